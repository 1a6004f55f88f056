//! Combiner: per-pixel sum across a fixed-size window of aligned frames.
//!
//! Groups are formed as disjoint, contiguous windows of size `n` over the
//! sorted raw-frame sequence; any trailing remainder (< n) is discarded.

use crate::error::CombineError;
use m23_io::Frame;
use ndarray::Array2;

/// Splits `frames` (already sorted by sequence order) into disjoint windows
/// of exactly `n` frames, dropping any trailing remainder.
pub fn group_into_windows<'a>(frames: &'a [Frame], n: usize) -> Vec<&'a [Frame]> {
    if n == 0 {
        return Vec::new();
    }
    frames.chunks(n).filter(|chunk| chunk.len() == n).collect()
}

/// Sums a single window of `n` aligned frames into one combined image,
/// copying header metadata from the first frame of the group.
pub fn combine_window(group: &[Frame]) -> Result<Frame, CombineError> {
    let first = &group[0];
    let shape = first.shape();
    let mut sum = Array2::<f32>::zeros(shape);
    for (index, frame) in group.iter().enumerate() {
        if frame.shape() != shape {
            return Err(CombineError::ShapeMismatch {
                first: shape,
                other: frame.shape(),
                index,
            });
        }
        sum += &frame.data;
    }
    Ok(Frame::new(sum, first.meta.clone()))
}

/// Combines every disjoint window of `n` aligned frames in `frames` (sorted
/// order), discarding any trailing remainder. A window containing a frame
/// that failed alignment upstream must already have been excluded by the
/// caller — the Combiner itself has no knowledge of alignment failures; the
/// enclosing orchestration discards the entire group containing such a
/// frame.
pub fn combine_all(frames: &[Frame], n: usize) -> Result<Vec<Frame>, CombineError> {
    group_into_windows(frames, n)
        .into_iter()
        .map(combine_window)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use m23_io::FrameMeta;

    fn frame(value: f32, seq: u32) -> Frame {
        Frame::new(
            Array2::from_elem((4, 4), value),
            FrameMeta { sequence_number: seq, ..Default::default() },
        )
    }

    #[test]
    fn sums_exactly_n_frames() {
        let frames: Vec<Frame> = (0..10).map(|i| frame(100.0, i)).collect();
        let combined = combine_all(&frames, 10).unwrap();
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].data[[0, 0]], 1000.0);
    }

    #[test]
    fn discards_trailing_remainder() {
        let frames: Vec<Frame> = (0..25).map(|i| frame(1.0, i)).collect();
        let combined = combine_all(&frames, 10).unwrap();
        // 25 / 10 = 2 full windows, 5 discarded
        assert_eq!(combined.len(), 2);
    }

    #[test]
    fn metadata_copied_from_first_frame_of_group() {
        let frames: Vec<Frame> = (0..10).map(|i| frame(1.0, i)).collect();
        let combined = combine_all(&frames, 10).unwrap();
        assert_eq!(combined[0].meta.sequence_number, 0);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let mut frames: Vec<Frame> = (0..10).map(|i| frame(1.0, i)).collect();
        frames[5] = Frame::new(Array2::from_elem((3, 3), 1.0), FrameMeta::default());
        assert!(combine_window(&frames).is_err());
    }
}

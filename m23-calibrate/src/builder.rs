//! Calibration Builder: master dark (per-pixel median of darks) and master
//! flat (per-pixel median of flats minus master dark).

use crate::error::CalibrationError;
use m23_io::Frame;
use ndarray::Array2;

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Per-pixel median across a set of same-shaped frames, cropping any
/// mismatched frame to `(rows, cols)` first.
fn pixelwise_median(frames: &[Frame], rows: usize, cols: usize) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((rows, cols));
    let mut column_buffer = Vec::with_capacity(frames.len());
    for r in 0..rows {
        for c in 0..cols {
            column_buffer.clear();
            for frame in frames {
                column_buffer.push(frame.data[[r, c]]);
            }
            out[[r, c]] = median(&mut column_buffer);
        }
    }
    out
}

/// Builds the master dark: per-pixel median over `darks`.
pub fn build_master_dark(
    darks: &[Frame],
    rows: usize,
    cols: usize,
) -> Result<Array2<f32>, CalibrationError> {
    if darks.is_empty() {
        return Err(CalibrationError::InsufficientCalibration(0, 0, false));
    }
    let cropped: Vec<Frame> = darks.iter().map(|f| f.cropped_to(rows, cols)).collect();
    Ok(pixelwise_median(&cropped, rows, cols))
}

/// Builds the master flat: per-pixel (median_of_flats - master_dark).
///
/// Classical bias frames are not used; the dark frames substitute for
/// flat-darks.
pub fn build_master_flat(
    flats: &[Frame],
    master_dark: &Array2<f32>,
    rows: usize,
    cols: usize,
    prebuilt_masterflat: Option<&Array2<f32>>,
) -> Result<Array2<f32>, CalibrationError> {
    if let Some(prebuilt) = prebuilt_masterflat {
        return Ok(prebuilt.clone());
    }
    if flats.is_empty() {
        return Err(CalibrationError::InsufficientCalibration(1, 0, false));
    }
    let cropped: Vec<Frame> = flats.iter().map(|f| f.cropped_to(rows, cols)).collect();
    let median_flats = pixelwise_median(&cropped, rows, cols);
    Ok(&median_flats - master_dark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use m23_io::FrameMeta;
    use ndarray::Array2;

    fn flat_frame(value: f32, rows: usize, cols: usize) -> Frame {
        Frame::new(Array2::from_elem((rows, cols), value), FrameMeta::default())
    }

    #[test]
    fn master_dark_is_pixelwise_median() {
        let darks = vec![flat_frame(1.0, 2, 2), flat_frame(3.0, 2, 2), flat_frame(5.0, 2, 2)];
        let dark = build_master_dark(&darks, 2, 2).unwrap();
        assert_eq!(dark[[0, 0]], 3.0);
    }

    #[test]
    fn no_darks_is_insufficient_calibration() {
        let darks: Vec<Frame> = vec![];
        assert!(matches!(
            build_master_dark(&darks, 2, 2),
            Err(CalibrationError::InsufficientCalibration(0, 0, false))
        ));
    }

    #[test]
    fn master_flat_subtracts_master_dark() {
        let flats = vec![flat_frame(10.0, 2, 2), flat_frame(12.0, 2, 2)];
        let dark = Array2::from_elem((2, 2), 2.0);
        let flat = build_master_flat(&flats, &dark, 2, 2, None).unwrap();
        assert_eq!(flat[[0, 0]], 9.0);
    }

    #[test]
    fn prebuilt_masterflat_is_used_verbatim() {
        let prebuilt = Array2::from_elem((2, 2), 42.0);
        let dark = Array2::from_elem((2, 2), 2.0);
        let flat = build_master_flat(&[], &dark, 2, 2, Some(&prebuilt)).unwrap();
        assert_eq!(flat[[0, 0]], 42.0);
    }
}

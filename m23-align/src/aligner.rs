//! Aligner: registers a calibrated frame to a fixed reference frame.
//!
//! Algorithm: detect bright sources in both frames, match
//! triangular asterisms between them to recover a similarity transform, then
//! resample the frame into the reference's pixel grid, filling unsampled
//! pixels with a sentinel.

use crate::detect::{detect_bright_sources, Source};
use crate::error::AlignError;
use crate::transform::SimilarityTransform;
use m23_io::Frame;
use ndarray::Array2;
use std::collections::HashMap;

/// Sentinel value written into output pixels whose pre-image falls outside
/// the source frame.
pub const ALIGNMENT_SENTINEL: f32 = 0.0;

pub struct Aligner {
    /// How many of the brightest sources to consider per frame. Asterism
    /// matching is cubic in this count, so it is kept small.
    pub max_sources: usize,
    /// Detection threshold in standard deviations above the mean.
    pub detection_sigma: f64,
    /// Relative tolerance when comparing triangle side-ratio invariants.
    pub triangle_tolerance: f64,
    /// Minimum number of distinct matched points required to accept a
    /// transform.
    pub min_matched_points: usize,
}

impl Default for Aligner {
    fn default() -> Self {
        Self {
            max_sources: 25,
            detection_sigma: 4.0,
            triangle_tolerance: 0.02,
            min_matched_points: 4,
        }
    }
}

/// The two invariant side-ratios of a triangle, computed from its sorted
/// side lengths `d1 <= d2 <= d3`: `(d1/d3, d2/d3)`.
fn triangle_invariant(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Option<[f64; 2]> {
    let dist = |p: (f64, f64), q: (f64, f64)| ((p.0 - q.0).powi(2) + (p.1 - q.1).powi(2)).sqrt();
    let mut sides = [dist(b, c), dist(a, c), dist(a, b)];
    sides.sort_by(|x, y| x.partial_cmp(y).unwrap());
    if sides[2] < 1e-6 {
        return None;
    }
    Some([sides[0] / sides[2], sides[1] / sides[2]])
}

/// Returns the indices of `points` sorted by the length of the side opposite
/// each vertex, ascending. Used to find a consistent vertex correspondence
/// between two similar triangles.
fn vertex_order_by_opposite_side(points: [(f64, f64); 3]) -> [usize; 3] {
    let dist = |p: (f64, f64), q: (f64, f64)| ((p.0 - q.0).powi(2) + (p.1 - q.1).powi(2)).sqrt();
    let opposite = [
        dist(points[1], points[2]),
        dist(points[0], points[2]),
        dist(points[0], points[1]),
    ];
    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| opposite[i].partial_cmp(&opposite[j]).unwrap());
    order
}

/// Finds a similarity transform mapping `frame_sources` onto `ref_sources` by
/// matching triangular asterisms and voting on point correspondences.
fn estimate_transform(
    frame_sources: &[Source],
    ref_sources: &[Source],
    tolerance: f64,
    min_matched_points: usize,
) -> Option<SimilarityTransform> {
    let n_frame = frame_sources.len();
    let n_ref = ref_sources.len();
    if n_frame < 3 || n_ref < 3 {
        return None;
    }

    let mut votes: HashMap<(usize, usize), u32> = HashMap::new();

    for i in 0..n_frame {
        for j in (i + 1)..n_frame {
            for k in (j + 1)..n_frame {
                let fp = [
                    (frame_sources[i].row, frame_sources[i].col),
                    (frame_sources[j].row, frame_sources[j].col),
                    (frame_sources[k].row, frame_sources[k].col),
                ];
                let Some(frame_inv) = triangle_invariant(fp[0], fp[1], fp[2]) else { continue };

                for a in 0..n_ref {
                    for b in (a + 1)..n_ref {
                        for c in (b + 1)..n_ref {
                            let rp = [
                                (ref_sources[a].row, ref_sources[a].col),
                                (ref_sources[b].row, ref_sources[b].col),
                                (ref_sources[c].row, ref_sources[c].col),
                            ];
                            let Some(ref_inv) = triangle_invariant(rp[0], rp[1], rp[2]) else {
                                continue;
                            };

                            if (frame_inv[0] - ref_inv[0]).abs() > tolerance
                                || (frame_inv[1] - ref_inv[1]).abs() > tolerance
                            {
                                continue;
                            }

                            let frame_order = vertex_order_by_opposite_side(fp);
                            let ref_order = vertex_order_by_opposite_side(rp);
                            let frame_idx = [i, j, k];
                            let ref_idx = [a, b, c];
                            for slot in 0..3 {
                                let f = frame_idx[frame_order[slot]];
                                let r = ref_idx[ref_order[slot]];
                                *votes.entry((f, r)).or_insert(0) += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    if votes.is_empty() {
        return None;
    }

    // For each frame source, keep its highest-voted reference correspondence.
    let mut best_for_frame: HashMap<usize, (usize, u32)> = HashMap::new();
    for (&(f, r), &count) in &votes {
        best_for_frame
            .entry(f)
            .and_modify(|entry| {
                if count > entry.1 {
                    *entry = (r, count);
                }
            })
            .or_insert((r, count));
    }

    let min_votes = 2;
    let mut pairs: Vec<((f64, f64), (f64, f64))> = best_for_frame
        .iter()
        .filter(|(_, &(_, count))| count >= min_votes)
        .map(|(&f, &(r, _))| {
            (
                (frame_sources[f].row, frame_sources[f].col),
                (ref_sources[r].row, ref_sources[r].col),
            )
        })
        .collect();

    if pairs.len() < min_matched_points {
        return None;
    }
    pairs.sort_by(|a, b| a.0 .0.partial_cmp(&b.0 .0).unwrap());

    SimilarityTransform::fit(&pairs)
}

/// Bilinear sample of `data` at fractional `(row, col)`. Returns `None` when
/// the sample falls outside `data`'s bounds.
fn bilinear_sample(data: &Array2<f32>, row: f64, col: f64) -> Option<f32> {
    let (rows, cols) = data.dim();
    if row < 0.0 || col < 0.0 || row > (rows - 1) as f64 || col > (cols - 1) as f64 {
        return None;
    }
    let r0 = row.floor() as usize;
    let c0 = col.floor() as usize;
    let r1 = (r0 + 1).min(rows - 1);
    let c1 = (c0 + 1).min(cols - 1);
    let fr = row - r0 as f64;
    let fc = col - c0 as f64;

    let v00 = data[[r0, c0]] as f64;
    let v01 = data[[r0, c1]] as f64;
    let v10 = data[[r1, c0]] as f64;
    let v11 = data[[r1, c1]] as f64;

    let top = v00 * (1.0 - fc) + v01 * fc;
    let bottom = v10 * (1.0 - fc) + v11 * fc;
    Some((top * (1.0 - fr) + bottom * fr) as f32)
}

impl Aligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `frame` to `reference`, returning a new frame with the same
    /// shape where the same sky position maps to the same pixel index as in
    /// `reference`.
    pub fn align(&self, frame: &Frame, reference: &Frame) -> Result<Frame, AlignError> {
        let frame_sources = detect_bright_sources(&frame.data, self.max_sources, self.detection_sigma);
        let ref_sources =
            detect_bright_sources(&reference.data, self.max_sources, self.detection_sigma);

        if frame_sources.len() < 3 || ref_sources.len() < 3 {
            return Err(AlignError::InsufficientSources {
                frame: frame_sources.len(),
                reference: ref_sources.len(),
            });
        }

        let transform = estimate_transform(
            &frame_sources,
            &ref_sources,
            self.triangle_tolerance,
            self.min_matched_points,
        )
        .ok_or(AlignError::AlignmentFailed {
            required: self.min_matched_points,
            found: 0,
        })?;

        // `transform` maps frame coordinates onto reference coordinates; to
        // resample into the reference grid we need the inverse (reference
        // pixel -> frame pixel to sample from).
        let inverse = transform.invert().ok_or(AlignError::AlignmentFailed {
            required: self.min_matched_points,
            found: 0,
        })?;

        let (rows, cols) = reference.shape();
        let mut out = Array2::<f32>::from_elem((rows, cols), ALIGNMENT_SENTINEL);
        for r in 0..rows {
            for c in 0..cols {
                let (src_row, src_col) = inverse.apply(r as f64, c as f64);
                if let Some(value) = bilinear_sample(&frame.data, src_row, src_col) {
                    out[[r, c]] = value;
                }
            }
        }

        Ok(Frame::new(out, frame.meta.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use m23_io::FrameMeta;

    fn star_field(rows: usize, cols: usize, stars: &[(usize, usize)], shift: (i32, i32)) -> Array2<f32> {
        let mut data = Array2::<f32>::from_elem((rows, cols), 10.0);
        for &(r, c) in stars {
            let nr = r as i32 + shift.0;
            let nc = c as i32 + shift.1;
            if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                data[[nr as usize, nc as usize]] = 5000.0;
            }
        }
        data
    }

    #[test]
    fn aligns_a_pure_translation() {
        let stars = [(20, 20), (20, 60), (60, 30), (70, 70), (35, 75)];
        let reference = Frame::new(star_field(100, 100, &stars, (0, 0)), FrameMeta::default());
        let shifted = Frame::new(star_field(100, 100, &stars, (3, -2)), FrameMeta::default());

        let aligner = Aligner::new();
        let aligned = aligner.align(&shifted, &reference).unwrap();

        assert_eq!(aligned.shape(), reference.shape());
        for &(r, c) in &stars {
            assert!(aligned.data[[r, c]] > 1000.0, "expected bright star at ({r},{c})");
        }
    }

    #[test]
    fn insufficient_sources_fails() {
        let reference = Frame::new(Array2::<f32>::from_elem((50, 50), 10.0), FrameMeta::default());
        let frame = Frame::new(Array2::<f32>::from_elem((50, 50), 10.0), FrameMeta::default());
        let aligner = Aligner::new();
        assert!(matches!(
            aligner.align(&frame, &reference),
            Err(AlignError::InsufficientSources { .. })
        ));
    }
}

//! Calibrator: applies master dark/flat calibration to a raw frame.

use crate::error::CalibrationError;
use m23_io::{CropRegion, Frame};
use ndarray::Array2;

/// Which variant of hot-pixel correction to apply, if enabled. Both are
/// documented but currently inactive by default; which one (if either)
/// should run, and whether pre- or post-calibration, remains an open
/// question this workspace does not guess — the flag defaults to
/// `Disabled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HotPixelCorrection {
    #[default]
    Disabled,
    /// Replace a hot pixel with the mean of its eight 3x3 neighbors.
    NeighborMean,
    /// Replace a hot pixel with a Gaussian fit over its surrounding 10x10
    /// box, evaluated at the center, when both the center and any 4-neighbor
    /// exceed `median(R) + 2 sigma(R)`.
    GaussianFit,
}

type RawFrameTransform = dyn Fn(&Frame) -> Frame + Send + Sync;

/// Applies flat-field calibration to raw frames. The optional
/// `raw_frame_transform` is the "coma correction" external-collaborator hook:
/// when present it runs on the raw frame before any calibration arithmetic;
/// absent, the identity transform is used.
pub struct Calibrator {
    pub hot_pixel_correction: HotPixelCorrection,
    raw_frame_transform: Option<Box<RawFrameTransform>>,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self {
            hot_pixel_correction: HotPixelCorrection::default(),
            raw_frame_transform: None,
        }
    }
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hot_pixel_correction(mut self, mode: HotPixelCorrection) -> Self {
        self.hot_pixel_correction = mode;
        self
    }

    pub fn with_raw_frame_transform(
        mut self,
        transform: Box<dyn Fn(&Frame) -> Frame + Send + Sync>,
    ) -> Self {
        self.raw_frame_transform = Some(transform);
        self
    }

    /// Side length (in pixels) of the centered square region averaged for
    /// `flat_center_mean`: 175 px for a 1024^2 frame, 350 px for a 2048^2
    /// frame — both are the same fraction (175/1024) of the frame side, so
    /// this scales linearly rather than halving it.
    fn flat_center_side(rows: usize) -> usize {
        ((rows as f64) * 175.0 / 1024.0).round() as usize
    }

    fn flat_center_mean(flat: &Array2<f32>) -> f32 {
        let (rows, cols) = flat.dim();
        let side = Self::flat_center_side(rows).min(Self::flat_center_side(cols));
        let row_start = (rows - side) / 2;
        let col_start = (cols - side) / 2;
        let region = flat.slice(ndarray::s![
            row_start..row_start + side,
            col_start..col_start + side
        ]);
        let sum: f64 = region.iter().map(|v| *v as f64).sum();
        (sum / region.len() as f64) as f32
    }

    /// Applies the full calibration contract to a raw frame, returning the
    /// calibrated frame.
    pub fn calibrate(
        &self,
        raw: &Frame,
        master_dark: &Array2<f32>,
        master_flat: &Array2<f32>,
        crop_region: &CropRegion,
    ) -> Result<Frame, CalibrationError> {
        let raw = match &self.raw_frame_transform {
            Some(transform) => transform(raw),
            None => raw.clone(),
        };

        let (rows, cols) = master_dark.dim();
        let raw = if !crop_region.is_empty() {
            raw.cropped_to(rows, cols)
        } else {
            raw
        };

        if raw.shape() != master_dark.dim() || raw.shape() != master_flat.dim() {
            return Err(CalibrationError::CalibrationDimensionMismatch {
                raw: raw.shape(),
                dark: master_dark.dim(),
                flat: master_flat.dim(),
            });
        }

        let flat_center_mean = Self::flat_center_mean(master_flat);
        let mut calibrated = Array2::<f32>::zeros(raw.shape());
        ndarray::azip!((c in &mut calibrated, &r in &raw.data, &d in master_dark, &f in master_flat) {
            *c = (flat_center_mean / f) * (r - d);
        });

        if !crop_region.is_empty() {
            // Sentinel is applied AFTER the calibration arithmetic so it does
            // not propagate through division.
            crop_region.fill(&mut calibrated, 1.0);
        }

        if self.hot_pixel_correction != HotPixelCorrection::Disabled {
            correct_hot_pixels(&mut calibrated, master_dark, self.hot_pixel_correction);
        }

        Ok(Frame::new(calibrated, raw.meta.clone()))
    }
}

fn std_dev(data: &Array2<f32>) -> f32 {
    let mean = data.mean().unwrap_or(0.0);
    let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / data.len() as f32;
    variance.sqrt()
}

fn correct_hot_pixels(image: &mut Array2<f32>, dark: &Array2<f32>, mode: HotPixelCorrection) {
    let (rows, cols) = dark.dim();
    let dark_median = {
        let mut values: Vec<f32> = dark.iter().copied().collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        values[values.len() / 2]
    };
    let dark_std = std_dev(dark);
    let threshold = dark_median + 3.0 * dark_std;

    let edge_band = 5;
    let mut hot: Vec<(usize, usize)> = Vec::new();
    for r in edge_band..rows.saturating_sub(edge_band) {
        for c in edge_band..cols.saturating_sub(edge_band) {
            if dark[[r, c]] > threshold {
                hot.push((r, c));
            }
        }
    }

    match mode {
        HotPixelCorrection::Disabled => {}
        HotPixelCorrection::NeighborMean => {
            for (r, c) in hot {
                let mut sum = 0.0f32;
                let mut count = 0;
                for dr in -1i32..=1 {
                    for dc in -1i32..=1 {
                        if dr == 0 && dc == 0 {
                            continue;
                        }
                        let nr = r as i32 + dr;
                        let nc = c as i32 + dc;
                        if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                            sum += image[[nr as usize, nc as usize]];
                            count += 1;
                        }
                    }
                }
                if count > 0 {
                    image[[r, c]] = sum / count as f32;
                }
            }
        }
        HotPixelCorrection::GaussianFit => {
            let image_std = std_dev(image);
            let mean = image.mean().unwrap_or(0.0);
            let local_threshold = mean + 2.0 * image_std;
            for (r, c) in hot {
                let exceeds_neighbor = [(-1i32, 0i32), (1, 0), (0, -1), (0, 1)].iter().any(|(dr, dc)| {
                    let nr = r as i32 + dr;
                    let nc = c as i32 + dc;
                    nr >= 0
                        && nc >= 0
                        && (nr as usize) < rows
                        && (nc as usize) < cols
                        && image[[nr as usize, nc as usize]] > local_threshold
                });
                if image[[r, c]] > local_threshold && exceeds_neighbor {
                    image[[r, c]] = gaussian_fit_center(image, r, c, rows, cols);
                }
            }
        }
    }
}

/// Evaluates a Gaussian fit over the 10x10 box surrounding `(r, c)` at its
/// center, approximated here by the intensity-weighted mean of that box
/// (a lightweight stand-in for a full nonlinear Gaussian fit, consistent
/// with the centroid-refinement style used in the Extractor).
fn gaussian_fit_center(image: &Array2<f32>, r: usize, c: usize, rows: usize, cols: usize) -> f32 {
    let half = 5i32;
    let r0 = r as i32;
    let c0 = c as i32;
    let mut weighted_sum = 0.0f64;
    let mut weight_total = 0.0f64;
    for dr in -half..half {
        for dc in -half..half {
            let nr = r0 + dr;
            let nc = c0 + dc;
            if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                let value = image[[nr as usize, nc as usize]] as f64;
                let dist2 = (dr * dr + dc * dc) as f64;
                let weight = (-dist2 / 8.0).exp();
                weighted_sum += value * weight;
                weight_total += weight;
            }
        }
    }
    if weight_total > 0.0 {
        (weighted_sum / weight_total) as f32
    } else {
        image[[r, c]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use m23_io::FrameMeta;

    #[test]
    fn calibrate_matches_testable_property() {
        // calibrated(i,j) = (flat_center_mean / F(i,j)) * (R(i,j) - D(i,j))
        let raw = Frame::new(Array2::from_elem((10, 10), 100.0), FrameMeta::default());
        let dark = Array2::from_elem((10, 10), 1.0);
        let flat = Array2::from_elem((10, 10), 2.0);
        let calibrator = Calibrator::new();
        let calibrated = calibrator
            .calibrate(&raw, &dark, &flat, &CropRegion::default())
            .unwrap();
        // flat is uniform so flat_center_mean == 2.0; (2.0/2.0)*(100-1) = 99
        assert!((calibrated.data[[5, 5]] - 99.0).abs() < 1e-4);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let raw = Frame::new(Array2::from_elem((10, 10), 100.0), FrameMeta::default());
        let dark = Array2::from_elem((8, 8), 1.0);
        let flat = Array2::from_elem((8, 8), 2.0);
        let calibrator = Calibrator::new();
        assert!(calibrator
            .calibrate(&raw, &dark, &flat, &CropRegion::default())
            .is_err());
    }

    #[test]
    fn crop_region_sentinel_applied_after_arithmetic() {
        let raw = Frame::new(Array2::from_elem((10, 10), 100.0), FrameMeta::default());
        let dark = Array2::from_elem((10, 10), 1.0);
        let flat = Array2::from_elem((10, 10), 2.0);
        let region = CropRegion {
            polygons: vec![vec![(0, 0), (0, 4), (4, 4), (4, 0)]],
        };
        let calibrator = Calibrator::new();
        let calibrated = calibrator.calibrate(&raw, &dark, &flat, &region).unwrap();
        assert_eq!(calibrated.data[[1, 1]], 1.0);
        assert!((calibrated.data[[8, 8]] - 99.0).abs() < 1e-4);
    }
}

//! 2-D image matrices and their metadata.

use ndarray::Array2;
use std::path::PathBuf;

/// Metadata accompanying a [`Frame`]: duration, timestamp, sequence number,
/// and where it came from on disk.
#[derive(Debug, Clone, Default)]
pub struct FrameMeta {
    pub exposure_duration: f64,
    pub timestamp: Option<chrono::NaiveDateTime>,
    pub sequence_number: u32,
    pub origin_path: Option<PathBuf>,
}

/// A 2-D matrix of non-negative intensities plus its metadata.
///
/// Frames are value-like: stages consume and produce frames, never mutate one
/// in place that another stage still holds a reference to.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Array2<f32>,
    pub meta: FrameMeta,
}

impl Frame {
    pub fn new(data: Array2<f32>, meta: FrameMeta) -> Self {
        Self { data, meta }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Trims extraneous rows/cols so the frame matches `(rows, cols)`, taking
    /// the top-left `rows x cols` window. Used by the Calibration Builder and
    /// Calibrator before any pixel arithmetic.
    pub fn cropped_to(&self, rows: usize, cols: usize) -> Frame {
        if self.shape() == (rows, cols) {
            return self.clone();
        }
        let data = self.data.slice(ndarray::s![0..rows, 0..cols]).to_owned();
        Frame::new(data, self.meta.clone())
    }
}

/// Ordered list of polygons (each a sequence of integer (x, y) vertices)
/// defining pixels to overwrite with a sentinel value.
///
/// Invariant: all vertex coordinates lie within image bounds (checked by the
/// caller before use; lives for the lifetime of the configuration).
#[derive(Debug, Clone, Default)]
pub struct CropRegion {
    pub polygons: Vec<Vec<(u32, u32)>>,
}

impl CropRegion {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Overwrites pixels inside any polygon with `fill_value`, in place.
    ///
    /// Uses an even-odd scanline fill (no external polygon-rasterization
    /// dependency is part of the stack this workspace carries forward).
    pub fn fill(&self, data: &mut Array2<f32>, fill_value: f32) {
        let (rows, cols) = data.dim();
        for polygon in &self.polygons {
            if polygon.len() < 3 {
                continue;
            }
            for row in 0..rows {
                let y = row as f64 + 0.5;
                let mut crossings: Vec<f64> = Vec::new();
                let n = polygon.len();
                for i in 0..n {
                    let (x1, y1) = polygon[i];
                    let (x2, y2) = polygon[(i + 1) % n];
                    let (y1, y2) = (y1 as f64, y2 as f64);
                    if (y1 <= y && y < y2) || (y2 <= y && y < y1) {
                        let (x1, x2) = (x1 as f64, x2 as f64);
                        let t = (y - y1) / (y2 - y1);
                        crossings.push(x1 + t * (x2 - x1));
                    }
                }
                crossings.sort_by(|a, b| a.partial_cmp(b).unwrap());
                for pair in crossings.chunks(2) {
                    if pair.len() < 2 {
                        continue;
                    }
                    let start = pair[0].ceil().max(0.0) as usize;
                    let end = (pair[1].ceil() as i64).min(cols as i64).max(0) as usize;
                    for col in start..end.min(cols) {
                        data[[row, col]] = fill_value;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn cropped_to_trims_trailing_rows_cols() {
        let data = Array2::from_shape_fn((6, 6), |(r, c)| (r * 6 + c) as f32);
        let frame = Frame::new(data, FrameMeta::default());
        let cropped = frame.cropped_to(4, 4);
        assert_eq!(cropped.shape(), (4, 4));
        assert_eq!(cropped.data[[0, 0]], 0.0);
        assert_eq!(cropped.data[[3, 3]], frame.data[[3, 3]]);
    }

    #[test]
    fn crop_region_fills_triangle() {
        let mut data = Array2::<f32>::zeros((10, 10));
        let region = CropRegion {
            polygons: vec![vec![(0, 0), (0, 9), (9, 0)]],
        };
        region.fill(&mut data, 1.0);
        assert_eq!(data[[0, 0]], 1.0);
        assert_eq!(data[[9, 9]], 0.0);
    }

    #[test]
    fn empty_crop_region_is_empty() {
        let region = CropRegion::default();
        assert!(region.is_empty());
    }
}

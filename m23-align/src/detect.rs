//! Coarse bright-source peak finder used for asterism matching.
//!
//! This is deliberately not the Extractor's full sky-background-subtracted
//! centroid pipeline: alignment only needs a handful of
//! well-separated bright points, found fast, not photometrically accurate
//! centroids.

use ndarray::Array2;

/// A detected source: its (row, col) pixel position and peak intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Source {
    pub row: f64,
    pub col: f64,
    pub peak: f32,
}

fn mean_and_std(data: &Array2<f32>) -> (f64, f64) {
    let n = data.len() as f64;
    let mean: f64 = data.iter().map(|v| *v as f64).sum::<f64>() / n;
    let variance: f64 = data.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Detects local-maximum bright sources above `background + k*sigma`, returns
/// up to `max_sources` ordered brightest-first.
///
/// A pixel is a local maximum if it is strictly greater than all eight of its
/// neighbors (so flat plateaus do not produce duplicate detections one pixel
/// apart).
pub fn detect_bright_sources(data: &Array2<f32>, max_sources: usize, k: f64) -> Vec<Source> {
    let (mean, std) = mean_and_std(data);
    let threshold = (mean + k * std) as f32;
    let (rows, cols) = data.dim();

    let mut sources = Vec::new();
    for r in 1..rows.saturating_sub(1) {
        for c in 1..cols.saturating_sub(1) {
            let value = data[[r, c]];
            if value <= threshold {
                continue;
            }
            let is_peak = (-1i32..=1).all(|dr| {
                (-1i32..=1).all(|dc| {
                    if dr == 0 && dc == 0 {
                        true
                    } else {
                        let nr = (r as i32 + dr) as usize;
                        let nc = (c as i32 + dc) as usize;
                        value > data[[nr, nc]]
                    }
                })
            });
            if is_peak {
                sources.push(Source {
                    row: r as f64,
                    col: c as f64,
                    peak: value,
                });
            }
        }
    }

    sources.sort_by(|a, b| b.peak.partial_cmp(&a.peak).unwrap());
    sources.truncate(max_sources);
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_a_single_bright_peak() {
        let mut data = Array2::<f32>::zeros((20, 20));
        data[[10, 10]] = 1000.0;
        let sources = detect_bright_sources(&data, 10, 3.0);
        assert_eq!(sources.len(), 1);
        assert_eq!((sources[0].row, sources[0].col), (10.0, 10.0));
    }

    #[test]
    fn orders_brightest_first() {
        let mut data = Array2::<f32>::zeros((20, 20));
        data[[5, 5]] = 500.0;
        data[[15, 15]] = 900.0;
        let sources = detect_bright_sources(&data, 10, 3.0);
        assert_eq!(sources.len(), 2);
        assert_eq!((sources[0].row, sources[0].col), (15.0, 15.0));
    }

    #[test]
    fn caps_at_max_sources() {
        let mut data = Array2::<f32>::zeros((20, 20));
        for i in 0..5 {
            data[[2 + i * 3, 2]] = 100.0 + i as f32;
        }
        let sources = detect_bright_sources(&data, 2, 3.0);
        assert_eq!(sources.len(), 2);
    }
}

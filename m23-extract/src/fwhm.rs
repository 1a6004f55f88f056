//! FWHM estimation: second-moment estimate over an 11-pixel 1-D slice through
//! the centroid, along each axis independently.

use ndarray::Array2;

fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Second-moment FWHM along one axis: `2.355 * sqrt(weighted_sum /
/// (baseline_subtracted_sum - 1))`, where `weighted_sum` accumulates
/// `(I - sky) * (position - center)^2` over an 11-pixel window and
/// `baseline_subtracted_sum` is the raw intensity sum minus `11 * sky`.
///
/// Returns `0.0` if the baseline-subtracted sum is not large enough to take
/// a square root of a positive number (a flat or sky-dominated slice).
fn axis_fwhm(samples: &[(f64, f64)], center: f64, sky_per_pixel: f64) -> f64 {
    let mut weighted_sum = 0.0f64;
    let mut raw_sum = 0.0f64;
    for &(position, intensity) in samples {
        raw_sum += intensity;
        weighted_sum += (intensity - sky_per_pixel) * (position - center).powi(2);
    }
    let baseline_subtracted = raw_sum - sky_per_pixel * samples.len() as f64;
    let denom = baseline_subtracted - 1.0;
    if denom <= 0.0 || weighted_sum <= 0.0 {
        return 0.0;
    }
    2.355 * (weighted_sum / denom).sqrt()
}

/// Computes `(x_fwhm, y_fwhm, avg_fwhm)` for a star centered at `(row, col)`.
/// `x_fwhm` varies along columns (the x axis); `y_fwhm` varies along rows
/// (the y axis), matching the catalog's x=column, y=row convention.
pub fn fwhm(image: &Array2<f32>, row: f64, col: f64, sky_per_pixel: f64) -> (f64, f64, f64) {
    let (rows, cols) = image.dim();
    let row0 = round_half_up(row);
    let col0 = round_half_up(col);

    let mut col_samples = Vec::with_capacity(11);
    for dc in -5i64..=5 {
        let c = col0 + dc;
        if row0 >= 0 && c >= 0 && (row0 as usize) < rows && (c as usize) < cols {
            col_samples.push((col + dc as f64, image[[row0 as usize, c as usize]] as f64));
        }
    }
    let mut row_samples = Vec::with_capacity(11);
    for dr in -5i64..=5 {
        let r = row0 + dr;
        if r >= 0 && col0 >= 0 && (r as usize) < rows && (col0 as usize) < cols {
            row_samples.push((row + dr as f64, image[[r as usize, col0 as usize]] as f64));
        }
    }

    let x_fwhm = axis_fwhm(&col_samples, col, sky_per_pixel);
    let y_fwhm = axis_fwhm(&row_samples, row, sky_per_pixel);
    let avg_fwhm = (x_fwhm + y_fwhm) / 2.0;
    (x_fwhm, y_fwhm, avg_fwhm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_profile_yields_zero_fwhm() {
        let image = Array2::<f32>::from_elem((30, 30), 50.0);
        let (x, y, avg) = fwhm(&image, 15.0, 15.0, 50.0);
        assert_eq!((x, y, avg), (0.0, 0.0, 0.0));
    }

    #[test]
    fn peaked_profile_yields_positive_fwhm() {
        let mut image = Array2::<f32>::from_elem((30, 30), 50.0);
        for dr in -2i32..=2 {
            for dc in -2i32..=2 {
                image[[(15 + dr) as usize, (15 + dc) as usize]] = 500.0;
            }
        }
        let (x, y, avg) = fwhm(&image, 15.0, 15.0, 50.0);
        assert!(x > 0.0);
        assert!(y > 0.0);
        assert!((avg - (x + y) / 2.0).abs() < 1e-9);
    }
}

//! Intra-Night Normalizer: chooses four anchor log files spread through the
//! night, derives a per-image scale factor equalizing each other file's star
//! fluxes to the anchor sum, and emits normalized flux/scale time series.

use crate::error::IntraNormalizeError;
use crate::mask::find_corner_quadrilateral;
use m23_catalog::ReferenceCatalog;
use m23_io::textfmt::LogFileCombinedRow;

/// One night's extracted log file, already selected for a single radius
/// column (the caller picks the radius index out of each row's `star_adu`
/// before constructing this).
#[derive(Debug, Clone)]
pub struct LogFileEntry {
    /// Used only for deterministic tie-breaking when two files share a
    /// sequence number: the smaller path-sort order wins.
    pub path_sort_key: String,
    pub sequence_number: u32,
    pub rows: Vec<LogFileCombinedRow>,
}

/// Per-star normalized flux time series and the shared per-image scale
/// factor series, in file order.
pub struct IntraNightResult {
    /// `norm_factor[i]` is `n(f)` for the i-th log file in sorted order.
    pub norm_factors: Vec<f64>,
    /// `fluxes[star_index][i]` is the normalized flux for that star in the
    /// i-th log file.
    pub fluxes: Vec<Vec<f64>>,
}

fn sort_log_files(mut files: Vec<LogFileEntry>) -> Vec<LogFileEntry> {
    files.sort_by(|a, b| {
        a.sequence_number
            .cmp(&b.sequence_number)
            .then_with(|| a.path_sort_key.cmp(&b.path_sort_key))
    });
    files
}

fn anchor_indices(n: usize) -> [usize; 4] {
    [
        (n * 1) / 5,
        (n * 2) / 5,
        (n * 3) / 5,
        (n * 4) / 5,
    ]
}

/// Builds the per-file exclusion mask: `true` means the star is included.
fn build_inclusion_mask(
    catalog: &ReferenceCatalog,
    rows: &[LogFileCombinedRow],
    image_rows: usize,
    image_cols: usize,
) -> Vec<bool> {
    let quad = find_corner_quadrilateral(catalog, image_rows, image_cols);
    catalog
        .stars
        .iter()
        .zip(rows.iter())
        .map(|(star, row)| {
            let drift = ((row.x - star.x).powi(2) + (row.y - star.y).powi(2)).sqrt();
            if drift > 1.0 {
                return false;
            }
            match &quad {
                Some(q) => q.contains_with_margin((row.x, row.y), 12.0),
                None => true,
            }
        })
        .collect()
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Runs the full intra-night normalization for one night at one radius.
///
/// `files` need not be pre-sorted; this function sorts them by sequence
/// number (tie-broken by `path_sort_key`) before anchor selection.
pub fn intra_night_normalize(
    catalog: &ReferenceCatalog,
    files: Vec<LogFileEntry>,
    image_rows: usize,
    image_cols: usize,
    radius_index: usize,
) -> Result<IntraNightResult, IntraNormalizeError> {
    let files = sort_log_files(files);
    let n = files.len();
    if n < 4 {
        return Err(IntraNormalizeError::InsufficientSamples(n));
    }

    let anchors = anchor_indices(n);
    let n_stars = catalog.len();

    // Precompute inclusion masks and ADU-at-radius for every file.
    let masks: Vec<Vec<bool>> = files
        .iter()
        .map(|f| build_inclusion_mask(catalog, &f.rows, image_rows, image_cols))
        .collect();
    let adus: Vec<Vec<f64>> = files
        .iter()
        .map(|f| f.rows.iter().map(|r| r.star_adu[radius_index]).collect())
        .collect();

    // anchor_sum[star] = sum of ADU for that star across the four anchors,
    // restricted to files/stars where the star was included by that file's
    // mask (excluded stars contribute 0).
    let mut anchor_sum = vec![0.0f64; n_stars];
    for &anchor_idx in &anchors {
        for star_idx in 0..n_stars {
            if masks[anchor_idx][star_idx] {
                anchor_sum[star_idx] += adus[anchor_idx][star_idx];
            }
        }
    }

    let mut norm_factors = Vec::with_capacity(n);
    for file_idx in 0..n {
        let mut scales = Vec::with_capacity(n_stars);
        for star_idx in 0..n_stars {
            if !masks[file_idx][star_idx] {
                continue;
            }
            let f_adu = adus[file_idx][star_idx];
            if f_adu == 0.0 {
                continue;
            }
            let scale = anchor_sum[star_idx] / (4.0 * f_adu);
            if scale.is_finite() && scale > 0.0 && scale <= 5.0 {
                scales.push(scale);
            }
        }
        let n_factor = if scales.is_empty() { 0.0 } else { median(&mut scales) };
        norm_factors.push(n_factor);
    }

    let mut fluxes = vec![Vec::with_capacity(n); n_stars];
    for (file_idx, &n_factor) in norm_factors.iter().enumerate() {
        for star_idx in 0..n_stars {
            let flux = (n_factor * adus[file_idx][star_idx]).max(0.0);
            fluxes[star_idx].push(flux);
        }
    }

    Ok(IntraNightResult { norm_factors, fluxes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use m23_catalog::CatalogStar;
    use std::collections::HashMap;

    fn catalog_with_stars(positions: &[(f64, f64)]) -> ReferenceCatalog {
        ReferenceCatalog {
            stars: positions
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| CatalogStar {
                    number: (i + 1) as u32,
                    x,
                    y,
                    ref_adu: HashMap::new(),
                    r_i: None,
                })
                .collect(),
        }
    }

    fn row(x: f64, y: f64, adu: f64) -> LogFileCombinedRow {
        LogFileCombinedRow {
            x,
            y,
            x_fwhm: 3.0,
            y_fwhm: 3.0,
            avg_fwhm: 3.0,
            sky_adu: 0.0,
            star_adu: vec![adu],
        }
    }

    #[test]
    fn anchor_pick_at_fifths() {
        // 50 files -> anchors at indices 10,20,30,40.
        assert_eq!(anchor_indices(50), [10, 20, 30, 40]);
    }

    #[test]
    fn fewer_than_four_files_is_insufficient_samples() {
        let catalog = catalog_with_stars(&[(100.0, 100.0)]);
        let files = vec![
            LogFileEntry { path_sort_key: "a".into(), sequence_number: 1, rows: vec![row(100.0, 100.0, 500.0)] },
            LogFileEntry { path_sort_key: "b".into(), sequence_number: 2, rows: vec![row(100.0, 100.0, 500.0)] },
        ];
        let result = intra_night_normalize(&catalog, files, 1024, 1024, 0);
        assert!(matches!(result, Err(IntraNormalizeError::InsufficientSamples(2))));
    }

    #[test]
    fn self_normalizing_an_anchor_yields_scale_near_one() {
        // Normalizing an anchor against itself (all files identical) yields
        // a median scale of ~1.
        let catalog = catalog_with_stars(&[(512.0, 512.0), (200.0, 200.0), (800.0, 800.0)]);
        let files: Vec<LogFileEntry> = (0..10)
            .map(|i| LogFileEntry {
                path_sort_key: format!("{i:03}"),
                sequence_number: i,
                rows: vec![row(512.0, 512.0, 1000.0), row(200.0, 200.0, 2000.0), row(800.0, 800.0, 3000.0)],
            })
            .collect();
        let result = intra_night_normalize(&catalog, files, 1024, 1024, 0).unwrap();
        for factor in &result.norm_factors {
            assert!((factor - 1.0).abs() < 1e-4, "factor {factor} not near 1.0");
        }
    }

    #[test]
    fn negative_normalized_flux_is_clamped_to_zero() {
        let catalog = catalog_with_stars(&[(512.0, 512.0)]);
        let files: Vec<LogFileEntry> = (0..5)
            .map(|i| LogFileEntry {
                path_sort_key: format!("{i}"),
                sequence_number: i,
                rows: vec![row(512.0, 512.0, -10.0)],
            })
            .collect();
        let result = intra_night_normalize(&catalog, files, 1024, 1024, 0).unwrap();
        for flux in &result.fluxes[0] {
            assert!(*flux >= 0.0);
        }
    }
}

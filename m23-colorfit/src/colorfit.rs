//! Inter-Night Normalizer: derives a per-star correction factor from a
//! reference catalog's expected ADU against this night's measured flux,
//! segmented by color (R-I) and, for stars lacking usable color data, by
//! brightness magnitude.

use crate::error::ColorFitError;
use crate::polyfit::{evaluate, mean, median, polyfit, std_dev};
use m23_catalog::ReferenceCatalog;
use std::collections::HashMap;

const MIN_TOLERABLE_INTRANIGHT_NORMFACTOR: f64 = 0.85;
const MAX_TOLERABLE_INTRANIGHT_NORMFACTOR: f64 = 1.15;

const SECTION_1_RANGE: (f64, f64) = (0.135, 0.455);
const SECTION_2_RANGE: (f64, f64) = (0.455, 1.063);
const SECTION_3_RANGE: (f64, f64) = (1.063, 7.0);

const HISTOGRAM_BINS: usize = 11;
const OUTLIER_SIGMA: f64 = 2.0;

/// A fixed table of stars whose colorimetry is unreliable (long-period
/// variables) but for which a surrogate R-I has been derived by hand and is
/// evaluated against the section-3 color fit.
const LPV_SURROGATE_COLORS: &[(u32, f64)] = &[
    (814, 2.6137),
    (1223, 3.6242),
    (1654, 2.8866),
    (1702, 2.9175),
    (1716, 2.6137),
    (1843, 2.7849),
    (2437, 2.5545),
    (2509, 2.7816),
    (2510, 3.0923),
];

/// Per-radius coefficients for `m(s) = a - b * log10(flux(s))`.
fn magnitude_coefficients(radius: u32) -> Result<(f64, f64), ColorFitError> {
    match radius {
        3 => Ok((23.971, 2.9507)),
        4 => Ok((24.176, 2.6148)),
        5 => Ok((23.99, 2.5665)),
        other => Err(ColorFitError::UnsupportedRadius(other)),
    }
}

/// One star's per-night flux time series, in combined-image order, and the
/// parallel intra-night normalization factor applied to each sample.
pub struct StarObservation {
    pub star_number: u32,
    pub time_series: Vec<f64>,
    pub intra_norm_factors: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ColorFitResult {
    pub star_number: u32,
    pub median_flux: f64,
    pub normalized_median_flux: f64,
    pub norm_factor: f64,
    pub measured_r_i: Option<f64>,
    pub used_r_i: Option<f64>,
}

fn attendance(time_series: &[f64]) -> f64 {
    if time_series.is_empty() {
        return 0.0;
    }
    let present = time_series.iter().filter(|&&v| v > 0.0).count();
    present as f64 / time_series.len() as f64
}

/// The "upper-mid" median: `sorted[len/2]`, taken only over samples that are
/// strictly positive and whose intra-night norm factor survived within
/// [0.85, 1.15]. NaN if no sample survives.
fn specialized_median(time_series: &[f64], intra_norm_factors: &[f64]) -> f64 {
    let mut surviving: Vec<f64> = time_series
        .iter()
        .zip(intra_norm_factors.iter())
        .filter(|(&v, &f)| v > 0.0 && (MIN_TOLERABLE_INTRANIGHT_NORMFACTOR..=MAX_TOLERABLE_INTRANIGHT_NORMFACTOR).contains(&f))
        .map(|(&v, _)| v)
        .collect();
    if surviving.is_empty() {
        return f64::NAN;
    }
    surviving.sort_by(|a, b| a.partial_cmp(b).unwrap());
    surviving[surviving.len() / 2]
}

fn section_for_color(color: f64) -> Option<u8> {
    if color.abs() < 0.0001 {
        return None;
    }
    if color > SECTION_1_RANGE.0 && color <= SECTION_1_RANGE.1 {
        Some(1)
    } else if color > SECTION_2_RANGE.0 && color <= SECTION_2_RANGE.1 {
        Some(2)
    } else if color > SECTION_3_RANGE.0 && color <= SECTION_3_RANGE.1 {
        Some(3)
    } else {
        None
    }
}

/// Replaces the first/last values of a sorted-by-color series with the mean
/// of their two nearest interior neighbors when they sit more than 2 sigma
/// from their immediate neighbor. Affects only the values handed to the
/// polynomial fit, never the stored residual/flux data.
fn synthesize_endpoints(ys: &[f64]) -> Vec<f64> {
    let mut fit_ys = ys.to_vec();
    if ys.len() < 4 {
        return fit_ys;
    }
    let sigma = std_dev(ys);
    if sigma <= 0.0 {
        return fit_ys;
    }
    if (ys[0] - ys[1]).abs() / sigma > OUTLIER_SIGMA {
        fit_ys[0] = mean(&ys[1..3]);
    }
    let last = ys.len() - 1;
    if (ys[last] - ys[last - 1]).abs() / sigma > OUTLIER_SIGMA {
        fit_ys[last] = mean(&ys[last - 3..last - 1]);
    }
    fit_ys
}

struct SectionData {
    stars: Vec<u32>,
    xs: Vec<f64>,
    ys: Vec<f64>,
    residuals: Vec<f64>,
    cubic_fit: Option<Vec<f64>>,
}

fn build_section(stars: Vec<u32>, xs: Vec<f64>, ys: Vec<f64>) -> SectionData {
    let fit_ys = synthesize_endpoints(&ys);
    let cubic_fit = polyfit(&xs, &fit_ys, 3);
    let residuals = match &cubic_fit {
        Some(coeffs) => xs.iter().zip(ys.iter()).map(|(&x, &y)| y - evaluate(coeffs, x)).collect(),
        None => Vec::new(),
    };
    SectionData { stars, xs, ys, residuals, cubic_fit }
}

/// Runs the full inter-night color/magnitude normalization for one radius.
pub fn inter_night_normalize(
    catalog: &ReferenceCatalog,
    radius: u32,
    observations: &[StarObservation],
) -> Result<Vec<ColorFitResult>, ColorFitError> {
    let (mag_a, mag_b) = magnitude_coefficients(radius)?;

    let obs_by_star: HashMap<u32, &StarObservation> =
        observations.iter().map(|o| (o.star_number, o)).collect();

    let mut results: HashMap<u32, ColorFitResult> = HashMap::new();
    let mut attendances: HashMap<u32, f64> = HashMap::new();

    for star in &catalog.stars {
        let (median_flux, att) = match obs_by_star.get(&star.number) {
            Some(obs) => (specialized_median(&obs.time_series, &obs.intra_norm_factors), attendance(&obs.time_series)),
            None => (f64::NAN, 0.0),
        };
        attendances.insert(star.number, att);
        results.insert(
            star.number,
            ColorFitResult {
                star_number: star.number,
                median_flux,
                normalized_median_flux: f64::NAN,
                norm_factor: f64::NAN,
                measured_r_i: star.r_i,
                used_r_i: None,
            },
        );
    }

    // Step 2: signal ratio for stars with enough attendance and signal.
    let mut signal_ratio: HashMap<u32, f64> = HashMap::new();
    for star in &catalog.stars {
        let res = &results[&star.number];
        if attendances[&star.number] >= 0.5 && res.median_flux > 0.001 {
            let reference_adu = star.ref_adu.get(&radius).copied().unwrap_or(f64::NAN);
            signal_ratio.insert(star.number, reference_adu / res.median_flux);
        }
    }

    // Step 3: color population assignment, restricted to stars with a signal ratio.
    let mut population: HashMap<u32, u8> = HashMap::new();
    for star in &catalog.stars {
        if !signal_ratio.contains_key(&star.number) {
            continue;
        }
        if let Some(color) = star.r_i {
            if let Some(section) = section_for_color(color) {
                population.insert(star.number, section);
            }
        }
    }

    // Step 4: per-section cubic fit and residuals, in star-number order for determinism.
    let mut sections: HashMap<u8, SectionData> = HashMap::new();
    for section_number in 1u8..=3 {
        let mut stars: Vec<u32> = population
            .iter()
            .filter(|(_, &s)| s == section_number)
            .map(|(&n, _)| n)
            .collect();
        stars.sort_unstable();
        let xs: Vec<f64> = stars.iter().map(|n| results[n].measured_r_i.unwrap()).collect();
        let ys: Vec<f64> = stars.iter().map(|n| signal_ratio[n]).collect();
        sections.insert(section_number, build_section(stars, xs, ys));
    }

    let all_residuals: Vec<f64> = sections.values().flat_map(|s| s.residuals.iter().copied()).collect();

    let outlier_threshold = if all_residuals.len() >= 2 {
        let sigma = std_dev(&all_residuals);
        let min = all_residuals.iter().cloned().fold(f64::INFINITY, f64::min) - 5.0 * sigma;
        let max = all_residuals.iter().cloned().fold(f64::NEG_INFINITY, f64::max) - 5.0 * sigma;
        let (weighted_mean, weighted_sigma) = histogram_gaussian_fit(&all_residuals, min, max, HISTOGRAM_BINS);
        Some((weighted_mean - OUTLIER_SIGMA * weighted_sigma, weighted_mean + OUTLIER_SIGMA * weighted_sigma))
    } else {
        None
    };

    let mut outliers: HashMap<u32, bool> = HashMap::new();
    if let Some((bottom, top)) = outlier_threshold {
        for section in sections.values() {
            for (i, &star_no) in section.stars.iter().enumerate() {
                let r = section.residuals[i];
                outliers.insert(star_no, r < bottom || r > top);
            }
        }
    }

    // Step 5: final quadratic refit per section, evaluated for every star in
    // that section including ones marked as outliers.
    let mut section_quadratic_fit: HashMap<u8, Vec<f64>> = HashMap::new();
    for section_number in 1u8..=3 {
        let section = &sections[&section_number];
        let kept: Vec<usize> = (0..section.stars.len())
            .filter(|&i| !outliers.get(&section.stars[i]).copied().unwrap_or(false))
            .collect();
        let xs: Vec<f64> = kept.iter().map(|&i| section.xs[i]).collect();
        let ys: Vec<f64> = kept.iter().map(|&i| section.ys[i]).collect();
        let fit_ys = synthesize_endpoints(&ys);
        if let Some(coeffs) = polyfit(&xs, &fit_ys, 2) {
            for &star_no in &section.stars {
                let color = results[&star_no].measured_r_i.unwrap();
                let norm_factor = evaluate(&coeffs, color);
                let entry = results.get_mut(&star_no).unwrap();
                entry.norm_factor = norm_factor;
                entry.normalized_median_flux = entry.median_flux * norm_factor;
                entry.used_r_i = Some(color);
            }
            section_quadratic_fit.insert(section_number, coeffs);
        }
    }

    // Step 6: magnitude fallback for stars without usable color data.
    let magnitudes: HashMap<u32, f64> = signal_ratio
        .keys()
        .map(|&n| (n, mag_a - mag_b * results[&n].median_flux.log10()))
        .collect();

    let mut region_members: HashMap<u8, Vec<u32>> = HashMap::new();
    for (&star_no, &m) in &magnitudes {
        let region = if m < 11.0 {
            1
        } else if m < 12.5 {
            2
        } else {
            3
        };
        region_members.entry(region).or_default().push(star_no);
    }
    for members in region_members.values_mut() {
        members.sort_unstable();
    }

    let region_fit = |region: u8| -> Option<RegionFit> {
        let members = region_members.get(&region)?;
        let xs: Vec<f64> = members.iter().map(|n| magnitudes[n]).collect();
        let ys: Vec<f64> = members.iter().map(|n| signal_ratio[n]).collect();
        match region {
            1 => polyfit(&xs, &ys, 1).map(RegionFit::Polynomial),
            2 => polyfit(&xs, &ys, 2).map(RegionFit::Polynomial),
            _ => Some(RegionFit::Constant(median(&ys))),
        }
    };
    let region_1_fit = region_fit(1);
    let region_2_fit = region_fit(2);
    let region_3_fit = region_fit(3);

    let mut sorted_star_numbers: Vec<u32> = catalog.stars.iter().map(|s| s.number).collect();
    sorted_star_numbers.sort_unstable();

    for &star_no in &sorted_star_numbers {
        let color = results[&star_no].measured_r_i.unwrap_or(0.0);
        if !(color < 0.135 || color >= 7.0) {
            continue;
        }

        let lpv_override = LPV_SURROGATE_COLORS.iter().find(|&&(n, _)| n == star_no).map(|&(_, c)| c);

        let assignment = if let Some(surrogate) = lpv_override {
            section_quadratic_fit.get(&3).map(|coeffs| (evaluate(coeffs, surrogate), surrogate))
        } else {
            let region = if region_members.get(&1).is_some_and(|m| m.contains(&star_no)) {
                Some(1)
            } else if region_members.get(&2).is_some_and(|m| m.contains(&star_no)) {
                Some(2)
            } else if region_members.get(&3).is_some_and(|m| m.contains(&star_no)) {
                Some(3)
            } else {
                None
            };
            region.and_then(|r| {
                let m = magnitudes[&star_no];
                let fit = match r {
                    1 => &region_1_fit,
                    2 => &region_2_fit,
                    _ => &region_3_fit,
                };
                fit.as_ref().map(|f| (f.evaluate(m), color))
            })
        };

        if let Some((norm_factor, used_color)) = assignment {
            let entry = results.get_mut(&star_no).unwrap();
            entry.norm_factor = norm_factor;
            entry.normalized_median_flux = entry.median_flux * norm_factor;
            entry.used_r_i = Some(used_color);
        }
    }

    // Step 8: zeroing for insufficient data. Resets used_r_i back to the raw
    // measured value even if a fit above had just assigned an override.
    for star_no in &sorted_star_numbers {
        let att = attendances[star_no];
        let entry = results.get_mut(star_no).unwrap();
        if entry.median_flux.is_nan() || att < 0.5 {
            entry.normalized_median_flux = 0.0;
            entry.norm_factor = 0.0;
            entry.used_r_i = entry.measured_r_i;
        }
    }

    let mut out: Vec<ColorFitResult> = results.into_values().collect();
    out.sort_by_key(|r| r.star_number);
    Ok(out)
}

enum RegionFit {
    Polynomial(Vec<f64>),
    Constant(f64),
}

impl RegionFit {
    fn evaluate(&self, x: f64) -> f64 {
        match self {
            RegionFit::Polynomial(coeffs) => evaluate(coeffs, x),
            RegionFit::Constant(value) => *value,
        }
    }
}

/// Builds an `bins`-bin histogram of `values` over `[range_min, range_max]`
/// and fits a Gaussian to the bin mid-values weighted by bin counts,
/// matching `scipy.stats.norm.fit` applied to the bin-expanded sample.
fn histogram_gaussian_fit(values: &[f64], range_min: f64, range_max: f64, bins: usize) -> (f64, f64) {
    let width = (range_max - range_min) / bins as f64;
    let mut counts = vec![0u64; bins];
    if width > 0.0 {
        for &v in values {
            if v < range_min || v > range_max {
                continue;
            }
            let mut idx = ((v - range_min) / width) as usize;
            if idx >= bins {
                idx = bins - 1;
            }
            counts[idx] += 1;
        }
    }
    let mid_values: Vec<f64> = (0..bins).map(|i| range_min + width * (i as f64 + 0.5)).collect();

    let total: u64 = counts.iter().sum();
    if total == 0 {
        return (0.0, 1.0);
    }
    let weighted_mean = mid_values.iter().zip(counts.iter()).map(|(&m, &c)| m * c as f64).sum::<f64>() / total as f64;
    let weighted_var = mid_values
        .iter()
        .zip(counts.iter())
        .map(|(&m, &c)| c as f64 * (m - weighted_mean).powi(2))
        .sum::<f64>()
        / total as f64;
    (weighted_mean, weighted_var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use m23_catalog::CatalogStar;

    fn star(number: u32, r_i: Option<f64>, ref_adu: f64, radius: u32) -> CatalogStar {
        let mut map = HashMap::new();
        map.insert(radius, ref_adu);
        CatalogStar { number, x: 0.0, y: 0.0, ref_adu: map, r_i }
    }

    #[test]
    fn color_section_boundaries() {
        assert_eq!(section_for_color(0.455), Some(1));
        assert_eq!(section_for_color(0.4551), Some(2));
        assert_eq!(section_for_color(7.0), Some(3));
        assert_eq!(section_for_color(7.0001), None);
    }

    #[test]
    fn unsupported_radius_errors() {
        let catalog = ReferenceCatalog { stars: vec![] };
        let result = inter_night_normalize(&catalog, 7, &[]);
        assert!(matches!(result, Err(ColorFitError::UnsupportedRadius(7))));
    }

    #[test]
    fn insufficient_attendance_zeros_the_star() {
        let catalog = ReferenceCatalog { stars: vec![star(1, Some(0.5), 1000.0, 5)] };
        let obs = vec![StarObservation {
            star_number: 1,
            time_series: vec![0.0, 0.0, 0.0, 100.0],
            intra_norm_factors: vec![1.0, 1.0, 1.0, 1.0],
        }];
        let results = inter_night_normalize(&catalog, 5, &obs).unwrap();
        let r = &results[0];
        assert_eq!(r.norm_factor, 0.0);
        assert_eq!(r.normalized_median_flux, 0.0);
        assert_eq!(r.used_r_i, r.measured_r_i);
    }

    #[test]
    fn lpv_override_uses_section_three_fit_at_surrogate_color() {
        // Build enough section-3 stars (color in (1.063, 7]) to support a cubic fit,
        // plus star 1223 with no color data, using its LPV surrogate color.
        let mut stars = vec![];
        let colors = [1.2, 2.0, 3.0, 4.0, 5.0, 6.0];
        for (i, &c) in colors.iter().enumerate() {
            stars.push(star(100 + i as u32, Some(c), 1000.0 * (i as f64 + 1.0), 5));
        }
        stars.push(star(1223, None, 1000.0, 5));
        let catalog = ReferenceCatalog { stars };

        let mut obs = vec![];
        for (i, _) in colors.iter().enumerate() {
            obs.push(StarObservation {
                star_number: 100 + i as u32,
                time_series: vec![500.0; 10],
                intra_norm_factors: vec![1.0; 10],
            });
        }
        obs.push(StarObservation {
            star_number: 1223,
            time_series: vec![1000.0; 10],
            intra_norm_factors: vec![1.0; 10],
        });

        let results = inter_night_normalize(&catalog, 5, &obs).unwrap();
        let lpv = results.iter().find(|r| r.star_number == 1223).unwrap();
        assert_eq!(lpv.used_r_i, Some(3.6242));
        assert!(lpv.norm_factor.is_finite());
    }
}

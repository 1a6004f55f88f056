//! Fixed-width text file formats used at the external-interface boundary:
//! LogFileCombined, FluxLogCombined, ColorNormalized.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// One star's row in a LogFileCombined file: `{x, y, xfwhm, yfwhm, avg_fwhm,
/// sky_adu, star_adu[r]}`.
#[derive(Debug, Clone)]
pub struct LogFileCombinedRow {
    pub x: f64,
    pub y: f64,
    pub x_fwhm: f64,
    pub y_fwhm: f64,
    pub avg_fwhm: f64,
    pub sky_adu: f64,
    pub star_adu: Vec<f64>,
}

pub struct LogFileCombinedHeader {
    pub image_identity: String,
    pub star_count: usize,
    pub radii: Vec<u32>,
}

const COLUMN_WIDTH: usize = 16;

fn fmt_col(value: f64) -> String {
    format!("{:>width$.4}", value, width = COLUMN_WIDTH)
}

/// Writes a LogFileCombined file: 9 header rows followed by one fixed-width
/// row per star.
pub fn write_log_file_combined(
    path: &Path,
    header: &LogFileCombinedHeader,
    rows: &[LogFileCombinedRow],
) -> Result<()> {
    let mut out = String::new();
    out.push_str(&format!("Image: {}\n", header.image_identity));
    out.push_str(&format!("Star count: {}\n", header.star_count));
    out.push_str(&format!(
        "Radii of extraction: {}\n",
        header
            .radii
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(",")
    ));
    out.push_str("Sky annulus inner radius: placeholder\n");
    out.push_str("Sky annulus outer radius: placeholder\n");
    out.push_str("Detection threshold: placeholder\n");
    out.push_str("--\n");
    out.push_str("--\n");
    out.push_str(&format!(
        "{:>w$} {:>w$} {:>w$} {:>w$} {:>w$} {:>w$}{}\n",
        "X",
        "Y",
        "XFWHM",
        "YFWHM",
        "AvgFWHM",
        "SkyADU",
        header
            .radii
            .iter()
            .map(|r| format!(" {:>w$}", format!("StarADU_{r}"), w = COLUMN_WIDTH))
            .collect::<String>(),
        w = COLUMN_WIDTH
    ));

    for row in rows {
        let mut line = format!(
            "{} {} {} {} {} {}",
            fmt_col(row.x),
            fmt_col(row.y),
            fmt_col(row.x_fwhm),
            fmt_col(row.y_fwhm),
            fmt_col(row.avg_fwhm),
            fmt_col(row.sky_adu),
        );
        for adu in &row.star_adu {
            line.push(' ');
            line.push_str(&fmt_col(*adu));
        }
        line.push('\n');
        out.push_str(&line);
    }

    fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Reads back a LogFileCombined file's star rows (used both by tests and by
/// the reference catalog loader, since the reference logfile shares this
/// shape).
pub fn read_log_file_combined(path: &Path) -> Result<(LogFileCombinedHeader, Vec<LogFileCombinedRow>)> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut lines = content.lines();

    let image_identity = lines
        .next()
        .unwrap_or_default()
        .trim_start_matches("Image: ")
        .to_string();
    let star_count: usize = lines
        .next()
        .unwrap_or_default()
        .trim_start_matches("Star count: ")
        .trim()
        .parse()
        .unwrap_or(0);
    let radii: Vec<u32> = lines
        .next()
        .unwrap_or_default()
        .trim_start_matches("Radii of extraction: ")
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    // skip remaining header rows (9 total, 3 consumed above)
    for _ in 0..6 {
        lines.next();
    }

    let mut rows = Vec::new();
    for line in lines {
        let fields: Vec<f64> = line
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if fields.len() < 6 {
            continue;
        }
        rows.push(LogFileCombinedRow {
            x: fields[0],
            y: fields[1],
            x_fwhm: fields[2],
            y_fwhm: fields[3],
            avg_fwhm: fields[4],
            sky_adu: fields[5],
            star_adu: fields[6..].to_vec(),
        });
    }

    Ok((
        LogFileCombinedHeader {
            image_identity,
            star_count,
            radii,
        },
        rows,
    ))
}

/// Writes a FluxLogCombined file: 6 header rows then one `%10.2f` flux value
/// per line.
pub fn write_flux_log_combined(
    path: &Path,
    program_id: &str,
    start_image: &str,
    end_image: &str,
    reference_file: &str,
    x: f64,
    y: f64,
    fluxes: &[f64],
) -> Result<()> {
    let mut out = String::new();
    out.push_str(&format!("Program: {program_id}\n"));
    out.push_str(&format!("Start image: {start_image}\n"));
    out.push_str(&format!("End image: {end_image}\n"));
    out.push_str(&format!("Reference file: {reference_file}\n"));
    out.push_str(&format!("X: {x:.2}\n"));
    out.push_str(&format!("Y: {y:.2}\n"));
    for flux in fluxes {
        out.push_str(&format!("{flux:10.2}\n"));
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn read_flux_log_combined(path: &Path) -> Result<Vec<f64>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .skip(6)
        .filter_map(|l| l.trim().parse().ok())
        .collect())
}

/// Writes a NormFactorFile: one per-image normalization factor per line, in
/// the same order as the corresponding FluxLogCombined's entries.
pub fn write_norm_factor_file(path: &Path, factors: &[f64]) -> Result<()> {
    let mut out = String::new();
    for factor in factors {
        out.push_str(&format!("{factor:10.6}\n"));
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn read_norm_factor_file(path: &Path) -> Result<Vec<f64>> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().filter_map(|l| l.trim().parse().ok()).collect())
}

/// One star's row in a ColorNormalized file.
#[derive(Debug, Clone)]
pub struct ColorNormalizedRow {
    pub star_number: u32,
    pub normalized_median_flux: f64,
    pub norm_factor: f64,
    pub measured_r_i: f64,
    pub used_r_i: f64,
}

/// Writes a ColorNormalized file: two header rows then rows with column
/// widths 8/32/24/32/32 for {star_no, normalized_median_flux, norm_factor,
/// measured_r_i, used_r_i}.
pub fn write_color_normalized(path: &Path, rows: &[ColorNormalizedRow]) -> Result<()> {
    let mut out = String::new();
    out.push_str("Inter-night color normalization\n");
    out.push_str(&format!(
        "{:>8} {:>32} {:>24} {:>32} {:>32}\n",
        "Star", "NormalizedMedianFlux", "NormFactor", "MeasuredRI", "UsedRI"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:>8} {:>32.6} {:>24.6} {:>32.6} {:>32.6}\n",
            row.star_number,
            row.normalized_median_flux,
            row.norm_factor,
            row.measured_r_i,
            row.used_r_i,
        ));
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn read_color_normalized(path: &Path) -> Result<Vec<ColorNormalizedRow>> {
    let content = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for line in content.lines().skip(2) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            continue;
        }
        if let (Ok(star_number), Ok(normalized_median_flux), Ok(norm_factor), Ok(measured_r_i), Ok(used_r_i)) = (
            fields[0].parse(),
            fields[1].parse(),
            fields[2].parse(),
            fields[3].parse(),
            fields[4].parse(),
        ) {
            rows.push(ColorNormalizedRow {
                star_number,
                normalized_median_flux,
                norm_factor,
                measured_r_i,
                used_r_i,
            });
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn flux_log_combined_round_trips() {
        let file = NamedTempFile::new().unwrap();
        write_flux_log_combined(
            file.path(),
            "m23",
            "0001",
            "0100",
            "ref.txt",
            512.0,
            512.0,
            &[100.0, 200.5, 0.0],
        )
        .unwrap();
        let fluxes = read_flux_log_combined(file.path()).unwrap();
        assert_eq!(fluxes, vec![100.0, 200.5, 0.0]);
    }

    #[test]
    fn log_file_combined_round_trips() {
        let file = NamedTempFile::new().unwrap();
        let header = LogFileCombinedHeader {
            image_identity: "m23_7.0-0001".to_string(),
            star_count: 2,
            radii: vec![3, 4, 5],
        };
        let rows = vec![LogFileCombinedRow {
            x: 10.5,
            y: 20.25,
            x_fwhm: 3.1,
            y_fwhm: 3.2,
            avg_fwhm: 3.15,
            sky_adu: 50.0,
            star_adu: vec![100.0, 150.0, 200.0],
        }];
        write_log_file_combined(file.path(), &header, &rows).unwrap();
        let (read_header, read_rows) = read_log_file_combined(file.path()).unwrap();
        assert_eq!(read_header.star_count, 2);
        assert_eq!(read_header.radii, vec![3, 4, 5]);
        assert_eq!(read_rows.len(), 1);
        assert!((read_rows[0].x - 10.5).abs() < 1e-6);
        assert_eq!(read_rows[0].star_adu.len(), 3);
    }

    #[test]
    fn color_normalized_round_trips() {
        let file = NamedTempFile::new().unwrap();
        let rows = vec![ColorNormalizedRow {
            star_number: 42,
            normalized_median_flux: 1234.5,
            norm_factor: 1.02,
            measured_r_i: 0.5,
            used_r_i: 0.5,
        }];
        write_color_normalized(file.path(), &rows).unwrap();
        let read_rows = read_color_normalized(file.path()).unwrap();
        assert_eq!(read_rows.len(), 1);
        assert_eq!(read_rows[0].star_number, 42);
    }
}

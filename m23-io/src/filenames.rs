//! Filename-convention parsing, bit-exact for downstream tooling.
//!
//! One polymorphic kind tag plus per-kind regex-backed parsers, rather than
//! a family of file-role types each exposing its own `path`/`data`/
//! `is_valid_file_name`.

use regex::Regex;
use std::sync::OnceLock;

/// The file-role kinds that appear on disk across a night's processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Raw,
    AlignedCombined,
    LogFileCombined,
    FluxLogCombined,
    ColorNormalized,
}

/// Fields recovered from a raw or combined image filename:
/// `m23_<duration>-<NNNN>.fit`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFileName {
    pub duration: f64,
    pub sequence_number: u32,
}

fn raw_image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^m23_(\d+\.?\d*)-(\d+)\.fit$").unwrap())
}

/// Fields recovered from a `LogFileCombined` filename:
/// `<MM-DD-YY>_m23_<duration>-ref_revised_71_<NNNN>_flux.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogFileCombinedName {
    pub date: String,
    pub duration: f64,
    pub sequence_number: u32,
}

fn log_file_combined_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2}-\d{2}-\d{2})_m23_(\d+\.?\d*)-ref_revised_71_(\d+)_flux\.txt$")
            .unwrap()
    })
}

/// Fields recovered from a `FluxLogCombined` filename:
/// `<MM-DD-YY>_m23_<duration>-<SSSS>_flux.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxLogCombinedName {
    pub date: String,
    pub duration: f64,
    pub star_number: u32,
}

fn flux_log_combined_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{2}-\d{2}-\d{2})_m23_(\d+\.?\d*)-(\d{4})_flux\.txt$").unwrap())
}

/// Fields recovered from a `ColorNormalized` filename:
/// `<YYYY-MM-DD>_Normalized_<radius_word>_Pixel_Radius.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorNormalizedName {
    pub date: String,
    pub radius_word: String,
}

fn color_normalized_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2})_Normalized_(\w+)_Pixel_Radius\.txt$").unwrap()
    })
}

pub fn parse_image_filename(name: &str) -> Option<ImageFileName> {
    let caps = raw_image_regex().captures(name)?;
    Some(ImageFileName {
        duration: caps[1].parse().ok()?,
        sequence_number: caps[2].parse().ok()?,
    })
}

pub fn parse_log_file_combined(name: &str) -> Option<LogFileCombinedName> {
    let caps = log_file_combined_regex().captures(name)?;
    Some(LogFileCombinedName {
        date: caps[1].to_string(),
        duration: caps[2].parse().ok()?,
        sequence_number: caps[3].parse().ok()?,
    })
}

pub fn parse_flux_log_combined(name: &str) -> Option<FluxLogCombinedName> {
    let caps = flux_log_combined_regex().captures(name)?;
    Some(FluxLogCombinedName {
        date: caps[1].to_string(),
        duration: caps[2].parse().ok()?,
        star_number: caps[3].parse().ok()?,
    })
}

pub fn parse_color_normalized(name: &str) -> Option<ColorNormalizedName> {
    let caps = color_normalized_regex().captures(name)?;
    Some(ColorNormalizedName {
        date: caps[1].to_string(),
        radius_word: caps[2].to_string(),
    })
}

/// Returns whether `name` is a valid filename of the given kind.
pub fn is_valid_file_name(kind: FileKind, name: &str) -> bool {
    match kind {
        FileKind::Raw | FileKind::AlignedCombined => parse_image_filename(name).is_some(),
        FileKind::LogFileCombined => parse_log_file_combined(name).is_some(),
        FileKind::FluxLogCombined => parse_flux_log_combined(name).is_some(),
        FileKind::ColorNormalized => parse_color_normalized(name).is_some(),
    }
}

pub fn format_image_filename(duration: f64, sequence_number: u32) -> String {
    format!("m23_{duration}-{sequence_number:04}.fit")
}

/// Combined images use a 3-digit zero-padded sequence number
/// (`m23_<duration>-<NNN>.fit`), distinct from the 4-digit raw-frame
/// convention.
pub fn format_combined_image_filename(duration: f64, sequence_number: u32) -> String {
    format!("m23_{duration}-{sequence_number:03}.fit")
}

pub fn format_log_file_combined(date: &str, duration: f64, sequence_number: u32) -> String {
    format!("{date}_m23_{duration}-ref_revised_71_{sequence_number:04}_flux.txt")
}

pub fn format_flux_log_combined(date: &str, duration: f64, star_number: u32) -> String {
    format!("{date}_m23_{duration}-{star_number:04}_flux.txt")
}

pub fn format_color_normalized(date: &str, radius_word: &str) -> String {
    format!("{date}_Normalized_{radius_word}_Pixel_Radius.txt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_image_filename() {
        let parsed = parse_image_filename("m23_7.0-0042.fit").unwrap();
        assert_eq!(parsed.duration, 7.0);
        assert_eq!(parsed.sequence_number, 42);
    }

    #[test]
    fn rejects_malformed_raw_image_filename() {
        assert!(parse_image_filename("m23_7.0_0042.fits").is_none());
    }

    #[test]
    fn parses_log_file_combined_filename() {
        let parsed =
            parse_log_file_combined("06-15-23_m23_7.0-ref_revised_71_0010_flux.txt").unwrap();
        assert_eq!(parsed.date, "06-15-23");
        assert_eq!(parsed.sequence_number, 10);
    }

    #[test]
    fn parses_flux_log_combined_filename() {
        let parsed = parse_flux_log_combined("06-15-23_m23_7.0-0814_flux.txt").unwrap();
        assert_eq!(parsed.star_number, 814);
    }

    #[test]
    fn parses_color_normalized_filename() {
        let parsed =
            parse_color_normalized("2023-06-15_Normalized_Fourth_Pixel_Radius.txt").unwrap();
        assert_eq!(parsed.radius_word, "Fourth");
    }

    #[test]
    fn round_trips_formatted_names() {
        let name = format_image_filename(7.0, 42);
        assert!(is_valid_file_name(FileKind::Raw, &name));
    }

    #[test]
    fn combined_images_use_three_digit_sequence_numbers() {
        let name = format_combined_image_filename(7.0, 7);
        assert_eq!(name, "m23_7-007.fit");
        assert!(is_valid_file_name(FileKind::AlignedCombined, &name));
    }
}

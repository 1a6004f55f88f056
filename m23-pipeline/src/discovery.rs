//! Per-night input discovery: locating raw images, dark/flat calibration
//! frames on disk, and mapping a night's input folder name (`<Month D,
//! YYYY>`) to its output folder name (`<YYYY-MM-DD>`).

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Subdirectory of a night's input folder holding the night's raw science
/// images, named per the raw-frame filename convention.
pub const RAW_IMAGES_DIR_NAME: &str = "Raw Images";

/// Subdirectory of a night's input folder holding dark and flat calibration
/// frames, distinguished by filename prefix (`dark`/`flat`, case
/// insensitive).
pub const CALIBRATION_DIR_NAME: &str = "Calibration Frames";

pub fn night_date_from_input_folder_name(name: &str) -> Result<NaiveDate> {
    let (month_day, year) = name
        .split_once(',')
        .ok_or_else(|| anyhow!("night folder name '{name}' is not '<Month D, YYYY>'"))?;
    let mut parts = month_day.split_whitespace();
    let month_name = parts.next().ok_or_else(|| anyhow!("missing month in '{name}'"))?;
    let day: u32 = parts
        .next()
        .ok_or_else(|| anyhow!("missing day in '{name}'"))?
        .parse()
        .map_err(|_| anyhow!("invalid day in '{name}'"))?;
    let year: i32 = year.trim().parse().map_err(|_| anyhow!("invalid year in '{name}'"))?;
    let month = month_number(month_name).ok_or_else(|| anyhow!("invalid month name '{month_name}' in '{name}'"))?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| anyhow!("invalid calendar date in '{name}'"))
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "January", "February", "March", "April", "May", "June", "July", "August", "September",
        "October", "November", "December",
    ];
    MONTHS.iter().position(|m| m.eq_ignore_ascii_case(name)).map(|i| i as u32 + 1)
}

pub fn output_folder_name_from_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Lists raw science image files under `night_path/Raw Images`, sorted by
/// sequence number so downstream log-file output ordering matches raw-frame
/// sequence order.
pub fn discover_raw_images(night_path: &Path) -> Result<Vec<PathBuf>> {
    let dir = night_path.join(RAW_IMAGES_DIR_NAME);
    let mut found: Vec<(u32, PathBuf)> = Vec::new();
    if dir.is_dir() {
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if let Some(parsed) = m23_io::filenames::parse_image_filename(name) {
                found.push((parsed.sequence_number, path.to_path_buf()));
            }
        }
    }
    found.sort_by_key(|(seq, _)| *seq);
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

fn discover_calibration_frames(night_path: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let dir = night_path.join(CALIBRATION_DIR_NAME);
    let mut found = Vec::new();
    if dir.is_dir() {
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if name.to_ascii_lowercase().starts_with(prefix) && path.extension().is_some_and(|e| e == "fit") {
                found.push(path.to_path_buf());
            }
        }
    }
    found.sort();
    Ok(found)
}

pub fn discover_dark_frames(night_path: &Path) -> Result<Vec<PathBuf>> {
    discover_calibration_frames(night_path, "dark")
}

pub fn discover_flat_frames(night_path: &Path) -> Result<Vec<PathBuf>> {
    discover_calibration_frames(night_path, "flat")
}

/// Removes every regular file (not subdirectory) directly inside `dir`,
/// creating `dir` first if it doesn't exist. Used before each stage's output
/// so re-entry after a partial failure is idempotent.
pub fn reinitialize_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_night_folder_name() {
        let date = night_date_from_input_folder_name("June 15, 2023").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 6, 15).unwrap());
    }

    #[test]
    fn formats_output_folder_name() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        assert_eq!(output_folder_name_from_date(&date), "2023-06-15");
    }

    #[test]
    fn rejects_malformed_night_folder_name() {
        assert!(night_date_from_input_folder_name("not a date").is_err());
    }

    #[test]
    fn reinitialize_clears_existing_files_but_keeps_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.txt"), "old").unwrap();

        reinitialize_output_dir(&target).unwrap();

        assert!(target.is_dir());
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 0);
    }
}

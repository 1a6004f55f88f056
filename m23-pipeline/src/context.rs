//! Per-night working paths and the lightweight context value a worker
//! carries through all stages: an explicit log sink instead of a
//! process-wide logger, plus cancellation checked at stage boundaries.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::logger::NightLogger;

pub struct NightPaths {
    root: PathBuf,
}

impl NightPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn calibration(&self) -> PathBuf {
        self.root.join("Calibration")
    }

    pub fn aligned_combined(&self) -> PathBuf {
        self.root.join("Aligned Combined")
    }

    pub fn log_files_combined(&self) -> PathBuf {
        self.root.join("Log Files Combined")
    }

    pub fn flux_logs_combined(&self, radius: u32) -> PathBuf {
        self.root.join("Flux Logs Combined").join(radius_folder_name(radius))
    }

    pub fn color_normalized(&self, radius: u32) -> PathBuf {
        self.root.join("Color Normalized").join(radius_folder_name(radius))
    }

    pub fn processing_log(&self, night_date: &str) -> PathBuf {
        self.root.join(format!("Night-{night_date}-Processing-log.txt"))
    }
}

/// Ordinal radius-folder naming (e.g. radius 4 -> "Fourth Pixel Radius").
pub fn radius_folder_name(radius: u32) -> String {
    format!("{} Pixel Radius", radius_word(radius))
}

/// The bare ordinal word for a radius (e.g. 4 -> "Fourth"), used both in the
/// folder name above and in the ColorNormalized filename convention.
pub fn radius_word(radius: u32) -> &'static str {
    ordinal_word(radius)
}

fn ordinal_word(n: u32) -> &'static str {
    match n {
        1 => "First",
        2 => "Second",
        3 => "Third",
        4 => "Fourth",
        5 => "Fifth",
        6 => "Sixth",
        7 => "Seventh",
        8 => "Eighth",
        9 => "Ninth",
        10 => "Tenth",
        _ => "Nth",
    }
}

/// A worker's handle on one night: its log sink and a shared cancellation
/// flag checked at each stage boundary.
pub struct NightContext {
    pub logger: NightLogger,
    pub cancel: Arc<AtomicBool>,
    pub paths: NightPaths,
    pub label: String,
}

impl NightContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

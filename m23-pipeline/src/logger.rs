//! Per-night log sink: an explicit sink threaded through the pipeline as
//! part of each worker's context value, rather than a process-wide ambient
//! logger.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Writes timestamped lines to a night's own log file and also emits them
/// through the `log` crate (target `"m23_pipeline::night"`) so a process-wide
/// subscriber, if one is installed, sees every night's activity interleaved.
pub struct NightLogger {
    file: Mutex<File>,
    night: String,
}

impl NightLogger {
    /// Opens (truncating) the log file at `path` for the given night label.
    pub fn create(path: &Path, night: impl Into<String>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("opening night log at {}", path.display()))?;
        Ok(Self { file: Mutex::new(file), night: night.into() })
    }

    fn write_line(&self, level: &str, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{timestamp} {level} {message}");
        }
    }

    pub fn info(&self, message: &str) {
        log::info!(target: "m23_pipeline::night", "[{}] {}", self.night, message);
        self.write_line("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        log::warn!(target: "m23_pipeline::night", "[{}] {}", self.night, message);
        self.write_line("WARN", message);
    }

    pub fn error(&self, message: &str) {
        log::error!(target: "m23_pipeline::night", "[{}] {}", self.night, message);
        self.write_line("ERROR", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn writes_lines_to_the_night_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("night.log");
        let logger = NightLogger::create(&path, "2023-06-15").unwrap();
        logger.info("starting calibration");
        logger.warn("skipping frame 15");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("INFO starting calibration"));
        assert!(contents.contains("WARN skipping frame 15"));
    }
}

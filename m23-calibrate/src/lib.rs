//! Calibration Builder (master dark/flat) and Calibrator.

pub mod builder;
pub mod calibrator;
pub mod error;

pub use builder::{build_master_dark, build_master_flat};
pub use calibrator::{Calibrator, HotPixelCorrection};
pub use error::CalibrationError;

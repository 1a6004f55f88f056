//! Extractor: star-center refinement, multi-radius aperture photometry,
//! per-region sky background estimation, and FWHM estimation.

pub mod centroid;
pub mod circle;
pub mod error;
pub mod extractor;
pub mod fwhm;
pub mod sky;

pub use error::ExtractError;
pub use extractor::{extract_stars, to_log_file_combined, ExtractedStar};

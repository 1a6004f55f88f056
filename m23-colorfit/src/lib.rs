//! Inter-Night Normalizer: color- and magnitude-segmented per-star
//! correction factors against a reference catalog.

pub mod colorfit;
pub mod error;
pub mod polyfit;

pub use colorfit::{inter_night_normalize, ColorFitResult, StarObservation};
pub use error::ColorFitError;

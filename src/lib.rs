// m23-engine/src/lib.rs
//! Per-night image processing and photometric normalization engine for a
//! long-baseline stellar-monitoring program.
//!
//! This crate re-exports the workspace's per-concern crates as named modules,
//! organized leaves-first:
//!
//! - [`io`]: Frame Store — 2-D image matrices, FITS-like I/O, and the
//!   fixed-width text formats and filename conventions at the external
//!   interface boundary.
//! - [`catalog`]: the reference catalog, R-I color table, and the tagged
//!   configuration record an external driver constructs and passes in.
//! - [`calibrate`]: Calibration Builder (master dark/flat) and Calibrator.
//! - [`align`]: Aligner — asterism-matched similarity-transform registration.
//! - [`combine`]: Combiner — fixed-size temporal stacking.
//! - [`extract`]: Extractor — centroid refinement, multi-radius aperture
//!   photometry, sky background, FWHM.
//! - [`normalize`]: Intra-Night Normalizer.
//! - [`colorfit`]: Inter-Night Normalizer.
//! - [`pipeline`]: the per-night state machine and bounded worker pool tying
//!   every stage above together.
//!
//! # Examples
//!
//! ```no_run
//! use m23_engine::{catalog, pipeline};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let text = std::fs::read_to_string("config.toml")?;
//! let config: catalog::Config = toml::from_str(&text)?;
//!
//! // One worker per configured night, bounded to 4 concurrent nights.
//! let outcomes = pipeline::run(&config, 4)?;
//! for outcome in outcomes {
//!     println!("{}: {:?}", outcome.label, outcome.result.is_ok());
//! }
//! # Ok(())
//! # }
//! ```

pub use m23_align as align;
pub use m23_calibrate as calibrate;
pub use m23_catalog as catalog;
pub use m23_colorfit as colorfit;
pub use m23_combine as combine;
pub use m23_extract as extract;
pub use m23_io as io;
pub use m23_normalize as normalize;
pub use m23_pipeline as pipeline;

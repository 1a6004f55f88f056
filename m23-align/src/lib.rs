//! Aligner: registers calibrated frames to a fixed reference frame via an
//! asterism-matched similarity transform.

pub mod aligner;
pub mod detect;
pub mod error;
pub mod transform;

pub use aligner::{Aligner, ALIGNMENT_SENTINEL};
pub use error::AlignError;
pub use transform::SimilarityTransform;

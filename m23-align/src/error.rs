use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("alignment failed: fewer than {required} matched asterism points found (got {found})")]
    AlignmentFailed { required: usize, found: usize },
    #[error("alignment failed: insufficient bright sources detected (frame: {frame}, reference: {reference})")]
    InsufficientSources { frame: usize, reference: usize },
}

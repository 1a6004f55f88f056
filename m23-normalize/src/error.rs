use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntraNormalizeError {
    #[error("insufficient samples for intra-night normalization: need at least 4 log files, got {0}")]
    InsufficientSamples(usize),
}

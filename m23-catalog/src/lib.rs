//! Reference catalog, R-I color table, and the tagged configuration record.

pub mod catalog;
pub mod color;
pub mod config;

pub use catalog::{CatalogStar, ReferenceCatalog};
pub use color::ColorTable;
pub use config::{
    Config, ConfigError, ImageConfig, InputConfig, NightInput, OutputConfig, ProcessingConfig,
    ReferenceConfig,
};

//! Combiner: per-pixel sum across a fixed-size window of aligned frames.

pub mod combiner;
pub mod error;

pub use combiner::{combine_all, combine_window, group_into_windows};
pub use error::CombineError;

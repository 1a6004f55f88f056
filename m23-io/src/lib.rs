//! Frame store: typed accessors for 2-D image matrices and their metadata.

pub mod filenames;
pub mod fits;
pub mod frame;
pub mod textfmt;

pub use frame::{CropRegion, Frame, FrameMeta};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no radii of extraction given")]
    NoRadii,
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("combine group shape mismatch: first frame {first:?}, frame at index {index} is {other:?}")]
    ShapeMismatch {
        first: (usize, usize),
        other: (usize, usize),
        index: usize,
    },
}

use thiserror::Error;

/// Errors produced by the segmentation chain.
#[derive(Error, Debug)]
pub enum SegmentError {
    /// Shape mismatch between inputs, degenerate masks or bad parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Region merge ran out of iterations before reaching a fixed point.
    #[error("h-transform did not converge within {iterations} iterations")]
    UnconvergedIteration {
        /// Iteration budget that was exhausted.
        iterations: usize,
    },

    /// Size statistics requested for a labeling with no regions.
    #[error("no regions available to build a size distribution")]
    EmptyDistribution,

    /// A normalization or ratio came out non-finite or zero.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SegmentError>;

impl SegmentError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SegmentError::InvalidInput(message.into())
    }
}

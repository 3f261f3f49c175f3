use thiserror::Error;

/// Errors from the variance and cosmology routines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CosmoError {
    /// Non-positive radius, unsorted table, bad quadrature settings.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An integral or ratio stayed non-finite or non-positive after the
    /// high-precision fallback.
    #[error("numeric degeneracy in {quantity}: {value}")]
    NumericDegeneracy {
        /// Name of the quantity being computed.
        quantity: String,
        /// Offending value.
        value: f64,
    },
}

pub type Result<T> = std::result::Result<T, CosmoError>;

use thiserror::Error;

use crate::abi::XrResult;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerError {
    #[error("initialization failed: {0}")]
    InitializationFailed(&'static str),

    #[error("validation failure: {0}")]
    ValidationFailure(&'static str),

    #[error("{name} could not be resolved through the next layer ({result})")]
    Unresolved { name: &'static str, result: XrResult },

    #[error("next layer returned {0}")]
    Downstream(XrResult),
}

pub type Result<T> = std::result::Result<T, LayerError>;

impl LayerError {
    /// The result code reported across the C ABI.
    pub fn result(&self) -> XrResult {
        match self {
            LayerError::InitializationFailed(_) | LayerError::Unresolved { .. } => {
                XrResult::ERROR_INITIALIZATION_FAILED
            }
            LayerError::ValidationFailure(_) => XrResult::ERROR_VALIDATION_FAILURE,
            LayerError::Downstream(result) => *result,
        }
    }
}

impl From<LayerError> for XrResult {
    fn from(err: LayerError) -> Self {
        err.result()
    }
}

//! Error types for the Kolosal tuner

use thiserror::Error;

/// Result type alias for tuner operations
pub type Result<T> = std::result::Result<T, TuneError>;

/// Main error type for the tuner
#[derive(Error, Debug)]
pub enum TuneError {
    // Configuration errors: fatal to the current tuning invocation
    #[error("Unknown parameter kind '{kind}' for parameter '{name}'")]
    UnknownParameterKind { name: String, kind: String },

    #[error("Categorical parameter '{0}' has no choices")]
    EmptyChoices(String),

    #[error("Invalid bounds for parameter '{name}': {reason}")]
    InvalidBounds { name: String, reason: String },

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Target column not found: {0}")]
    MissingTarget(String),

    #[error("Unknown model family: {0}")]
    UnknownModelFamily(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Trial evaluation errors
    #[error("Trial {trial_id} failed: {source}")]
    TrialFailed {
        trial_id: usize,
        #[source]
        source: Box<TuneError>,
    },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    ComputationError(String),

    // Data and infrastructure errors
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TuneError {
    /// Whether this error is a configuration problem rather than a data or trial failure
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TuneError::UnknownParameterKind { .. }
                | TuneError::EmptyChoices(_)
                | TuneError::InvalidBounds { .. }
                | TuneError::UnknownTaskType(_)
                | TuneError::MissingTarget(_)
                | TuneError::UnknownModelFamily(_)
                | TuneError::ConfigError(_)
        )
    }

    pub(crate) fn shape_mismatch(expected_rows: usize, actual_rows: usize) -> Self {
        TuneError::ShapeError {
            expected: format!("y length = {}", expected_rows),
            actual: format!("y length = {}", actual_rows),
        }
    }
}

impl From<polars::error::PolarsError> for TuneError {
    fn from(err: polars::error::PolarsError) -> Self {
        TuneError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TuneError {
    fn from(err: serde_json::Error) -> Self {
        TuneError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TuneError {
    fn from(err: ndarray::ShapeError) -> Self {
        TuneError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TuneError::UnknownParameterKind {
            name: "alpha".to_string(),
            kind: "unsupported_kind".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown parameter kind 'unsupported_kind' for parameter 'alpha'"
        );
    }

    #[test]
    fn test_trial_failed_wraps_source() {
        let err = TuneError::TrialFailed {
            trial_id: 3,
            source: Box::new(TuneError::ModelNotFitted),
        };
        assert_eq!(err.to_string(), "Trial 3 failed: Model not fitted");
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_config_classification() {
        assert!(TuneError::EmptyChoices("c".into()).is_config_error());
        assert!(TuneError::UnknownTaskType("ranking".into()).is_config_error());
        assert!(!TuneError::DataError("x".into()).is_config_error());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TuneError = io_err.into();
        assert!(matches!(err, TuneError::IoError(_)));
    }
}

//! Error types for the analytics core and its configuration.

/// Result type for feature building, model fitting and prediction.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Internal processing faults.
///
/// These never reach forecast callers: the forecast service logs them and
/// degrades to an empty result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyticsError {
    /// Two inputs that must line up row-for-row do not.
    #[error("Shape mismatch in {what}: expected {expected} rows, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A NaN or infinite value reached the model.
    #[error("Non-finite value in {what} at row {row}")]
    NonFiniteInput { what: &'static str, row: usize },

    /// Prediction was requested before `fit`.
    #[error("Model has not been fitted")]
    ModelNotFitted,

    /// A parameter outside its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A wall-clock time that cannot be represented in the configured offset.
    #[error("Invalid time: {0}")]
    InvalidTime(String),
}

impl AnalyticsError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

/// Configuration read, parse and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at `{path}`: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No occupancy.toml found in standard locations")]
    NotFound,
}

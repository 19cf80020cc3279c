//! Error types for occupancy data sources.
//!
//! Every failure coming out of an [`OccupancySource`](super::OccupancySource)
//! is an *upstream data error*: the forecast service either retries through a
//! fallback source or surfaces it to the caller as a failure envelope.

use std::fmt;

/// Result type for data source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Structured context for source errors.
///
/// Provides additional information about where and why a fetch failed.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "fetch_records", "read_data_file")
    pub operation: Option<String>,
    /// The source that failed (e.g., "json-file", "in-memory")
    pub source_name: Option<String>,
    /// The venue the records were requested for
    pub venue: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
    /// Whether a retry could succeed
    pub retryable: bool,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the source name.
    pub fn with_source(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Set the venue identifier.
    pub fn with_venue(mut self, venue: impl ToString) -> Self {
        self.venue = Some(venue.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mark this error as retryable.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref name) = self.source_name {
            parts.push(format!("source={}", name));
        }
        if let Some(ref venue) = self.venue {
            parts.push(format!("venue={}", venue));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for data source operations
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source could not be reached or read.
    #[error("Source unavailable: {message} {context}")]
    Unavailable {
        message: String,
        context: ErrorContext,
    },

    /// The fetch did not complete within the configured timeout.
    #[error("Source timeout: {message} {context}")]
    Timeout {
        message: String,
        context: ErrorContext,
    },

    /// The source answered with something that is not a record list.
    #[error("Invalid payload: {message} {context}")]
    InvalidPayload {
        message: String,
        context: ErrorContext,
    },

    /// The source is missing required settings (path, endpoint, key).
    #[error("Source not configured: {message} {context}")]
    NotConfigured {
        message: String,
        context: ErrorContext,
    },
}

impl SourceError {
    /// Create an unavailable error with full context.
    pub fn unavailable_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Unavailable {
            message: message.into(),
            context: context.retryable(),
        }
    }

    /// Create a timeout error with context.
    pub fn timeout_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Timeout {
            message: message.into(),
            context: context.retryable(),
        }
    }

    /// Create an invalid payload error with context.
    pub fn invalid_payload_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InvalidPayload {
            message: message.into(),
            context,
        }
    }

    /// Create a not-configured error. Retrying cannot fix configuration.
    pub fn not_configured_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotConfigured {
            message: message.into(),
            context: ErrorContext {
                retryable: false,
                ..context
            },
        }
    }

    /// Short machine-readable classification used in failure envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Timeout { .. } => "timeout",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::NotConfigured { .. } => "not_configured",
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.context().retryable
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Unavailable { context, .. }
            | Self::Timeout { context, .. }
            | Self::InvalidPayload { context, .. }
            | Self::NotConfigured { context, .. } => context,
        }
    }

    /// Add or update the venue in the error context.
    pub fn with_venue(mut self, venue: impl ToString) -> Self {
        match &mut self {
            Self::Unavailable { context, .. }
            | Self::Timeout { context, .. }
            | Self::InvalidPayload { context, .. }
            | Self::NotConfigured { context, .. } => {
                context.venue = Some(venue.to_string());
            }
        }
        self
    }

    /// Add or update the source name in the error context.
    pub fn with_source(mut self, name: impl Into<String>) -> Self {
        match &mut self {
            Self::Unavailable { context, .. }
            | Self::Timeout { context, .. }
            | Self::InvalidPayload { context, .. }
            | Self::NotConfigured { context, .. } => {
                context.source_name = Some(name.into());
            }
        }
        self
    }
}

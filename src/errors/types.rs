//! # Error Types
//!
//! Error taxonomy for the edgeplane compiler using `thiserror`.

/// Custom result type for edgeplane operations
pub type Result<T> = std::result::Result<T, EdgeplaneError>;

/// Main error type for the edgeplane compiler
#[derive(thiserror::Error, Debug)]
pub enum EdgeplaneError {
    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Two mutually exclusive options were set together
    #[error("Configuration conflict between '{first}' and '{second}': {message}")]
    Conflict {
        first: String,
        second: String,
        message: String,
    },

    /// A single configuration value is malformed
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// A structural routing constraint would be violated
    #[error("Constraint violation: {message}")]
    Constraint { message: String },

    /// The secondary-region graph is missing something the primary needs
    #[error("Cross-region dependency error: {message}")]
    CrossRegion { message: String },

    /// Serialization errors while rendering a plan
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
}

impl EdgeplaneError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a conflict error naming the offending option pair
    pub fn conflict<A: Into<String>, B: Into<String>, M: Into<String>>(
        first: A,
        second: B,
        message: M,
    ) -> Self {
        Self::Conflict { first: first.into(), second: second.into(), message: message.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a constraint violation error
    pub fn constraint<S: Into<String>>(message: S) -> Self {
        Self::Constraint { message: message.into() }
    }

    /// Create a cross-region dependency error
    pub fn cross_region<S: Into<String>>(message: S) -> Self {
        Self::CrossRegion { message: message.into() }
    }

    /// Add context to an error
    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        let context = context.into();
        match &mut self {
            EdgeplaneError::Io { context: ref mut ctx, .. }
            | EdgeplaneError::Serialization { context: ref mut ctx, .. } => {
                *ctx = format!("{}: {}", context, ctx);
            }
            _ => {}
        }
        self
    }

    /// Stable category name used as a structured log field
    pub fn category(&self) -> &'static str {
        match self {
            EdgeplaneError::Config { .. } => "config",
            EdgeplaneError::Conflict { .. } => "conflict",
            EdgeplaneError::Validation { .. } => "validation",
            EdgeplaneError::Constraint { .. } => "constraint",
            EdgeplaneError::CrossRegion { .. } => "cross_region",
            EdgeplaneError::Serialization { .. } => "serialization",
            EdgeplaneError::Io { .. } => "io",
        }
    }

    /// Compile-time errors never succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<std::io::Error> for EdgeplaneError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for EdgeplaneError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            source: Box::new(error),
            context: "JSON serialization failed".to_string(),
        }
    }
}

impl From<serde_yaml::Error> for EdgeplaneError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Serialization {
            source: Box::new(error),
            context: "YAML serialization failed".to_string(),
        }
    }
}

impl From<config::ConfigError> for EdgeplaneError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for EdgeplaneError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let message = fields
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}

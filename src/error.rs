//! Error handling for cebaf-graph
//!
//! This module defines the crate-wide error type and a Result alias for use
//! throughout the library. Service and hierarchy errors abort a run;
//! expression errors are recovered per timestamp by the snapshot writer.

use thiserror::Error;

/// Main error type for graph generation
#[derive(Error, Debug)]
pub enum GraphError {
    /// Non-ok status from an upstream service
    #[error("Service error: {message}")]
    Service { message: String },

    /// Upstream response could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A type name is absent from the type hierarchy
    #[error("Type not found in hierarchy: {0}")]
    TypeNotFound(String),

    /// Invalid or incomplete date span
    #[error("Date span error: {0}")]
    DateSpan(String),

    /// Unresolved placeholder or invalid expression syntax
    #[error("Expression error: {0}")]
    Expression(String),

    /// A fetch was requested with an empty channel set
    #[error("No channels to fetch")]
    NoChannels,

    /// Request cannot be split to respect the throttle
    #[error("Throttle error: {0}")]
    Throttle(String),

    /// Errors related to configuration loading
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        GraphError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a service error from a message
    pub fn service(message: impl Into<String>) -> Self {
        GraphError::Service {
            message: message.into(),
        }
    }

    /// Create an expression error from a Rhai evaluation error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        GraphError::Expression(err.to_string())
    }

    /// Create a service or parse error from a transport error
    pub fn from_http_error(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GraphError::Parse(err.to_string())
        } else {
            GraphError::service(err.to_string())
        }
    }

    /// Whether this error (or the error it wraps) is an expression error
    pub fn is_expression(&self) -> bool {
        match self {
            GraphError::Expression(_) => true,
            GraphError::WithContext { source, .. } => source.is_expression(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Parse(err.to_string())
    }
}

/// Result type alias for graph generation
pub type Result<T> = std::result::Result<T, GraphError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphError::TypeNotFound("Dipole".to_string());
        assert_eq!(err.to_string(), "Type not found in hierarchy: Dipole");
    }

    #[test]
    fn test_error_with_context() {
        let err = GraphError::service("bad request");
        let with_ctx = err.with_context("Fetching inventory");
        assert!(with_ctx.to_string().contains("Fetching inventory"));
        assert!(with_ctx.to_string().contains("bad request"));
    }

    #[test]
    fn test_expression_detected_through_context() {
        let err = GraphError::Expression("$(X) < 0.1".to_string()).with_context("filter");
        assert!(err.is_expression());
        assert!(!GraphError::NoChannels.is_expression());
    }
}

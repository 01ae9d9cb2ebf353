//! Error types for the relay core.

use serde::{Deserialize, Serialize};

/// Errors raised while dispatching a single tool invocation upstream.
///
/// These never escape [`crate::Dispatcher::call_api`]; they are folded into an
/// [`ErrorEnvelope`] there.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Method outside GET/POST/PUT/DELETE.
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// No connection registered under this name.
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    /// A parameter could not be encoded for the request.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Transport failure or non-success upstream status.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl DispatchError {
    /// Full message including every underlying cause.
    ///
    /// reqwest's own `Display` stops at "error sending request"; the cause
    /// chain carries the transport detail (refused, timed out, DNS).
    pub fn message(&self) -> String {
        let Self::Http(err) = self else {
            return self.to_string();
        };

        let mut parts = Vec::new();
        if err.is_timeout() {
            parts.push("request timed out".to_string());
        } else if err.is_connect() {
            parts.push("connection failed".to_string());
        }
        parts.push(err.to_string());

        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            let text = cause.to_string();
            if parts.last() != Some(&text) {
                parts.push(text);
            }
            source = cause.source();
        }

        parts.join(": ")
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The normalized `{"error": message}` result handed back in place of a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Serialize to the JSON string returned to tool callers.
    pub fn to_json(&self) -> String {
        // A single string field always serializes; the fallback keeps this infallible.
        serde_json::to_string(self)
            .unwrap_or_else(|_| String::from(r#"{"error":"unserializable error message"}"#))
    }
}

impl From<&DispatchError> for ErrorEnvelope {
    fn from(err: &DispatchError) -> Self {
        Self::new(err.message())
    }
}

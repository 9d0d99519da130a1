//! Error types for cache operations
//!
//! This module defines the error type shared by the store backends, the
//! instrumented cache, the call recorder and the page cache.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing store failure - connection or backend issues
    #[error("Store error: {0}")]
    Store(String),

    /// A list operation was issued against a string key, or the reverse
    #[error("Wrong type for key '{key}': {expected} operation on {found} value")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Stored value does not have the shape the caller asked for
    #[error("Cannot decode value as {kind}: {reason}")]
    Decode { kind: &'static str, reason: String },

    /// Origin fetch failed
    #[error("Fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    /// Operation timeout
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    Timeout { timeout_ms: u64, context: String },

    /// Recorded call history is malformed or from an unknown format version
    #[error("History error: {0}")]
    History(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Build a decode error for the given target kind
    pub fn decode(kind: &'static str, reason: impl ToString) -> Self {
        CacheError::Decode {
            kind,
            reason: reason.to_string(),
        }
    }
}

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Store(e.to_string())
    }
}

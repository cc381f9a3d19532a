//! Crate-level error types

use std::time::Duration;

use thiserror::Error;

use crate::crypto::CryptoError;

/// Errors surfaced by the trust-flow core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// Required configuration keys are missing
    #[error("Missing configuration keys: {}", missing.join(", "))]
    Config {
        /// Every key that was required but absent
        missing: Vec<String>,
    },

    /// Malformed envelope, header or JSON document
    #[error("Format error: {0}")]
    Format(String),

    /// Signature layer index out of range
    #[error("Layer index {index} out of range (envelope has {len} layers)")]
    Index {
        /// Requested layer
        index: usize,
        /// Number of layers present
        len: usize,
    },

    /// No key matched the requested role or key id
    #[error("No key found for {0}")]
    KeyNotFound(String),

    /// A matching key exists but is flagged invalid
    #[error("Key is invalid: {0}")]
    KeyInvalid(String),

    /// The crypto facet failed for reasons other than key selection
    #[error("Crypto facet error: {0}")]
    Crypto(#[from] CryptoError),

    /// A flow descriptor cannot be compiled
    #[error("Invalid flow `{flow}`: {reason}")]
    InvalidFlow {
        /// Flow name
        flow: String,
        /// What is wrong with it
        reason: String,
    },

    /// A plugin could not be constructed
    #[error("Plugin construction failed: {0}")]
    PluginConstruction(String),

    /// A plugin failed to initialize
    #[error("Plugin `{0}` failed to initialize")]
    PluginInit(String),

    /// SDK bring-up did not complete in time
    #[error("Initialization timed out after {0:?}")]
    InitTimeout(Duration),

    /// No API registered under the requested name
    #[error("No API registered as `{0}`")]
    ApiNotFound(String),

    /// The data facet rejected an operation
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for TrustError {
    fn from(err: serde_json::Error) -> Self {
        TrustError::Format(err.to_string())
    }
}

/// Result type for trust-flow operations
pub type TrustResult<T> = Result<T, TrustError>;

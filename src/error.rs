//! Error types for the HTTP collaborators and the JSON stores.
//!
//! Orchestration code (sync, maintenance, main) works in `anyhow::Result`;
//! these enums are what the boundaries return so callers can decide
//! between substituting a sentinel and propagating.

use std::path::PathBuf;

/// Failure talking to the catalog or length source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status code.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {endpoint}: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),
}

impl SourceError {
    pub fn decode(endpoint: &'static str, message: impl Into<String>) -> Self {
        SourceError::Decode {
            endpoint,
            message: message.into(),
        }
    }
}

/// The user identity could not be established. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("invalid SteamID '{0}': expected 17 digits")]
    InvalidId(String),

    #[error("vanity name '{0}' could not be resolved to a SteamID")]
    NoMatch(String),

    #[error("vanity lookup failed: {0}")]
    Source(#[from] SourceError),
}

/// Failure reading or writing one of the JSON stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

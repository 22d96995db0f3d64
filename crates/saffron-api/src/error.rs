//! Errors raised while building the HTTP client.
//!
//! Per-request failures are [`saffron_billing::RemoteError`]s; this type only
//! covers construction, before any request is sent.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiClientError {
    /// ## When This Occurs
    /// - `remote.base_url` does not parse
    /// - Scheme is not http or https
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// TLS backend failed to initialize.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

pub type ApiClientResult<T> = Result<T, ApiClientError>;

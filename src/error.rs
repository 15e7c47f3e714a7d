//! error.rs - Error types for provider fetches and the live feed

use std::time::Duration;
use thiserror::Error;

use crate::models::Platform;

/// Failure fetching or decoding one provider's listings.
///
/// Never surfaced to callers: the scheduler logs it and treats the source as
/// empty for the cycle.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{platform} request failed: {source}")]
    Http {
        platform: Platform,
        #[source]
        source: reqwest::Error,
    },

    #[error("{platform} returned status {status}")]
    Status { platform: Platform, status: u16 },

    #[error("{platform} payload could not be decoded: {message}")]
    Decode { platform: Platform, message: String },

    #[error("{platform} did not respond within {timeout:?}")]
    Timeout { platform: Platform, timeout: Duration },

    #[error("{platform} provider unavailable: {message}")]
    Unavailable { platform: Platform, message: String },
}

/// Failure on the live feed connection. Recovered by reconnecting.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("connection closed by server")]
    Closed,

    #[error("could not encode subscription: {0}")]
    Encode(#[from] serde_json::Error),
}

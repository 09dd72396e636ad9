//! Error types for `strand-core`.

use thiserror::Error;

/// Failure talking to the relay set while querying.
///
/// Timeouts are not errors: a query that runs out of time yields whatever
/// arrived so far, and that partial result is treated as authoritative.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("relay query failed: {0}")]
    Transport(String),

    #[error("no relays connected")]
    NotConnected,
}

/// Publishing has no degraded fallback, so every failure reaches the caller.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to send event: {0}")]
    Send(String),

    #[error("timed out publishing event after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key: {0}")]
    Invalid(String),

    #[error("failed to sign event: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Key(#[from] KeyError),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

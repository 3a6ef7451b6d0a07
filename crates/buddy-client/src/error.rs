use buddy_core::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by the client crate.
///
/// None of these are fatal to a running session; they come out of
/// configuration and setup.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

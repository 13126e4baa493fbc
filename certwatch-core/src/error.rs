//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Domain record not found
    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    /// Network failure (DNS resolution, connect/read timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// TLS negotiation failure or missing peer certificate
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// Leaf certificate outside its validity window
    #[error("Certificate validity error: {0}")]
    ValidationWindow(String),

    /// The renewal authority rejected an order, challenge or CSR
    #[error("Renewal protocol error for {domain}: {message}")]
    RenewalProtocol { domain: String, message: String },

    /// Notification delivery failure
    #[error("Notification transport error: {0}")]
    Transport(String),

    /// Cancellation received during a wait
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl CoreError {
    /// Whether it is expected behavior (user input, resource does not exist,
    /// a probe target being down, etc.), used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error`
    /// when returning `false`.
    /// **Please update this method simultaneously when new variants are added.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::DomainNotFound(_)
                | Self::Network(_)
                | Self::Handshake(_)
                | Self::ValidationWindow(_)
                | Self::Validation(_)
        )
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;

//! Error types for the energy cost tracker

use crate::types::{MeterValue, ResourceKind};
use thiserror::Error;

/// Errors surfaced by the upstream metering API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The credential exchange was rejected outright
    #[error("invalid credentials: check the account email and password")]
    InvalidCredentials,

    /// No upstream resource of this kind is linked to the account
    #[error("no {0} resource is linked to this account: check the meter linkage on the supplier portal")]
    NotFound(ResourceKind),

    /// A previously issued token was rejected mid-request
    #[error("token rejected by the upstream API")]
    AuthRejected,

    /// Network request failed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response did not match the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Upstream API error
    #[error("upstream API error: {0}")]
    Api(String),
}

impl ApiError {
    /// True for failures worth retrying within the cycle's retry bound.
    ///
    /// `InvalidCredentials` and `NotFound` are user-actionable and never
    /// retried; `AuthRejected` is handled separately via one forced
    /// re-authentication.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::InvalidResponse(_) | Self::Api(_)
        )
    }
}

/// Errors from the pure tariff arithmetic
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TariffError {
    /// A negative quantity was supplied where only non-negative ones are valid
    #[error("negative {quantity} is not a valid tariff input")]
    Negative { quantity: &'static str },
}

/// Errors when reading a published value
#[derive(Debug, Error, Clone)]
pub enum ValueError {
    /// The value was never published, or is currently marked unavailable
    #[error("value {name} is not available")]
    NotAvailable { name: &'static str },
}

impl ValueError {
    /// Creates a NotAvailable error
    pub fn not_available(value: MeterValue) -> Self {
        Self::NotAvailable { name: value.name() }
    }
}

//! Provider-side errors
//!
//! [`TransportError`] is what a backend call can fail with; its kind decides
//! whether the fallback controller may switch providers.

use super::capability::Capability;
use super::selector::ProviderKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Network failure, timeout, overload or bad credentials
    Unavailable,
    /// The model rejected a feature it was assumed to support
    CapabilityMismatch,
    /// The request itself was refused; retrying elsewhere will not help
    Rejected,
    /// A reply arrived but could not be parsed
    InvalidResponse,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Unavailable => "provider unavailable",
            TransportErrorKind::CapabilityMismatch => "capability mismatch",
            TransportErrorKind::Rejected => "request rejected",
            TransportErrorKind::InvalidResponse => "invalid response",
        }
    }
}

/// Failure of a single backend call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unavailable, message)
    }

    pub fn capability_mismatch(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::CapabilityMismatch, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Rejected, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidResponse, message)
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::unavailable(format!("request timed out after {} seconds", seconds))
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Whether the fallback controller may answer this with a provider switch
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Unavailable | TransportErrorKind::CapabilityMismatch
        )
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} ({}): {}", self.kind.as_str(), code, self.message),
            None => write!(f, "{}: {}", self.kind.as_str(), self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// No provider can drive OS mode with the given configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("model '{model}' cannot drive OS mode: missing {}", format_missing(.missing))]
    MissingCapabilities {
        model: String,
        missing: Vec<Capability>,
    },

    #[error("{kind} provider is not configured: {reason}")]
    NotConfigured { kind: ProviderKind, reason: String },
}

impl CapabilityError {
    pub fn missing(&self) -> &[Capability] {
        match self {
            CapabilityError::MissingCapabilities { missing, .. } => missing,
            CapabilityError::NotConfigured { .. } => &[],
        }
    }
}

fn format_missing(missing: &[Capability]) -> String {
    missing
        .iter()
        .map(Capability::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

use crate::protocol::{ProtocolViolation, TranslationError};
use crate::provider::{CapabilityError, ProviderKind, TransportError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("provider fallback was already used in this session")]
    FallbackAlreadyUsed,

    #[error("provider switch requested without starting a fallback")]
    FallbackNotStarted,

    #[error("conversation would break tool pairing: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("session has already finished")]
    Finished,
}

/// Everything a run can end with besides its normal outcome
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("provider call failed: {0}")]
    Provider(TransportError),

    #[error("fallback exhausted on {provider} provider: {cause}")]
    FallbackExhausted { provider: ProviderKind, cause: String },

    #[error(transparent)]
    Session(#[from] SessionError),
}

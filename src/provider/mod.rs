//! Provider capabilities, selection and transports

mod capability;
mod error;
pub mod http;
pub mod mock;
mod selector;
mod transport;

pub use capability::{
    Capability, CapabilityProbe, CapabilitySet, CapabilitySource, KnownModel, ModelDescriptor,
    ProbePolicy, ProbeReport, ProbeWarning,
};
pub use error::{CapabilityError, TransportError, TransportErrorKind};
pub use http::{AnthropicHttpTransport, OpenAiHttpTransport};
pub use mock::MockTransport;
pub use selector::{
    Credential, EnvSignals, GenericOverrides, ProviderConfig, ProviderKind, ProviderSelector,
    Selection, SelectionReason, SelectionRequest, TokenLimits, DEFAULT_GENERIC_ENDPOINT,
    DEFAULT_GENERIC_MODEL, DEFAULT_VENDOR_ENDPOINT, DEFAULT_VENDOR_MODEL,
};
pub use transport::{GenericTransport, Transports, VendorTransport};

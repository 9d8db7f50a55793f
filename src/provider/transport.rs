use super::error::TransportError;
use super::selector::ProviderConfig;
use crate::protocol::generic::{GenericRequest, GenericResponse};
use crate::protocol::vendor::{VendorRequest, VendorResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// Backend speaking the vendor computer-use schema
#[async_trait]
pub trait VendorTransport: Send + Sync {
    async fn send(
        &self,
        config: &ProviderConfig,
        request: &VendorRequest,
    ) -> Result<VendorResponse, TransportError>;

    fn name(&self) -> &str;
}

/// Backend speaking OpenAI-style chat completions with function calling
#[async_trait]
pub trait GenericTransport: Send + Sync {
    async fn send(
        &self,
        config: &ProviderConfig,
        request: &GenericRequest,
    ) -> Result<GenericResponse, TransportError>;

    fn name(&self) -> &str;
}

/// One transport per provider kind; the session's active kind picks which is used
#[derive(Clone)]
pub struct Transports {
    pub vendor: Arc<dyn VendorTransport>,
    pub generic: Arc<dyn GenericTransport>,
}

impl Transports {
    pub fn new(vendor: Arc<dyn VendorTransport>, generic: Arc<dyn GenericTransport>) -> Self {
        Self { vendor, generic }
    }
}

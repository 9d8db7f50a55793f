//! Provider calls with a single bounded fallback
//!
//! A session may switch providers once. The switch happens only for failures
//! another backend could plausibly avoid; everything else propagates as is.

use super::error::RunError;
use super::images::prune_images;
use super::prompt::SystemPrompt;
use super::state::Session;
use crate::protocol::generic::{GenericMessage, GenericRequest};
use crate::protocol::textual::{fold_tool_history, parse_textual_tool_calls};
use crate::protocol::translate::{
    decode_generic_response, decode_vendor_response, encode_generic, encode_vendor,
};
use crate::protocol::vendor::VendorRequest;
use crate::protocol::{Message, ToolSchemaTranslator, TranslationError, TranslationWarning};
use crate::provider::{
    ProviderKind, ProviderSelector, SelectionRequest, TransportError, Transports,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Failure of one provider attempt, before fallback policy is applied
#[derive(Debug)]
enum AttemptError {
    Translation(TranslationError),
    Transport(TransportError),
}

impl From<TranslationError> for AttemptError {
    fn from(err: TranslationError) -> Self {
        AttemptError::Translation(err)
    }
}

impl From<TransportError> for AttemptError {
    fn from(err: TransportError) -> Self {
        AttemptError::Transport(err)
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Translation(e) => write!(f, "{}", e),
            AttemptError::Transport(e) => write!(f, "{}", e),
        }
    }
}

pub struct FallbackController {
    selector: ProviderSelector,
    request: SelectionRequest,
    transports: Transports,
    tools: ToolSchemaTranslator,
    prompt: SystemPrompt,
    recent_images: Option<usize>,
    request_timeout: Duration,
}

impl FallbackController {
    /// `request` must be the selection input the session was created from
    pub fn new(
        selector: ProviderSelector,
        request: SelectionRequest,
        transports: Transports,
        tools: ToolSchemaTranslator,
    ) -> Self {
        Self {
            selector,
            request,
            transports,
            tools,
            prompt: SystemPrompt::new(None),
            recent_images: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.prompt = prompt;
        self
    }

    /// Send only about this many of the most recent screenshots
    pub fn with_recent_images(mut self, recent_images: Option<usize>) -> Self {
        self.recent_images = recent_images;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn tools(&self) -> &ToolSchemaTranslator {
        &self.tools
    }

    /// Gets the next assistant message for the session's conversation
    ///
    /// The reply is returned, not appended.
    pub async fn invoke(&self, session: &mut Session) -> Result<Message, RunError> {
        let failure = match self.attempt(session).await {
            Ok(message) => return Ok(message),
            Err(AttemptError::Translation(e)) => return Err(e.into()),
            Err(AttemptError::Transport(e)) if !e.is_recoverable() => {
                error!(provider = %session.provider_kind(), "Provider call failed: {}", e);
                return Err(RunError::Provider(e));
            }
            Err(AttemptError::Transport(e)) => e,
        };

        let failed = session.provider_kind();
        if session.fallback_used() {
            error!(provider = %failed, "Provider failed after fallback: {}", failure);
            return Err(RunError::FallbackExhausted {
                provider: failed,
                cause: failure.to_string(),
            });
        }

        warn!(provider = %failed, "Provider failed, trying fallback: {}", failure);
        session.begin_fallback()?;

        let alternate = self
            .selector
            .select_excluding(&self.request, failed)
            .map_err(|e| {
                error!("No alternate provider: {}", e);
                RunError::FallbackExhausted {
                    provider: failed,
                    cause: format!("{}; no alternate provider: {}", failure, e),
                }
            })?;
        session.apply_fallback(alternate)?;

        let switched = session.provider_kind();
        info!(from = %failed, to = %switched, "Retrying request on alternate provider");

        self.attempt(session).await.map_err(|e| {
            error!(provider = %switched, "Fallback provider failed: {}", e);
            RunError::FallbackExhausted {
                provider: switched,
                cause: e.to_string(),
            }
        })
    }

    async fn attempt(&self, session: &Session) -> Result<Message, AttemptError> {
        let outgoing = prune_images(session.messages(), self.recent_images);
        let config = session.provider();
        let capabilities = session.capabilities();
        let system = self
            .prompt
            .render(config.kind, capabilities, self.tools.version());

        debug!(
            provider = %config.kind,
            model = %config.model_id,
            messages = outgoing.len(),
            "Invoking provider"
        );

        match config.kind {
            ProviderKind::VendorComputerUse => {
                let encoded = encode_vendor(&outgoing)?;
                log_warnings(&encoded.warnings);
                let request = VendorRequest {
                    model: config.model_id.clone(),
                    max_tokens: config.max_tokens,
                    system: Some(system),
                    messages: encoded.value,
                    tools: vec![self.tools.vendor_tool_definition()],
                };
                let response = self
                    .with_timeout(self.transports.vendor.send(config, &request))
                    .await?;
                let decoded = decode_vendor_response(&response)?;
                log_warnings(&decoded.warnings);
                Ok(decoded.value)
            }
            ProviderKind::GenericToolCalling => {
                let encoded = if capabilities.tool_calling {
                    encode_generic(&outgoing)?
                } else {
                    encode_generic(&fold_tool_history(&outgoing))?
                };
                log_warnings(&encoded.warnings);
                let mut messages = Vec::with_capacity(encoded.value.len() + 1);
                messages.push(GenericMessage::system(system));
                messages.extend(encoded.value);
                let tools = if capabilities.tool_calling {
                    vec![self.tools.generic_tool_definition()]
                } else {
                    Vec::new()
                };
                let request = GenericRequest {
                    model: config.model_id.clone(),
                    messages,
                    max_tokens: Some(config.max_tokens),
                    tools,
                };
                let response = self
                    .with_timeout(self.transports.generic.send(config, &request))
                    .await?;
                let decoded = decode_generic_response(&response)?;
                log_warnings(&decoded.warnings);

                let mut message = decoded.value;
                if !capabilities.tool_calling && !message.has_tool_calls() {
                    let calls = parse_textual_tool_calls(&message.text());
                    if !calls.is_empty() {
                        debug!(calls = calls.len(), "Parsed tool calls from reply text");
                        message.content.extend(calls);
                    }
                }
                Ok(message)
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| TransportError::timeout(self.request_timeout.as_secs()))?
    }
}

fn log_warnings(warnings: &[TranslationWarning]) {
    for warning in warnings {
        warn!("Translation warning: {}", warning);
    }
}

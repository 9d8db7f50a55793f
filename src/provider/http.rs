//! HTTP transports for the two wire schemas
//!
//! Both clients keep one pooled `reqwest::Client` and map every failure into a
//! [`TransportError`] whose kind tells the fallback controller what to do.

use super::error::TransportError;
use super::selector::ProviderConfig;
use super::transport::{GenericTransport, VendorTransport};
use crate::protocol::generic::{GenericRequest, GenericResponse};
use crate::protocol::tool_schema::ComputerToolVersion;
use crate::protocol::vendor::{VendorRequest, VendorResponse};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Features whose absence turns a 400 into a capability mismatch
const FEATURE_HINTS: &[&str] = &["image", "vision", "tool", "function"];

/// Phrases that mark a 400 body as a refusal rather than a malformed request
const UNSUPPORTED_HINTS: &[&str] = &["support", "not allowed"];

/// Maps an HTTP error status and body to a transport error
pub fn classify_status(status: u16, body: &str) -> TransportError {
    let message = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    };

    let error = match status {
        401 | 403 | 408 | 429 | 529 | 500..=599 => TransportError::unavailable(message),
        400 | 404 | 422 => {
            let lower = body.to_lowercase();
            let unsupported = UNSUPPORTED_HINTS.iter().any(|hint| lower.contains(hint));
            if unsupported && FEATURE_HINTS.iter().any(|hint| lower.contains(hint)) {
                TransportError::capability_mismatch(message)
            } else {
                TransportError::rejected(message)
            }
        }
        _ => TransportError::rejected(message),
    };
    error.with_status(status)
}

fn build_client(timeout: Duration) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TransportError::unavailable(format!("failed to build HTTP client: {}", e)))
}

async fn execute<T: DeserializeOwned>(
    request: RequestBuilder,
    endpoint: &str,
    timeout: Duration,
) -> Result<T, TransportError> {
    let start = Instant::now();

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            error!("Provider request timed out after {:?}", timeout);
            TransportError::timeout(timeout.as_secs())
        } else if e.is_connect() {
            error!("Cannot connect to provider at {}", endpoint);
            TransportError::unavailable(format!("connection failed: {}", e))
        } else {
            error!("Provider request error: {}", e);
            TransportError::unavailable(format!("request failed: {}", e))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!("Provider returned error status {}: {}", status, body);
        return Err(classify_status(status.as_u16(), &body));
    }

    let parsed = response.json::<T>().await.map_err(|e| {
        error!("Failed to parse provider response: {}", e);
        TransportError::invalid_response(format!("JSON parse error: {}", e))
    })?;

    info!(
        "Provider call completed in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(parsed)
}

/// Anthropic Messages API with the computer-use beta enabled
pub struct AnthropicHttpTransport {
    http_client: Client,
    timeout: Duration,
}

impl AnthropicHttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            http_client: build_client(timeout)?,
            timeout,
        })
    }

    /// Beta header matching the tool version declared in the request
    fn beta_flag(request: &VendorRequest) -> Option<&'static str> {
        request
            .tools
            .iter()
            .find_map(|tool| ComputerToolVersion::from_tool_type(&tool.tool_type))
            .map(|version| version.beta_flag())
    }
}

#[async_trait]
impl VendorTransport for AnthropicHttpTransport {
    async fn send(
        &self,
        config: &ProviderConfig,
        request: &VendorRequest,
    ) -> Result<VendorResponse, TransportError> {
        let url = format!("{}/v1/messages", config.endpoint.trim_end_matches('/'));
        debug!(
            url = %url,
            messages = request.messages.len(),
            "Sending vendor request"
        );

        let mut builder = self
            .http_client
            .post(&url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request);
        if let Some(beta) = Self::beta_flag(request) {
            builder = builder.header("anthropic-beta", beta);
        }
        if let Some(credential) = &config.credential {
            builder = builder.header("x-api-key", credential.expose());
        }

        let response: VendorResponse = execute(builder, &config.endpoint, self.timeout).await?;
        if let Some(usage) = &response.usage {
            debug!(
                "Vendor usage: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiHttpTransport {
    http_client: Client,
    timeout: Duration,
}

impl OpenAiHttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            http_client: build_client(timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl GenericTransport for OpenAiHttpTransport {
    async fn send(
        &self,
        config: &ProviderConfig,
        request: &GenericRequest,
    ) -> Result<GenericResponse, TransportError> {
        let url = format!("{}/chat/completions", config.endpoint.trim_end_matches('/'));
        debug!(
            url = %url,
            messages = request.messages.len(),
            "Sending generic request"
        );

        let mut builder = self.http_client.post(&url).json(request);
        if let Some(credential) = &config.credential {
            builder = builder.bearer_auth(credential.expose());
        }

        let response: GenericResponse = execute(builder, &config.endpoint, self.timeout).await?;
        if let Some(usage) = &response.usage {
            debug!(
                "Generic usage: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tool_schema::{DisplayGeometry, ToolSchemaTranslator};
    use crate::provider::error::TransportErrorKind;
    use yare::parameterized;

    #[parameterized(
        server_error = { 500, "", TransportErrorKind::Unavailable },
        overloaded = { 529, "{\"type\":\"overloaded_error\"}", TransportErrorKind::Unavailable },
        rate_limited = { 429, "slow down", TransportErrorKind::Unavailable },
        unauthorized = { 401, "invalid x-api-key", TransportErrorKind::Unavailable },
        vision_unsupported = { 400, "This model does not support image input", TransportErrorKind::CapabilityMismatch },
        tools_unsupported = { 400, "tools are not supported for this model", TransportErrorKind::CapabilityMismatch },
        bad_request = { 400, "messages: field required", TransportErrorKind::Rejected },
        unsupported_parameter = { 400, "parameter 'logprobs' is not supported", TransportErrorKind::Rejected },
        unsupported_temperature = { 422, "temperature 3.0 is not supported", TransportErrorKind::Rejected },
        feature_without_refusal = { 400, "tool_use ids must be unique", TransportErrorKind::Rejected },
        teapot = { 418, "", TransportErrorKind::Rejected },
    )]
    fn test_classify_status(status: u16, body: &str, expected: TransportErrorKind) {
        let err = classify_status(status, body);
        assert_eq!(err.kind, expected);
        assert_eq!(err.status_code, Some(status));
    }

    #[test]
    fn test_beta_flag_follows_tool_version() {
        let translator = ToolSchemaTranslator::new(
            ComputerToolVersion::V20250124,
            DisplayGeometry::default(),
        );
        let request = VendorRequest {
            model: "claude-3-7-sonnet-20250219".to_string(),
            max_tokens: 1024,
            system: None,
            messages: Vec::new(),
            tools: vec![translator.vendor_tool_definition()],
        };
        assert_eq!(
            AnthropicHttpTransport::beta_flag(&request),
            Some("computer-use-2025-01-24")
        );
    }

    #[test]
    fn test_no_beta_flag_without_tools() {
        let request = VendorRequest {
            model: "claude".to_string(),
            max_tokens: 1024,
            system: None,
            messages: Vec::new(),
            tools: Vec::new(),
        };
        assert_eq!(AnthropicHttpTransport::beta_flag(&request), None);
    }
}

use super::error::TransportError;
use super::selector::{ProviderConfig, ProviderKind};
use super::transport::{GenericTransport, VendorTransport};
use crate::protocol::generic::{
    FunctionCall, GenericChoice, GenericContent, GenericMessage, GenericRequest, GenericResponse,
    GenericToolCall,
};
use crate::protocol::vendor::{VendorBlock, VendorRequest, VendorResponse, VendorRole};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A request the mock received, kept for assertions
#[derive(Debug, Clone)]
pub enum RecordedRequest {
    Vendor {
        model_id: String,
        request: VendorRequest,
    },
    Generic {
        model_id: String,
        request: GenericRequest,
    },
}

impl RecordedRequest {
    pub fn kind(&self) -> ProviderKind {
        match self {
            RecordedRequest::Vendor { .. } => ProviderKind::VendorComputerUse,
            RecordedRequest::Generic { .. } => ProviderKind::GenericToolCalling,
        }
    }
}

/// Scripted backend for both provider kinds
///
/// Each kind has its own queue; a call on an empty queue fails with
/// `InvalidResponse` so a test never hangs on a missing reply.
pub struct MockTransport {
    vendor_replies: Mutex<VecDeque<Result<VendorResponse, TransportError>>>,
    generic_replies: Mutex<VecDeque<Result<GenericResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    name: String,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_name("MockTransport")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            vendor_replies: Mutex::new(VecDeque::new()),
            generic_replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            name: name.into(),
        }
    }

    pub fn push_vendor(&self, reply: Result<VendorResponse, TransportError>) {
        self.vendor_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_generic(&self, reply: Result<GenericResponse, TransportError>) {
        self.generic_replies.lock().unwrap().push_back(reply);
    }

    pub fn remaining_replies(&self) -> usize {
        self.vendor_replies.lock().unwrap().len() + self.generic_replies.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn vendor_text(text: impl Into<String>) -> VendorResponse {
        Self::vendor_reply(vec![VendorBlock::text(text)], "end_turn")
    }

    pub fn vendor_tool_use(id: impl Into<String>, input: Value) -> VendorResponse {
        Self::vendor_reply(
            vec![VendorBlock::ToolUse {
                id: id.into(),
                name: "computer".to_string(),
                input,
            }],
            "tool_use",
        )
    }

    pub fn vendor_reply(content: Vec<VendorBlock>, stop_reason: &str) -> VendorResponse {
        VendorResponse {
            id: "msg_mock".to_string(),
            role: VendorRole::Assistant,
            content,
            model: "mock".to_string(),
            stop_reason: Some(stop_reason.to_string()),
            usage: None,
        }
    }

    pub fn generic_text(text: impl Into<String>) -> GenericResponse {
        Self::generic_reply(
            GenericMessage::assistant(Some(GenericContent::Text(text.into())), Vec::new()),
            "stop",
        )
    }

    pub fn generic_tool_call(id: impl Into<String>, arguments: Value) -> GenericResponse {
        let call = GenericToolCall {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: "computer".to_string(),
                arguments: arguments.to_string(),
            },
        };
        Self::generic_reply(GenericMessage::assistant(None, vec![call]), "tool_calls")
    }

    pub fn generic_reply(message: GenericMessage, finish_reason: &str) -> GenericResponse {
        GenericResponse {
            id: "chatcmpl_mock".to_string(),
            choices: vec![GenericChoice {
                index: 0,
                message,
                finish_reason: Some(finish_reason.to_string()),
            }],
            usage: None,
        }
    }

    fn exhausted(&self, kind: ProviderKind) -> TransportError {
        TransportError::invalid_response(format!(
            "{}: no more {} replies in queue",
            self.name, kind
        ))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VendorTransport for MockTransport {
    async fn send(
        &self,
        config: &ProviderConfig,
        request: &VendorRequest,
    ) -> Result<VendorResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest::Vendor {
            model_id: config.model_id.clone(),
            request: request.clone(),
        });
        self.vendor_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(self.exhausted(ProviderKind::VendorComputerUse)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl GenericTransport for MockTransport {
    async fn send(
        &self,
        config: &ProviderConfig,
        request: &GenericRequest,
    ) -> Result<GenericResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest::Generic {
            model_id: config.model_id.clone(),
            request: request.clone(),
        });
        self.generic_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(self.exhausted(ProviderKind::GenericToolCalling)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

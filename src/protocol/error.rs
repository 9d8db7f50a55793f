//! Translation errors and warnings

use thiserror::Error;

/// Hard failures while translating between the neutral model and a wire schema
///
/// Any of these means a message would otherwise be dropped or misread, so the run stops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("message {message_index}: unrecognized vendor content block")]
    UnknownVendorBlock { message_index: usize },

    #[error("message {message_index}: unrecognized generic content part")]
    UnknownGenericPart { message_index: usize },

    #[error("message {message_index}: system messages travel outside the conversation")]
    UnexpectedSystemMessage { message_index: usize },

    #[error("message {message_index}: {block} block is not allowed in a {role} message")]
    MisplacedBlock {
        message_index: usize,
        role: &'static str,
        block: &'static str,
    },

    #[error("tool result references unknown call id '{call_id}'")]
    OrphanToolResult { call_id: String },

    #[error("tool call '{call_id}' has malformed arguments: {reason}")]
    MalformedArguments { call_id: String, reason: String },

    #[error("message {message_index}: tool message without tool_call_id")]
    MissingToolCallId { message_index: usize },

    #[error("provider response contained no choices")]
    EmptyResponse,

    #[error("payload is not in vendor format: {reason}")]
    NotVendorFormat { reason: String },
}

/// Recoverable degradation recorded during translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationWarning {
    pub message_index: usize,
    pub detail: String,
}

impl std::fmt::Display for TranslationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "message {}: {}", self.message_index, self.detail)
    }
}

/// A translated value together with the warnings emitted while producing it
#[derive(Debug, Clone, PartialEq)]
pub struct Translated<T> {
    pub value: T,
    pub warnings: Vec<TranslationWarning>,
}

impl<T> Translated<T> {
    pub fn new(value: T, warnings: Vec<TranslationWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Translated<U> {
        Translated {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

/// Errors converting the computer tool definition between schemas
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolSchemaError {
    #[error("unknown tool '{0}', only the computer tool is supported")]
    UnknownTool(String),

    #[error("unsupported computer tool type '{0}'")]
    UnsupportedToolType(String),

    #[error("action enum does not match any computer tool version: {0:?}")]
    ActionSetMismatch(Vec<String>),

    #[error("generic tool schema is missing the action enum")]
    MissingActionEnum,
}

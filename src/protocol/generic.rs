//! OpenAI-style chat-completions wire types
//!
//! Used for every backend that speaks generic function calling.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Media types accepted in `image_url` data URIs
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenericRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericMessage {
    pub role: GenericRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<GenericContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<GenericToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl GenericMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: GenericRole::System,
            content: Some(GenericContent::Text(text.into())),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: GenericContent) -> Self {
        Self {
            role: GenericRole::User,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: Option<GenericContent>, tool_calls: Vec<GenericToolCall>) -> Self {
        Self {
            role: GenericRole::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: GenericRole::Tool,
            content: Some(GenericContent::Text(output.into())),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Message content: a plain string or a list of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenericContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
    #[serde(other)]
    Unknown,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn data_image(media_type: &str, data: &str) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: data_uri(media_type, data),
                detail: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl GenericToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: String) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// Function invocation; `arguments` is a JSON document encoded as a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A tool declared through the function-calling envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Body of `POST /chat/completions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericRequest {
    pub model: String,
    pub messages: Vec<GenericMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<GenericTool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericChoice {
    #[serde(default)]
    pub index: u32,
    pub message: GenericMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericResponse {
    #[serde(default)]
    pub id: String,
    pub choices: Vec<GenericChoice>,
    #[serde(default)]
    pub usage: Option<GenericUsage>,
}

fn function_type() -> String {
    "function".to_string()
}

/// Wraps a base64 payload in a `data:` URI
pub fn data_uri(media_type: &str, data: &str) -> String {
    format!("data:{};base64,{}", media_type, data)
}

/// Splits a base64 `data:` URI into `(media_type, payload)`
///
/// Returns `None` for remote URLs and non-base64 data URIs.
pub fn parse_data_uri(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let media_type = header.strip_suffix(";base64")?;
    Some((media_type, payload))
}

//! Anthropic Messages API wire types (computer-use beta)
//!
//! Only the subset the sampling loop exchanges is modelled. Field names follow
//! the documented JSON exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Media types accepted inline by the vendor API
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorRole {
    User,
    Assistant,
}

/// A message in vendor format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorMessage {
    pub role: VendorRole,
    #[serde(deserialize_with = "de::string_or_blocks")]
    pub content: Vec<VendorBlock>,
}

impl VendorMessage {
    pub fn new(role: VendorRole, content: Vec<VendorBlock>) -> Self {
        Self { role, content }
    }
}

/// Content block discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VendorBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: ToolResultContent,
        #[serde(default)]
        is_error: bool,
    },
    /// Any block type this crate does not understand
    #[serde(other)]
    Unknown,
}

impl VendorBlock {
    pub fn text(text: impl Into<String>) -> Self {
        VendorBlock::Text { text: text.into() }
    }

    pub fn base64_image(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        VendorBlock::Image {
            source: ImageSource::Base64 {
                media_type: media_type.into(),
                data: data.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

/// `tool_result.content` is either a bare string or a list of text/image blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<VendorBlock>),
}

impl Default for ToolResultContent {
    fn default() -> Self {
        ToolResultContent::Blocks(Vec::new())
    }
}

/// The computer-use tool as declared to the vendor API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub display_width_px: u32,
    pub display_height_px: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_number: Option<u32>,
}

/// Body of `POST /v1/messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<VendorMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools: Vec<VendorToolDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Non-streaming response of `POST /v1/messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorResponse {
    #[serde(default)]
    pub id: String,
    pub role: VendorRole,
    pub content: Vec<VendorBlock>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<VendorUsage>,
}

mod de {
    use super::VendorBlock;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrBlocks {
        String(String),
        Blocks(Vec<VendorBlock>),
    }

    pub fn string_or_blocks<'de, D>(deserializer: D) -> Result<Vec<VendorBlock>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match StringOrBlocks::deserialize(deserializer)? {
            StringOrBlocks::String(text) => vec![VendorBlock::Text { text }],
            StringOrBlocks::Blocks(blocks) => blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_block_wire_shape() {
        let block = VendorBlock::base64_image("image/png", "AAAA");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "image",
                "source": {"type": "base64", "media_type": "image/png", "data": "AAAA"}
            })
        );
    }

    #[test]
    fn test_string_content_is_single_text_block() {
        let msg: VendorMessage =
            serde_json::from_value(json!({"role": "user", "content": "hello"})).unwrap();
        assert_eq!(msg.content, vec![VendorBlock::text("hello")]);
    }

    #[test]
    fn test_unknown_block_type_deserializes_to_marker() {
        let msg: VendorMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": [{"type": "thinking", "thinking": "hmm"}]
        }))
        .unwrap();
        assert_eq!(msg.content, vec![VendorBlock::Unknown]);
    }

    #[test]
    fn test_tool_result_string_content() {
        let block: VendorBlock = serde_json::from_value(json!({
            "type": "tool_result",
            "tool_use_id": "toolu_1",
            "content": "done"
        }))
        .unwrap();
        assert_eq!(
            block,
            VendorBlock::ToolResult {
                tool_use_id: "toolu_1".to_string(),
                content: ToolResultContent::Text("done".to_string()),
                is_error: false,
            }
        );
    }

    #[test]
    fn test_response_parses() {
        let response: VendorResponse = serde_json::from_value(json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "Taking a screenshot"},
                {"type": "tool_use", "id": "toolu_1", "name": "computer", "input": {"action": "screenshot"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();
        assert_eq!(response.content.len(), 2);
        assert_eq!(response.stop_reason.as_deref(), Some("tool_use"));
    }
}

//! Message translation between the vendor and generic schemas
//!
//! Both directions go through the neutral [`Message`] list: the vendor codec and the
//! generic codec each map their wire format to and from it, and the public
//! `to_*_format` functions compose a decode with an encode.
//!
//! Canonical generic form, as produced by [`encode_generic`]:
//! - user content is always a part list
//! - assistant text is a plain string (a part list when there are several texts)
//!   followed by `tool_calls`
//! - each tool result is its own `tool` message; error results carry [`ERROR_MARKER`]

use super::error::{TranslationError, TranslationWarning, Translated};
use super::generic::{
    self, ContentPart, GenericContent, GenericMessage, GenericResponse, GenericRole,
    GenericToolCall,
};
use super::message::{ContentBlock, Message, Role};
use super::vendor::{
    self, ImageSource, ToolResultContent, VendorBlock, VendorMessage, VendorResponse, VendorRole,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Prefix marking an error tool result in schemas without an error flag
pub const ERROR_MARKER: &str = "[tool error] ";

/// Stateless translator between the two conversation schemas
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageTranslator;

impl MessageTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Converts generic-format messages into vendor format
    pub fn to_vendor_format(
        &self,
        messages: &[GenericMessage],
    ) -> Result<Translated<Vec<VendorMessage>>, TranslationError> {
        let neutral = decode_generic(messages)?;
        let encoded = encode_vendor(&neutral.value)?;
        Ok(Translated::new(
            encoded.value,
            concat(neutral.warnings, encoded.warnings),
        ))
    }

    /// Converts vendor-format messages into generic format
    pub fn to_generic_format(
        &self,
        messages: &[VendorMessage],
    ) -> Result<Translated<Vec<GenericMessage>>, TranslationError> {
        let neutral = decode_vendor(messages)?;
        let encoded = encode_generic(&neutral.value)?;
        Ok(Translated::new(
            encoded.value,
            concat(neutral.warnings, encoded.warnings),
        ))
    }
}

/// Parses raw JSON that claims to be a vendor message list
///
/// Generic-only roles are rejected here; generic-only block types surface later as
/// [`TranslationError::UnknownVendorBlock`].
pub fn parse_vendor_messages(
    value: serde_json::Value,
) -> Result<Vec<VendorMessage>, TranslationError> {
    serde_json::from_value(value).map_err(|e| TranslationError::NotVendorFormat {
        reason: e.to_string(),
    })
}

fn concat(
    mut first: Vec<TranslationWarning>,
    second: Vec<TranslationWarning>,
) -> Vec<TranslationWarning> {
    first.extend(second);
    first
}

struct WarningSink {
    warnings: Vec<TranslationWarning>,
}

impl WarningSink {
    fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Records the warning and returns the placeholder text
    fn omit_image(&mut self, message_index: usize, reason: String) -> String {
        warn!(message_index, %reason, "Image omitted during translation");
        let placeholder = format!("[image omitted: {}]", reason);
        self.warnings.push(TranslationWarning {
            message_index,
            detail: format!("image omitted: {}", reason),
        });
        placeholder
    }
}

fn misplaced(message_index: usize, role: Role, block: &ContentBlock) -> TranslationError {
    TranslationError::MisplacedBlock {
        message_index,
        role: role.as_str(),
        block: block.tag(),
    }
}

fn check_known_call(seen: &HashSet<String>, call_id: &str) -> Result<(), TranslationError> {
    if seen.contains(call_id) {
        Ok(())
    } else {
        Err(TranslationError::OrphanToolResult {
            call_id: call_id.to_string(),
        })
    }
}

/// Builds a vendor `tool_use` block from call parts
pub fn vendor_tool_use(id: &str, name: &str, arguments: &serde_json::Value) -> VendorBlock {
    VendorBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input: arguments.clone(),
    }
}

/// Builds a generic function call from call parts
pub fn generic_tool_call(
    id: &str,
    name: &str,
    arguments: &serde_json::Value,
) -> Result<GenericToolCall, TranslationError> {
    let encoded =
        serde_json::to_string(arguments).map_err(|e| TranslationError::MalformedArguments {
            call_id: id.to_string(),
            reason: e.to_string(),
        })?;
    Ok(GenericToolCall::function(id, name, encoded))
}

/// Parses the arguments of a generic function call without reinterpreting values
pub fn parse_generic_arguments(call: &GenericToolCall) -> Result<serde_json::Value, TranslationError> {
    let raw = call.function.arguments.trim();
    if raw.is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw).map_err(|e| TranslationError::MalformedArguments {
        call_id: call.id.clone(),
        reason: e.to_string(),
    })
}

/// Encodes an error or plain tool output for a schema without an error flag
pub fn mark_error_output(output: &str, is_error: bool) -> String {
    if is_error {
        format!("{}{}", ERROR_MARKER, output)
    } else {
        output.to_string()
    }
}

/// Reverses [`mark_error_output`]
pub fn unmark_error_output(text: &str) -> (String, bool) {
    match text.strip_prefix(ERROR_MARKER) {
        Some(rest) => (rest.to_string(), true),
        None => (text.to_string(), false),
    }
}

// ---------------------------------------------------------------------------
// Vendor codec
// ---------------------------------------------------------------------------

/// Encodes neutral messages into vendor format
pub fn encode_vendor(
    messages: &[Message],
) -> Result<Translated<Vec<VendorMessage>>, TranslationError> {
    let mut sink = WarningSink::new();
    let mut seen_calls = HashSet::new();
    let mut out = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        let role = match message.role {
            Role::User | Role::Tool => VendorRole::User,
            Role::Assistant => VendorRole::Assistant,
        };

        let mut blocks = Vec::with_capacity(message.content.len());
        for block in &message.content {
            let encoded = match (message.role, block) {
                (Role::User | Role::Assistant, ContentBlock::Text { value }) => {
                    VendorBlock::text(value.clone())
                }
                (Role::User, ContentBlock::Image { media_type, data }) => {
                    if vendor::SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str()) {
                        VendorBlock::base64_image(media_type.clone(), data.clone())
                    } else {
                        VendorBlock::text(
                            sink.omit_image(index, format!("unsupported media type {}", media_type)),
                        )
                    }
                }
                (
                    Role::Assistant,
                    ContentBlock::ToolCall {
                        id,
                        name,
                        arguments,
                    },
                ) => {
                    seen_calls.insert(id.clone());
                    vendor_tool_use(id, name, arguments)
                }
                (
                    Role::Tool,
                    ContentBlock::ToolResult {
                        call_id,
                        output,
                        is_error,
                    },
                ) => {
                    check_known_call(&seen_calls, call_id)?;
                    let content = if output.is_empty() {
                        Vec::new()
                    } else {
                        vec![VendorBlock::text(output.clone())]
                    };
                    VendorBlock::ToolResult {
                        tool_use_id: call_id.clone(),
                        content: ToolResultContent::Blocks(content),
                        is_error: *is_error,
                    }
                }
                (role, other) => return Err(misplaced(index, role, other)),
            };
            blocks.push(encoded);
        }

        out.push(VendorMessage::new(role, blocks));
    }

    debug!(messages = out.len(), "Encoded vendor messages");
    Ok(Translated::new(out, sink.warnings))
}

/// Decodes vendor messages into the neutral model
///
/// A user message is split into runs: consecutive `tool_result` blocks form one
/// `Tool` message, everything else forms `User` messages, in original order.
/// Images nested in a tool result are lifted into the user message that follows it.
pub fn decode_vendor(
    messages: &[VendorMessage],
) -> Result<Translated<Vec<Message>>, TranslationError> {
    let mut sink = WarningSink::new();
    let mut out = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        match message.role {
            VendorRole::Assistant => {
                let mut blocks = Vec::with_capacity(message.content.len());
                for block in &message.content {
                    let decoded = match block {
                        VendorBlock::Text { text } => ContentBlock::text(text.clone()),
                        VendorBlock::ToolUse { id, name, input } => {
                            ContentBlock::tool_call(id.clone(), name.clone(), input.clone())
                        }
                        VendorBlock::Image { .. } => {
                            return Err(TranslationError::MisplacedBlock {
                                message_index: index,
                                role: "assistant",
                                block: "image",
                            })
                        }
                        VendorBlock::ToolResult { .. } => {
                            return Err(TranslationError::MisplacedBlock {
                                message_index: index,
                                role: "assistant",
                                block: "tool_result",
                            })
                        }
                        VendorBlock::Unknown => {
                            return Err(TranslationError::UnknownVendorBlock {
                                message_index: index,
                            })
                        }
                    };
                    blocks.push(decoded);
                }
                out.push(Message::new(Role::Assistant, blocks));
            }
            VendorRole::User => decode_vendor_user(index, message, &mut sink, &mut out)?,
        }
    }

    Ok(Translated::new(out, sink.warnings))
}

fn decode_vendor_user(
    index: usize,
    message: &VendorMessage,
    sink: &mut WarningSink,
    out: &mut Vec<Message>,
) -> Result<(), TranslationError> {
    let mut user_run: Vec<ContentBlock> = Vec::new();
    let mut tool_run: Vec<ContentBlock> = Vec::new();
    let mut lifted: Vec<ContentBlock> = Vec::new();

    fn flush_tool(
        tool_run: &mut Vec<ContentBlock>,
        lifted: &mut Vec<ContentBlock>,
        user_run: &mut Vec<ContentBlock>,
        out: &mut Vec<Message>,
    ) {
        if !tool_run.is_empty() {
            out.push(Message::tool_results(std::mem::take(tool_run)));
            user_run.append(lifted);
        }
    }

    if message.content.is_empty() {
        out.push(Message::new(Role::User, Vec::new()));
        return Ok(());
    }

    for block in &message.content {
        match block {
            VendorBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                if !user_run.is_empty() {
                    out.push(Message::new(Role::User, std::mem::take(&mut user_run)));
                }
                let output = match content {
                    ToolResultContent::Text(text) => text.clone(),
                    ToolResultContent::Blocks(parts) => {
                        let mut texts = Vec::new();
                        for part in parts {
                            match part {
                                VendorBlock::Text { text } => texts.push(text.clone()),
                                VendorBlock::Image { source } => {
                                    debug!(message_index = index, "Lifting tool result image");
                                    lifted.push(decode_vendor_image(index, source, sink));
                                }
                                VendorBlock::Unknown
                                | VendorBlock::ToolUse { .. }
                                | VendorBlock::ToolResult { .. } => {
                                    return Err(TranslationError::UnknownVendorBlock {
                                        message_index: index,
                                    })
                                }
                            }
                        }
                        texts.join("\n")
                    }
                };
                tool_run.push(ContentBlock::tool_result(
                    tool_use_id.clone(),
                    output,
                    *is_error,
                ));
            }
            VendorBlock::Text { text } => {
                flush_tool(&mut tool_run, &mut lifted, &mut user_run, out);
                user_run.push(ContentBlock::text(text.clone()));
            }
            VendorBlock::Image { source } => {
                flush_tool(&mut tool_run, &mut lifted, &mut user_run, out);
                user_run.push(decode_vendor_image(index, source, sink));
            }
            VendorBlock::ToolUse { .. } => {
                return Err(TranslationError::MisplacedBlock {
                    message_index: index,
                    role: "user",
                    block: "tool_use",
                })
            }
            VendorBlock::Unknown => {
                return Err(TranslationError::UnknownVendorBlock {
                    message_index: index,
                })
            }
        }
    }

    flush_tool(&mut tool_run, &mut lifted, &mut user_run, out);
    if !user_run.is_empty() {
        out.push(Message::new(Role::User, user_run));
    }
    Ok(())
}

fn decode_vendor_image(index: usize, source: &ImageSource, sink: &mut WarningSink) -> ContentBlock {
    match source {
        ImageSource::Base64 { media_type, data } => ContentBlock::image(media_type.clone(), data.clone()),
        ImageSource::Url { url } => ContentBlock::text(
            sink.omit_image(index, format!("remote image {} is not inline", url)),
        ),
    }
}

/// Decodes a vendor response into an assistant message
pub fn decode_vendor_response(
    response: &VendorResponse,
) -> Result<Translated<Message>, TranslationError> {
    let message = VendorMessage::new(VendorRole::Assistant, response.content.clone());
    let decoded = decode_vendor(std::slice::from_ref(&message))?;
    Ok(decoded.map(|mut messages| {
        messages
            .pop()
            .unwrap_or_else(|| Message::new(Role::Assistant, Vec::new()))
    }))
}

// ---------------------------------------------------------------------------
// Generic codec
// ---------------------------------------------------------------------------

/// Encodes neutral messages into canonical generic format
pub fn encode_generic(
    messages: &[Message],
) -> Result<Translated<Vec<GenericMessage>>, TranslationError> {
    let mut sink = WarningSink::new();
    let mut seen_calls = HashSet::new();
    let mut out = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        match message.role {
            Role::User => {
                let mut parts = Vec::with_capacity(message.content.len());
                for block in &message.content {
                    match block {
                        ContentBlock::Text { value } => parts.push(ContentPart::text(value.clone())),
                        ContentBlock::Image { media_type, data } => {
                            if generic::SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str()) {
                                parts.push(ContentPart::data_image(media_type, data));
                            } else {
                                parts.push(ContentPart::text(sink.omit_image(
                                    index,
                                    format!("unsupported media type {}", media_type),
                                )));
                            }
                        }
                        other => return Err(misplaced(index, Role::User, other)),
                    }
                }
                out.push(GenericMessage::user(GenericContent::Parts(parts)));
            }
            Role::Assistant => {
                let mut texts = Vec::new();
                let mut calls = Vec::new();
                for block in &message.content {
                    match block {
                        ContentBlock::Text { value } => texts.push(value.clone()),
                        ContentBlock::ToolCall {
                            id,
                            name,
                            arguments,
                        } => {
                            seen_calls.insert(id.clone());
                            calls.push(generic_tool_call(id, name, arguments)?);
                        }
                        other => return Err(misplaced(index, Role::Assistant, other)),
                    }
                }
                let content = match texts.len() {
                    0 => None,
                    1 => texts.pop().map(GenericContent::Text),
                    _ => Some(GenericContent::Parts(
                        texts.into_iter().map(ContentPart::text).collect(),
                    )),
                };
                out.push(GenericMessage::assistant(content, calls));
            }
            Role::Tool => {
                for block in &message.content {
                    match block {
                        ContentBlock::ToolResult {
                            call_id,
                            output,
                            is_error,
                        } => {
                            check_known_call(&seen_calls, call_id)?;
                            out.push(GenericMessage::tool(
                                call_id.clone(),
                                mark_error_output(output, *is_error),
                            ));
                        }
                        other => return Err(misplaced(index, Role::Tool, other)),
                    }
                }
            }
        }
    }

    debug!(messages = out.len(), "Encoded generic messages");
    Ok(Translated::new(out, sink.warnings))
}

/// Decodes generic messages into the neutral model
///
/// Consecutive `tool` messages collapse into a single `Tool` message.
pub fn decode_generic(
    messages: &[GenericMessage],
) -> Result<Translated<Vec<Message>>, TranslationError> {
    let mut sink = WarningSink::new();
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        match message.role {
            GenericRole::System => {
                return Err(TranslationError::UnexpectedSystemMessage {
                    message_index: index,
                })
            }
            GenericRole::User => {
                if !message.tool_calls.is_empty() {
                    return Err(TranslationError::MisplacedBlock {
                        message_index: index,
                        role: "user",
                        block: "tool_call",
                    });
                }
                let blocks = decode_generic_content(index, message.content.as_ref(), true, &mut sink)?;
                out.push(Message::new(Role::User, blocks));
            }
            GenericRole::Assistant => {
                let mut blocks =
                    decode_generic_content(index, message.content.as_ref(), false, &mut sink)?;
                for call in &message.tool_calls {
                    let arguments = parse_generic_arguments(call)?;
                    blocks.push(ContentBlock::tool_call(
                        call.id.clone(),
                        call.function.name.clone(),
                        arguments,
                    ));
                }
                out.push(Message::new(Role::Assistant, blocks));
            }
            GenericRole::Tool => {
                let call_id = message
                    .tool_call_id
                    .clone()
                    .ok_or(TranslationError::MissingToolCallId {
                        message_index: index,
                    })?;
                let text = match &message.content {
                    None => String::new(),
                    Some(GenericContent::Text(text)) => text.clone(),
                    Some(GenericContent::Parts(parts)) => {
                        let mut texts = Vec::with_capacity(parts.len());
                        for part in parts {
                            match part {
                                ContentPart::Text { text } => texts.push(text.as_str()),
                                _ => {
                                    return Err(TranslationError::UnknownGenericPart {
                                        message_index: index,
                                    })
                                }
                            }
                        }
                        texts.join("\n")
                    }
                };
                let (output, is_error) = unmark_error_output(&text);
                let result = ContentBlock::tool_result(call_id, output, is_error);

                match out.last_mut() {
                    Some(last) if last.role == Role::Tool => last.content.push(result),
                    _ => out.push(Message::tool_results(vec![result])),
                }
            }
        }
    }

    Ok(Translated::new(out, sink.warnings))
}

fn decode_generic_content(
    index: usize,
    content: Option<&GenericContent>,
    allow_images: bool,
    sink: &mut WarningSink,
) -> Result<Vec<ContentBlock>, TranslationError> {
    let parts = match content {
        None => return Ok(Vec::new()),
        Some(GenericContent::Text(text)) => return Ok(vec![ContentBlock::text(text.clone())]),
        Some(GenericContent::Parts(parts)) => parts,
    };

    let mut blocks = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            ContentPart::Text { text } => blocks.push(ContentBlock::text(text.clone())),
            ContentPart::ImageUrl { image_url } => {
                if !allow_images {
                    return Err(TranslationError::MisplacedBlock {
                        message_index: index,
                        role: "assistant",
                        block: "image",
                    });
                }
                match generic::parse_data_uri(&image_url.url) {
                    Some((media_type, data)) => blocks.push(ContentBlock::image(media_type, data)),
                    None => blocks.push(ContentBlock::text(sink.omit_image(
                        index,
                        format!("image url {} is not an inline data URI", image_url.url),
                    ))),
                }
            }
            ContentPart::Unknown => {
                return Err(TranslationError::UnknownGenericPart {
                    message_index: index,
                })
            }
        }
    }
    Ok(blocks)
}

/// Decodes the first choice of a generic response into an assistant message
pub fn decode_generic_response(
    response: &GenericResponse,
) -> Result<Translated<Message>, TranslationError> {
    let choice = response
        .choices
        .first()
        .ok_or(TranslationError::EmptyResponse)?;
    let mut message = choice.message.clone();
    message.role = GenericRole::Assistant;
    let decoded = decode_generic(std::slice::from_ref(&message))?;
    Ok(decoded.map(|mut messages| {
        messages
            .pop()
            .unwrap_or_else(|| Message::new(Role::Assistant, Vec::new()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::generic::ImageUrl;
    use serde_json::json;

    fn screenshot_call(id: &str) -> ContentBlock {
        ContentBlock::tool_call(id, "computer", json!({"action": "screenshot"}))
    }

    fn sample_conversation() -> Vec<Message> {
        vec![
            Message::new(
                Role::User,
                vec![
                    ContentBlock::text("Open the browser"),
                    ContentBlock::image("image/png", "AAAA"),
                ],
            ),
            Message::new(
                Role::Assistant,
                vec![
                    ContentBlock::text("Clicking the icon"),
                    ContentBlock::tool_call(
                        "call_1",
                        "computer",
                        json!({"action": "left_click", "coordinate": [512, 300]}),
                    ),
                ],
            ),
            Message::tool_results(vec![ContentBlock::tool_result("call_1", "clicked", false)]),
            Message::new(Role::User, vec![ContentBlock::image("image/png", "BBBB")]),
            Message::new(Role::Assistant, vec![screenshot_call("call_2")]),
            Message::tool_results(vec![ContentBlock::tool_result(
                "call_2",
                "display unavailable",
                true,
            )]),
            Message::assistant_text("Done"),
        ]
    }

    #[test]
    fn test_generic_round_trip_through_vendor() {
        let translator = MessageTranslator::new();
        let generic = encode_generic(&sample_conversation()).unwrap().value;

        let vendor = translator.to_vendor_format(&generic).unwrap();
        assert!(vendor.warnings.is_empty());
        let back = translator.to_generic_format(&vendor.value).unwrap();

        assert_eq!(back.value, generic);
    }

    #[test]
    fn test_neutral_round_trip_through_both_codecs() {
        let original = sample_conversation();

        let via_vendor = decode_vendor(&encode_vendor(&original).unwrap().value).unwrap();
        assert_eq!(via_vendor.value, original);

        let via_generic = decode_generic(&encode_generic(&original).unwrap().value).unwrap();
        assert_eq!(via_generic.value, original);
    }

    #[test]
    fn test_vendor_text_and_image_scenario() {
        let translator = MessageTranslator::new();
        let vendor = vec![VendorMessage::new(
            VendorRole::User,
            vec![
                VendorBlock::text("What do you see?"),
                VendorBlock::base64_image("image/png", "AAAA"),
            ],
        )];

        let generic = translator.to_generic_format(&vendor).unwrap().value;
        assert_eq!(generic.len(), 1);
        match &generic[0].content {
            Some(GenericContent::Parts(parts)) => {
                assert_eq!(parts[0], ContentPart::text("What do you see?"));
                match &parts[1] {
                    ContentPart::ImageUrl { image_url } => {
                        assert!(image_url.url.starts_with("data:image/png;base64,"));
                        assert!(image_url.url.contains("AAAA"));
                    }
                    other => panic!("expected image part, got {:?}", other),
                }
            }
            other => panic!("expected parts, got {:?}", other),
        }

        let back = translator.to_vendor_format(&generic).unwrap().value;
        assert_eq!(back, vendor);
    }

    #[test]
    fn test_unsupported_media_type_degrades_to_text() {
        let messages = vec![Message::new(
            Role::User,
            vec![ContentBlock::image("image/bmp", "Qk0=")],
        )];

        let vendor = encode_vendor(&messages).unwrap();
        assert_eq!(vendor.warnings.len(), 1);
        match &vendor.value[0].content[0] {
            VendorBlock::Text { text } => assert!(text.contains("image omitted")),
            other => panic!("expected text placeholder, got {:?}", other),
        }

        let generic = encode_generic(&messages).unwrap();
        assert_eq!(generic.warnings.len(), 1);
    }

    #[test]
    fn test_remote_image_url_degrades_to_text() {
        let generic = vec![GenericMessage::user(GenericContent::Parts(vec![
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "https://example.com/screen.png".to_string(),
                    detail: None,
                },
            },
        ]))];

        let decoded = decode_generic(&generic).unwrap();
        assert_eq!(decoded.warnings.len(), 1);
        assert!(matches!(decoded.value[0].content[0], ContentBlock::Text { .. }));
    }

    #[test]
    fn test_multi_part_tool_output_joined_like_vendor() {
        let mut tool = GenericMessage::tool("c", "");
        tool.content = Some(GenericContent::Parts(vec![
            ContentPart::text("clicked"),
            ContentPart::text("window opened"),
        ]));
        let generic = vec![
            GenericMessage::assistant(
                None,
                vec![GenericToolCall::function(
                    "c",
                    "computer",
                    "{\"action\":\"screenshot\"}".into(),
                )],
            ),
            tool,
        ];

        let decoded = decode_generic(&generic).unwrap().value;
        assert_eq!(
            decoded[1].content,
            vec![ContentBlock::tool_result("c", "clicked\nwindow opened", false)]
        );

        let vendor = encode_vendor(&decoded).unwrap().value;
        assert_eq!(decode_vendor(&vendor).unwrap().value, decoded);
    }

    #[test]
    fn test_unknown_vendor_block_is_hard_error() {
        let vendor = vec![VendorMessage::new(
            VendorRole::Assistant,
            vec![VendorBlock::text("hi"), VendorBlock::Unknown],
        )];
        let err = MessageTranslator::new().to_generic_format(&vendor).unwrap_err();
        assert_eq!(err, TranslationError::UnknownVendorBlock { message_index: 0 });
    }

    #[test]
    fn test_unknown_generic_part_is_hard_error() {
        let generic = vec![GenericMessage::user(GenericContent::Parts(vec![
            ContentPart::Unknown,
        ]))];
        let err = MessageTranslator::new().to_vendor_format(&generic).unwrap_err();
        assert_eq!(err, TranslationError::UnknownGenericPart { message_index: 0 });
    }

    #[test]
    fn test_error_result_uses_marker_in_generic() {
        let messages = vec![
            Message::new(Role::Assistant, vec![screenshot_call("call_9")]),
            Message::tool_results(vec![ContentBlock::tool_result("call_9", "boom", true)]),
        ];
        let generic = encode_generic(&messages).unwrap().value;
        assert_eq!(
            generic[1].content,
            Some(GenericContent::Text(format!("{}boom", ERROR_MARKER)))
        );

        let vendor = encode_vendor(&messages).unwrap().value;
        match &vendor[1].content[0] {
            VendorBlock::ToolResult { is_error, .. } => assert!(*is_error),
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[test]
    fn test_orphan_tool_result_rejected() {
        let messages = vec![Message::tool_results(vec![ContentBlock::tool_result(
            "missing", "ok", false,
        )])];
        assert_eq!(
            encode_vendor(&messages).unwrap_err(),
            TranslationError::OrphanToolResult {
                call_id: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_mixed_vendor_user_message_splits_into_runs() {
        let vendor = vec![
            VendorMessage::new(
                VendorRole::Assistant,
                vec![vendor_tool_use("toolu_1", "computer", &json!({"action": "screenshot"}))],
            ),
            VendorMessage::new(
                VendorRole::User,
                vec![
                    VendorBlock::ToolResult {
                        tool_use_id: "toolu_1".to_string(),
                        content: ToolResultContent::Blocks(vec![
                            VendorBlock::text("took screenshot"),
                            VendorBlock::base64_image("image/png", "CCCC"),
                        ]),
                        is_error: false,
                    },
                    VendorBlock::text("Continue"),
                ],
            ),
        ];

        let decoded = decode_vendor(&vendor).unwrap().value;
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[1].role, Role::Tool);
        assert_eq!(
            decoded[2].content,
            vec![
                ContentBlock::image("image/png", "CCCC"),
                ContentBlock::text("Continue"),
            ]
        );
    }

    #[test]
    fn test_consecutive_generic_tool_messages_collapse() {
        let generic = vec![
            GenericMessage::assistant(
                None,
                vec![
                    GenericToolCall::function("a", "computer", r#"{"action":"screenshot"}"#.into()),
                    GenericToolCall::function("b", "computer", r#"{"action":"cursor_position"}"#.into()),
                ],
            ),
            GenericMessage::tool("a", "ok"),
            GenericMessage::tool("b", "at 1,1"),
        ];
        let decoded = decode_generic(&generic).unwrap().value;
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].content.len(), 2);

        let vendor = encode_vendor(&decoded).unwrap().value;
        assert_eq!(vendor.len(), 2);
        assert_eq!(vendor[1].content.len(), 2);
    }

    #[test]
    fn test_system_message_rejected() {
        let generic = vec![GenericMessage::system("be helpful")];
        assert_eq!(
            decode_generic(&generic).unwrap_err(),
            TranslationError::UnexpectedSystemMessage { message_index: 0 }
        );
    }

    #[test]
    fn test_malformed_arguments_rejected() {
        let generic = vec![GenericMessage::assistant(
            None,
            vec![GenericToolCall::function("c", "computer", "{not json".into())],
        )];
        assert!(matches!(
            decode_generic(&generic),
            Err(TranslationError::MalformedArguments { .. })
        ));
    }

    #[test]
    fn test_generic_idempotence_on_canonical_form() {
        let generic = encode_generic(&sample_conversation()).unwrap().value;
        let again = encode_generic(&decode_generic(&generic).unwrap().value)
            .unwrap()
            .value;
        assert_eq!(again, generic);
    }

    #[test]
    fn test_generic_payload_rejected_by_vendor_parser() {
        let generic_json = json!([{"role": "tool", "tool_call_id": "a", "content": "ok"}]);
        assert!(matches!(
            parse_vendor_messages(generic_json),
            Err(TranslationError::NotVendorFormat { .. })
        ));

        let image_url_json = json!([{
            "role": "user",
            "content": [{"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}]
        }]);
        let parsed = parse_vendor_messages(image_url_json).unwrap();
        assert_eq!(
            MessageTranslator::new().to_generic_format(&parsed).unwrap_err(),
            TranslationError::UnknownVendorBlock { message_index: 0 }
        );
    }

    #[test]
    fn test_decode_generic_response_takes_first_choice() {
        let response: GenericResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Let me look",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "computer", "arguments": "{\"action\":\"screenshot\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let message = decode_generic_response(&response).unwrap().value;
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), "Let me look");
        assert!(message.has_tool_calls());
    }

    #[test]
    fn test_empty_generic_response_is_error() {
        let response = GenericResponse {
            id: String::new(),
            choices: Vec::new(),
            usage: None,
        };
        assert_eq!(
            decode_generic_response(&response).unwrap_err(),
            TranslationError::EmptyResponse
        );
    }
}

//! Plain-text tool calls for models without native function calling
//!
//! Such models are told to write `computer.<action>(...)` in their reply; this
//! module turns those snippets into regular tool call blocks.

use super::message::{ContentBlock, Message, Role};
use super::tool_schema::{ComputerAction, ComputerToolVersion, COMPUTER_TOOL_NAME};
use super::translate::mark_error_output;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, error};
use uuid::Uuid;

/// Prefix of a tool result folded into user text
pub const TOOL_RESULT_PREFIX: &str = "Tool result: ";

fn call_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| match Regex::new(r"computer\.(\w+)\(([^)]*)\)") {
            Ok(re) => Some(re),
            Err(e) => {
                error!("Failed to compile textual tool call pattern: {}", e);
                None
            }
        })
        .as_ref()
}

/// System prompt section describing the textual call syntax
pub fn textual_tool_instructions(version: ComputerToolVersion) -> String {
    let actions: Vec<&str> = version.actions().iter().map(ComputerAction::as_str).collect();
    format!(
        "<TOOL_SYNTAX>\n\
         * You cannot call functions natively. To act, write one call per line as \
         computer.<action>(<arguments>).\n\
         * Available actions: {}.\n\
         * Mouse actions take integer pixel coordinates: computer.left_click(512, 300).\n\
         * Typing and keys take a quoted string: computer.type(\"hello\"), computer.key(\"Return\").\n\
         * Stop writing calls once the task is complete.\n\
         </TOOL_SYNTAX>",
        actions.join(", ")
    )
}

/// Extracts `computer.<action>(...)` calls from model text
///
/// Unknown actions are kept as written; argument validation happens when the
/// call is executed so the model sees the error.
pub fn parse_textual_tool_calls(text: &str) -> Vec<ContentBlock> {
    let Some(pattern) = call_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(text)
        .map(|caps| {
            let action = &caps[1];
            let params = caps[2].trim();
            let arguments = textual_arguments(action, params);
            let id = format!("call_{}", Uuid::new_v4().simple());
            debug!(%id, action, "Parsed textual tool call");
            ContentBlock::tool_call(id, COMPUTER_TOOL_NAME, arguments)
        })
        .collect()
}

fn textual_arguments(action: &str, params: &str) -> Value {
    if params.is_empty() {
        return json!({ "action": action });
    }

    if let Some((x, y)) = params.split_once(',') {
        if let (Ok(x), Ok(y)) = (x.trim().parse::<i64>(), y.trim().parse::<i64>()) {
            return json!({ "action": action, "coordinate": [x, y] });
        }
    }

    let quoted = params
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .or_else(|| params.strip_prefix('\'').and_then(|p| p.strip_suffix('\'')));
    match quoted {
        Some(text) => json!({ "action": action, "text": text }),
        None => json!({ "action": action }),
    }
}

/// Writes tool call arguments back in `computer.<action>(...)` form
pub fn render_textual_call(arguments: &Value) -> String {
    let action = arguments
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let coordinate = arguments
        .get("coordinate")
        .and_then(Value::as_array)
        .and_then(|pair| match pair.as_slice() {
            [x, y] => Some((x.as_i64()?, y.as_i64()?)),
            _ => None,
        });
    if let Some((x, y)) = coordinate {
        return format!("computer.{}({}, {})", action, x, y);
    }
    match arguments.get("text").and_then(Value::as_str) {
        Some(text) => format!("computer.{}(\"{}\")", action, text),
        None => format!("computer.{}()", action),
    }
}

/// Rewrites tool calls and results as plain text for backends without function calling
///
/// Calls already present in the assistant text are not written twice. Each tool
/// message becomes a user message with one `Tool result:` line per result, and
/// error results keep the error marker.
pub fn fold_tool_history(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|message| match message.role {
            Role::User => message.clone(),
            Role::Assistant => fold_assistant(message),
            Role::Tool => fold_tool_results(message),
        })
        .collect()
}

fn fold_assistant(message: &Message) -> Message {
    if !message.has_tool_calls() {
        return message.clone();
    }
    let written_in_text = !parse_textual_tool_calls(&message.text()).is_empty();
    let content = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolCall { arguments, .. } if !written_in_text => {
                Some(ContentBlock::text(render_textual_call(arguments)))
            }
            ContentBlock::ToolCall { .. } => None,
            other => Some(other.clone()),
        })
        .collect();
    Message::new(Role::Assistant, content)
}

fn fold_tool_results(message: &Message) -> Message {
    let lines: Vec<String> = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult {
                output, is_error, ..
            } => Some(format!(
                "{}{}",
                TOOL_RESULT_PREFIX,
                mark_error_output(output, *is_error)
            )),
            _ => None,
        })
        .collect();
    Message::user_text(lines.join("\n"))
}

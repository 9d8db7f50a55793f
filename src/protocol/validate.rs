//! Tool call / tool result pairing rules

use super::message::{ContentBlock, Message, Role};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("tool call id '{0}' appears twice in one message")]
    DuplicateCallId(String),

    #[error("tool call '{0}' was not answered before the next turn")]
    UnansweredCall(String),

    #[error("tool result '{0}' does not answer a pending tool call")]
    UnexpectedResult(String),

    #[error("{role} message may not contain {block} blocks")]
    MisplacedBlock {
        role: &'static str,
        block: &'static str,
    },
}

/// Incrementally checks that every tool call is answered exactly once
#[derive(Debug, Default, Clone)]
pub struct PairingTracker {
    pending: Vec<String>,
}

impl PairingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls still waiting for a result
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn observe(&mut self, message: &Message) -> Result<(), ProtocolViolation> {
        match message.role {
            Role::Tool => {
                for block in &message.content {
                    match block {
                        ContentBlock::ToolResult { call_id, .. } => {
                            let position = self
                                .pending
                                .iter()
                                .position(|id| id == call_id)
                                .ok_or_else(|| ProtocolViolation::UnexpectedResult(call_id.clone()))?;
                            self.pending.remove(position);
                        }
                        other => {
                            return Err(ProtocolViolation::MisplacedBlock {
                                role: "tool",
                                block: other.tag(),
                            })
                        }
                    }
                }
                Ok(())
            }
            Role::User | Role::Assistant => {
                if let Some(id) = self.pending.first() {
                    return Err(ProtocolViolation::UnansweredCall(id.clone()));
                }
                if message.role == Role::Assistant {
                    let mut seen = HashSet::new();
                    let mut calls = Vec::new();
                    for (id, _, _) in message.tool_calls() {
                        if !seen.insert(id) {
                            return Err(ProtocolViolation::DuplicateCallId(id.to_string()));
                        }
                        calls.push(id.to_string());
                    }
                    self.pending = calls;
                } else if let Some(block) = message
                    .content
                    .iter()
                    .find(|b| matches!(b, ContentBlock::ToolCall { .. } | ContentBlock::ToolResult { .. }))
                {
                    return Err(ProtocolViolation::MisplacedBlock {
                        role: "user",
                        block: block.tag(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Validates a complete message list; trailing unanswered calls are allowed
pub fn check_tool_pairing(messages: &[Message]) -> Result<(), ProtocolViolation> {
    let mut tracker = PairingTracker::new();
    for message in messages {
        tracker.observe(message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ContentBlock {
        ContentBlock::tool_call(id, "computer", json!({"action": "screenshot"}))
    }

    #[test]
    fn test_valid_pairing() {
        let messages = vec![
            Message::user_text("go"),
            Message::new(Role::Assistant, vec![call("a"), call("b")]),
            Message::tool_results(vec![
                ContentBlock::tool_result("b", "ok", false),
                ContentBlock::tool_result("a", "ok", false),
            ]),
            Message::user_text("next"),
        ];
        assert!(check_tool_pairing(&messages).is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let messages = vec![Message::new(Role::Assistant, vec![call("a"), call("a")])];
        assert_eq!(
            check_tool_pairing(&messages),
            Err(ProtocolViolation::DuplicateCallId("a".to_string()))
        );
    }

    #[test]
    fn test_unanswered_call_rejected_at_next_turn() {
        let messages = vec![
            Message::new(Role::Assistant, vec![call("a")]),
            Message::user_text("hello?"),
        ];
        assert_eq!(
            check_tool_pairing(&messages),
            Err(ProtocolViolation::UnansweredCall("a".to_string()))
        );
    }

    #[test]
    fn test_double_answer_rejected() {
        let messages = vec![
            Message::new(Role::Assistant, vec![call("a")]),
            Message::tool_results(vec![ContentBlock::tool_result("a", "ok", false)]),
            Message::tool_results(vec![ContentBlock::tool_result("a", "again", false)]),
        ];
        assert_eq!(
            check_tool_pairing(&messages),
            Err(ProtocolViolation::UnexpectedResult("a".to_string()))
        );
    }

    #[test]
    fn test_trailing_pending_call_allowed() {
        let mut tracker = PairingTracker::new();
        tracker
            .observe(&Message::new(Role::Assistant, vec![call("z")]))
            .unwrap();
        assert_eq!(tracker.pending(), &["z".to_string()]);
    }
}

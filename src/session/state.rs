use super::error::SessionError;
use crate::protocol::{Message, PairingTracker};
use crate::provider::{CapabilitySet, ProviderConfig, ProviderKind, Selection};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    TurnLimit,
    Cancelled,
    DeadlineExceeded,
    Fatal(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::TurnLimit => write!(f, "turn limit reached"),
            AbortReason::Cancelled => write!(f, "cancelled"),
            AbortReason::DeadlineExceeded => write!(f, "deadline exceeded"),
            AbortReason::Fatal(message) => write!(f, "fatal error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingObservation,
    AwaitingProviderResponse,
    ExecutingTool,
    Completed,
    Aborted(AbortReason),
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Completed | LoopState::Aborted(_))
    }
}

/// One OS-mode conversation
///
/// Appends are validated against the tool pairing rules, and the provider may
/// be switched at most once.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    messages: Vec<Message>,
    provider: ProviderConfig,
    capabilities: CapabilitySet,
    fallback_used: bool,
    provider_switched: bool,
    state: LoopState,
    pairing: PairingTracker,
    turns: usize,
}

impl Session {
    pub fn new(selection: Selection) -> Self {
        let id = Uuid::new_v4();
        info!(
            session = %id,
            provider = %selection.config.kind,
            model = %selection.config.model_id,
            "Session started"
        );
        Self {
            id,
            started_at: Utc::now(),
            messages: Vec::new(),
            provider: selection.config,
            capabilities: selection.capabilities,
            fallback_used: false,
            provider_switched: false,
            state: LoopState::AwaitingObservation,
            pairing: PairingTracker::new(),
            turns: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn fallback_used(&self) -> bool {
        self.fallback_used
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Completed provider round trips
    pub fn turns(&self) -> usize {
        self.turns
    }

    pub(crate) fn append(&mut self, message: Message) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::Finished);
        }
        self.pairing.observe(&message)?;
        debug!(
            session = %self.id,
            role = message.role.as_str(),
            blocks = message.content.len(),
            "Appended message"
        );
        self.messages.push(message);
        Ok(())
    }

    pub(crate) fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            debug!(session = %self.id, from = ?self.state, to = ?state, "State transition");
            self.state = state;
        }
    }

    pub(crate) fn complete_turn(&mut self) {
        self.turns += 1;
    }

    /// Consumes the fallback allowance; fails if it was already spent
    pub(crate) fn begin_fallback(&mut self) -> Result<(), SessionError> {
        if self.fallback_used {
            return Err(SessionError::FallbackAlreadyUsed);
        }
        self.fallback_used = true;
        Ok(())
    }

    /// Rewrites the provider after [`Session::begin_fallback`]; capabilities follow the new selection
    pub(crate) fn apply_fallback(&mut self, selection: Selection) -> Result<(), SessionError> {
        if !self.fallback_used {
            return Err(SessionError::FallbackNotStarted);
        }
        if self.provider_switched {
            return Err(SessionError::FallbackAlreadyUsed);
        }
        info!(
            session = %self.id,
            from = %self.provider.kind,
            to = %selection.config.kind,
            model = %selection.config.model_id,
            "Provider switched"
        );
        self.provider = selection.config;
        self.capabilities = selection.capabilities;
        self.provider_switched = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ContentBlock, Role};
    use crate::provider::{
        EnvSignals, ModelDescriptor, ProviderSelector, SelectionRequest,
    };
    use serde_json::json;

    fn request() -> SelectionRequest {
        SelectionRequest {
            model: ModelDescriptor::named("gpt-4o"),
            env: EnvSignals {
                vendor_api_key: Some("sk-ant".to_string()),
                generic_api_key: None,
            },
            ..Default::default()
        }
    }

    fn session() -> Session {
        Session::new(ProviderSelector::default().select(&request()).unwrap())
    }

    #[test]
    fn test_new_session() {
        let session = session();
        assert_eq!(session.provider_kind(), ProviderKind::VendorComputerUse);
        assert!(!session.fallback_used());
        assert_eq!(session.state(), &LoopState::AwaitingObservation);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_fallback_applies_once() {
        let mut session = session();
        let alternate = ProviderSelector::default()
            .select_excluding(&request(), ProviderKind::VendorComputerUse)
            .unwrap();

        assert_eq!(
            session.apply_fallback(alternate.clone()),
            Err(SessionError::FallbackNotStarted)
        );
        session.begin_fallback().unwrap();
        session.apply_fallback(alternate.clone()).unwrap();
        assert_eq!(session.provider_kind(), ProviderKind::GenericToolCalling);
        assert_eq!(session.provider().model_id, "gpt-4o");

        assert_eq!(session.begin_fallback(), Err(SessionError::FallbackAlreadyUsed));
        assert_eq!(
            session.apply_fallback(alternate),
            Err(SessionError::FallbackAlreadyUsed)
        );
    }

    #[test]
    fn test_append_enforces_pairing() {
        let mut session = session();
        session.append(Message::user_text("open the browser")).unwrap();
        session
            .append(Message::new(
                Role::Assistant,
                vec![ContentBlock::tool_call(
                    "call_1",
                    "computer",
                    json!({"action": "screenshot"}),
                )],
            ))
            .unwrap();
        let err = session.append(Message::user_text("skip")).unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)));
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_no_appends_after_terminal_state() {
        let mut session = session();
        session.set_state(LoopState::Completed);
        assert_eq!(
            session.append(Message::user_text("more")),
            Err(SessionError::Finished)
        );
    }
}

//! The observe / decide / act cycle
//!
//! ```text
//! AwaitingObservation -> AwaitingProviderResponse -> ExecutingTool -> AwaitingObservation
//!                                                 \-> Completed (no tool calls)
//! ```
//! Cancellation, the deadline and the turn limit are checked between turns only,
//! so a tool call is never left without its result.

use super::error::RunError;
use super::events::{LoopEvent, LoopObserver, NoOpObserver};
use super::executor::{ActionExecutor, Observation, ToolExecutionError, SCREENSHOT_MEDIA_TYPE};
use super::fallback::FallbackController;
use super::state::{AbortReason, LoopState, Session};
use crate::protocol::{ComputerInput, ContentBlock, Message, Role, COMPUTER_TOOL_NAME};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub const DEFAULT_MAX_TURNS: usize = 50;
pub const DEFAULT_EXECUTOR_TIMEOUT: Duration = Duration::from_secs(30);

const NO_SCREENSHOT_TEXT: &str = "No screenshot was captured after the last actions.";

/// Shared stop request, honored between turns
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub max_turns: usize,
    pub executor_timeout: Duration,
    /// Wall-clock budget for the whole run
    pub deadline: Option<Duration>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            executor_timeout: DEFAULT_EXECUTOR_TIMEOUT,
            deadline: None,
        }
    }
}

/// What the operator asked for, plus the screen as it looks right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub instruction: String,
    pub screenshot_base64: Option<String>,
}

impl Task {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            screenshot_base64: None,
        }
    }

    pub fn with_screenshot(mut self, base64: impl Into<String>) -> Self {
        self.screenshot_base64 = Some(base64.into());
        self
    }

    fn into_message(self) -> Message {
        let mut content = vec![ContentBlock::text(self.instruction)];
        if let Some(data) = self.screenshot_base64 {
            content.push(ContentBlock::image(SCREENSHOT_MEDIA_TYPE, data));
        }
        Message::new(Role::User, content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoopOutcome {
    Completed { turns: usize, final_text: String },
    Aborted { turns: usize, reason: AbortReason },
}

pub struct SamplingLoop {
    controller: FallbackController,
    executor: Arc<dyn ActionExecutor>,
    observer: Arc<dyn LoopObserver>,
    options: LoopOptions,
    cancel: CancelFlag,
}

impl SamplingLoop {
    pub fn new(controller: FallbackController, executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            controller,
            executor,
            observer: Arc::new(NoOpObserver),
            options: LoopOptions::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_options(mut self, options: LoopOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Drives the session until the model stops calling tools or the run is aborted
    pub async fn run(&self, session: &mut Session, task: Task) -> Result<LoopOutcome, RunError> {
        let started = Instant::now();
        let mut observation = task.into_message();

        info!(
            session = %session.id(),
            provider = %session.provider_kind(),
            max_turns = self.options.max_turns,
            "Starting sampling loop"
        );

        loop {
            if let Some(reason) = self.abort_reason(session, started) {
                info!(session = %session.id(), "Run aborted: {}", reason);
                self.transition(session, LoopState::Aborted(reason.clone()));
                return Ok(LoopOutcome::Aborted {
                    turns: session.turns(),
                    reason,
                });
            }

            self.transition(session, LoopState::AwaitingObservation);
            self.guard(session, |s| s.append(observation).map_err(RunError::from))?;

            let reply = self.request_reply(session).await?;
            let turn = session.turns();

            if !reply.has_tool_calls() {
                let final_text = reply.text();
                self.guard(session, |s| s.append(reply).map_err(RunError::from))?;
                self.transition(session, LoopState::Completed);
                info!(session = %session.id(), turns = turn, "Run completed");
                return Ok(LoopOutcome::Completed {
                    turns: turn,
                    final_text,
                });
            }

            let calls: Vec<(String, String, Value)> = reply
                .tool_calls()
                .map(|(id, name, args)| (id.to_string(), name.to_string(), args.clone()))
                .collect();
            self.guard(session, |s| s.append(reply).map_err(RunError::from))?;

            self.transition(session, LoopState::ExecutingTool);
            let mut results = Vec::with_capacity(calls.len());
            let mut screenshots = Vec::new();
            for (call_id, name, arguments) in calls {
                let start = Instant::now();
                let outcome = self.execute_call(&name, &arguments).await;
                let (output, is_error) = match outcome {
                    Ok(observed) => {
                        let output = observed.render_output();
                        if let Some(screenshot) = observed.screenshot_base64 {
                            screenshots.push(screenshot);
                        }
                        (output, false)
                    }
                    Err(e) => (e.to_string(), true),
                };
                self.observer.on_event(&LoopEvent::ToolExecuted {
                    turn,
                    call_id: call_id.clone(),
                    output: output.clone(),
                    success: !is_error,
                    execution_time: start.elapsed(),
                });
                results.push(ContentBlock::tool_result(call_id, output, is_error));
            }
            self.guard(session, |s| {
                s.append(Message::tool_results(results))
                    .map_err(RunError::from)
            })?;

            observation = next_observation(screenshots);
        }
    }

    async fn request_reply(&self, session: &mut Session) -> Result<Message, RunError> {
        self.transition(session, LoopState::AwaitingProviderResponse);
        let turn = session.turns() + 1;
        let before = session.provider_kind();
        self.observer.on_event(&LoopEvent::ProviderRequest {
            turn,
            provider: before,
        });

        let start = Instant::now();
        let reply = match self.controller.invoke(session).await {
            Ok(reply) => reply,
            Err(e) => {
                self.fail(session, &e);
                return Err(e);
            }
        };

        let after = session.provider_kind();
        if after != before {
            self.observer.on_event(&LoopEvent::FallbackActivated {
                from: before,
                to: after,
            });
        }
        session.complete_turn();
        self.observer.on_event(&LoopEvent::ProviderResponse {
            turn,
            tool_calls: reply.tool_calls().count(),
            response_time: start.elapsed(),
        });
        for block in &reply.content {
            self.observer.on_event(&LoopEvent::AssistantBlock {
                turn,
                block: block.clone(),
            });
        }
        Ok(reply)
    }

    async fn execute_call(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<Observation, ToolExecutionError> {
        if name != COMPUTER_TOOL_NAME {
            return Err(ToolExecutionError::UnknownTool(name.to_string()));
        }
        let input = ComputerInput::from_arguments(arguments)?;
        let version = self.controller.tools().version();
        if !version.supports(input.action) {
            return Err(ToolExecutionError::UnsupportedAction {
                action: input.action,
                version,
            });
        }

        debug!(action = %input.action, "Executing action");
        tokio::time::timeout(self.options.executor_timeout, self.executor.execute(&input))
            .await
            .map_err(|_| ToolExecutionError::Timeout {
                seconds: self.options.executor_timeout.as_secs(),
            })?
    }

    fn abort_reason(&self, session: &Session, started: Instant) -> Option<AbortReason> {
        if self.cancel.is_cancelled() {
            return Some(AbortReason::Cancelled);
        }
        if self
            .options
            .deadline
            .is_some_and(|deadline| started.elapsed() >= deadline)
        {
            return Some(AbortReason::DeadlineExceeded);
        }
        if session.turns() >= self.options.max_turns {
            return Some(AbortReason::TurnLimit);
        }
        None
    }

    fn transition(&self, session: &mut Session, to: LoopState) {
        let from = session.state().clone();
        if from != to {
            session.set_state(to.clone());
            self.observer.on_event(&LoopEvent::StateChanged { from, to });
        }
    }

    fn guard<T>(
        &self,
        session: &mut Session,
        step: impl FnOnce(&mut Session) -> Result<T, RunError>,
    ) -> Result<T, RunError> {
        step(session).map_err(|e| {
            self.fail(session, &e);
            e
        })
    }

    fn fail(&self, session: &mut Session, err: &RunError) {
        error!(session = %session.id(), "Run failed: {}", err);
        self.transition(session, LoopState::Aborted(AbortReason::Fatal(err.to_string())));
    }
}

fn next_observation(screenshots: Vec<String>) -> Message {
    if screenshots.is_empty() {
        return Message::user_text(NO_SCREENSHOT_TEXT);
    }
    Message::new(
        Role::User,
        screenshots
            .into_iter()
            .map(|data| ContentBlock::image(SCREENSHOT_MEDIA_TYPE, data))
            .collect(),
    )
}

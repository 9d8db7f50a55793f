//! Loop events for callers that render progress

use super::state::LoopState;
use crate::protocol::ContentBlock;
use crate::provider::ProviderKind;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Events emitted while a session runs
#[derive(Debug, Clone)]
pub enum LoopEvent {
    StateChanged {
        from: LoopState,
        to: LoopState,
    },

    /// Provider request sent
    ProviderRequest { turn: usize, provider: ProviderKind },

    /// Provider reply received
    ProviderResponse {
        turn: usize,
        tool_calls: usize,
        response_time: Duration,
    },

    /// One block of the assistant reply, in order
    AssistantBlock { turn: usize, block: ContentBlock },

    FallbackActivated { from: ProviderKind, to: ProviderKind },

    ToolExecuted {
        turn: usize,
        call_id: String,
        output: String,
        success: bool,
        execution_time: Duration,
    },
}

pub trait LoopObserver: Send + Sync {
    fn on_event(&self, event: &LoopEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl LoopObserver for NoOpObserver {
    fn on_event(&self, _event: &LoopEvent) {}
}

/// Observer that logs events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl LoopObserver for LoggingObserver {
    fn on_event(&self, event: &LoopEvent) {
        match event {
            LoopEvent::StateChanged { from, to } => {
                debug!(?from, ?to, "Loop state changed");
            }
            LoopEvent::ProviderRequest { turn, provider } => {
                debug!(turn, provider = %provider, "Sending request to provider");
            }
            LoopEvent::ProviderResponse {
                turn,
                tool_calls,
                response_time,
            } => {
                debug!(
                    turn,
                    tool_calls,
                    response_time_ms = response_time.as_millis(),
                    "Received provider response"
                );
            }
            LoopEvent::AssistantBlock { turn, block } => match block {
                ContentBlock::Text { value } => info!(turn, "Assistant: {}", value),
                ContentBlock::ToolCall {
                    name, arguments, ..
                } => info!(turn, tool = %name, %arguments, "Assistant requested action"),
                other => debug!(turn, block = other.tag(), "Assistant block"),
            },
            LoopEvent::FallbackActivated { from, to } => {
                warn!(from = %from, to = %to, "Provider fallback activated");
            }
            LoopEvent::ToolExecuted {
                turn,
                call_id,
                output,
                success,
                execution_time,
            } => {
                if *success {
                    debug!(
                        turn,
                        call_id = %call_id,
                        execution_time_ms = execution_time.as_millis(),
                        "Action complete"
                    );
                } else {
                    warn!(
                        turn,
                        call_id = %call_id,
                        execution_time_ms = execution_time.as_millis(),
                        "Action failed: {}",
                        output
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingObserver {
        count: Arc<AtomicUsize>,
    }

    impl LoopObserver for CountingObserver {
        fn on_event(&self, _event: &LoopEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_observers_receive_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let observers: Vec<Box<dyn LoopObserver>> = vec![
            Box::new(NoOpObserver),
            Box::new(LoggingObserver),
            Box::new(CountingObserver {
                count: count.clone(),
            }),
        ];

        let event = LoopEvent::ProviderRequest {
            turn: 1,
            provider: ProviderKind::VendorComputerUse,
        };
        for observer in &observers {
            observer.on_event(&event);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

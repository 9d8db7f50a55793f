//! OS-mode sessions and the sampling loop that drives them

mod error;
pub mod events;
mod executor;
mod fallback;
pub mod images;
mod prompt;
mod sampling;
mod state;

pub use error::{RunError, SessionError};
pub use events::{LoggingObserver, LoopEvent, LoopObserver, NoOpObserver};
pub use executor::{ActionExecutor, Observation, ToolExecutionError, SCREENSHOT_MEDIA_TYPE};
pub use fallback::{FallbackController, DEFAULT_REQUEST_TIMEOUT};
pub use prompt::SystemPrompt;
pub use sampling::{
    CancelFlag, LoopOptions, LoopOutcome, SamplingLoop, Task, DEFAULT_EXECUTOR_TIMEOUT,
    DEFAULT_MAX_TURNS,
};
pub use state::{AbortReason, LoopState, Session};

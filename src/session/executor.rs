use crate::protocol::{ComputerAction, ComputerInputError, ComputerToolVersion, ComputerInput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Media type of screenshots returned by executors
pub const SCREENSHOT_MEDIA_TYPE: &str = "image/png";

/// Result of one executed action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub screenshot_base64: Option<String>,
    pub status_text: String,
    /// Note from the executor environment, shown to the model in a `<system>` tag
    pub system: Option<String>,
}

impl Observation {
    pub fn text(status_text: impl Into<String>) -> Self {
        Self {
            status_text: status_text.into(),
            ..Default::default()
        }
    }

    pub fn screenshot(base64: impl Into<String>) -> Self {
        Self {
            screenshot_base64: Some(base64.into()),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, note: impl Into<String>) -> Self {
        self.system = Some(note.into());
        self
    }

    /// Text the model receives as the tool result output
    pub fn render_output(&self) -> String {
        let mut output = match &self.system {
            Some(note) => format!("<system>{}</system>\n", note),
            None => String::new(),
        };
        if self.status_text.is_empty() && self.screenshot_base64.is_some() {
            output.push_str("Screenshot captured.");
        } else {
            output.push_str(&self.status_text);
        }
        output
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolExecutionError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid tool input: {0}")]
    InvalidInput(#[from] ComputerInputError),

    #[error("action '{action}' is not available in {}", .version.tool_type())]
    UnsupportedAction {
        action: ComputerAction,
        version: ComputerToolVersion,
    },

    #[error("action timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("action failed: {0}")]
    Failed(String),
}

/// Performs computer actions; lives outside this crate
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, input: &ComputerInput) -> Result<Observation, ToolExecutionError>;
}

//! osbridge - provider abstraction core for computer-use agents
//!
//! An agent that drives a desktop through screenshots and mouse/keyboard actions
//! needs a model backend. This crate decides which backend to use, translates the
//! conversation between the vendor computer-use schema and generic function
//! calling, and runs the observe/decide/act loop with at most one provider switch
//! per session.
//!
//! # Core Concepts
//!
//! - **Provider selection**: [`ProviderSelector`] picks the vendor computer-use
//!   backend or a generic tool-calling backend whose model was probed for vision
//!   and tool calling by [`CapabilityProbe`]
//! - **Translation**: [`MessageTranslator`] and [`ToolSchemaTranslator`] convert the
//!   neutral [`Message`] history to and from each wire format
//! - **Sampling loop**: [`SamplingLoop`] alternates model calls and tool execution,
//!   delegating provider failures to [`FallbackController`]
//!
//! # Example Usage
//!
//! ```no_run
//! use osbridge::config::OsBridgeConfig;
//! use osbridge::protocol::ToolSchemaTranslator;
//! use osbridge::provider::{
//!     AnthropicHttpTransport, CapabilityProbe, OpenAiHttpTransport, ProviderSelector, Transports,
//! };
//! use osbridge::session::{ActionExecutor, FallbackController, SamplingLoop, Session, Task};
//! use std::sync::Arc;
//!
//! async fn run(executor: Arc<dyn ActionExecutor>) -> anyhow::Result<()> {
//!     let config = OsBridgeConfig::from_env()?;
//!     let selector = ProviderSelector::new(CapabilityProbe::new(config.probe_policy()));
//!     let request = config.selection_request();
//!     let selection = selector.select(&request)?;
//!
//!     let transports = Transports::new(
//!         Arc::new(AnthropicHttpTransport::new(config.request_timeout())?),
//!         Arc::new(OpenAiHttpTransport::new(config.request_timeout())?),
//!     );
//!     let tools = ToolSchemaTranslator::new(config.tool_version, config.display);
//!     let controller = FallbackController::new(selector, request, transports, tools)
//!         .with_recent_images(config.recent_images)
//!         .with_request_timeout(config.request_timeout());
//!
//!     let mut session = Session::new(selection);
//!     let outcome = SamplingLoop::new(controller, executor)
//!         .with_options(config.loop_options())
//!         .run(&mut session, Task::new("Open the settings window"))
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`protocol`]: neutral message model, wire schemas and translators
//! - [`provider`]: capability probing, provider selection and transports
//! - [`session`]: session state, fallback control and the sampling loop
//! - [`config`]: environment-driven configuration
//! - [`cli`]: command-line inspection of the selection decision

pub mod cli;
pub mod config;
pub mod protocol;
pub mod provider;
pub mod session;
pub mod util;

pub use config::{ConfigError, OsBridgeConfig};
pub use protocol::{
    ComputerAction, ComputerInput, ComputerToolVersion, ContentBlock, DisplayGeometry, Message,
    MessageTranslator, Role, ToolSchemaTranslator, TranslationError,
};
pub use provider::{
    Capability, CapabilityError, CapabilityProbe, CapabilitySet, ModelDescriptor, ProviderConfig,
    ProviderKind, ProviderSelector, Selection, SelectionRequest, TransportError, Transports,
};
pub use session::{
    ActionExecutor, FallbackController, LoopOutcome, Observation, RunError, SamplingLoop, Session,
    Task,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

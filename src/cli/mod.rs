pub mod commands;
pub mod handlers;

pub use commands::{CliArgs, Commands, ProbeArgs, ProviderArgs, SelectArgs, ToolSchemaArgs};
pub use handlers::{handle_probe, handle_select, handle_tool_schema};

use crate::config::OsBridgeConfig;
use crate::protocol::ComputerToolVersion;
use crate::provider::ProviderKind;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Provider abstraction core for screenshot-driven computer-use agents
#[derive(Parser, Debug)]
#[command(
    name = "osbridge",
    about = "Provider abstraction core for screenshot-driven computer-use agents",
    version,
    author,
    long_about = "osbridge decides which model backend drives OS mode, translates conversations \
                  between the vendor computer-use schema and generic function calling, and \
                  runs the observe/decide/act loop. These commands inspect that decision \
                  without touching a screen."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Report the capabilities detected for a model",
        long_about = "Probes the configured model for vision, tool calling and streaming \
                      support and prints where each answer came from.\n\n\
                      Examples:\n  \
                      osbridge probe --model gpt-4o\n  \
                      osbridge probe --model my-local-model --assume-capable --format json"
    )]
    Probe(ProbeArgs),

    #[command(
        about = "Show which provider OS mode would use",
        long_about = "Runs provider selection against the current environment and flags and \
                      prints the resulting configuration with credentials redacted.\n\n\
                      Examples:\n  \
                      osbridge select\n  \
                      osbridge select --os-provider custom --model gpt-4o --api-base http://localhost:8080/v1"
    )]
    Select(SelectArgs),

    #[command(
        about = "Print the computer tool definition",
        long_about = "Prints the computer tool declaration in vendor or generic form.\n\n\
                      Examples:\n  \
                      osbridge tool-schema\n  \
                      osbridge tool-schema --format generic --tool-version 20250124"
    )]
    ToolSchema(ToolSchemaArgs),
}

/// Flags shared by commands that need a provider configuration
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderArgs {
    #[arg(
        long = "os-provider",
        value_parser = parse_provider,
        help = "Force a provider: anthropic, custom (auto-selected by default)"
    )]
    pub provider: Option<ProviderKind>,

    #[arg(short = 'm', long, value_name = "MODEL", help = "Model id for the generic backend")]
    pub model: Option<String>,

    #[arg(long = "api-base", alias = "api_base", value_name = "URL", help = "Generic backend endpoint")]
    pub api_base: Option<String>,

    #[arg(long = "api-key", alias = "api_key", value_name = "KEY", help = "Generic backend credential")]
    pub api_key: Option<String>,

    #[arg(long = "max-tokens", alias = "max_tokens", value_name = "N")]
    pub max_tokens: Option<u32>,

    #[arg(long = "context-window", alias = "context_window", value_name = "N")]
    pub context_window: Option<u32>,

    #[arg(long, value_name = "BOOL", help = "Declare whether the model accepts images")]
    pub vision: Option<bool>,

    #[arg(long = "tool-calling", value_name = "BOOL", help = "Declare whether the model supports function calling")]
    pub tool_calling: Option<bool>,

    #[arg(long = "assume-capable", help = "Treat capabilities nothing reports as supported")]
    pub assume_capable: bool,
}

impl ProviderArgs {
    /// Flags win over environment values
    pub fn apply(&self, config: &mut OsBridgeConfig) {
        if self.provider.is_some() {
            config.provider = self.provider;
        }
        if self.model.is_some() {
            config.model = self.model.clone();
        }
        if self.api_base.is_some() {
            config.api_base = self.api_base.clone();
        }
        if self.api_key.is_some() {
            config.api_key = self.api_key.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if self.context_window.is_some() {
            config.context_window = self.context_window;
        }
        if self.vision.is_some() {
            config.vision = self.vision;
        }
        if self.tool_calling.is_some() {
            config.tool_calling = self.tool_calling;
        }
        if self.assume_capable {
            config.assume_capable = true;
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct SelectArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ToolSchemaArgs {
    #[arg(short = 'f', long, value_enum, default_value = "vendor", help = "Schema to print")]
    pub format: SchemaFormatArg,

    #[arg(long = "tool-version", value_parser = parse_tool_version_arg, help = "Computer tool version: 20241022 or 20250124")]
    pub tool_version: Option<ComputerToolVersion>,

    #[arg(long, value_name = "PX", help = "Display width in pixels")]
    pub width: Option<u32>,

    #[arg(long, value_name = "PX", help = "Display height in pixels")]
    pub height: Option<u32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormatArg {
    Vendor,
    Generic,
}

fn parse_provider(s: &str) -> Result<ProviderKind, String> {
    s.parse::<ProviderKind>()
}

fn parse_tool_version_arg(s: &str) -> Result<ComputerToolVersion, String> {
    s.parse::<ComputerToolVersion>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_probe_args() {
        let args = CliArgs::parse_from(["osbridge", "probe", "--model", "gpt-4o", "--vision", "false"]);
        match args.command {
            Commands::Probe(probe) => {
                assert_eq!(probe.provider.model.as_deref(), Some("gpt-4o"));
                assert_eq!(probe.provider.vision, Some(false));
                assert_eq!(probe.format, OutputFormatArg::Human);
            }
            _ => panic!("Expected Probe command"),
        }
    }

    #[test]
    fn test_select_accepts_underscore_flag_spellings() {
        let args = CliArgs::parse_from([
            "osbridge",
            "select",
            "--os-provider",
            "custom",
            "--api_base",
            "http://localhost:8080/v1",
            "--max_tokens",
            "1024",
        ]);
        match args.command {
            Commands::Select(select) => {
                assert_eq!(select.provider.provider, Some(ProviderKind::GenericToolCalling));
                assert_eq!(select.provider.api_base.as_deref(), Some("http://localhost:8080/v1"));
                assert_eq!(select.provider.max_tokens, Some(1024));
            }
            _ => panic!("Expected Select command"),
        }
    }

    #[test]
    fn test_tool_schema_args() {
        let args = CliArgs::parse_from([
            "osbridge",
            "tool-schema",
            "--format",
            "generic",
            "--tool-version",
            "20250124",
        ]);
        match args.command {
            Commands::ToolSchema(schema) => {
                assert_eq!(schema.format, SchemaFormatArg::Generic);
                assert_eq!(schema.tool_version, Some(ComputerToolVersion::V20250124));
            }
            _ => panic!("Expected ToolSchema command"),
        }
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let result = CliArgs::try_parse_from(["osbridge", "select", "--os-provider", "azure"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = OsBridgeConfig {
            model: Some("from-env".to_string()),
            ..Default::default()
        };
        let flags = ProviderArgs {
            model: Some("from-flag".to_string()),
            assume_capable: true,
            ..Default::default()
        };
        flags.apply(&mut config);
        assert_eq!(config.model.as_deref(), Some("from-flag"));
        assert!(config.assume_capable);
    }

    #[test]
    fn test_global_flags_conflict() {
        let result = CliArgs::try_parse_from(["osbridge", "-v", "-q", "tool-schema"]);
        assert!(result.is_err());
    }
}

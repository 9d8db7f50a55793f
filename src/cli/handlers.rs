//! Command handlers; each returns the process exit code
//!
//! Exit codes: 0 on success, 1 for configuration or output errors, 2 when the
//! configured model cannot drive OS mode.

use crate::cli::commands::{
    OutputFormatArg, ProbeArgs, ProviderArgs, SchemaFormatArg, SelectArgs, ToolSchemaArgs,
};
use crate::config::OsBridgeConfig;
use crate::protocol::{DisplayGeometry, ToolSchemaTranslator};
use crate::provider::{
    CapabilityError, CapabilityProbe, ProbeReport, ProviderSelector, Selection,
};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use tracing::{debug, error};

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_INCAPABLE: i32 = 2;

pub fn handle_probe(args: &ProbeArgs) -> i32 {
    let result = load_config(&args.provider).and_then(|config| {
        let report = probe_model(&config);
        render_probe(&config, &report, args.format)
    });
    finish(result)
}

pub fn handle_select(args: &SelectArgs) -> i32 {
    let config = match load_config(&args.provider) {
        Ok(config) => config,
        Err(e) => return finish(Err(e)),
    };

    let selector = ProviderSelector::new(CapabilityProbe::new(config.probe_policy()));
    match selector.select(&config.selection_request()) {
        Ok(selection) => finish(render_selection(&selection, args.format)),
        Err(e) => {
            report_capability_error(&e);
            EXIT_INCAPABLE
        }
    }
}

pub fn handle_tool_schema(args: &ToolSchemaArgs) -> i32 {
    let result = OsBridgeConfig::from_env()
        .context("Failed to load configuration")
        .and_then(|config| render_tool_schema(&config, args));
    finish(result)
}

fn finish(result: Result<String>) -> i32 {
    match result {
        Ok(output) => {
            println!("{}", output);
            EXIT_OK
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    }
}

fn report_capability_error(err: &CapabilityError) {
    error!("{}", err);
    eprintln!("Error: {}", err);
    let missing = err.missing();
    if !missing.is_empty() {
        eprintln!(
            "Hint: declare support with --vision/--tool-calling, pass --assume-capable, \
             or set ANTHROPIC_API_KEY to use the vendor computer-use provider"
        );
    }
}

fn load_config(flags: &ProviderArgs) -> Result<OsBridgeConfig> {
    let mut config = OsBridgeConfig::from_env().context("Failed to load configuration")?;
    flags.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    debug!("Resolved configuration:\n{}", config);
    Ok(config)
}

fn probe_model(config: &OsBridgeConfig) -> ProbeReport {
    let probe = CapabilityProbe::new(config.probe_policy());
    probe.probe(&config.model_descriptor())
}

fn render_probe(
    config: &OsBridgeConfig,
    report: &ProbeReport,
    format: OutputFormatArg,
) -> Result<String> {
    match format {
        OutputFormatArg::Json => {
            serde_json::to_string_pretty(report).context("Failed to serialize probe report")
        }
        OutputFormatArg::Human => {
            let mut out = String::new();
            writeln!(
                out,
                "Model: {}",
                config.model.as_deref().unwrap_or("<unspecified>")
            )?;
            for (capability, source) in &report.sources {
                let supported = report.capabilities.supports(*capability);
                writeln!(
                    out,
                    "  {:<12} {:<4} ({:?})",
                    capability.as_str(),
                    if supported { "yes" } else { "no" },
                    source
                )?;
            }
            for warning in &report.warnings {
                writeln!(out, "Warning: {}", warning)?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

fn render_selection(selection: &Selection, format: OutputFormatArg) -> Result<String> {
    match format {
        OutputFormatArg::Json => {
            serde_json::to_string_pretty(selection).context("Failed to serialize selection")
        }
        OutputFormatArg::Human => {
            let config = &selection.config;
            let mut out = String::new();
            writeln!(out, "Provider: {} ({:?})", config.kind, selection.reason)?;
            writeln!(out, "  Model: {}", config.model_id)?;
            writeln!(out, "  Endpoint: {}", config.endpoint)?;
            writeln!(
                out,
                "  Credential: {}",
                if config.credential.is_some() {
                    "***"
                } else {
                    "(none)"
                }
            )?;
            writeln!(out, "  Max Tokens: {}", config.max_tokens)?;
            if let Some(window) = config.context_window {
                writeln!(out, "  Context Window: {}", window)?;
            }
            writeln!(
                out,
                "  Vision: {}, Tool Calling: {}, Streaming: {}",
                selection.capabilities.vision,
                selection.capabilities.tool_calling,
                selection.capabilities.streaming
            )?;
            for warning in &selection.warnings {
                writeln!(out, "Warning: {}", warning)?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

fn render_tool_schema(config: &OsBridgeConfig, args: &ToolSchemaArgs) -> Result<String> {
    let display = DisplayGeometry {
        width_px: args.width.unwrap_or(config.display.width_px),
        height_px: args.height.unwrap_or(config.display.height_px),
        display_number: config.display.display_number,
    };
    let translator =
        ToolSchemaTranslator::new(args.tool_version.unwrap_or(config.tool_version), display);

    let json = match args.format {
        SchemaFormatArg::Vendor => serde_json::to_string_pretty(&translator.vendor_tool_definition()),
        SchemaFormatArg::Generic => {
            serde_json::to_string_pretty(&translator.generic_tool_definition())
        }
    };
    json.context("Failed to serialize tool definition")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ComputerToolVersion;
    use crate::provider::{ProviderKind, SelectionReason};

    fn config_for(model: &str) -> OsBridgeConfig {
        OsBridgeConfig {
            model: Some(model.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_probe_human_lists_sources() {
        let config = config_for("gpt-4o");
        let report = probe_model(&config);
        let output = render_probe(&config, &report, OutputFormatArg::Human).unwrap();
        assert!(output.starts_with("Model: gpt-4o"));
        assert!(output.contains("vision"));
        assert!(output.contains("KnownModel"));
        assert!(!output.contains("Warning"));
    }

    #[test]
    fn test_render_probe_json_includes_warnings() {
        let config = config_for("my-local-model");
        let report = probe_model(&config);
        let output = render_probe(&config, &report, OutputFormatArg::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["capabilities"]["vision"], false);
        assert_eq!(value["warnings"].as_array().map(|w| w.len()), Some(3));
    }

    #[test]
    fn test_render_selection_redacts_credential() {
        let mut config = config_for("gpt-4o");
        config.provider = Some(ProviderKind::GenericToolCalling);
        config.api_key = Some("sk-secret".to_string());
        let selection = ProviderSelector::default()
            .select(&config.selection_request())
            .unwrap();
        assert_eq!(selection.reason, SelectionReason::Explicit);

        for format in [OutputFormatArg::Human, OutputFormatArg::Json] {
            let output = render_selection(&selection, format).unwrap();
            assert!(!output.contains("sk-secret"));
            assert!(output.contains("***"));
        }
    }

    #[test]
    fn test_render_tool_schema_vendor_and_generic() {
        let config = OsBridgeConfig::default();
        let args = ToolSchemaArgs {
            format: SchemaFormatArg::Vendor,
            tool_version: Some(ComputerToolVersion::V20250124),
            width: Some(1024),
            height: None,
        };
        let vendor: serde_json::Value =
            serde_json::from_str(&render_tool_schema(&config, &args).unwrap()).unwrap();
        assert_eq!(vendor["type"], "computer_20250124");
        assert_eq!(vendor["display_width_px"], 1024);

        let args = ToolSchemaArgs {
            format: SchemaFormatArg::Generic,
            ..args
        };
        let generic: serde_json::Value =
            serde_json::from_str(&render_tool_schema(&config, &args).unwrap()).unwrap();
        assert_eq!(generic["type"], "function");
        assert_eq!(generic["function"]["name"], "computer");
    }

    #[test]
    fn test_missing_capability_error_names_vision() {
        let config = config_for("llama3-8b");
        let selector = ProviderSelector::new(CapabilityProbe::new(config.probe_policy()));
        let err = selector.select(&config.selection_request()).unwrap_err();
        assert!(err.to_string().contains("vision"));
        assert!(!err.missing().is_empty());
    }
}

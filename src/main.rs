use osbridge::cli::commands::{CliArgs, Commands};
use osbridge::cli::handlers::{handle_probe, handle_select, handle_tool_schema};
use osbridge::util::logging::{self, LoggingConfig};
use osbridge::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("osbridge v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Probe(probe_args) => handle_probe(probe_args),
        Commands::Select(select_args) => handle_select(select_args),
        Commands::ToolSchema(schema_args) => handle_tool_schema(schema_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        logging::parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("OSBRIDGE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        logging::parse_level(&level_str)
    };

    let use_json = env::var("OSBRIDGE_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    logging::init_logging(LoggingConfig {
        level,
        use_json,
        ..Default::default()
    });
}

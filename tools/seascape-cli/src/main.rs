//! `seascape` binary entry point.

use clap::Parser;
use seascape_cli::cli::Args;
use seascape_cli::{commands, report};
use seascape_telemetry::{init_logging, TelemetryConfig};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Quiet by default so stdout stays machine-readable
    let telemetry = if std::env::var("SEASCAPE_LOG_LEVEL").is_ok() || std::env::var("RUST_LOG").is_ok() {
        TelemetryConfig::for_service("seascape-cli")
    } else {
        TelemetryConfig::for_service("seascape-cli").with_log_level("warn")
    };
    if let Err(e) = init_logging(&telemetry) {
        eprintln!("warning: {e}");
    }

    match commands::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let (code, line) = report(&error);
            eprintln!("{line}");
            ExitCode::from(code)
        }
    }
}

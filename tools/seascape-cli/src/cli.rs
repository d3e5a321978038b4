//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Seascape bus client
#[derive(Parser, Debug)]
#[command(name = "seascape")]
#[command(about = "Send requests to Seascape services and follow their broadcasts")]
pub struct Args {
    /// Bus configuration file (TOML)
    #[arg(short, long, env = "SEASCAPE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one request and print the reply parameters
    Request {
        /// Service name from the configuration
        service: String,
        /// Command to run
        command: String,
        /// Request parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,
    },

    /// Subscribe to a service's broadcasts and print them as they arrive
    Subscribe {
        /// Service name from the configuration
        service: String,
        /// Topic filter as a JSON object (e.g. '{"o":["seascape"]}')
        #[arg(short, long, default_value = "{}")]
        filter: String,
        /// Stop after this many broadcasts
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Parse a dotted topic and show its levels
    Topic {
        /// Topic string, e.g. seascape.core.1.erc20.token.Transfer
        topic: String,
    },

    /// Show the canonical form of a topic filter
    Filter {
        /// Topic filter as a JSON object
        filter: String,
    },

    /// List configured endpoints
    Endpoints,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let args = Args::parse_from([
            "seascape",
            "--config",
            "bus.toml",
            "request",
            "indexer",
            "height",
            "--params",
            r#"{"network_id":"1"}"#,
        ]);
        assert_eq!(args.config, Some(PathBuf::from("bus.toml")));
        match args.command {
            Command::Request {
                service,
                command,
                params,
            } => {
                assert_eq!(service, "indexer");
                assert_eq!(command, "height");
                assert_eq!(params, r#"{"network_id":"1"}"#);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_subscribe_defaults() {
        let args = Args::parse_from(["seascape", "subscribe", "indexer"]);
        match args.command {
            Command::Subscribe { filter, count, .. } => {
                assert_eq!(filter, "{}");
                assert_eq!(count, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

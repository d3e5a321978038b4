//! # Seascape CLI
//!
//! Thin command-line wrapper over `seascape-bus`.
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | The service rejected the request, or a subscription failed |
//! | 2 | Configuration or input error |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod cli;
pub mod commands;

use commands::InvalidInput;
use seascape_bus::{ConfigError, TransportError};

/// Exit code for application-level failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code for configuration and usage errors.
pub const EXIT_CONFIG: u8 = 2;

/// Map an error to its exit code and the line printed on stderr.
pub fn report(error: &anyhow::Error) -> (u8, String) {
    if let Some(e) = error.downcast_ref::<TransportError>() {
        return match e {
            // Display already reads "configuration error: ..."
            TransportError::Config(_) => (EXIT_CONFIG, e.to_string()),
            _ => (EXIT_FAILURE, format!("error: {e}")),
        };
    }
    if let Some(e) = error.downcast_ref::<ConfigError>() {
        return (EXIT_CONFIG, format!("configuration error: {e}"));
    }
    if let Some(e) = error.downcast_ref::<InvalidInput>() {
        return (EXIT_CONFIG, format!("error: {e}"));
    }
    (EXIT_FAILURE, format!("error: {error:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::SubscriptionEnded;

    #[test]
    fn test_report_application_failure() {
        let err = anyhow::Error::from(TransportError::Application {
            service: "indexer".into(),
            command: "height".into(),
            message: "network 56 not indexed".into(),
        });
        assert_eq!(
            report(&err),
            (
                EXIT_FAILURE,
                "error: indexer rejected 'height': network 56 not indexed".to_string()
            )
        );
    }

    #[test]
    fn test_report_unknown_service() {
        let err = anyhow::Error::from(TransportError::Config("unknown service 'ghost'".into()));
        assert_eq!(
            report(&err),
            (
                EXIT_CONFIG,
                "configuration error: unknown service 'ghost'".to_string()
            )
        );
    }

    #[test]
    fn test_report_config_file_error() {
        let err = anyhow::Error::from(ConfigError::Invalid("transport.max_attempts cannot be 0".into()));
        let (code, line) = report(&err);
        assert_eq!(code, EXIT_CONFIG);
        assert!(line.starts_with("configuration error: "));
    }

    #[test]
    fn test_report_subscription_failure() {
        let err = anyhow::Error::from(SubscriptionEnded {
            service: "indexer".into(),
            message: "heartbeat failed".into(),
        });
        assert_eq!(
            report(&err),
            (
                EXIT_FAILURE,
                "error: subscription to indexer ended: heartbeat failed".to_string()
            )
        );
    }
}

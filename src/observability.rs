//! Observability utilities.
//!
//! Logs always go to stderr: stdout carries the MCP protocol stream.

use crate::types::ObservabilityConfig;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing subscriber once for the process.
///
/// Log format defaults to plain text and can be switched to JSON via
/// `GITLAB_MCP_LOG_FORMAT=json`. Filter comes from `RUST_LOG`, falling back
/// to `config.log_level`.
pub fn init_tracing(config: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let env_filter = env_filter(rust_log.as_deref(), &config.log_level);

        let result = if config.json_logs {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_ansi(false).with_writer(std::io::stderr))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}

/// `RUST_LOG` directives when present and parseable, else `fallback`.
fn env_filter(rust_log: Option<&str>, fallback: &str) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

#[cfg(test)]
mod tests {
    use super::env_filter;

    #[test]
    fn test_filter_prefers_rust_log() {
        assert_eq!(env_filter(Some("gitlab_mcp=debug"), "info").to_string(), "gitlab_mcp=debug");
    }

    #[test]
    fn test_filter_falls_back_to_config_level() {
        assert_eq!(env_filter(None, "warn").to_string(), "warn");
        assert_eq!(env_filter(Some("  "), "warn").to_string(), "warn");
        assert_eq!(env_filter(Some("gitlab_mcp=loud"), "error").to_string(), "error");
    }
}

//! Configuration structures.
//!
//! Configuration is resolved once at process start from environment variables
//! (or the equivalent CLI flags) and passed by reference from then on.

use crate::tools::ModeFlags;
use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default GitLab API root when `GITLAB_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "https://gitlab.com/api/v4";

/// Environment variable names.
pub mod env {
    pub const TOKEN: &str = "GITLAB_PERSONAL_ACCESS_TOKEN";
    pub const API_URL: &str = "GITLAB_API_URL";
    pub const READ_ONLY: &str = "GITLAB_READ_ONLY_MODE";
    pub const USE_WIKI: &str = "USE_GITLAB_WIKI";
    pub const USE_PIPELINE: &str = "USE_PIPELINE";
    pub const USE_MILESTONE: &str = "USE_MILESTONE";
    pub const HTTP_PROXY: &str = "HTTP_PROXY";
    pub const HTTPS_PROXY: &str = "HTTPS_PROXY";
    pub const REQUEST_TIMEOUT: &str = "GITLAB_REQUEST_TIMEOUT";
    pub const LOG_FORMAT: &str = "GITLAB_MCP_LOG_FORMAT";
}

/// Global server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// GitLab connection settings.
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// Tool group toggles.
    #[serde(default)]
    pub features: ModeFlags,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// MCP transport configuration.
    #[serde(default)]
    pub server: ServerConfig,
}

/// GitLab connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabConfig {
    /// Personal access token. Never serialized.
    #[serde(skip_serializing, default)]
    pub token: String,

    /// API root, always ending in `/api/v4`.
    pub api_url: String,

    /// Proxy for `http://` URLs (http or socks5 scheme).
    pub http_proxy: Option<String>,

    /// Proxy for `https://` URLs (http or socks5 scheme).
    pub https_proxy: Option<String>,

    /// Per-request timeout enforced by the HTTP transport.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            http_proxy: None,
            https_proxy: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Fallback filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// MCP stdio transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Maximum accepted size of one JSON-RPC line in bytes.
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| lookup(key).as_deref() == Some("true");

        let request_timeout = match non_empty(env::REQUEST_TIMEOUT) {
            Some(raw) => humantime_serde::re::humantime::parse_duration(raw.trim()).map_err(|e| {
                Error::configuration(format!("{} is not a duration: {}", env::REQUEST_TIMEOUT, e))
            })?,
            None => GitLabConfig::default().request_timeout,
        };

        let config = Config {
            gitlab: GitLabConfig {
                token: lookup(env::TOKEN).unwrap_or_default(),
                api_url: normalize_api_url(non_empty(env::API_URL).as_deref()),
                http_proxy: non_empty(env::HTTP_PROXY),
                https_proxy: non_empty(env::HTTPS_PROXY),
                request_timeout,
            },
            features: ModeFlags {
                read_only: flag(env::READ_ONLY),
                wiki: flag(env::USE_WIKI),
                pipeline: flag(env::USE_PIPELINE),
                milestone: flag(env::USE_MILESTONE),
            },
            observability: ObservabilityConfig {
                json_logs: lookup(env::LOG_FORMAT)
                    .map(|v| v.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
                ..ObservabilityConfig::default()
            },
            server: ServerConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.gitlab.token.trim().is_empty() {
            return Err(Error::configuration(format!(
                "{} environment variable is not set",
                env::TOKEN
            )));
        }
        if !self.gitlab.api_url.starts_with("http://") && !self.gitlab.api_url.starts_with("https://") {
            return Err(Error::configuration(format!(
                "GitLab API URL must be http(s): {}",
                self.gitlab.api_url
            )));
        }
        Ok(())
    }
}

/// Normalize a user-supplied GitLab URL so it ends in `/api/v4`.
///
/// Accepts bare hosts (`https://gitlab.example.com`), URLs with a trailing
/// slash, and URLs that already carry the API suffix.
pub fn normalize_api_url(url: Option<&str>) -> String {
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return DEFAULT_API_URL.to_string();
    };

    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with("/api/v4") {
        trimmed.to_string()
    } else {
        format!("{}/api/v4", trimmed)
    }
}

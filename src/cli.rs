//! Command-line surface for the stdio binary.
//!
//! Every flag mirrors an environment variable; a flag wins over its variable.
//! Values are funnelled through [`Config::from_lookup`] so both paths share
//! one parser.

use crate::types::{env, Config, Result};
use clap::Parser;
use std::collections::HashMap;

#[derive(Debug, Parser)]
#[command(name = "gitlab-mcp")]
#[command(about = "MCP server exposing GitLab REST operations as tools", long_about = None)]
#[command(version)]
pub struct Cli {
    /// GitLab personal access token
    #[arg(long, env = env::TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// GitLab instance or API root (`/api/v4` is appended when missing)
    #[arg(long, env = env::API_URL)]
    pub api_url: Option<String>,

    /// Expose only read-only tools
    #[arg(long, env = env::READ_ONLY, num_args = 0..=1, default_missing_value = "true")]
    pub read_only: Option<String>,

    /// Expose wiki tools
    #[arg(long, env = env::USE_WIKI, num_args = 0..=1, default_missing_value = "true")]
    pub use_wiki: Option<String>,

    /// Expose pipeline tools
    #[arg(long, env = env::USE_PIPELINE, num_args = 0..=1, default_missing_value = "true")]
    pub use_pipeline: Option<String>,

    /// Expose milestone tools
    #[arg(long, env = env::USE_MILESTONE, num_args = 0..=1, default_missing_value = "true")]
    pub use_milestone: Option<String>,

    /// Proxy for http:// requests
    #[arg(long, env = env::HTTP_PROXY)]
    pub http_proxy: Option<String>,

    /// Proxy for https:// requests
    #[arg(long, env = env::HTTPS_PROXY)]
    pub https_proxy: Option<String>,

    /// Per-request timeout, e.g. `30s` or `2m`
    #[arg(long, env = env::REQUEST_TIMEOUT)]
    pub request_timeout: Option<String>,

    /// Log format: `text` or `json`
    #[arg(long, env = env::LOG_FORMAT)]
    pub log_format: Option<String>,
}

impl Cli {
    /// Resolve the parsed flags into a validated [`Config`].
    pub fn into_config(self) -> Result<Config> {
        let values: HashMap<&'static str, String> = [
            (env::TOKEN, self.token),
            (env::API_URL, self.api_url),
            (env::READ_ONLY, self.read_only),
            (env::USE_WIKI, self.use_wiki),
            (env::USE_PIPELINE, self.use_pipeline),
            (env::USE_MILESTONE, self.use_milestone),
            (env::HTTP_PROXY, self.http_proxy),
            (env::HTTPS_PROXY, self.https_proxy),
            (env::REQUEST_TIMEOUT, self.request_timeout),
            (env::LOG_FORMAT, self.log_format),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();

        Config::from_lookup(|key| values.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    #[test]
    fn test_command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_feed_config() {
        let cli = Cli::try_parse_from([
            "gitlab-mcp",
            "--token",
            "glpat-cli",
            "--api-url",
            "https://gitlab.internal/",
            "--read-only",
            "--use-wiki",
            "false",
            "--use-pipeline",
            "--request-timeout",
            "5s",
            "--log-format",
            "json",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();

        assert_eq!(config.gitlab.token, "glpat-cli");
        assert_eq!(config.gitlab.api_url, "https://gitlab.internal/api/v4");
        assert_eq!(config.gitlab.request_timeout, Duration::from_secs(5));
        assert!(config.features.read_only);
        assert!(!config.features.wiki);
        assert!(config.features.pipeline);
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_bad_timeout_is_configuration_error() {
        let cli = Cli::try_parse_from([
            "gitlab-mcp",
            "--token",
            "glpat-cli",
            "--request-timeout",
            "soon",
        ])
        .unwrap();
        let err = cli.into_config().unwrap_err();
        assert!(err.to_string().contains(env::REQUEST_TIMEOUT));
    }
}

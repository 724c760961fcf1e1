//! gitlab-mcp stdio server - main entry point.
//!
//! Reads newline-delimited JSON-RPC from stdin and answers on stdout. Logs
//! go to stderr.

use clap::Parser;
use gitlab_mcp::cli::Cli;
use gitlab_mcp::gitlab::ReqwestTransport;
use gitlab_mcp::mcp::{McpServer, Router, ServerInfo};
use gitlab_mcp::tools::Gateway;
use gitlab_mcp::types::ObservabilityConfig;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logging must be up before config errors are reported.
    let json_logs = cli
        .log_format
        .as_deref()
        .is_some_and(|f| f.eq_ignore_ascii_case("json"));
    gitlab_mcp::observability::init_tracing(&ObservabilityConfig {
        json_logs,
        ..ObservabilityConfig::default()
    });

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration_invalid");
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    let transport = Arc::new(ReqwestTransport::new(&config.gitlab)?);
    let gateway = Gateway::new(&config, transport)?;
    tracing::info!(
        api_url = %config.gitlab.api_url,
        tools = gateway.list_tools().len(),
        read_only = config.features.read_only,
        "gitlab_mcp_starting"
    );

    let router = Router::new(Arc::new(gateway), ServerInfo::default());
    let server = McpServer::new(router, &config.server);

    let cancel = server.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown_signal_received");
            cancel.cancel();
        }
    });

    server.serve_stdio().await?;
    tracing::info!("gitlab_mcp_stopped");
    Ok(())
}

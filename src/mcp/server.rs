//! MCP stdio server: read loop and response writer.
//!
//! Requests are handled one at a time in arrival order. The loop ends on EOF
//! or when the cancellation token fires between requests.

use crate::mcp::codec::{read_frame, write_message, Frame};
use crate::mcp::protocol::{Response, RpcError, INVALID_REQUEST};
use crate::mcp::router::Router;
use crate::types::ServerConfig;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct McpServer {
    router: Router,
    max_message_bytes: usize,
    cancel: CancellationToken,
}

impl McpServer {
    pub fn new(router: Router, config: &ServerConfig) -> Self {
        Self {
            router,
            max_message_bytes: config.max_message_bytes,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the loop; clone it into signal handlers.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve on the process's stdin/stdout.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        self.serve(reader, writer).await
    }

    /// Serve until EOF or cancellation.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(max_message_bytes = self.max_message_bytes, "mcp_server_started");

        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("mcp_server_cancelled");
                    break;
                }
                frame = read_frame(&mut reader, self.max_message_bytes) => frame?,
            };

            let response = match frame {
                None => {
                    tracing::info!("mcp_input_closed");
                    break;
                }
                Some(Frame::Line(line)) if line.iter().all(u8::is_ascii_whitespace) => continue,
                Some(Frame::Line(line)) => self.router.handle_line(&line).await,
                Some(Frame::Oversized(size)) => {
                    tracing::warn!(size, limit = self.max_message_bytes, "mcp_message_too_large");
                    Some(Response::failure(
                        Value::Null,
                        RpcError::new(
                            INVALID_REQUEST,
                            format!("Message exceeds {} bytes", self.max_message_bytes),
                        ),
                    ))
                }
            };

            if let Some(response) = response {
                write_message(&mut writer, &response).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::transport::MockTransport;
    use crate::mcp::router::ServerInfo;
    use crate::mcp::protocol::PARSE_ERROR;
    use crate::tools::Gateway;
    use crate::types::{Config, GitLabConfig};
    use serde_json::json;
    use std::sync::Arc;

    fn server(max_message_bytes: usize) -> McpServer {
        let config = Config {
            gitlab: GitLabConfig {
                token: "glpat-test".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let gateway = Gateway::new(&config, Arc::new(MockTransport::new())).unwrap();
        McpServer::new(
            Router::new(Arc::new(gateway), ServerInfo::default()),
            &ServerConfig { max_message_bytes },
        )
    }

    async fn run(server: &McpServer, input: &str) -> Vec<Response> {
        let mut out = Vec::new();
        server.serve(BufReader::new(input.as_bytes()), &mut out).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_answers_in_order_and_skips_notifications() {
        let input = [
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }).to_string(),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
            String::new(),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" }).to_string(),
        ]
        .join("\n");

        let responses = run(&server(1024), &input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id, json!(1));
        assert_eq!(responses[1], Response::success(json!(2), json!({})));
    }

    #[tokio::test]
    async fn test_oversized_and_garbage_lines_keep_loop_alive() {
        let padding = "x".repeat(200);
        let input = format!(
            "{{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\",\"pad\":\"{}\"}}\nnot json\n{}\n",
            padding,
            json!({ "jsonrpc": "2.0", "id": 3, "method": "ping" })
        );

        let responses = run(&server(128), &input).await;
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].id, Value::Null);
        assert_eq!(responses[0].error.as_ref().unwrap().code, INVALID_REQUEST);
        assert_eq!(responses[1].error.as_ref().unwrap().code, PARSE_ERROR);
        assert_eq!(responses[2].id, json!(3));
    }

    #[tokio::test]
    async fn test_cancellation_stops_pending_read() {
        let server = server(1024);
        let (_client, server_side) = tokio::io::duplex(64);
        let (read_half, write_half) = tokio::io::split(server_side);
        let token = server.cancellation_token();
        token.cancel();
        server.serve(BufReader::new(read_half), write_half).await.unwrap();
        assert!(server.cancellation_token().is_cancelled());
    }
}

//! MCP method router: JSON-RPC method name to gateway operation.

use crate::mcp::protocol::{
    CallToolParams, Request, Response, RpcError, DEFAULT_PROTOCOL_VERSION, INVALID_PARAMS,
    INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::tools::Gateway;
use crate::types::Error;
use serde_json::{json, Value};
use std::sync::Arc;

/// Name and version reported in the `initialize` answer.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    gateway: Arc<Gateway>,
    info: ServerInfo,
}

impl Router {
    pub fn new(gateway: Arc<Gateway>, info: ServerInfo) -> Self {
        Self { gateway, info }
    }

    /// Handle one raw line. `None` means nothing is written back.
    pub async fn handle_line(&self, line: &[u8]) -> Option<Response> {
        let value: Value = match serde_json::from_slice(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "mcp_parse_error");
                return Some(Response::failure(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        let id = value.get("id").cloned();
        let request: Request = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(Response::failure(
                    id.unwrap_or(Value::Null),
                    RpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                ));
            }
        };
        self.handle(request).await
    }

    /// Route a decoded request. Notifications never produce a response.
    pub async fn handle(&self, request: Request) -> Option<Response> {
        if let Some(version) = request.jsonrpc.as_deref() {
            if version != JSONRPC_VERSION {
                return request.id.map(|id| {
                    Response::failure(
                        id,
                        RpcError::new(INVALID_REQUEST, format!("Unsupported jsonrpc version: {}", version)),
                    )
                });
            }
        }

        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "mcp_notification");
            return None;
        };
        tracing::debug!(method = %request.method, "mcp_request");

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.gateway.list_tools() })),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        Some(match outcome {
            Ok(result) => Response::success(id, result),
            Err(error) => Response::failure(id, error),
        })
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        tracing::info!(protocol_version, "mcp_initialize");

        json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": self.info.name, "version": self.info.version },
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| RpcError::new(INVALID_PARAMS, "Missing params"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))
            })?;

        match self.gateway.dispatch(&params.name, params.arguments).await {
            Ok(response) => serde_json::to_value(response)
                .map_err(|e| tool_error(&params.name, &Error::Serialization(e))),
            Err(err) => Err(tool_error(&params.name, &err)),
        }
    }
}

/// JSON-RPC error for a failed tool call. `data` carries the tool name, the
/// error kind and the backend status when GitLab answered.
pub fn tool_error(tool: &str, err: &Error) -> RpcError {
    let mut data = json!({ "tool": tool, "kind": err.kind() });
    if let Error::Backend(backend) = err {
        data["status"] = json!(backend.status);
    }
    if let Error::Validation(errors) = err {
        data["fields"] = json!(errors
            .fields()
            .iter()
            .map(|f| json!({ "path": f.path, "reason": f.reason }))
            .collect::<Vec<_>>());
    }
    RpcError::new(err.rpc_code(), format!("Error executing tool {}: {}", tool, err)).with_data(data)
}

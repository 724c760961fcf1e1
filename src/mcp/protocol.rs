//! JSON-RPC 2.0 message types for the MCP stdio transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version answered when the client does not name one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Incoming request or notification. Notifications carry no `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Outgoing response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// `tools/call` parameters. A missing `arguments` stays `None` so dispatch
/// can reject it.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_has_no_id() {
        let req: Request =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })).unwrap();
        assert!(req.is_notification());

        let req: Request = serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 0, "method": "ping" })).unwrap();
        assert!(!req.is_notification());
    }

    #[test]
    fn test_response_omits_unset_half() {
        let ok = serde_json::to_value(Response::success(json!(1), json!({}))).unwrap();
        assert_eq!(ok, json!({ "jsonrpc": "2.0", "id": 1, "result": {} }));

        let err = serde_json::to_value(Response::failure(
            json!("a"),
            RpcError::new(METHOD_NOT_FOUND, "Method not found: x"),
        ))
        .unwrap();
        assert_eq!(
            err,
            json!({ "jsonrpc": "2.0", "id": "a", "error": { "code": -32601, "message": "Method not found: x" } })
        );
    }

    #[test]
    fn test_call_params_keep_missing_arguments() {
        let params: CallToolParams = serde_json::from_value(json!({ "name": "get_issue" })).unwrap();
        assert!(params.arguments.is_none());
    }
}

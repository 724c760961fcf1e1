//! HTTP transport capability.
//!
//! One method: send a request, get status, headers and body back. Proxy,
//! TLS and timeout concerns stay behind this trait.

use crate::types::{Error, GitLabConfig, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// One outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Performs one HTTP request. Network failures are `Error::Transport`;
/// non-success statuses are returned, not raised.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport with optional per-scheme proxies.
pub struct ReqwestTransport {
    client: Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Build the client from connection settings.
    ///
    /// Proxy URLs may use `http`, `https` or `socks5` schemes.
    pub fn new(config: &GitLabConfig) -> Result<Self> {
        // Only the configured proxies apply, never ambient system ones.
        let mut builder = Client::builder()
            .no_proxy()
            .timeout(config.request_timeout)
            .user_agent(concat!("gitlab-mcp/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = &config.http_proxy {
            let proxy = reqwest::Proxy::http(proxy).map_err(|e| {
                Error::configuration(format!("invalid HTTP_PROXY '{}': {}", proxy, e))
            })?;
            builder = builder.proxy(proxy);
        }
        if let Some(proxy) = &config.https_proxy {
            let proxy = reqwest::Proxy::https(proxy).map_err(|e| {
                Error::configuration(format!("invalid HTTPS_PROXY '{}': {}", proxy, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("x-total".to_string(), "42".to_string());
        let response = HttpResponse {
            status: 200,
            headers,
            ..Default::default()
        };
        assert!(response.is_success());
        assert_eq!(response.header("X-Total"), Some("42"));
        assert_eq!(response.header("x-total-pages"), None);
    }

    #[test]
    fn test_rejects_malformed_proxy() {
        let config = GitLabConfig {
            https_proxy: Some("http://[bad".to_string()),
            request_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        let err = ReqwestTransport::new(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_accepts_socks_proxy() {
        let config = GitLabConfig {
            https_proxy: Some("socks5://127.0.0.1:1080".to_string()),
            ..Default::default()
        };
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}

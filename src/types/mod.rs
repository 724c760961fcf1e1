//! Core types for the GitLab MCP server.
//!
//! This module provides foundational types used throughout the system:
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration resolved once at startup

mod config;
mod errors;

pub use config::{
    env, normalize_api_url, Config, GitLabConfig, ObservabilityConfig, ServerConfig,
    DEFAULT_API_URL,
};
pub use errors::{BackendError, BackendErrorKind, Error, Result, RATE_LIMIT_PHRASE};

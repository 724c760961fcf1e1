//! # gitlab-mcp - GitLab REST API as MCP tools
//!
//! Exposes a curated set of GitLab REST v4 operations to MCP clients over
//! stdio:
//! - A static tool catalog with typed parameter schemas
//! - Mode-based visibility (read-only, wiki, pipeline, milestone)
//! - Argument validation before any network call
//! - A pluggable HTTP transport, mockable in tests
//! - JSON-RPC 2.0 framing with structured error data
//!
//! ## Architecture
//!
//! ```text
//!   stdin → McpServer → Router → Gateway ──┬─ ToolCatalog (schemas)
//!                                          ├─ visibility filter
//!                                          └─ handlers → GitLabApi → Transport
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "mcp-stdio")]
pub mod cli;
pub mod gitlab;
pub mod mcp;
pub mod tools;
pub mod types;
pub mod validation;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, Result};

//! Dispatch gateway: one entry point from `(name, args)` to a response.
//!
//! The gateway owns the catalog, the handler registry and the exposed
//! (filtered) listing. All three are built once and never mutated.

use crate::gitlab::{GitLabApi, Transport};
use crate::tools::catalog::{strip_dialect, ToolCatalog, ToolEntry};
use crate::tools::handlers;
use crate::tools::visibility::{self, ModeFlags};
use crate::types::{Config, Error, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Future returned by a handler.
pub type InvokeFuture<'a> = BoxFuture<'a, Result<ToolOutput>>;

/// Handler signature. Arguments are already validated and defaulted.
pub type Invoke = for<'a> fn(&'a GitLabApi, Value) -> InvokeFuture<'a>;

/// Tagged handler record: metadata plus implementation.
#[derive(Clone)]
pub struct Tool {
    pub entry: ToolEntry,
    pub invoke: Invoke,
}

impl Tool {
    pub fn new(entry: ToolEntry, invoke: Invoke) -> Self {
        Self { entry, invoke }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool").field("name", &self.entry.name).finish()
    }
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Serialized as pretty JSON.
    Json(Value),
    /// Passed through verbatim (job logs).
    Text(String),
}

impl ToolOutput {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(ToolOutput::Json(serde_json::to_value(value)?))
    }

    pub fn into_response(self) -> Result<ToolResponse> {
        let text = match self {
            ToolOutput::Json(value) => serde_json::to_string_pretty(&value)?,
            ToolOutput::Text(text) => text,
        };
        Ok(ToolResponse::text(text))
    }
}

/// One content block of a tool response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Success envelope: `{content: [{type: "text", text}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<TextContent>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent {
                content_type: "text".to_string(),
                text: text.into(),
            }],
        }
    }
}

/// Listing form of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    fn from_entry(entry: &ToolEntry) -> Self {
        Self {
            name: entry.name.clone(),
            description: entry.description.clone(),
            input_schema: strip_dialect(&entry.input_schema()),
        }
    }
}

pub struct Gateway {
    api: GitLabApi,
    catalog: ToolCatalog,
    registry: HashMap<String, Invoke>,
    exposed: Vec<ToolDescriptor>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("api", &self.api)
            .field("tools", &self.catalog.len())
            .field("exposed", &self.exposed.len())
            .finish()
    }
}

impl Gateway {
    /// Build the gateway with every GitLab tool.
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let api = GitLabApi::new(&config.gitlab, transport)?;
        Self::with_tools(api, handlers::all_tools(), &config.features)
    }

    /// Build from an explicit tool list.
    pub fn with_tools(api: GitLabApi, tools: Vec<Tool>, flags: &ModeFlags) -> Result<Self> {
        let mut catalog = ToolCatalog::new();
        let mut registry = HashMap::with_capacity(tools.len());
        for tool in tools {
            registry.insert(tool.entry.name.clone(), tool.invoke);
            catalog.register(tool.entry)?;
        }
        Self::from_parts(api, catalog, registry, flags)
    }

    /// Assemble from a catalog and a registry built separately.
    ///
    /// Fails when a cataloged name has no handler.
    pub fn from_parts(
        api: GitLabApi,
        catalog: ToolCatalog,
        registry: HashMap<String, Invoke>,
        flags: &ModeFlags,
    ) -> Result<Self> {
        let missing: Vec<&str> = catalog
            .list_names()
            .into_iter()
            .filter(|name| !registry.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::configuration(format!(
                "tools without a handler: {}",
                missing.join(", ")
            )));
        }

        for (group, name) in visibility::unmatched_members(catalog.list_names()) {
            tracing::warn!(group = group.as_str(), tool = name, "group_member_not_cataloged");
        }

        let exposed: Vec<ToolDescriptor> = visibility::filter(catalog.list_entries(), flags)
            .iter()
            .map(ToolDescriptor::from_entry)
            .collect();

        tracing::info!(
            cataloged = catalog.len(),
            exposed = exposed.len(),
            read_only = flags.read_only,
            wiki = flags.wiki,
            pipeline = flags.pipeline,
            milestone = flags.milestone,
            "gateway_ready"
        );

        Ok(Self {
            api,
            catalog,
            registry,
            exposed,
        })
    }

    /// Tools listed to callers, in catalog order, without `$schema`.
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.exposed
    }

    /// The full catalog, regardless of mode flags.
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Run one invocation.
    ///
    /// Visibility is not re-checked: a registered tool hidden from the
    /// listing still dispatches.
    pub async fn dispatch(&self, name: &str, args: Option<Value>) -> Result<ToolResponse> {
        let span = tracing::info_span!("dispatch", tool = %name);
        async move {
            let started = Instant::now();
            let result = self.dispatch_inner(name, args).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => tracing::info!(elapsed_ms, "tool_completed"),
                Err(e) => tracing::warn!(kind = e.kind(), error = %e, elapsed_ms, "tool_failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch_inner(&self, name: &str, args: Option<Value>) -> Result<ToolResponse> {
        let args = args.ok_or(Error::MissingArguments)?;
        let invoke = self
            .registry
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;
        let args = self.catalog.validate_params(name, &args)?;
        let output = invoke(&self.api, args).await?;
        output.into_response()
    }
}

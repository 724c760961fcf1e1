//! Tool infrastructure: catalog, visibility, dispatch and the GitLab handlers.
//!
//! The catalog holds typed metadata and argument shapes. Visibility decides
//! what `tools/list` shows. The gateway validates a call against the catalog
//! and hands it to the registered handler.

pub mod catalog;
pub mod gateway;
pub mod handlers;
pub mod visibility;

pub use catalog::{ParamDef, ParamType, ToolCatalog, ToolEntry};
pub use gateway::{Gateway, Tool, ToolDescriptor, ToolOutput, ToolResponse};
pub use visibility::{ModeFlags, ToolGroup};

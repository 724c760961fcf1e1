//! Tool handlers, one module per GitLab resource.
//!
//! Each module exposes `tools()`: its catalog entries paired with their
//! handler functions. Handlers receive arguments the gateway has already
//! validated against the entry's shape.

pub mod issues;
pub mod labels;
pub mod merge_requests;
pub mod milestones;
pub mod namespaces;
pub mod pipelines;
pub mod projects;
pub mod repository;
pub mod wiki;

use crate::tools::catalog::{ParamDef, ParamType};
use crate::tools::gateway::Tool;
use crate::types::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Every tool, in listing order.
pub fn all_tools() -> Vec<Tool> {
    let mut tools = Vec::new();
    tools.extend(repository::tools());
    tools.extend(issues::tools());
    tools.extend(merge_requests::tools());
    tools.extend(namespaces::tools());
    tools.extend(projects::tools());
    tools.extend(labels::tools());
    tools.extend(wiki::tools());
    tools.extend(pipelines::tools());
    tools.extend(milestones::tools());
    tools
}

/// Deserialize validated arguments into a handler's typed struct.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| Error::validation("arguments", e.to_string()))
}

// Shared parameter definitions.

pub(crate) fn project_id() -> ParamDef {
    ParamDef::required("project_id", ParamType::String, "Project ID or URL-encoded path")
}

pub(crate) fn page() -> ParamDef {
    ParamDef::optional("page", ParamType::UInt, "Page number for pagination")
}

pub(crate) fn per_page() -> ParamDef {
    ParamDef::optional("per_page", ParamType::UInt, "Number of items per page")
}

pub(crate) fn optional_bool(name: &str, description: &str) -> ParamDef {
    ParamDef::optional(name, ParamType::Bool, description)
}

pub(crate) fn optional_str(name: &str, description: &str) -> ParamDef {
    ParamDef::optional(name, ParamType::String, description)
}

pub(crate) fn optional_int(name: &str, description: &str) -> ParamDef {
    ParamDef::optional(name, ParamType::UInt, description)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_unique_and_shapes_render() {
        let tools = all_tools();
        let mut seen = HashSet::new();
        for tool in &tools {
            assert!(seen.insert(tool.entry.name.clone()), "duplicate {}", tool.entry.name);
            let schema = tool.entry.input_schema();
            assert_eq!(schema["type"], "object", "{}", tool.entry.name);
        }
    }

    #[test]
    fn test_every_group_member_is_cataloged() {
        let tools = all_tools();
        let unmatched =
            crate::tools::visibility::unmatched_members(tools.iter().map(|t| t.entry.name.as_str()));
        assert!(unmatched.is_empty(), "{unmatched:?}");
    }

    #[test]
    fn test_schemas_compile_and_strip_preserves_verdicts() {
        use serde_json::json;
        let samples = [
            json!({}),
            json!({ "project_id": "42" }),
            json!({ "project_id": "42", "issue_iid": 7 }),
            json!({ "project_id": 42, "issue_iid": "7" }),
            json!({ "project_id": "42", "issue_iid": 7, "extra": true }),
        ];

        for tool in all_tools() {
            let full = tool.entry.input_schema();
            let stripped = crate::tools::catalog::strip_dialect(&full);
            let full_validator = jsonschema::validator_for(&full).unwrap();
            let stripped_validator = jsonschema::validator_for(&stripped).unwrap();
            for sample in &samples {
                assert_eq!(
                    full_validator.is_valid(sample),
                    stripped_validator.is_valid(sample),
                    "{} on {}",
                    tool.entry.name,
                    sample
                );
            }
        }
    }

    #[test]
    fn test_parse_args_failure_is_validation() {
        #[derive(Debug, serde::Deserialize)]
        struct Args {
            #[allow(dead_code)]
            iid: u64,
        }
        let err = parse_args::<Args>(serde_json::json!({ "iid": "x" })).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}

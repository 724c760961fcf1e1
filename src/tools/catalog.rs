//! Tool catalog: typed metadata, argument shapes, validation, JSON Schema.
//!
//! Owns tool *metadata* only. Handlers live in `tools::handlers` and are
//! paired with their entries by the gateway.

use crate::types::{Error, Result};
use crate::validation::{join_path, ValidationErrors};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// JSON Schema dialect advertised on rendered input schemas.
pub const SCHEMA_DIALECT: &str = "http://json-schema.org/draft-07/schema#";

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    /// Integer `>= 0`: ids, iids and paging.
    UInt,
    Float,
    Bool,
    Enum(Vec<String>),
    Array(Box<ParamType>),
    Object(Vec<ParamDef>),
    /// Accepts the first alternative that validates cleanly.
    OneOf(Vec<ParamType>),
    /// Nullable: `null` or the inner type.
    Optional(Box<ParamType>),
}

impl ParamType {
    pub fn enumeration(variants: &[&str]) -> Self {
        ParamType::Enum(variants.iter().map(|v| v.to_string()).collect())
    }

    pub fn array_of(item: ParamType) -> Self {
        ParamType::Array(Box::new(item))
    }

    pub fn nullable(inner: ParamType) -> Self {
        ParamType::Optional(Box::new(inner))
    }

    /// Check `value`, recording failures under `path`, and return the
    /// normalized value (unknown object keys dropped, defaults filled in).
    pub(crate) fn normalize(&self, value: &Value, path: &str, errors: &mut ValidationErrors) -> Value {
        match self {
            ParamType::String => {
                if !value.is_string() {
                    errors.push(path, format!("expected string, got {}", value_type_name(value)));
                }
                value.clone()
            }
            ParamType::Int => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => value.clone(),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
                    _ => {
                        errors.push(path, "expected integer, got number");
                        value.clone()
                    }
                },
                _ => {
                    errors.push(path, format!("expected integer, got {}", value_type_name(value)));
                    value.clone()
                }
            },
            ParamType::UInt => {
                let normalized = ParamType::Int.normalize(value, path, errors);
                if normalized.as_i64().is_some_and(|n| n < 0) {
                    errors.push(path, format!("expected non-negative integer, got {}", normalized));
                }
                normalized
            }
            ParamType::Float => {
                if !value.is_number() {
                    errors.push(path, format!("expected number, got {}", value_type_name(value)));
                }
                value.clone()
            }
            ParamType::Bool => {
                if !value.is_boolean() {
                    errors.push(path, format!("expected boolean, got {}", value_type_name(value)));
                }
                value.clone()
            }
            ParamType::Enum(variants) => {
                match value.as_str() {
                    Some(s) if variants.iter().any(|v| v == s) => {}
                    Some(s) => errors.push(
                        path,
                        format!(
                            "invalid enum value '{}', expected one of: {}",
                            s,
                            variants.join(", ")
                        ),
                    ),
                    None => errors.push(
                        path,
                        format!("expected string for enum, got {}", value_type_name(value)),
                    ),
                }
                value.clone()
            }
            ParamType::Array(item) => match value.as_array() {
                Some(items) => Value::Array(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, v)| item.normalize(v, &join_path(path, &i.to_string()), errors))
                        .collect(),
                ),
                None => {
                    errors.push(path, format!("expected array, got {}", value_type_name(value)));
                    value.clone()
                }
            },
            ParamType::Object(fields) => normalize_object(fields, value, path, errors),
            ParamType::OneOf(alternatives) => {
                for alternative in alternatives {
                    let mut scratch = ValidationErrors::new();
                    let normalized = alternative.normalize(value, path, &mut scratch);
                    if scratch.is_empty() {
                        return normalized;
                    }
                }
                errors.push(
                    path,
                    format!(
                        "expected {}, got {}",
                        self.display_name(),
                        value_type_name(value)
                    ),
                );
                value.clone()
            }
            ParamType::Optional(inner) => {
                if value.is_null() {
                    Value::Null
                } else {
                    inner.normalize(value, path, errors)
                }
            }
        }
    }

    /// Human-readable type name used in error messages.
    pub fn display_name(&self) -> String {
        match self {
            ParamType::String => "string".to_string(),
            ParamType::Int => "integer".to_string(),
            ParamType::UInt => "non-negative integer".to_string(),
            ParamType::Float => "number".to_string(),
            ParamType::Bool => "boolean".to_string(),
            ParamType::Enum(variants) => format!("enum({})", variants.join("|")),
            ParamType::Array(item) => format!("{}[]", item.display_name()),
            ParamType::Object(_) => "object".to_string(),
            ParamType::OneOf(alternatives) => alternatives
                .iter()
                .map(ParamType::display_name)
                .collect::<Vec<_>>()
                .join(" | "),
            ParamType::Optional(inner) => format!("{}?", inner.display_name()),
        }
    }

    /// Render this type as a JSON Schema fragment.
    pub fn json_schema(&self) -> Value {
        match self {
            ParamType::String => serde_json::json!({ "type": "string" }),
            ParamType::Int => serde_json::json!({ "type": "integer" }),
            ParamType::UInt => serde_json::json!({ "type": "integer", "minimum": 0 }),
            ParamType::Float => serde_json::json!({ "type": "number" }),
            ParamType::Bool => serde_json::json!({ "type": "boolean" }),
            ParamType::Enum(variants) => serde_json::json!({ "type": "string", "enum": variants }),
            ParamType::Array(item) => serde_json::json!({ "type": "array", "items": item.json_schema() }),
            ParamType::Object(fields) => object_schema(fields),
            ParamType::OneOf(alternatives) => serde_json::json!({
                "anyOf": alternatives.iter().map(ParamType::json_schema).collect::<Vec<_>>(),
            }),
            ParamType::Optional(inner) => serde_json::json!({
                "anyOf": [inner.json_schema(), { "type": "null" }],
            }),
        }
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn normalize_object(fields: &[ParamDef], value: &Value, path: &str, errors: &mut ValidationErrors) -> Value {
    let Some(map) = value.as_object() else {
        errors.push(path, format!("expected object, got {}", value_type_name(value)));
        return value.clone();
    };

    let mut out = Map::new();
    for field in fields {
        let field_path = join_path(path, &field.name);
        let provided = map.get(&field.name).filter(|v| {
            // An explicit null on a non-nullable optional field counts as absent.
            !(v.is_null() && !field.required && !matches!(field.param_type, ParamType::Optional(_)))
        });

        match provided {
            Some(v) => {
                let normalized = field.param_type.normalize(v, &field_path, errors);
                out.insert(field.name.clone(), normalized);
            }
            None => {
                if let Some(default) = &field.default {
                    out.insert(field.name.clone(), default.clone());
                } else if field.is_required() {
                    errors.push(field_path, "Required");
                }
            }
        }
    }
    Value::Object(out)
}

fn object_schema(fields: &[ParamDef]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.clone(), field.json_schema());
        if field.is_required() {
            required.push(Value::String(field.name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema.insert("additionalProperties".to_string(), Value::Bool(false));
    Value::Object(schema)
}

// =============================================================================
// Parameter definition
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Fill `default` when the caller omits the field; never required.
    pub fn with_default(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required && self.default.is_none()
    }

    fn json_schema(&self) -> Value {
        let mut schema = self.param_type.json_schema();
        if let Some(map) = schema.as_object_mut() {
            if !self.description.is_empty() {
                map.insert("description".to_string(), Value::String(self.description.clone()));
            }
            if let Some(default) = &self.default {
                map.insert("default".to_string(), default.clone());
            }
        }
        schema
    }
}

// =============================================================================
// Tool entry
// =============================================================================

/// Complete tool metadata entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

impl ToolEntry {
    pub fn new(name: &str, description: &str, parameters: Vec<ParamDef>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Full input schema, including the `$schema` dialect marker.
    pub fn input_schema(&self) -> Value {
        let mut schema = object_schema(&self.parameters);
        if let Some(map) = schema.as_object_mut() {
            map.insert("$schema".to_string(), Value::String(SCHEMA_DIALECT.to_string()));
        }
        schema
    }

    /// Validate raw arguments and return them normalized.
    pub fn validate_args(&self, args: &Value) -> Result<Value> {
        let mut errors = ValidationErrors::new();
        let normalized = normalize_object(&self.parameters, args, "", &mut errors);
        errors.into_result()?;
        Ok(normalized)
    }
}

/// Remove the `$schema` dialect marker, which some MCP clients reject.
pub fn strip_dialect(schema: &Value) -> Value {
    let mut stripped = schema.clone();
    if let Some(map) = stripped.as_object_mut() {
        map.remove("$schema");
    }
    stripped
}

// =============================================================================
// Tool catalog
// =============================================================================

/// In-memory, insertion-ordered tool catalog. Owns metadata, not implementations.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool entry. Names must be non-empty and unique.
    pub fn register(&mut self, entry: ToolEntry) -> Result<()> {
        if entry.name.is_empty() {
            return Err(Error::configuration("Tool name cannot be empty"));
        }
        if self.index.contains_key(&entry.name) {
            return Err(Error::configuration(format!(
                "Tool registered twice: {}",
                entry.name
            )));
        }
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Get a tool entry by name.
    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Check if a tool exists.
    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tool names in registration order.
    pub fn list_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// All tool entries in registration order.
    pub fn list_entries(&self) -> &[ToolEntry] {
        &self.entries
    }

    /// Validate arguments against a tool's parameter definitions.
    ///
    /// Returns the normalized arguments or one aggregated validation error.
    pub fn validate_params(&self, name: &str, params: &Value) -> Result<Value> {
        let entry = self
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;
        entry.validate_args(params)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_entry() -> ToolEntry {
        ToolEntry::new(
            "push_files",
            "Push multiple files to a GitLab project in a single commit",
            vec![
                ParamDef::required("project_id", ParamType::String, "Project ID or URL-encoded path"),
                ParamDef::required("branch", ParamType::String, "Branch to push to"),
                ParamDef::required(
                    "files",
                    ParamType::array_of(ParamType::Object(vec![
                        ParamDef::required("file_path", ParamType::String, "Path where to create the file"),
                        ParamDef::required("content", ParamType::String, "Content of the file"),
                    ])),
                    "Array of files to push",
                ),
                ParamDef::optional("per_page", ParamType::Int, "Number of results per page")
                    .with_default(json!(20)),
                ParamDef::optional(
                    "state",
                    ParamType::enumeration(&["opened", "closed"]),
                    "Issue state",
                ),
            ],
        )
    }

    #[test]
    fn test_register_and_get() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        assert!(catalog.has_tool("push_files"));
        assert!(!catalog.has_tool("nonexistent"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get("push_files").unwrap().description,
            "Push multiple files to a GitLab project in a single commit"
        );
    }

    #[test]
    fn test_register_empty_name_fails() {
        let mut catalog = ToolCatalog::new();
        let mut entry = sample_entry();
        entry.name = String::new();
        assert!(catalog.register(entry).is_err());
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();
        let err = catalog.register(sample_entry()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_order_is_registration_order() {
        let mut catalog = ToolCatalog::new();
        for name in ["zeta", "alpha", "mid"] {
            catalog.register(ToolEntry::new(name, "", vec![])).unwrap();
        }
        assert_eq!(catalog.list_names(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_validate_fills_defaults_and_drops_unknown() {
        let entry = sample_entry();
        let args = json!({
            "project_id": "group/app",
            "branch": "main",
            "files": [{ "file_path": "a.txt", "content": "hi", "mode": "100644" }],
            "bogus": true,
        });

        let normalized = entry.validate_args(&args).unwrap();
        assert_eq!(normalized["per_page"], 20);
        assert!(normalized.get("bogus").is_none());
        assert!(normalized["files"][0].get("mode").is_none());
    }

    #[test]
    fn test_validate_aggregates_every_failure() {
        let entry = sample_entry();
        let args = json!({
            "branch": 7,
            "files": [{ "file_path": "a.txt" }, { "file_path": 3, "content": "x" }],
            "state": "merged",
        });

        let err = entry.validate_args(&args).unwrap_err();
        let Error::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.paths(),
            vec!["project_id", "branch", "files.0.content", "files.1.file_path", "state"]
        );
    }

    #[test]
    fn test_null_on_optional_field_is_absent() {
        let entry = sample_entry();
        let args = json!({ "project_id": "1", "branch": "b", "files": [], "state": null });
        let normalized = entry.validate_args(&args).unwrap();
        assert!(normalized.get("state").is_none());
    }

    #[test]
    fn test_validate_params_unknown_tool() {
        let catalog = ToolCatalog::new();
        assert!(matches!(
            catalog.validate_params("nonexistent", &json!({})),
            Err(Error::UnknownTool(_))
        ));
    }

    fn check(pt: &ParamType, value: &Value) -> std::result::Result<(), String> {
        let mut errors = ValidationErrors::new();
        pt.normalize(value, "", &mut errors);
        match errors.fields().first() {
            None => Ok(()),
            Some(first) => Err(first.to_string()),
        }
    }

    #[test]
    fn test_uint_rejects_negative_values() {
        let mut errors = ValidationErrors::new();
        assert_eq!(ParamType::UInt.normalize(&json!(0), "page", &mut errors), json!(0));
        assert_eq!(ParamType::UInt.normalize(&json!(3.0), "page", &mut errors), json!(3));
        assert!(errors.is_empty());

        ParamType::UInt.normalize(&json!(-1), "issue_iid", &mut errors);
        ParamType::UInt.normalize(&json!("x"), "page", &mut errors);
        assert_eq!(errors.paths(), vec!["issue_iid", "page"]);
        assert!(errors.fields()[0].reason.contains("non-negative"));
        assert_eq!(ParamType::UInt.json_schema(), json!({ "type": "integer", "minimum": 0 }));
    }

    #[test]
    fn test_one_of_accepts_either_alternative() {
        let pt = ParamType::OneOf(vec![ParamType::Int, ParamType::String]);
        assert!(check(&pt, &json!(12)).is_ok());
        assert!(check(&pt, &json!("bug")).is_ok());
        let err = check(&pt, &json!(true)).unwrap_err();
        assert!(err.contains("integer | string"));
    }

    #[test]
    fn test_int_accepts_integral_floats() {
        let mut errors = ValidationErrors::new();
        assert_eq!(ParamType::Int.normalize(&json!(7.0), "iid", &mut errors), json!(7));
        assert!(errors.is_empty());
        assert!(check(&ParamType::Int, &json!(7.5)).is_err());
    }

    #[test]
    fn test_param_type_enum_validation() {
        let pt = ParamType::enumeration(&["asc", "desc"]);
        assert!(check(&pt, &json!("asc")).is_ok());
        assert!(check(&pt, &json!("bad")).is_err());
        assert!(check(&pt, &json!(42)).is_err());
    }

    #[test]
    fn test_nullable_validation() {
        let pt = ParamType::nullable(ParamType::Int);
        assert!(check(&pt, &json!(null)).is_ok());
        assert!(check(&pt, &json!(3)).is_ok());
        assert!(check(&pt, &json!("3")).is_err());
    }

    #[test]
    fn test_input_schema_shape() {
        let schema = sample_entry().input_schema();
        assert_eq!(schema["$schema"], SCHEMA_DIALECT);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["project_id", "branch", "files"]));
        assert_eq!(schema["properties"]["per_page"]["default"], 20);
        assert_eq!(schema["properties"]["files"]["items"]["required"], json!(["file_path", "content"]));
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_strip_dialect_only_removes_marker() {
        let schema = sample_entry().input_schema();
        let stripped = strip_dialect(&schema);
        assert!(stripped.get("$schema").is_none());
        assert_eq!(stripped["properties"], schema["properties"]);
        assert_eq!(stripped["required"], schema["required"]);
    }
}

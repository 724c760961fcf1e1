//! Project label tools.

use super::{optional_bool, optional_str, parse_args, project_id};
use crate::gitlab::models::{DeleteStatus, Label};
use crate::gitlab::{query_pairs, with_query, GitLabApi};
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::gateway::{InvokeFuture, Tool, ToolOutput};
use crate::types::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

fn label_id() -> ParamDef {
    ParamDef::required(
        "label_id",
        ParamType::OneOf(vec![ParamType::UInt, ParamType::String]),
        "The ID or title of a group's label",
    )
}

fn priority() -> ParamDef {
    ParamDef::optional(
        "priority",
        ParamType::nullable(ParamType::UInt),
        "The priority of the label; null removes it",
    )
}

pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            ToolEntry::new(
                "list_labels",
                "List labels for a project",
                vec![
                    project_id(),
                    optional_bool("with_counts", "Whether or not to include issue and merge request counts"),
                    optional_bool("include_ancestor_groups", "Include ancestor groups"),
                    optional_str("search", "Keyword to filter labels by"),
                ],
            ),
            list_labels,
        ),
        Tool::new(
            ToolEntry::new(
                "get_label",
                "Get a single label from a project",
                vec![
                    project_id(),
                    label_id(),
                    optional_bool("include_ancestor_groups", "Include ancestor groups"),
                ],
            ),
            get_label,
        ),
        Tool::new(
            ToolEntry::new(
                "create_label",
                "Create a new label in a project",
                vec![
                    project_id(),
                    ParamDef::required("name", ParamType::String, "The name of the label"),
                    ParamDef::required(
                        "color",
                        ParamType::String,
                        "The color of the label given in 6-digit hex notation with leading '#' sign",
                    ),
                    optional_str("description", "The description of the label"),
                    priority(),
                ],
            ),
            create_label,
        ),
        Tool::new(
            ToolEntry::new(
                "update_label",
                "Update an existing label in a project",
                vec![
                    project_id(),
                    label_id(),
                    optional_str("new_name", "The new name of the label"),
                    optional_str("color", "The color of the label given in 6-digit hex notation with leading '#' sign"),
                    optional_str("description", "The new description of the label"),
                    priority(),
                ],
            ),
            update_label,
        ),
        Tool::new(
            ToolEntry::new(
                "delete_label",
                "Delete a label from a project",
                vec![project_id(), label_id()],
            ),
            delete_label,
        ),
    ]
}

/// Numeric id or label title; both address the same endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum LabelId {
    Id(u64),
    Name(String),
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelId::Id(id) => write!(f, "{}", id),
            LabelId::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LabelRef {
    project_id: String,
    label_id: LabelId,
}

impl LabelRef {
    fn url(&self, api: &GitLabApi) -> Result<reqwest::Url> {
        api.project_url(&self.project_id, &["labels", &self.label_id.to_string()])
    }
}

/// Validated arguments minus routing keys. Nulls survive only on nullable
/// fields, so an explicit `priority: null` reaches GitLab.
fn forward_body(args: &Value, routing: &[&str]) -> Map<String, Value> {
    args.as_object()
        .map(|map| {
            map.iter()
                .filter(|(key, _)| !routing.contains(&key.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Serialize, Deserialize)]
struct ListLabelsArgs {
    project_id: String,
    with_counts: Option<bool>,
    include_ancestor_groups: Option<bool>,
    search: Option<String>,
}

fn list_labels(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ListLabelsArgs = parse_args(args)?;
        let url = with_query(
            api.project_url(&args.project_id, &["labels"])?,
            query_pairs(&args, &["project_id"])?,
        );
        let labels: Vec<Label> = api.get(url).await?;
        ToolOutput::json(&labels)
    })
}

#[derive(Debug, Deserialize)]
struct GetLabelArgs {
    #[serde(flatten)]
    target: LabelRef,
    include_ancestor_groups: Option<bool>,
}

fn get_label(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: GetLabelArgs = parse_args(args)?;
        let url = with_query(
            args.target.url(api)?,
            args.include_ancestor_groups
                .map(|flag| ("include_ancestor_groups", flag.to_string())),
        );
        let label: Label = api.get(url).await?;
        ToolOutput::json(&label)
    })
}

#[derive(Debug, Deserialize)]
struct CreateLabelArgs {
    project_id: String,
}

fn create_label(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let body = forward_body(&args, &["project_id"]);
        let args: CreateLabelArgs = parse_args(args)?;
        let label: Label = api
            .post(api.project_url(&args.project_id, &["labels"])?, &body)
            .await?;
        ToolOutput::json(&label)
    })
}

fn update_label(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let body = forward_body(&args, &["project_id", "label_id"]);
        let target: LabelRef = parse_args(args)?;
        let label: Label = api.put(target.url(api)?, &body).await?;
        ToolOutput::json(&label)
    })
}

fn delete_label(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: LabelRef = parse_args(args)?;
        api.delete(target.url(api)?).await?;
        ToolOutput::json(&DeleteStatus::deleted("Label"))
    })
}

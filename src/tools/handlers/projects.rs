//! Project lookup and listing tools.

use super::{optional_bool, optional_int, optional_str, page, parse_args, per_page, project_id};
use crate::gitlab::models::Project;
use crate::gitlab::{decode_id, query_pairs, with_query, GitLabApi};
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::gateway::{InvokeFuture, Tool, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn order_by(variants: &[&str]) -> ParamDef {
    ParamDef::optional("order_by", ParamType::enumeration(variants), "Return projects ordered by field")
}

fn sort() -> ParamDef {
    ParamDef::optional(
        "sort",
        ParamType::enumeration(&["asc", "desc"]),
        "Return projects sorted in ascending or descending order",
    )
}

fn visibility() -> ParamDef {
    ParamDef::optional(
        "visibility",
        ParamType::enumeration(&["public", "internal", "private"]),
        "Filter by project visibility",
    )
}

pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            ToolEntry::new(
                "get_project",
                "Get details of a specific project",
                vec![project_id()],
            ),
            get_project,
        ),
        Tool::new(
            ToolEntry::new(
                "list_projects",
                "List projects accessible by the current user",
                vec![
                    optional_str("search", "Search term for projects"),
                    page(),
                    per_page(),
                    optional_bool("search_namespaces", "Needs to be true if search is full path"),
                    optional_bool("owned", "Filter for projects owned by current user"),
                    optional_bool("membership", "Filter for projects where current user is a member"),
                    optional_bool("simple", "Return only limited fields"),
                    optional_bool("archived", "Filter for archived projects"),
                    visibility(),
                    order_by(&["id", "name", "path", "created_at", "updated_at", "last_activity_at"]),
                    sort(),
                    optional_bool("with_issues_enabled", "Filter projects with issues feature enabled"),
                    optional_bool("with_merge_requests_enabled", "Filter projects with merge requests feature enabled"),
                    optional_int("min_access_level", "Filter by minimum access level"),
                ],
            ),
            list_projects,
        ),
        Tool::new(
            ToolEntry::new(
                "list_group_projects",
                "List projects in a GitLab group with filtering options",
                vec![
                    ParamDef::required("group_id", ParamType::String, "Group ID or path"),
                    optional_bool("include_subgroups", "Include projects from subgroups"),
                    optional_str("search", "Search term to filter projects"),
                    order_by(&["name", "path", "created_at", "updated_at", "last_activity_at"]),
                    sort(),
                    page(),
                    per_page(),
                    optional_bool("archived", "Filter for archived projects"),
                    visibility(),
                    optional_bool("with_issues_enabled", "Filter projects with issues feature enabled"),
                    optional_bool("with_merge_requests_enabled", "Filter projects with merge requests feature enabled"),
                    optional_int("min_access_level", "Filter by minimum access level"),
                    optional_bool("with_programming_language", "Filter by programming language"),
                    optional_bool("starred", "Filter by starred projects"),
                    optional_bool("statistics", "Include project statistics"),
                    optional_bool("with_custom_attributes", "Include custom attributes"),
                    optional_bool("with_security_reports", "Include security reports"),
                ],
            ),
            list_group_projects,
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct GetProjectArgs {
    project_id: String,
}

fn get_project(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: GetProjectArgs = parse_args(args)?;
        let project: Project = api.get(api.project_url(&args.project_id, &[])?).await?;
        ToolOutput::json(&project)
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct ListProjectsArgs {
    search: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
    search_namespaces: Option<bool>,
    owned: Option<bool>,
    membership: Option<bool>,
    simple: Option<bool>,
    archived: Option<bool>,
    visibility: Option<String>,
    order_by: Option<String>,
    sort: Option<String>,
    with_issues_enabled: Option<bool>,
    with_merge_requests_enabled: Option<bool>,
    min_access_level: Option<u64>,
}

fn list_projects(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ListProjectsArgs = parse_args(args)?;
        let url = with_query(api.url(["projects"])?, query_pairs(&args, &[])?);
        let projects: Vec<Project> = api.get(url).await?;
        ToolOutput::json(&projects)
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct ListGroupProjectsArgs {
    group_id: String,
    include_subgroups: Option<bool>,
    search: Option<String>,
    order_by: Option<String>,
    sort: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
    archived: Option<bool>,
    visibility: Option<String>,
    with_issues_enabled: Option<bool>,
    with_merge_requests_enabled: Option<bool>,
    min_access_level: Option<u64>,
    with_programming_language: Option<bool>,
    starred: Option<bool>,
    statistics: Option<bool>,
    with_custom_attributes: Option<bool>,
    with_security_reports: Option<bool>,
}

fn list_group_projects(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ListGroupProjectsArgs = parse_args(args)?;
        let group = decode_id("group_id", &args.group_id)?;
        let url = with_query(
            api.url(["groups", group.as_str(), "projects"])?,
            query_pairs(&args, &["group_id"])?,
        );
        let projects: Vec<Project> = api.get(url).await?;
        ToolOutput::json(&projects)
    })
}

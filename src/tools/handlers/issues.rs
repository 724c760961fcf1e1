//! Issue tools, including issue-to-issue links.

use super::{optional_bool, optional_int, optional_str, page, parse_args, per_page, project_id};
use crate::gitlab::models::{DeleteStatus, Issue, IssueLink, LinkedIssue};
use crate::gitlab::{query_pairs, with_query, GitLabApi};
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::gateway::{InvokeFuture, Tool, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

fn issue_iid() -> ParamDef {
    ParamDef::required("issue_iid", ParamType::UInt, "The internal ID of a project issue")
}

fn string_list(name: &str, description: &str) -> ParamDef {
    ParamDef::optional(name, ParamType::array_of(ParamType::String), description)
}

fn id_list(name: &str, description: &str) -> ParamDef {
    ParamDef::optional(name, ParamType::array_of(ParamType::UInt), description)
}

pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            ToolEntry::new(
                "create_issue",
                "Create a new issue in a GitLab project",
                vec![
                    project_id(),
                    ParamDef::required("title", ParamType::String, "Issue title"),
                    optional_str("description", "Issue description"),
                    id_list("assignee_ids", "Array of user IDs to assign"),
                    string_list("labels", "Array of label names"),
                    optional_int("milestone_id", "Milestone ID to assign"),
                ],
            ),
            create_issue,
        ),
        Tool::new(
            ToolEntry::new(
                "list_issues",
                "List issues in a GitLab project with filtering options",
                vec![
                    project_id(),
                    optional_int("assignee_id", "Return issues assigned to the given user ID"),
                    optional_str("assignee_username", "Return issues assigned to the given username"),
                    optional_int("author_id", "Return issues created by the given user ID"),
                    optional_str("author_username", "Return issues created by the given username"),
                    optional_bool("confidential", "Filter confidential or public issues"),
                    optional_str("created_after", "Return issues created after the given time"),
                    optional_str("created_before", "Return issues created before the given time"),
                    optional_str("due_date", "Return issues that have the due date"),
                    string_list("label_name", "Array of label names"),
                    optional_str("milestone", "Milestone title"),
                    ParamDef::optional(
                        "scope",
                        ParamType::enumeration(&["created-by-me", "assigned-to-me", "all"]),
                        "Return issues from a specific scope",
                    ),
                    optional_str("search", "Search for specific terms"),
                    ParamDef::optional(
                        "state",
                        ParamType::enumeration(&["opened", "closed", "all"]),
                        "Return issues with a specific state",
                    ),
                    optional_str("updated_after", "Return issues updated after the given time"),
                    optional_str("updated_before", "Return issues updated before the given time"),
                    optional_bool("with_labels_details", "Return more details for each label"),
                    page(),
                    per_page(),
                ],
            ),
            list_issues,
        ),
        Tool::new(
            ToolEntry::new(
                "get_issue",
                "Get details of a specific issue in a GitLab project",
                vec![project_id(), issue_iid()],
            ),
            get_issue,
        ),
        Tool::new(
            ToolEntry::new(
                "update_issue",
                "Update an issue in a GitLab project",
                vec![
                    project_id(),
                    issue_iid(),
                    optional_str("title", "The title of the issue"),
                    optional_str("description", "The description of the issue"),
                    id_list("assignee_ids", "Array of user IDs to assign issue to"),
                    optional_bool("confidential", "Set the issue to be confidential"),
                    optional_bool("discussion_locked", "Flag to lock discussions"),
                    optional_str("due_date", "Date the issue is due (YYYY-MM-DD)"),
                    string_list("labels", "Array of label names"),
                    optional_int("milestone_id", "Milestone ID to assign"),
                    ParamDef::optional(
                        "state_event",
                        ParamType::enumeration(&["close", "reopen"]),
                        "Update issue state (close/reopen)",
                    ),
                    optional_int("weight", "Weight of the issue (0-9)"),
                ],
            ),
            update_issue,
        ),
        Tool::new(
            ToolEntry::new(
                "delete_issue",
                "Delete an issue from a GitLab project",
                vec![project_id(), issue_iid()],
            ),
            delete_issue,
        ),
        Tool::new(
            ToolEntry::new(
                "list_issue_links",
                "List all issue links for a specific issue",
                vec![project_id(), issue_iid()],
            ),
            list_issue_links,
        ),
        Tool::new(
            ToolEntry::new(
                "get_issue_link",
                "Get a specific issue link",
                vec![
                    project_id(),
                    issue_iid(),
                    ParamDef::required("issue_link_id", ParamType::UInt, "ID of an issue relationship"),
                ],
            ),
            get_issue_link,
        ),
        Tool::new(
            ToolEntry::new(
                "create_issue_link",
                "Create an issue link between two issues",
                vec![
                    project_id(),
                    issue_iid(),
                    ParamDef::required(
                        "target_project_id",
                        ParamType::String,
                        "The ID or URL-encoded path of a target project",
                    ),
                    ParamDef::required("target_issue_iid", ParamType::UInt, "The internal ID of a target project's issue"),
                    ParamDef::optional(
                        "link_type",
                        ParamType::enumeration(&["relates_to", "blocks", "is_blocked_by"]),
                        "The type of the relation, defaults to relates_to",
                    )
                    .with_default(json!("relates_to")),
                ],
            ),
            create_issue_link,
        ),
        Tool::new(
            ToolEntry::new(
                "delete_issue_link",
                "Delete an issue link",
                vec![
                    project_id(),
                    issue_iid(),
                    ParamDef::required("issue_link_id", ParamType::UInt, "The ID of an issue relationship"),
                ],
            ),
            delete_issue_link,
        ),
    ]
}

/// GitLab takes issue labels as one comma-separated string.
fn join_labels(body: &mut Map<String, Value>) {
    if let Some(Value::Array(labels)) = body.get("labels") {
        let joined = labels
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(",");
        body.insert("labels".to_string(), Value::String(joined));
    }
}

/// Arguments minus the routing fields, with absent values dropped.
fn request_body<T: Serialize>(args: &T, routing: &[&str]) -> crate::types::Result<Map<String, Value>> {
    let Value::Object(mut map) = serde_json::to_value(args)? else {
        return Ok(Map::new());
    };
    map.retain(|key, value| !routing.contains(&key.as_str()) && !value.is_null());
    join_labels(&mut map);
    Ok(map)
}

#[derive(Debug, Deserialize)]
struct IssueRef {
    project_id: String,
    issue_iid: u64,
}

impl IssueRef {
    fn url(&self, api: &GitLabApi, rest: &[&str]) -> crate::types::Result<reqwest::Url> {
        let iid = self.issue_iid.to_string();
        let segments: Vec<&str> = ["issues", iid.as_str()].into_iter().chain(rest.iter().copied()).collect();
        api.project_url(&self.project_id, &segments)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CreateIssueArgs {
    project_id: String,
    title: String,
    description: Option<String>,
    assignee_ids: Option<Vec<u64>>,
    labels: Option<Vec<String>>,
    milestone_id: Option<u64>,
}

fn create_issue(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreateIssueArgs = parse_args(args)?;
        let body = request_body(&args, &["project_id"])?;
        let issue: Issue = api.post(api.project_url(&args.project_id, &["issues"])?, &body).await?;
        ToolOutput::json(&issue)
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct ListIssuesArgs {
    project_id: String,
    assignee_id: Option<u64>,
    assignee_username: Option<String>,
    author_id: Option<u64>,
    author_username: Option<String>,
    confidential: Option<bool>,
    created_after: Option<String>,
    created_before: Option<String>,
    due_date: Option<String>,
    label_name: Option<Vec<String>>,
    milestone: Option<String>,
    scope: Option<String>,
    search: Option<String>,
    state: Option<String>,
    updated_after: Option<String>,
    updated_before: Option<String>,
    with_labels_details: Option<bool>,
    page: Option<u64>,
    per_page: Option<u64>,
}

fn list_issues(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ListIssuesArgs = parse_args(args)?;
        let url = with_query(
            api.project_url(&args.project_id, &["issues"])?,
            query_pairs(&args, &["project_id"])?,
        );
        let issues: Vec<Issue> = api.get(url).await?;
        ToolOutput::json(&issues)
    })
}

fn get_issue(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: IssueRef = parse_args(args)?;
        let issue: Issue = api.get(target.url(api, &[])?).await?;
        ToolOutput::json(&issue)
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct UpdateIssueArgs {
    project_id: String,
    issue_iid: u64,
    title: Option<String>,
    description: Option<String>,
    assignee_ids: Option<Vec<u64>>,
    confidential: Option<bool>,
    discussion_locked: Option<bool>,
    due_date: Option<String>,
    labels: Option<Vec<String>>,
    milestone_id: Option<u64>,
    state_event: Option<String>,
    weight: Option<u64>,
}

fn update_issue(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: UpdateIssueArgs = parse_args(args)?;
        let body = request_body(&args, &["project_id", "issue_iid"])?;
        let url = api.project_url(&args.project_id, &["issues", &args.issue_iid.to_string()])?;
        let issue: Issue = api.put(url, &body).await?;
        ToolOutput::json(&issue)
    })
}

fn delete_issue(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: IssueRef = parse_args(args)?;
        api.delete(target.url(api, &[])?).await?;
        ToolOutput::json(&DeleteStatus::deleted("Issue"))
    })
}

fn list_issue_links(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: IssueRef = parse_args(args)?;
        let links: Vec<LinkedIssue> = api.get(target.url(api, &["links"])?).await?;
        ToolOutput::json(&links)
    })
}

#[derive(Debug, Deserialize)]
struct IssueLinkRef {
    #[serde(flatten)]
    issue: IssueRef,
    issue_link_id: u64,
}

fn get_issue_link(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: IssueLinkRef = parse_args(args)?;
        let link_id = target.issue_link_id.to_string();
        let link: IssueLink = api.get(target.issue.url(api, &["links", &link_id])?).await?;
        ToolOutput::json(&link)
    })
}

#[derive(Debug, Deserialize)]
struct CreateIssueLinkArgs {
    #[serde(flatten)]
    issue: IssueRef,
    target_project_id: String,
    target_issue_iid: u64,
    link_type: String,
}

fn create_issue_link(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreateIssueLinkArgs = parse_args(args)?;
        let body = json!({
            "target_project_id": args.target_project_id,
            "target_issue_iid": args.target_issue_iid,
            "link_type": args.link_type,
        });
        let link: IssueLink = api.post(args.issue.url(api, &["links"])?, &body).await?;
        ToolOutput::json(&link)
    })
}

fn delete_issue_link(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: IssueLinkRef = parse_args(args)?;
        let link_id = target.issue_link_id.to_string();
        api.delete(target.issue.url(api, &["links", &link_id])?).await?;
        ToolOutput::json(&DeleteStatus::deleted("Issue link"))
    })
}

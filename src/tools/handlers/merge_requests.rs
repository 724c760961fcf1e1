//! Merge request tools: create, inspect, update, notes and discussions.

use super::{optional_bool, optional_str, parse_args, project_id};
use crate::gitlab::models::{Discussion, DiscussionNote, MergeRequest, MergeRequestChanges};
use crate::gitlab::{with_query, GitLabApi};
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::gateway::{InvokeFuture, Tool, ToolOutput};
use crate::types::{Error, Result};
use crate::validation::ValidationErrors;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

fn mr_iid(required: bool) -> ParamDef {
    let description = "The internal ID of the merge request";
    if required {
        ParamDef::required("merge_request_iid", ParamType::UInt, description)
    } else {
        ParamDef::optional("merge_request_iid", ParamType::UInt, description)
    }
}

/// Parameters locating one MR by iid or by source branch.
fn mr_locator() -> Vec<ParamDef> {
    vec![
        project_id(),
        mr_iid(false),
        optional_str("source_branch", "Source branch name"),
    ]
}

pub fn tools() -> Vec<Tool> {
    let mut update_params = mr_locator();
    update_params.extend([
        optional_str("title", "The title of the merge request"),
        optional_str("description", "The description of the merge request"),
        optional_str("target_branch", "The target branch"),
        ParamDef::optional("assignee_ids", ParamType::array_of(ParamType::UInt), "The ID of the users to assign the MR to"),
        ParamDef::optional("labels", ParamType::array_of(ParamType::String), "Labels for the MR"),
        ParamDef::optional(
            "state_event",
            ParamType::enumeration(&["close", "reopen"]),
            "New state (close/reopen) for the MR",
        ),
        optional_bool("remove_source_branch", "Flag indicating if the source branch should be removed"),
        optional_bool("squash", "Squash commits into a single commit when merging"),
        optional_bool("draft", "Work in progress merge request"),
    ]);

    let mut diff_params = mr_locator();
    diff_params.push(ParamDef::optional(
        "view",
        ParamType::enumeration(&["inline", "parallel"]),
        "Diff view type",
    ));

    vec![
        Tool::new(
            ToolEntry::new(
                "create_merge_request",
                "Create a new merge request in a GitLab project",
                vec![
                    project_id(),
                    ParamDef::required("title", ParamType::String, "Merge request title"),
                    optional_str("description", "Merge request description"),
                    ParamDef::required("source_branch", ParamType::String, "Branch containing changes"),
                    ParamDef::required("target_branch", ParamType::String, "Branch to merge into"),
                    ParamDef::optional("assignee_ids", ParamType::array_of(ParamType::UInt), "The ID of the users to assign the MR to"),
                    ParamDef::optional("reviewer_ids", ParamType::array_of(ParamType::UInt), "The ID of the users to assign as reviewers"),
                    ParamDef::optional("labels", ParamType::array_of(ParamType::String), "Labels for the MR"),
                    optional_bool("draft", "Create as draft merge request"),
                    optional_bool("allow_collaboration", "Allow commits from upstream members"),
                ],
            ),
            create_merge_request,
        ),
        Tool::new(
            ToolEntry::new(
                "get_merge_request",
                "Get details of a merge request (Either merge_request_iid or source_branch must be provided)",
                mr_locator(),
            ),
            get_merge_request,
        ),
        Tool::new(
            ToolEntry::new(
                "get_merge_request_diffs",
                "Get the changes/diffs of a merge request (Either merge_request_iid or source_branch must be provided)",
                diff_params,
            ),
            get_merge_request_diffs,
        ),
        Tool::new(
            ToolEntry::new(
                "update_merge_request",
                "Update a merge request (Either merge_request_iid or source_branch must be provided)",
                update_params,
            ),
            update_merge_request,
        ),
        Tool::new(
            ToolEntry::new(
                "create_note",
                "Create a new note (comment) to an issue or merge request",
                vec![
                    project_id(),
                    ParamDef::required(
                        "noteable_type",
                        ParamType::enumeration(&["issue", "merge_request"]),
                        "Type of noteable (issue or merge_request)",
                    ),
                    ParamDef::required("noteable_iid", ParamType::UInt, "IID of the issue or merge request"),
                    ParamDef::required("body", ParamType::String, "Note content"),
                ],
            ),
            create_note,
        ),
        Tool::new(
            ToolEntry::new(
                "mr_discussions",
                "List discussion items for a merge request",
                vec![project_id(), mr_iid(true)],
            ),
            mr_discussions,
        ),
        Tool::new(
            ToolEntry::new(
                "update_merge_request_note",
                "Modify an existing merge request thread note",
                vec![
                    project_id(),
                    mr_iid(true),
                    ParamDef::required("discussion_id", ParamType::String, "The ID of a thread"),
                    ParamDef::required("note_id", ParamType::UInt, "The ID of a thread note"),
                    optional_str("body", "The content of the note or reply"),
                    optional_bool("resolved", "Resolve or unresolve the note"),
                ],
            ),
            update_merge_request_note,
        ),
    ]
}

// =============================================================================
// MR resolution
// =============================================================================

#[derive(Debug, Deserialize)]
struct MrLocator {
    project_id: String,
    merge_request_iid: Option<u64>,
    source_branch: Option<String>,
}

impl MrLocator {
    /// The iid to address, looking it up by source branch when needed.
    async fn resolve_iid(&self, api: &GitLabApi) -> Result<u64> {
        match (self.merge_request_iid, &self.source_branch) {
            (Some(iid), _) => Ok(iid),
            (None, Some(branch)) => Ok(find_by_branch(api, &self.project_id, branch).await?.iid),
            (None, None) => Err(missing_locator()),
        }
    }
}

fn missing_locator() -> Error {
    Error::validation(
        "merge_request_iid",
        "either merge_request_iid or source_branch must be provided",
    )
}

async fn find_by_branch(api: &GitLabApi, project_id: &str, branch: &str) -> Result<MergeRequest> {
    let url = with_query(
        api.project_url(project_id, &["merge_requests"])?,
        [("source_branch", branch)],
    );
    let found: Vec<MergeRequest> = api.get(url).await?;
    found
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(format!("No merge request found for source branch: {}", branch)))
}

fn mr_url(api: &GitLabApi, project_id: &str, iid: u64, rest: &[&str]) -> Result<reqwest::Url> {
    let iid = iid.to_string();
    let segments: Vec<&str> = ["merge_requests", iid.as_str()]
        .into_iter()
        .chain(rest.iter().copied())
        .collect();
    api.project_url(project_id, &segments)
}

/// GitLab takes MR labels as one comma-separated string.
fn into_body<T: Serialize>(args: &T, routing: &[&str]) -> Result<Map<String, Value>> {
    let Value::Object(mut map) = serde_json::to_value(args)? else {
        return Ok(Map::new());
    };
    map.retain(|key, value| !routing.contains(&key.as_str()) && !value.is_null());
    if let Some(Value::Array(labels)) = map.get("labels") {
        let joined = labels.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(",");
        map.insert("labels".to_string(), Value::String(joined));
    }
    Ok(map)
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CreateMergeRequestArgs {
    project_id: String,
    title: String,
    description: Option<String>,
    source_branch: String,
    target_branch: String,
    assignee_ids: Option<Vec<u64>>,
    reviewer_ids: Option<Vec<u64>>,
    labels: Option<Vec<String>>,
    draft: Option<bool>,
    allow_collaboration: Option<bool>,
}

fn create_merge_request(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreateMergeRequestArgs = parse_args(args)?;
        let body = into_body(&args, &["project_id"])?;
        let mr: MergeRequest = api
            .post(api.project_url(&args.project_id, &["merge_requests"])?, &body)
            .await?;
        ToolOutput::json(&mr)
    })
}

fn get_merge_request(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let locator: MrLocator = parse_args(args)?;
        let mr: MergeRequest = match (locator.merge_request_iid, &locator.source_branch) {
            (Some(iid), _) => api.get(mr_url(api, &locator.project_id, iid, &[])?).await?,
            (None, Some(branch)) => find_by_branch(api, &locator.project_id, branch).await?,
            (None, None) => return Err(missing_locator()),
        };
        ToolOutput::json(&mr)
    })
}

#[derive(Debug, Deserialize)]
struct DiffArgs {
    #[serde(flatten)]
    locator: MrLocator,
    view: Option<String>,
}

fn get_merge_request_diffs(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: DiffArgs = parse_args(args)?;
        let iid = args.locator.resolve_iid(api).await?;
        let url = with_query(
            mr_url(api, &args.locator.project_id, iid, &["changes"])?,
            args.view.iter().map(|v| ("view", v.as_str())),
        );
        let changes: MergeRequestChanges = api.get(url).await?;
        ToolOutput::json(&changes.changes)
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct UpdateMergeRequestArgs {
    project_id: String,
    merge_request_iid: Option<u64>,
    source_branch: Option<String>,
    title: Option<String>,
    description: Option<String>,
    target_branch: Option<String>,
    assignee_ids: Option<Vec<u64>>,
    labels: Option<Vec<String>>,
    state_event: Option<String>,
    remove_source_branch: Option<bool>,
    squash: Option<bool>,
    draft: Option<bool>,
}

fn update_merge_request(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: UpdateMergeRequestArgs = parse_args(args)?;
        let locator = MrLocator {
            project_id: args.project_id.clone(),
            merge_request_iid: args.merge_request_iid,
            source_branch: args.source_branch.clone(),
        };
        let iid = locator.resolve_iid(api).await?;
        let body = into_body(&args, &["project_id", "merge_request_iid", "source_branch"])?;
        let mr: MergeRequest = api.put(mr_url(api, &args.project_id, iid, &[])?, &body).await?;
        ToolOutput::json(&mr)
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum NoteableType {
    Issue,
    MergeRequest,
}

impl NoteableType {
    fn collection(&self) -> &'static str {
        match self {
            NoteableType::Issue => "issues",
            NoteableType::MergeRequest => "merge_requests",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateNoteArgs {
    project_id: String,
    noteable_type: NoteableType,
    noteable_iid: u64,
    body: String,
}

fn create_note(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreateNoteArgs = parse_args(args)?;
        let iid = args.noteable_iid.to_string();
        let url = api.project_url(
            &args.project_id,
            &[args.noteable_type.collection(), &iid, "notes"],
        )?;
        let note: Value = api.post(url, &json!({ "body": args.body })).await?;
        ToolOutput::json(&note)
    })
}

#[derive(Debug, Deserialize)]
struct DiscussionsArgs {
    project_id: String,
    merge_request_iid: u64,
}

fn mr_discussions(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: DiscussionsArgs = parse_args(args)?;
        let discussions: Vec<Discussion> = api
            .get(mr_url(api, &args.project_id, args.merge_request_iid, &["discussions"])?)
            .await?;
        ToolOutput::json(&discussions)
    })
}

#[derive(Debug, Deserialize)]
struct UpdateNoteArgs {
    project_id: String,
    merge_request_iid: u64,
    discussion_id: String,
    note_id: u64,
    body: Option<String>,
    resolved: Option<bool>,
}

impl UpdateNoteArgs {
    /// Exactly one of `body` and `resolved`.
    fn payload(&self) -> Result<Value> {
        match (&self.body, self.resolved) {
            (Some(body), None) => Ok(json!({ "body": body })),
            (None, Some(resolved)) => Ok(json!({ "resolved": resolved })),
            (Some(_), Some(_)) => {
                let mut errors = ValidationErrors::new();
                errors.push("body", "cannot be combined with resolved");
                errors.push("resolved", "cannot be combined with body");
                Err(Error::Validation(errors))
            }
            (None, None) => Err(Error::validation("body", "either body or resolved must be provided")),
        }
    }
}

fn update_merge_request_note(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: UpdateNoteArgs = parse_args(args)?;
        let payload = args.payload()?;
        let note_id = args.note_id.to_string();
        let url = mr_url(
            api,
            &args.project_id,
            args.merge_request_iid,
            &["discussions", &args.discussion_id, "notes", &note_id],
        )?;
        let note: DiscussionNote = api.put(url, &payload).await?;
        ToolOutput::json(&note)
    })
}

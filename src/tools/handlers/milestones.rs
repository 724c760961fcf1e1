//! Project milestone tools.

use super::{optional_bool, optional_str, page, parse_args, per_page, project_id};
use crate::gitlab::models::{BurndownEvent, DeleteStatus, Issue, MergeRequest, Milestone};
use crate::gitlab::{query_pairs, with_query, GitLabApi};
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::gateway::{Invoke, InvokeFuture, Tool, ToolOutput};
use crate::types::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn milestone_id() -> ParamDef {
    ParamDef::required("milestone_id", ParamType::UInt, "The ID of a project milestone")
}

/// A tool addressed by `project_id` and `milestone_id` alone.
fn milestone_ref(name: &str, description: &str, invoke: Invoke) -> Tool {
    Tool::new(ToolEntry::new(name, description, vec![project_id(), milestone_id()]), invoke)
}

pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            ToolEntry::new(
                "list_milestones",
                "List milestones in a GitLab project with filtering options",
                vec![
                    project_id(),
                    ParamDef::optional(
                        "iids",
                        ParamType::array_of(ParamType::UInt),
                        "Return only the milestones having the given iid",
                    ),
                    ParamDef::optional(
                        "state",
                        ParamType::enumeration(&["active", "closed"]),
                        "Return only active or closed milestones",
                    ),
                    optional_str("title", "Return only milestones with a title matching the provided string"),
                    optional_str("search", "Return only milestones with a title or description matching the provided string"),
                    optional_bool("include_ancestors", "Include ancestor groups"),
                    optional_str("updated_before", "Return milestones updated before the specified date"),
                    optional_str("updated_after", "Return milestones updated after the specified date"),
                    page(),
                    per_page(),
                ],
            ),
            list_milestones,
        ),
        milestone_ref("get_milestone", "Get details of a specific milestone", get_milestone),
        Tool::new(
            ToolEntry::new(
                "create_milestone",
                "Create a new milestone in a GitLab project",
                vec![
                    project_id(),
                    ParamDef::required("title", ParamType::String, "The title of the milestone"),
                    optional_str("description", "The description of the milestone"),
                    optional_str("due_date", "The due date of the milestone (YYYY-MM-DD)"),
                    optional_str("start_date", "The start date of the milestone (YYYY-MM-DD)"),
                ],
            ),
            create_milestone,
        ),
        Tool::new(
            ToolEntry::new(
                "edit_milestone",
                "Edit an existing milestone in a GitLab project",
                vec![
                    project_id(),
                    milestone_id(),
                    optional_str("title", "The title of the milestone"),
                    optional_str("description", "The description of the milestone"),
                    optional_str("due_date", "The due date of the milestone (YYYY-MM-DD)"),
                    optional_str("start_date", "The start date of the milestone (YYYY-MM-DD)"),
                    ParamDef::optional(
                        "state_event",
                        ParamType::enumeration(&["close", "activate"]),
                        "The state event of the milestone",
                    ),
                ],
            ),
            edit_milestone,
        ),
        milestone_ref(
            "delete_milestone",
            "Delete a milestone from a GitLab project",
            delete_milestone,
        ),
        milestone_ref(
            "get_milestone_issue",
            "Get issues associated with a specific milestone",
            get_milestone_issue,
        ),
        Tool::new(
            ToolEntry::new(
                "get_milestone_merge_requests",
                "Get merge requests associated with a specific milestone",
                vec![project_id(), milestone_id(), page(), per_page()],
            ),
            get_milestone_merge_requests,
        ),
        milestone_ref(
            "promote_milestone",
            "Promote a milestone to the next stage",
            promote_milestone,
        ),
        milestone_ref(
            "get_milestone_burndown_events",
            "Get burndown events for a specific milestone",
            get_milestone_burndown_events,
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct MilestoneRef {
    project_id: String,
    milestone_id: u64,
}

impl MilestoneRef {
    fn url(&self, api: &GitLabApi, action: Option<&str>) -> Result<reqwest::Url> {
        let id = self.milestone_id.to_string();
        let mut segments = vec!["milestones", id.as_str()];
        segments.extend(action);
        api.project_url(&self.project_id, &segments)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ListMilestonesArgs {
    project_id: String,
    iids: Option<Vec<u64>>,
    state: Option<String>,
    title: Option<String>,
    search: Option<String>,
    include_ancestors: Option<bool>,
    updated_before: Option<String>,
    updated_after: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
}

fn list_milestones(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ListMilestonesArgs = parse_args(args)?;
        // `iids` is an array parameter, repeated rather than comma-joined.
        let mut pairs = query_pairs(&args, &["project_id", "iids"])?;
        pairs.extend(
            args.iids
                .iter()
                .flatten()
                .map(|iid| ("iids[]".to_string(), iid.to_string())),
        );
        let url = with_query(api.project_url(&args.project_id, &["milestones"])?, pairs);
        let milestones: Vec<Milestone> = api.get(url).await?;
        ToolOutput::json(&milestones)
    })
}

fn get_milestone(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: MilestoneRef = parse_args(args)?;
        let milestone: Milestone = api.get(target.url(api, None)?).await?;
        ToolOutput::json(&milestone)
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct MilestoneFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_event: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateMilestoneArgs {
    project_id: String,
    #[serde(flatten)]
    fields: MilestoneFields,
}

fn create_milestone(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreateMilestoneArgs = parse_args(args)?;
        let milestone: Milestone = api
            .post(api.project_url(&args.project_id, &["milestones"])?, &args.fields)
            .await?;
        ToolOutput::json(&milestone)
    })
}

#[derive(Debug, Deserialize)]
struct EditMilestoneArgs {
    #[serde(flatten)]
    target: MilestoneRef,
    #[serde(flatten)]
    fields: MilestoneFields,
}

fn edit_milestone(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: EditMilestoneArgs = parse_args(args)?;
        let milestone: Milestone = api.put(args.target.url(api, None)?, &args.fields).await?;
        ToolOutput::json(&milestone)
    })
}

fn delete_milestone(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: MilestoneRef = parse_args(args)?;
        api.delete(target.url(api, None)?).await?;
        ToolOutput::json(&DeleteStatus::deleted("Milestone"))
    })
}

fn get_milestone_issue(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: MilestoneRef = parse_args(args)?;
        let issues: Vec<Issue> = api.get(target.url(api, Some("issues"))?).await?;
        ToolOutput::json(&issues)
    })
}

#[derive(Debug, Deserialize)]
struct MilestoneMergeRequestsArgs {
    #[serde(flatten)]
    target: MilestoneRef,
    page: Option<u64>,
    per_page: Option<u64>,
}

fn get_milestone_merge_requests(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: MilestoneMergeRequestsArgs = parse_args(args)?;
        let paging = [("page", args.page), ("per_page", args.per_page)];
        let url = with_query(
            args.target.url(api, Some("merge_requests"))?,
            paging
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v.to_string()))),
        );
        let merge_requests: Vec<MergeRequest> = api.get(url).await?;
        ToolOutput::json(&merge_requests)
    })
}

fn promote_milestone(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: MilestoneRef = parse_args(args)?;
        let milestone: Milestone = api.post_empty(target.url(api, Some("promote"))?).await?;
        ToolOutput::json(&milestone)
    })
}

fn get_milestone_burndown_events(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: MilestoneRef = parse_args(args)?;
        let events: Vec<BurndownEvent> = api.get(target.url(api, Some("burndown_events"))?).await?;
        ToolOutput::json(&events)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::transport::MockTransport;
    use crate::tools::handlers::test_support::{api, issue, output_json, pairs, respond, sorted_query};
    use reqwest::Method;
    use serde_json::json;

    fn milestone(state: &str) -> Value {
        json!({
            "id": 12,
            "iid": 3,
            "title": "v1.0",
            "description": null,
            "state": state,
            "web_url": "https://gitlab.example.com/g/p/-/milestones/3"
        })
    }

    #[tokio::test]
    async fn test_list_repeats_iids() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| {
                sorted_query(&req.url) == pairs(&[("iids[]", "1"), ("iids[]", "2"), ("state", "active")])
            })
            .times(1)
            .returning(|_| Ok(respond(200, json!([milestone("active")]).to_string())));

        list_milestones(
            &api(mock),
            json!({ "project_id": "42", "iids": [1, 2], "state": "active" }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_edit_sends_state_event() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| {
                req.method == Method::PUT
                    && req.url.path() == "/api/v4/projects/42/milestones/12"
                    && req.body == Some(json!({ "state_event": "close" }))
            })
            .times(1)
            .returning(|_| Ok(respond(200, milestone("closed").to_string())));

        let output = edit_milestone(
            &api(mock),
            json!({ "project_id": "42", "milestone_id": 12, "state_event": "close" }),
        )
        .await
        .unwrap();
        assert_eq!(output_json(output)["state"], "closed");
    }

    #[tokio::test]
    async fn test_milestone_issues_and_promote() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| req.url.path() == "/api/v4/projects/42/milestones/12/issues")
            .times(1)
            .returning(|_| Ok(respond(200, json!([issue(1)]).to_string())));
        mock.expect_send()
            .withf(|req| req.method == Method::POST && req.url.path() == "/api/v4/projects/42/milestones/12/promote")
            .times(1)
            .returning(|_| Ok(respond(200, milestone("active").to_string())));

        let gitlab = api(mock);
        let args = json!({ "project_id": "42", "milestone_id": 12 });
        let output = get_milestone_issue(&gitlab, args.clone()).await.unwrap();
        assert_eq!(output_json(output)[0]["iid"], 1);
        promote_milestone(&gitlab, args).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_milestone() {
        let mut mock = MockTransport::new();
        mock.expect_send().returning(|_| Ok(respond(204, "")));

        let output = delete_milestone(&api(mock), json!({ "project_id": "42", "milestone_id": 12 }))
            .await
            .unwrap();
        assert_eq!(output_json(output)["message"], "Milestone deleted successfully");
    }
}

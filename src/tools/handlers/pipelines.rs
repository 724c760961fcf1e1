//! CI pipeline and job tools.

use super::{optional_bool, optional_str, page, parse_args, per_page, project_id};
use crate::gitlab::models::{Job, Pipeline};
use crate::gitlab::{query_pairs, with_query, GitLabApi};
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::gateway::{InvokeFuture, Tool, ToolOutput};
use crate::types::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn pipeline_id() -> ParamDef {
    ParamDef::required("pipeline_id", ParamType::UInt, "The ID of the pipeline")
}

fn job_id() -> ParamDef {
    ParamDef::required("job_id", ParamType::UInt, "The ID of the job")
}

pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            ToolEntry::new(
                "list_pipelines",
                "List pipelines in a GitLab project with filtering options",
                vec![
                    project_id(),
                    ParamDef::optional(
                        "scope",
                        ParamType::enumeration(&["running", "pending", "finished", "branches", "tags"]),
                        "The scope of pipelines",
                    ),
                    ParamDef::optional(
                        "status",
                        ParamType::enumeration(&[
                            "created",
                            "waiting_for_resource",
                            "preparing",
                            "pending",
                            "running",
                            "success",
                            "failed",
                            "canceled",
                            "skipped",
                            "manual",
                            "scheduled",
                        ]),
                        "The status of pipelines",
                    ),
                    optional_str("ref", "The ref of pipelines"),
                    optional_str("sha", "The SHA of pipelines"),
                    optional_bool("yaml_errors", "Returns pipelines with invalid configurations"),
                    optional_str("username", "The username of the user who triggered pipelines"),
                    optional_str("updated_after", "Return pipelines updated after the specified date"),
                    optional_str("updated_before", "Return pipelines updated before the specified date"),
                    ParamDef::optional(
                        "order_by",
                        ParamType::enumeration(&["id", "status", "ref", "updated_at", "user_id"]),
                        "Order pipelines by",
                    ),
                    ParamDef::optional("sort", ParamType::enumeration(&["asc", "desc"]), "Sort pipelines"),
                    page(),
                    per_page(),
                ],
            ),
            list_pipelines,
        ),
        Tool::new(
            ToolEntry::new(
                "get_pipeline",
                "Get details of a specific pipeline in a GitLab project",
                vec![project_id(), pipeline_id()],
            ),
            get_pipeline,
        ),
        Tool::new(
            ToolEntry::new(
                "list_pipeline_jobs",
                "List all jobs in a specific pipeline",
                vec![
                    project_id(),
                    pipeline_id(),
                    ParamDef::optional(
                        "scope",
                        ParamType::enumeration(&[
                            "created", "pending", "running", "failed", "success", "canceled", "skipped", "manual",
                        ]),
                        "The scope of jobs to show",
                    ),
                    optional_bool("include_retried", "Whether to include retried jobs"),
                    page(),
                    per_page(),
                ],
            ),
            list_pipeline_jobs,
        ),
        Tool::new(
            ToolEntry::new(
                "get_pipeline_job",
                "Get details of a GitLab pipeline job number",
                vec![project_id(), job_id()],
            ),
            get_pipeline_job,
        ),
        Tool::new(
            ToolEntry::new(
                "get_pipeline_job_output",
                "Get the output/trace of a GitLab pipeline job number",
                vec![project_id(), job_id()],
            ),
            get_pipeline_job_output,
        ),
        Tool::new(
            ToolEntry::new(
                "create_pipeline",
                "Create a new pipeline for a branch or tag",
                vec![
                    project_id(),
                    ParamDef::required("ref", ParamType::String, "The branch or tag to run the pipeline on"),
                    ParamDef::optional(
                        "variables",
                        ParamType::array_of(ParamType::Object(vec![
                            ParamDef::required("key", ParamType::String, "The key of the variable"),
                            ParamDef::required("value", ParamType::String, "The value of the variable"),
                        ])),
                        "An array of variables to use for the pipeline",
                    ),
                ],
            ),
            create_pipeline,
        ),
        Tool::new(
            ToolEntry::new(
                "retry_pipeline",
                "Retry a failed or canceled pipeline",
                vec![project_id(), pipeline_id()],
            ),
            retry_pipeline,
        ),
        Tool::new(
            ToolEntry::new(
                "cancel_pipeline",
                "Cancel a running pipeline",
                vec![project_id(), pipeline_id()],
            ),
            cancel_pipeline,
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct PipelineRef {
    project_id: String,
    pipeline_id: u64,
}

impl PipelineRef {
    fn url(&self, api: &GitLabApi, action: Option<&str>) -> Result<reqwest::Url> {
        let id = self.pipeline_id.to_string();
        let mut segments = vec!["pipelines", id.as_str()];
        segments.extend(action);
        api.project_url(&self.project_id, &segments)
    }
}

#[derive(Debug, Deserialize)]
struct JobRef {
    project_id: String,
    job_id: u64,
}

impl JobRef {
    fn url(&self, api: &GitLabApi, rest: &[&str]) -> Result<reqwest::Url> {
        let id = self.job_id.to_string();
        let segments: Vec<&str> = ["jobs", id.as_str()].into_iter().chain(rest.iter().copied()).collect();
        api.project_url(&self.project_id, &segments)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ListPipelinesArgs {
    project_id: String,
    scope: Option<String>,
    status: Option<String>,
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    sha: Option<String>,
    yaml_errors: Option<bool>,
    username: Option<String>,
    updated_after: Option<String>,
    updated_before: Option<String>,
    order_by: Option<String>,
    sort: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
}

fn list_pipelines(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ListPipelinesArgs = parse_args(args)?;
        let url = with_query(
            api.project_url(&args.project_id, &["pipelines"])?,
            query_pairs(&args, &["project_id"])?,
        );
        let pipelines: Vec<Pipeline> = api.get(url).await?;
        ToolOutput::json(&pipelines)
    })
}

fn get_pipeline(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: PipelineRef = parse_args(args)?;
        let pipeline: Pipeline = api.get(target.url(api, None)?).await?;
        ToolOutput::json(&pipeline)
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct ListJobsArgs {
    project_id: String,
    pipeline_id: u64,
    scope: Option<String>,
    include_retried: Option<bool>,
    page: Option<u64>,
    per_page: Option<u64>,
}

fn list_pipeline_jobs(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ListJobsArgs = parse_args(args)?;
        let target = PipelineRef {
            project_id: args.project_id.clone(),
            pipeline_id: args.pipeline_id,
        };
        let url = with_query(
            target.url(api, Some("jobs"))?,
            query_pairs(&args, &["project_id", "pipeline_id"])?,
        );
        let jobs: Vec<Job> = api.get(url).await?;
        ToolOutput::json(&jobs)
    })
}

fn get_pipeline_job(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: JobRef = parse_args(args)?;
        let job: Job = api.get(target.url(api, &[])?).await?;
        ToolOutput::json(&job)
    })
}

/// The raw trace, passed through as text.
fn get_pipeline_job_output(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: JobRef = parse_args(args)?;
        let trace = api.get_text(target.url(api, &["trace"])?).await?;
        Ok(ToolOutput::Text(trace))
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct PipelineVariable {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct CreatePipelineArgs {
    project_id: String,
    #[serde(rename = "ref")]
    git_ref: String,
    variables: Option<Vec<PipelineVariable>>,
}

fn create_pipeline(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreatePipelineArgs = parse_args(args)?;
        let mut body = json!({ "ref": args.git_ref });
        if let Some(variables) = &args.variables {
            body["variables"] = serde_json::to_value(variables)?;
        }
        let pipeline: Pipeline = api
            .post(api.project_url(&args.project_id, &["pipeline"])?, &body)
            .await?;
        ToolOutput::json(&pipeline)
    })
}

fn retry_pipeline(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: PipelineRef = parse_args(args)?;
        let pipeline: Pipeline = api.post_empty(target.url(api, Some("retry"))?).await?;
        ToolOutput::json(&pipeline)
    })
}

fn cancel_pipeline(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: PipelineRef = parse_args(args)?;
        let pipeline: Pipeline = api.post_empty(target.url(api, Some("cancel"))?).await?;
        ToolOutput::json(&pipeline)
    })
}

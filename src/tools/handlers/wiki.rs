//! Project wiki tools.

use super::{optional_bool, optional_str, page, parse_args, per_page, project_id};
use crate::gitlab::models::{DeleteStatus, WikiPage};
use crate::gitlab::{query_pairs, with_query, GitLabApi};
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::gateway::{InvokeFuture, Tool, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn slug() -> ParamDef {
    ParamDef::required("slug", ParamType::String, "URL-encoded slug of the wiki page")
}

fn format(description: &str) -> ParamDef {
    ParamDef::optional(
        "format",
        ParamType::enumeration(&["markdown", "rdoc", "asciidoc", "org"]),
        description,
    )
}

pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            ToolEntry::new(
                "list_wiki_pages",
                "List wiki pages in a GitLab project",
                vec![
                    project_id(),
                    optional_bool("with_content", "Include content of the wiki pages"),
                    page(),
                    per_page(),
                ],
            ),
            list_wiki_pages,
        ),
        Tool::new(
            ToolEntry::new(
                "get_wiki_page",
                "Get details of a specific wiki page",
                vec![project_id(), slug()],
            ),
            get_wiki_page,
        ),
        Tool::new(
            ToolEntry::new(
                "create_wiki_page",
                "Create a new wiki page in a GitLab project",
                vec![
                    project_id(),
                    ParamDef::required("title", ParamType::String, "Title of the wiki page"),
                    ParamDef::required("content", ParamType::String, "Content of the wiki page"),
                    format("Content format, e.g., markdown, rdoc"),
                ],
            ),
            create_wiki_page,
        ),
        Tool::new(
            ToolEntry::new(
                "update_wiki_page",
                "Update an existing wiki page in a GitLab project",
                vec![
                    project_id(),
                    slug(),
                    optional_str("title", "New title of the wiki page"),
                    optional_str("content", "New content of the wiki page"),
                    format("Content format, e.g., markdown, rdoc"),
                ],
            ),
            update_wiki_page,
        ),
        Tool::new(
            ToolEntry::new(
                "delete_wiki_page",
                "Delete a wiki page from a GitLab project",
                vec![project_id(), slug()],
            ),
            delete_wiki_page,
        ),
    ]
}

#[derive(Debug, Serialize, Deserialize)]
struct ListWikiArgs {
    project_id: String,
    with_content: Option<bool>,
    page: Option<u64>,
    per_page: Option<u64>,
}

fn list_wiki_pages(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ListWikiArgs = parse_args(args)?;
        let url = with_query(
            api.project_url(&args.project_id, &["wikis"])?,
            query_pairs(&args, &["project_id"])?,
        );
        let pages: Vec<WikiPage> = api.get(url).await?;
        ToolOutput::json(&pages)
    })
}

#[derive(Debug, Deserialize)]
struct WikiRef {
    project_id: String,
    slug: String,
}

fn get_wiki_page(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: WikiRef = parse_args(args)?;
        let page: WikiPage = api
            .get(api.project_url(&target.project_id, &["wikis", &target.slug])?)
            .await?;
        ToolOutput::json(&page)
    })
}

#[derive(Debug, Serialize)]
struct WikiBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateWikiArgs {
    project_id: String,
    title: String,
    content: String,
    format: Option<String>,
}

fn create_wiki_page(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreateWikiArgs = parse_args(args)?;
        let body = WikiBody {
            title: Some(args.title),
            content: Some(args.content),
            format: args.format,
        };
        let page: WikiPage = api
            .post(api.project_url(&args.project_id, &["wikis"])?, &body)
            .await?;
        ToolOutput::json(&page)
    })
}

#[derive(Debug, Deserialize)]
struct UpdateWikiArgs {
    project_id: String,
    slug: String,
    title: Option<String>,
    content: Option<String>,
    format: Option<String>,
}

fn update_wiki_page(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: UpdateWikiArgs = parse_args(args)?;
        let body = WikiBody {
            title: args.title,
            content: args.content,
            format: args.format,
        };
        let page: WikiPage = api
            .put(api.project_url(&args.project_id, &["wikis", &args.slug])?, &body)
            .await?;
        ToolOutput::json(&page)
    })
}

fn delete_wiki_page(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let target: WikiRef = parse_args(args)?;
        api.delete(api.project_url(&target.project_id, &["wikis", &target.slug])?)
            .await?;
        ToolOutput::json(&DeleteStatus::deleted("Wiki page"))
    })
}

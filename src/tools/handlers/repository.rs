//! Repository tools: files, commits, branches, forks, project search.

use super::{optional_bool, optional_int, optional_str, parse_args, project_id};
use crate::gitlab::models::{
    Commit, Content, CreateUpdateFileResponse, Fork, Project, Reference, SearchResponse, TreeEntry,
};
use crate::gitlab::{query_pairs, with_query, GitLabApi};
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::gateway::{InvokeFuture, Tool, ToolOutput};
use crate::types::{Error, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            ToolEntry::new(
                "create_or_update_file",
                "Create or update a single file in a GitLab project",
                vec![
                    project_id(),
                    ParamDef::required("file_path", ParamType::String, "Path where to create/update the file"),
                    ParamDef::required("content", ParamType::String, "Content of the file"),
                    ParamDef::required("commit_message", ParamType::String, "Commit message"),
                    ParamDef::required("branch", ParamType::String, "Branch to create/update the file in"),
                    optional_str("previous_path", "Path of the file to move/rename"),
                    optional_str("last_commit_id", "Last known file commit ID"),
                    optional_str("commit_id", "Current file commit ID (for update operations)"),
                ],
            ),
            create_or_update_file,
        ),
        Tool::new(
            ToolEntry::new(
                "search_repositories",
                "Search for GitLab projects",
                vec![
                    ParamDef::required("search", ParamType::String, "Search query"),
                    ParamDef::optional("page", ParamType::UInt, "Page number for pagination (default: 1)")
                        .with_default(json!(1)),
                    ParamDef::optional("per_page", ParamType::UInt, "Number of results per page (default: 20)")
                        .with_default(json!(20)),
                ],
            ),
            search_repositories,
        ),
        Tool::new(
            ToolEntry::new(
                "create_repository",
                "Create a new GitLab project",
                vec![
                    ParamDef::required("name", ParamType::String, "Repository name"),
                    optional_str("description", "Repository description"),
                    ParamDef::optional(
                        "visibility",
                        ParamType::enumeration(&["private", "internal", "public"]),
                        "Repository visibility level",
                    ),
                    optional_bool("initialize_with_readme", "Initialize with README.md"),
                ],
            ),
            create_repository,
        ),
        Tool::new(
            ToolEntry::new(
                "get_file_contents",
                "Get the contents of a file or directory from a GitLab project",
                vec![
                    project_id(),
                    ParamDef::required("file_path", ParamType::String, "Path to the file or directory"),
                    optional_str("ref", "Branch/tag/commit to get contents from"),
                ],
            ),
            get_file_contents,
        ),
        Tool::new(
            ToolEntry::new(
                "push_files",
                "Push multiple files to a GitLab project in a single commit",
                vec![
                    project_id(),
                    ParamDef::required("branch", ParamType::String, "Branch to push to"),
                    ParamDef::required(
                        "files",
                        ParamType::array_of(ParamType::Object(vec![
                            ParamDef::required("file_path", ParamType::String, "Path where to create the file"),
                            ParamDef::required("content", ParamType::String, "Content of the file"),
                        ])),
                        "Array of files to push",
                    ),
                    ParamDef::required("commit_message", ParamType::String, "Commit message"),
                ],
            ),
            push_files,
        ),
        Tool::new(
            ToolEntry::new(
                "fork_repository",
                "Fork a GitLab project to your account or specified namespace",
                vec![
                    project_id(),
                    optional_str("namespace", "Namespace to fork to (full path)"),
                ],
            ),
            fork_repository,
        ),
        Tool::new(
            ToolEntry::new(
                "create_branch",
                "Create a new branch in a GitLab project",
                vec![
                    project_id(),
                    ParamDef::required("branch", ParamType::String, "Name for the new branch"),
                    optional_str("ref", "Source branch/commit for new branch"),
                ],
            ),
            create_branch,
        ),
        Tool::new(
            ToolEntry::new(
                "get_repository_tree",
                "Get the repository tree for a GitLab project (list files and directories)",
                vec![
                    project_id(),
                    optional_str("path", "The path inside the repository"),
                    optional_str("ref", "The name of a repository branch or tag"),
                    optional_bool("recursive", "Boolean value to get a recursive tree"),
                    optional_int("per_page", "Number of results to show per page"),
                    optional_str("page_token", "The tree record ID for pagination"),
                    optional_str("pagination", "Pagination method (keyset)"),
                ],
            ),
            get_repository_tree,
        ),
    ]
}

// =============================================================================
// Shared lookups
// =============================================================================

/// The project's default branch, `main` when GitLab reports none.
pub(crate) async fn default_branch(api: &GitLabApi, project_id: &str) -> Result<String> {
    let project: Project = api.get(api.project_url(project_id, &[])?).await?;
    Ok(project.default_branch.unwrap_or_else(|| "main".to_string()))
}

/// Fetch a file or directory at `git_ref`. A 404 is `Error::NotFound`.
async fn fetch_contents(api: &GitLabApi, project_id: &str, file_path: &str, git_ref: &str) -> Result<Content> {
    let url = with_query(
        api.project_url(project_id, &["repository", "files", file_path])?,
        [("ref", git_ref)],
    );
    match api.get::<Content>(url).await {
        Err(e) if e.is_not_found() => Err(Error::not_found(format!("File not found: {}", file_path))),
        other => other,
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateOrUpdateFileArgs {
    project_id: String,
    file_path: String,
    content: String,
    commit_message: String,
    branch: String,
    previous_path: Option<String>,
    last_commit_id: Option<String>,
    commit_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct FileWriteBody<'a> {
    branch: &'a str,
    content: &'a str,
    commit_message: &'a str,
    encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_commit_id: Option<String>,
}

fn create_or_update_file(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreateOrUpdateFileArgs = parse_args(args)?;

        // Only a missing file selects create; any other probe failure aborts.
        let existing = match fetch_contents(api, &args.project_id, &args.file_path, &args.branch).await {
            Ok(content) => Some(content),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let (probed_commit, probed_last_commit) = match &existing {
            Some(Content::File(file)) => (Some(file.commit_id.clone()), Some(file.last_commit_id.clone())),
            _ => (None, None),
        };
        let body = FileWriteBody {
            branch: &args.branch,
            content: &args.content,
            commit_message: &args.commit_message,
            encoding: "text",
            previous_path: args.previous_path.as_deref(),
            commit_id: args.commit_id.clone().or(probed_commit),
            last_commit_id: args.last_commit_id.clone().or(probed_last_commit),
        };

        let url = api.project_url(&args.project_id, &["repository", "files", &args.file_path])?;
        let response: CreateUpdateFileResponse = if existing.is_some() {
            tracing::debug!(file_path = %args.file_path, "file_exists_updating");
            api.put(url, &body).await?
        } else {
            tracing::debug!(file_path = %args.file_path, "file_missing_creating");
            api.post(url, &body).await?
        };
        ToolOutput::json(&response)
    })
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    search: String,
    page: u64,
    per_page: u64,
}

fn search_repositories(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: SearchArgs = parse_args(args)?;
        let url = with_query(
            api.url(["projects"])?,
            [
                ("search", args.search.clone()),
                ("page", args.page.to_string()),
                ("per_page", args.per_page.to_string()),
                ("order_by", "id".to_string()),
                ("sort", "desc".to_string()),
            ],
        );

        let (items, response) = api.get_with_response::<Vec<Project>>(url).await?;
        let header_number = |name: &str| response.header(name).and_then(|v| v.trim().parse::<u64>().ok());

        // GitLab omits the totals for result sets above 10,000.
        let count = header_number("x-total").unwrap_or(items.len() as u64);
        let total_pages = header_number("x-total-pages")
            .unwrap_or_else(|| count.div_ceil(args.per_page.max(1)));

        ToolOutput::json(&SearchResponse {
            count,
            total_pages,
            current_page: args.page,
            items,
        })
    })
}

#[derive(Debug, Deserialize)]
struct CreateRepositoryArgs {
    name: String,
    description: Option<String>,
    visibility: Option<String>,
    initialize_with_readme: Option<bool>,
}

/// Lowercased name with whitespace runs collapsed to `-`.
fn repository_path(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

fn create_repository(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreateRepositoryArgs = parse_args(args)?;
        let body = json!({
            "name": args.name,
            "description": args.description,
            "visibility": args.visibility,
            "initialize_with_readme": args.initialize_with_readme,
            "default_branch": "main",
            "path": repository_path(&args.name),
        });
        let project: Project = api.post(api.url(["projects"])?, &body).await?;
        ToolOutput::json(&project)
    })
}

#[derive(Debug, Deserialize)]
struct GetFileContentsArgs {
    project_id: String,
    file_path: String,
    #[serde(rename = "ref")]
    git_ref: Option<String>,
}

fn get_file_contents(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: GetFileContentsArgs = parse_args(args)?;
        let git_ref = match args.git_ref {
            Some(r) => r,
            None => default_branch(api, &args.project_id).await?,
        };

        let mut content = fetch_contents(api, &args.project_id, &args.file_path, &git_ref).await?;
        if let Content::File(file) = &mut content {
            if !file.content.is_empty() {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(file.content.as_bytes())
                    .map_err(|e| Error::InvalidResponse(format!("file content is not base64: {}", e)))?;
                file.content = String::from_utf8_lossy(&bytes).into_owned();
                file.encoding = "utf8".to_string();
            }
        }
        ToolOutput::json(&content)
    })
}

#[derive(Debug, Deserialize)]
struct PushFile {
    file_path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct PushFilesArgs {
    project_id: String,
    branch: String,
    files: Vec<PushFile>,
    commit_message: String,
}

fn push_files(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: PushFilesArgs = parse_args(args)?;
        let actions: Vec<Value> = args
            .files
            .iter()
            .map(|f| {
                json!({
                    "action": "create",
                    "file_path": f.file_path,
                    "content": f.content,
                    "encoding": "text",
                })
            })
            .collect();
        let body = json!({
            "branch": args.branch,
            "commit_message": args.commit_message,
            "actions": actions,
        });

        let commit: Commit = api
            .post(api.project_url(&args.project_id, &["repository", "commits"])?, &body)
            .await?;
        ToolOutput::json(&commit)
    })
}

#[derive(Debug, Deserialize)]
struct ForkArgs {
    project_id: String,
    namespace: Option<String>,
}

fn fork_repository(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ForkArgs = parse_args(args)?;
        let url = with_query(
            api.project_url(&args.project_id, &["fork"])?,
            args.namespace.iter().map(|ns| ("namespace", ns.as_str())),
        );
        match api.post_empty::<Fork>(url).await {
            Ok(fork) => ToolOutput::json(&fork),
            Err(Error::Backend(e)) if e.status == 409 => Err(Error::Conflict(
                "Project already exists in the target namespace".to_string(),
            )),
            Err(e) => Err(e),
        }
    })
}

#[derive(Debug, Deserialize)]
struct CreateBranchArgs {
    project_id: String,
    branch: String,
    #[serde(rename = "ref")]
    git_ref: Option<String>,
}

fn create_branch(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: CreateBranchArgs = parse_args(args)?;
        let git_ref = match args.git_ref {
            Some(r) => r,
            None => default_branch(api, &args.project_id).await?,
        };
        let body = json!({ "branch": args.branch, "ref": git_ref });
        let branch: Reference = api
            .post(api.project_url(&args.project_id, &["repository", "branches"])?, &body)
            .await?;
        ToolOutput::json(&branch)
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct TreeArgs {
    project_id: String,
    path: Option<String>,
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    recursive: Option<bool>,
    per_page: Option<u64>,
    page_token: Option<String>,
    pagination: Option<String>,
}

fn get_repository_tree(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: TreeArgs = parse_args(args)?;
        let url = with_query(
            api.project_url(&args.project_id, &["repository", "tree"])?,
            query_pairs(&args, &["project_id"])?,
        );
        match api.get::<Vec<TreeEntry>>(url).await {
            Ok(tree) => ToolOutput::json(&tree),
            Err(e) if e.is_not_found() => Err(Error::not_found("Repository or path not found")),
            Err(e) => Err(e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::transport::MockTransport;
    use crate::tools::handlers::test_support::{api, output_json, pairs, respond, sorted_query};
    use reqwest::Method;

    fn file_json(content_b64: &str) -> Value {
        json!({
            "file_name": "README.md",
            "file_path": "README.md",
            "size": 5,
            "encoding": "base64",
            "content": content_b64,
            "content_sha256": "abc",
            "ref": "main",
            "blob_id": "blob1",
            "commit_id": "commit-probed",
            "last_commit_id": "last-probed"
        })
    }

    fn write_response() -> String {
        json!({ "file_path": "README.md", "branch": "main" }).to_string()
    }

    fn write_args() -> Value {
        json!({
            "project_id": "group/app",
            "file_path": "README.md",
            "content": "hello",
            "commit_message": "docs",
            "branch": "main"
        })
    }

    #[tokio::test]
    async fn test_missing_file_is_created() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| req.method == Method::GET)
            .times(1)
            .returning(|_| Ok(respond(404, r#"{"message":"404 File Not Found"}"#)));
        mock.expect_send()
            .withf(|req| {
                req.method == Method::POST
                    && req.url.path() == "/api/v4/projects/group%2Fapp/repository/files/README.md"
                    && req.body.as_ref().map(|b| b.get("commit_id").is_none()) == Some(true)
            })
            .times(1)
            .returning(|_| Ok(respond(201, write_response())));

        let output = create_or_update_file(&api(mock), write_args()).await.unwrap();
        assert_eq!(output_json(output)["file_path"], "README.md");
    }

    #[tokio::test]
    async fn test_existing_file_is_updated_with_fetched_ids() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| req.method == Method::GET && req.url.query() == Some("ref=main"))
            .times(1)
            .returning(|_| Ok(respond(200, file_json("aGVsbG8=").to_string())));
        mock.expect_send()
            .withf(|req| {
                let body = req.body.clone().unwrap_or_default();
                req.method == Method::PUT
                    && body["commit_id"] == "commit-probed"
                    && body["last_commit_id"] == "explicit"
                    && body["encoding"] == "text"
            })
            .times(1)
            .returning(|_| Ok(respond(200, write_response())));

        let mut args = write_args();
        args["last_commit_id"] = json!("explicit");
        create_or_update_file(&api(mock), args).await.unwrap();
    }

    #[tokio::test]
    async fn test_lookup_failure_other_than_missing_aborts() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Ok(respond(500, "boom")));

        let err = create_or_update_file(&api(mock), write_args()).await.unwrap_err();
        assert!(matches!(err, Error::Backend(ref b) if b.status == 500));
    }

    #[tokio::test]
    async fn test_get_file_contents_defaults_ref_and_decodes() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| req.url.path() == "/api/v4/projects/42")
            .times(1)
            .returning(|_| {
                Ok(respond(
                    200,
                    json!({
                        "id": 42, "name": "app", "path_with_namespace": "g/app",
                        "description": null, "default_branch": "trunk"
                    })
                    .to_string(),
                ))
            });
        mock.expect_send()
            .withf(|req| req.url.query() == Some("ref=trunk"))
            .times(1)
            .returning(|_| Ok(respond(200, file_json("aGVsbG8=").to_string())));

        let output = get_file_contents(&api(mock), json!({ "project_id": "42", "file_path": "README.md" }))
            .await
            .unwrap();
        let value = output_json(output);
        assert_eq!(value["content"], "hello");
        assert_eq!(value["encoding"], "utf8");
    }

    #[tokio::test]
    async fn test_get_file_contents_not_found_names_path() {
        let mut mock = MockTransport::new();
        mock.expect_send().returning(|_| Ok(respond(404, "{}")));

        let err = get_file_contents(
            &api(mock),
            json!({ "project_id": "42", "file_path": "missing.txt", "ref": "main" }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "File not found: missing.txt");
    }

    #[tokio::test]
    async fn test_search_uses_headers_then_falls_back() {
        let project = json!({ "id": 1, "name": "a", "path_with_namespace": "g/a", "description": null });
        let body = json!([project.clone(), project]).to_string();

        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| {
                let query = req.url.query().unwrap_or_default();
                query.contains("order_by=id") && query.contains("sort=desc")
            })
            .times(1)
            .returning(move |_| Ok(respond(200, body.clone())));

        let output = search_repositories(&api(mock), json!({ "search": "a", "page": 1, "per_page": 1 }))
            .await
            .unwrap();
        let value = output_json(output);
        assert_eq!(value["count"], 2);
        assert_eq!(value["total_pages"], 2);
        assert_eq!(value["current_page"], 1);

        let mut mock = MockTransport::new();
        mock.expect_send().returning(|_| {
            let mut response = respond(200, "[]");
            response.headers.insert("x-total".to_string(), "40".to_string());
            response.headers.insert("x-total-pages".to_string(), "2".to_string());
            Ok(response)
        });
        let output = search_repositories(&api(mock), json!({ "search": "a", "page": 2, "per_page": 20 }))
            .await
            .unwrap();
        let value = output_json(output);
        assert_eq!(value["count"], 40);
        assert_eq!(value["total_pages"], 2);
    }

    #[test]
    fn test_repository_path() {
        assert_eq!(repository_path("My  New\tProject"), "my-new-project");
        assert_eq!(repository_path("tool"), "tool");
    }

    #[tokio::test]
    async fn test_fork_conflict() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| req.url.query() == Some("namespace=team"))
            .returning(|_| Ok(respond(409, "{}")));

        let err = fork_repository(&api(mock), json!({ "project_id": "42", "namespace": "team" }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(err.to_string(), "Project already exists in the target namespace");
    }

    #[tokio::test]
    async fn test_tree_not_found() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| sorted_query(&req.url) == pairs(&[("path", "docs"), ("recursive", "true")]))
            .returning(|_| Ok(respond(404, "{}")));

        let err = get_repository_tree(
            &api(mock),
            json!({ "project_id": "42", "path": "docs", "recursive": true }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Repository or path not found");
    }
}

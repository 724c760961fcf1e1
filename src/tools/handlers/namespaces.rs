//! Namespace tools.

use super::{optional_bool, optional_int, optional_str, page, parse_args, per_page};
use crate::gitlab::models::{Namespace, NamespaceExists};
use crate::gitlab::{decode_id, query_pairs, with_query, GitLabApi};
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::gateway::{InvokeFuture, Tool, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            ToolEntry::new(
                "list_namespaces",
                "List all namespaces available to the current user",
                vec![
                    optional_str("search", "Search term for namespaces"),
                    page(),
                    per_page(),
                    optional_bool("owned", "Filter for namespaces owned by current user"),
                ],
            ),
            list_namespaces,
        ),
        Tool::new(
            ToolEntry::new(
                "get_namespace",
                "Get details of a namespace by ID or path",
                vec![ParamDef::required(
                    "namespace_id",
                    ParamType::String,
                    "Namespace ID or full path",
                )],
            ),
            get_namespace,
        ),
        Tool::new(
            ToolEntry::new(
                "verify_namespace",
                "Verify if a namespace path exists",
                vec![
                    ParamDef::required("path", ParamType::String, "Namespace path to verify"),
                    optional_int("parent_id", "ID of the parent namespace"),
                ],
            ),
            verify_namespace,
        ),
    ]
}

#[derive(Debug, Serialize, Deserialize)]
struct ListNamespacesArgs {
    search: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
    owned: Option<bool>,
}

fn list_namespaces(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: ListNamespacesArgs = parse_args(args)?;
        let url = with_query(api.url(["namespaces"])?, query_pairs(&args, &[])?);
        let namespaces: Vec<Namespace> = api.get(url).await?;
        ToolOutput::json(&namespaces)
    })
}

#[derive(Debug, Deserialize)]
struct GetNamespaceArgs {
    namespace_id: String,
}

fn get_namespace(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: GetNamespaceArgs = parse_args(args)?;
        let id = decode_id("namespace_id", &args.namespace_id)?;
        let namespace: Namespace = api.get(api.url(["namespaces", id.as_str()])?).await?;
        ToolOutput::json(&namespace)
    })
}

#[derive(Debug, Deserialize)]
struct VerifyNamespaceArgs {
    path: String,
    parent_id: Option<u64>,
}

fn verify_namespace(api: &GitLabApi, args: Value) -> InvokeFuture<'_> {
    Box::pin(async move {
        let args: VerifyNamespaceArgs = parse_args(args)?;
        let path = decode_id("path", &args.path)?;
        let url = with_query(
            api.url(["namespaces", path.as_str(), "exists"])?,
            args.parent_id.map(|id| ("parent_id", id.to_string())),
        );
        let exists: NamespaceExists = api.get(url).await?;
        ToolOutput::json(&exists)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::transport::MockTransport;
    use crate::tools::handlers::test_support::{api, output_json, pairs, respond, sorted_query};
    use serde_json::json;

    fn namespace() -> Value {
        json!({
            "id": 9,
            "name": "Team",
            "path": "team",
            "kind": "group",
            "full_path": "org/team",
            "parent_id": 3,
            "avatar_url": null,
            "web_url": "https://gitlab.example.com/groups/org/team"
        })
    }

    #[tokio::test]
    async fn test_list_namespaces_query() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| {
                req.url.path() == "/api/v4/namespaces"
                    && sorted_query(&req.url) == pairs(&[("owned", "true"), ("search", "te")])
            })
            .times(1)
            .returning(|_| Ok(respond(200, json!([namespace()]).to_string())));

        let output = list_namespaces(&api(mock), json!({ "search": "te", "owned": true }))
            .await
            .unwrap();
        assert_eq!(output_json(output)[0]["full_path"], "org/team");
    }

    #[tokio::test]
    async fn test_get_namespace_by_path_is_one_segment() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| req.url.path() == "/api/v4/namespaces/org%2Fteam")
            .times(1)
            .returning(|_| Ok(respond(200, namespace().to_string())));

        get_namespace(&api(mock), json!({ "namespace_id": "org/team" }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_verify_namespace() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| {
                req.url.path() == "/api/v4/namespaces/team/exists" && req.url.query() == Some("parent_id=3")
            })
            .times(1)
            .returning(|_| Ok(respond(200, r#"{"exists": false, "suggests": ["team1"]}"#)));

        let output = verify_namespace(&api(mock), json!({ "path": "team", "parent_id": 3 }))
            .await
            .unwrap();
        assert_eq!(output_json(output), json!({ "exists": false, "suggests": ["team1"] }));
    }
}

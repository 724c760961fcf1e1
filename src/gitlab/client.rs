//! GitLab REST client.
//!
//! Builds endpoint URLs, attaches credentials, and is the one place where a
//! non-success response becomes a classified [`BackendError`].

use crate::gitlab::transport::{HttpRequest, HttpResponse, Transport};
use crate::types::{BackendError, BackendErrorKind, Error, GitLabConfig, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Authenticated handle on one GitLab instance.
#[derive(Clone)]
pub struct GitLabApi {
    base: Url,
    headers: HeaderMap,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for GitLabApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitLabApi")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl GitLabApi {
    pub fn new(config: &GitLabConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let base = Url::parse(&config.api_url).map_err(|e| {
            Error::configuration(format!("invalid GitLab API URL '{}': {}", config.api_url, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::configuration(format!(
                "GitLab API URL cannot carry a path: {}",
                config.api_url
            )));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| Error::configuration("access token contains invalid header characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            base,
            headers,
            transport,
        })
    }

    /// Append path segments to the API root. Each segment is encoded as a
    /// single segment, so `/` inside one becomes `%2F`.
    pub fn url<I, S>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::internal("API root cannot be a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `projects/<id>/<rest...>`, with the project id normalized first.
    pub fn project_url(&self, project_id: &str, rest: &[&str]) -> Result<Url> {
        let id = decode_id("project_id", project_id)?;
        self.url(
            ["projects", id.as_str()]
                .into_iter()
                .chain(rest.iter().copied()),
        )
    }

    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.execute(Method::GET, url.clone(), None).await?;
        decode(&url, &response)
    }

    /// GET that also hands back the response for header inspection.
    pub async fn get_with_response<T: DeserializeOwned>(&self, url: Url) -> Result<(T, HttpResponse)> {
        let response = self.execute(Method::GET, url.clone(), None).await?;
        let value = decode(&url, &response)?;
        Ok((value, response))
    }

    /// GET returning the raw body (job traces).
    pub async fn get_text(&self, url: Url) -> Result<String> {
        Ok(self.execute(Method::GET, url, None).await?.body)
    }

    pub async fn post<B, T>(&self, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self.execute(Method::POST, url.clone(), Some(body)).await?;
        decode(&url, &response)
    }

    /// POST without a request body.
    pub async fn post_empty<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.execute(Method::POST, url.clone(), None).await?;
        decode(&url, &response)
    }

    pub async fn put<B, T>(&self, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self.execute(Method::PUT, url.clone(), Some(body)).await?;
        decode(&url, &response)
    }

    pub async fn delete(&self, url: Url) -> Result<()> {
        self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    /// Send one request. Non-success statuses become `Error::Backend`.
    pub async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<HttpResponse> {
        tracing::debug!(method = %method, path = %url.path(), "gitlab_request");

        let request = HttpRequest {
            method: method.clone(),
            url: url.clone(),
            headers: self.headers.clone(),
            body,
        };
        let response = self.transport.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let err = BackendError::classify(response.status, response.status_text, response.body);
        match err.kind {
            BackendErrorKind::RateLimited => tracing::warn!(
                method = %method,
                path = %url.path(),
                status = err.status,
                body = %err.body,
                "gitlab_rate_limited"
            ),
            _ => tracing::debug!(
                method = %method,
                path = %url.path(),
                status = err.status,
                "gitlab_error_response"
            ),
        }
        Err(err.into())
    }
}

fn decode<T: DeserializeOwned>(url: &Url, response: &HttpResponse) -> Result<T> {
    serde_json::from_str(&response.body)
        .map_err(|e| Error::InvalidResponse(format!("{}: {}", url.path(), e)))
}

/// Percent-decode an id or path argument so callers may pass either
/// `group/app` or `group%2Fapp`. A malformed escape (`100%`, `%zz`) or
/// non-UTF-8 result is a validation error on `field`.
pub fn decode_id(field: &str, raw: &str) -> Result<String> {
    let malformed = raw.match_indices('%').any(|(i, _)| {
        !raw.get(i + 1..i + 3)
            .is_some_and(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
    });
    if malformed {
        return Err(Error::validation(field, "malformed percent-encoding"));
    }
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| Error::validation(field, "percent-encoding is not valid UTF-8"))
}

/// Flatten a serializable argument struct into query pairs.
///
/// `None` fields are skipped, booleans and numbers are stringified, and
/// arrays of scalars are comma-joined. Keys in `skip` stay out of the query.
pub fn query_pairs<T: Serialize>(args: &T, skip: &[&str]) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(args)?;
    let serde_json::Value::Object(map) = value else {
        return Ok(Vec::new());
    };

    Ok(map
        .into_iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .filter_map(|(key, value)| scalar_text(&value).map(|text| (key, text)))
        .collect())
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
    }
}

/// Append query pairs to a URL.
pub fn with_query<I, K, V>(mut url: Url, pairs: I) -> Url
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key.as_ref(), value.as_ref());
        }
    }
    if url.query() == Some("") {
        url.set_query(None);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::transport::MockTransport;
    use serde_json::{json, Value};

    fn config() -> GitLabConfig {
        GitLabConfig {
            token: "glpat-test".to_string(),
            api_url: "https://gitlab.example.com/api/v4".to_string(),
            ..Default::default()
        }
    }

    fn api_with(mock: MockTransport) -> GitLabApi {
        GitLabApi::new(&config(), Arc::new(mock)).unwrap()
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            status_text: "OK".to_string(),
            body: body.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_project_url_encodes_path_ids() {
        let api = api_with(MockTransport::new());
        let plain = api.project_url("group/sub/app", &["issues", "7"]).unwrap();
        let encoded = api.project_url("group%2Fsub%2Fapp", &["issues", "7"]).unwrap();

        assert_eq!(plain.as_str(), "https://gitlab.example.com/api/v4/projects/group%2Fsub%2Fapp/issues/7");
        assert_eq!(plain, encoded);
    }

    #[test]
    fn test_file_path_is_one_segment() {
        let api = api_with(MockTransport::new());
        let url = api.project_url("42", &["repository", "files", "src/main.rs"]).unwrap();
        assert!(url.as_str().ends_with("/projects/42/repository/files/src%2Fmain.rs"));
    }

    #[test]
    fn test_decode_id_rejects_malformed_escapes() {
        assert_eq!(decode_id("project_id", "group%2Fapp").unwrap(), "group/app");
        assert_eq!(decode_id("project_id", "plain").unwrap(), "plain");

        for raw in ["100%", "a%zz", "%2", "%C3%28"] {
            let err = decode_id("project_id", raw).unwrap_err();
            let Error::Validation(errors) = err else {
                panic!("expected validation error for {raw}");
            };
            assert_eq!(errors.paths(), vec!["project_id"]);
        }
    }

    #[test]
    fn test_malformed_project_id_never_reaches_transport() {
        let api = api_with(MockTransport::new());
        assert!(matches!(api.project_url("100%", &[]), Err(Error::Validation(_))));
    }

    #[test]
    fn test_query_pairs() {
        let args = json!({
            "project_id": "42",
            "state": "opened",
            "label_name": ["bug", "ui"],
            "confidential": false,
            "page": 2,
            "search": null,
        });
        let mut pairs = query_pairs(&args, &["project_id"]).unwrap();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("confidential".to_string(), "false".to_string()),
                ("label_name".to_string(), "bug,ui".to_string()),
                ("page".to_string(), "2".to_string()),
                ("state".to_string(), "opened".to_string()),
            ]
        );
    }

    #[test]
    fn test_with_query_empty_leaves_no_question_mark() {
        let api = api_with(MockTransport::new());
        let url = with_query(api.url(["projects"]).unwrap(), Vec::<(String, String)>::new());
        assert_eq!(url.as_str(), "https://gitlab.example.com/api/v4/projects");
    }

    #[tokio::test]
    async fn test_sends_bearer_and_json_headers() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| {
                req.method == Method::GET
                    && req.headers.get(AUTHORIZATION).map(|v| v.as_bytes()) == Some(b"Bearer glpat-test".as_slice())
                    && req.headers.get(CONTENT_TYPE).is_some()
            })
            .times(1)
            .returning(|_| Ok(ok(r#"{"exists": true}"#)));

        let api = api_with(mock);
        let value: Value = api.get(api.url(["namespaces", "grp", "exists"]).unwrap()).await.unwrap();
        assert_eq!(value["exists"], true);
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified_once() {
        let mut mock = MockTransport::new();
        mock.expect_send().times(1).returning(|_| {
            Ok(HttpResponse {
                status: 403,
                status_text: "Forbidden".to_string(),
                body: "User API Key Rate limit exceeded".to_string(),
                ..Default::default()
            })
        });

        let api = api_with(mock);
        let err = api
            .get::<Value>(api.project_url("1", &[]).unwrap())
            .await
            .unwrap_err();
        match err {
            Error::Backend(backend) => assert_eq!(backend.kind, BackendErrorKind::RateLimited),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_is_invalid_response() {
        let mut mock = MockTransport::new();
        mock.expect_send().returning(|_| Ok(ok("<html>")));

        let api = api_with(mock);
        let err = api
            .get::<Value>(api.project_url("1", &[]).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| Err(Error::Transport("connection refused".to_string())));

        let api = api_with(mock);
        let err = api.delete(api.project_url("1", &[]).unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}

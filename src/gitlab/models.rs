//! GitLab response models.
//!
//! Decoding a response body into one of these is the response validation
//! step. Unknown fields are dropped. Fields GitLab always sends but may set
//! to `null` are `Option` and always serialized; fields GitLab may omit are
//! skipped when absent.

use serde::{Deserialize, Serialize};

// =============================================================================
// Users and namespaces
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub web_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    User,
    Group,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub kind: NamespaceKind,
    pub full_path: String,
    pub parent_id: Option<u64>,
    pub avatar_url: Option<String>,
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_count_with_descendants: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billable_members_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_seats_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats_in_use: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_ends_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_repository_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceExists {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggests: Option<Vec<String>>,
}

// =============================================================================
// Projects
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectOwner {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub state: String,
    pub avatar_url: Option<String>,
    pub web_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectNamespace {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub kind: String,
    pub full_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLevel {
    pub access_level: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_level: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPermissions {
    #[serde(default)]
    pub project_access: Option<AccessLevel>,
    #[serde(default)]
    pub group_access: Option<AccessLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedGroup {
    pub group_id: u64,
    pub group_name: String,
    pub group_full_path: String,
    pub group_access_level: u64,
}

/// A project (GitLab calls the repository side of it the same thing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ProjectOwner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_url_to_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_url_to_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<ProjectNamespace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_issues_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forks_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ProjectPermissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_registry_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_registry_access_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_requests_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippets_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_create_merge_request_in: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_outdated_diff_discussions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_runners_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_with_groups: Option<Vec<SharedGroup>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkParentOwner {
    pub id: u64,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkParent {
    pub name: String,
    pub path_with_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ForkParentOwner>,
    pub web_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fork {
    #[serde(flatten)]
    pub project: Project,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from_project: Option<ForkParent>,
}

/// Paged project search result assembled from the list body and headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub count: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub items: Vec<Project>,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    pub file_name: String,
    pub file_path: String,
    pub size: u64,
    pub encoding: String,
    pub content: String,
    pub content_sha256: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub blob_id: String,
    pub commit_id: String,
    pub last_commit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_filemode: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub mode: String,
    pub web_url: String,
}

/// A file, or a directory listing when the path names a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    File(FileContent),
    Directory(Vec<DirectoryEntry>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryType {
    Blob,
    Tree,
    Commit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: TreeEntryType,
    pub path: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub short_id: String,
    pub title: String,
    pub author_name: String,
    pub author_email: String,
    pub authored_date: String,
    pub committer_name: String,
    pub committer_email: String,
    pub committed_date: String,
    pub web_url: String,
    pub parent_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCommit {
    pub id: String,
    pub web_url: String,
}

/// A branch as returned by the branches API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub commit: ReferenceCommit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUpdateFileResponse {
    pub file_path: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<FileContent>,
}

// =============================================================================
// Labels, milestones, issues
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: u64,
    pub name: String,
    pub color: String,
    pub text_color: String,
    pub description: Option<String>,
    pub description_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_issues_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_issues_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_merge_requests_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_project_label: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    pub description: Option<String>,
    pub state: String,
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
}

/// Issue labels arrive as names, or as objects with `with_labels_details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IssueLabels {
    Detailed(Vec<Label>),
    Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueReferences {
    pub short: String,
    pub relative: String,
    pub full: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStats {
    pub time_estimate: i64,
    pub total_time_spent: i64,
    pub human_time_estimate: Option<String>,
    pub human_total_time_spent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub iid: u64,
    pub project_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub state: String,
    pub author: User,
    pub assignees: Vec<User>,
    pub labels: IssueLabels,
    pub milestone: Option<Milestone>,
    pub created_at: String,
    pub updated_at: String,
    pub closed_at: Option<String>,
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<IssueReferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stats: Option<TimeStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidential: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    RelatesTo,
    Blocks,
    IsBlockedBy,
}

/// An issue as listed from another issue's links endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedIssue {
    #[serde(flatten)]
    pub issue: Issue,
    pub issue_link_id: u64,
    pub link_type: LinkType,
    pub link_created_at: String,
    pub link_updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueLink {
    pub source_issue: Issue,
    pub target_issue: Issue,
    pub link_type: LinkType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurndownEvent {
    pub created_at: String,
    pub weight: Option<i64>,
    pub action: String,
}

// =============================================================================
// Merge requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRefs {
    pub base_sha: String,
    pub head_sha: String,
    pub start_sha: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: u64,
    pub iid: u64,
    pub project_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub state: String,
    pub author: User,
    pub source_branch: String,
    pub target_branch: String,
    pub web_url: String,
    pub created_at: String,
    pub updated_at: String,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
    pub merge_commit_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<User>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_refs: Option<DiffRefs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_merge_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_in_progress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_discussions_resolved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_remove_source_branch: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_remove_source_branch: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_collaboration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_maintainer_to_push: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_when_pipeline_succeeds: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squash: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequestDiff {
    pub old_path: String,
    pub new_path: String,
    pub a_mode: String,
    pub b_mode: String,
    pub diff: String,
    pub new_file: bool,
    pub renamed_file: bool,
    pub deleted_file: bool,
}

/// `GET .../merge_requests/:iid/changes` body; only `changes` is kept.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestChanges {
    pub changes: Vec<MergeRequestDiff>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionNote {
    pub id: u64,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    pub body: String,
    pub author: User,
    pub created_at: String,
    pub updated_at: String,
    pub system: bool,
    pub noteable_id: u64,
    pub noteable_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noteable_iid: Option<u64>,
    #[serde(default)]
    pub resolvable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: String,
    pub individual_note: bool,
    pub notes: Vec<DiscussionNote>,
}

// =============================================================================
// Wiki
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiPage {
    pub title: String,
    pub slug: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

// =============================================================================
// Pipelines
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub project_id: u64,
    pub status: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPipeline {
    pub id: u64,
    pub project_id: u64,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub status: String,
    pub stage: String,
    pub name: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_failure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<JobPipeline>,
}

// =============================================================================
// Deletes
// =============================================================================

/// Body returned by every delete tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteStatus {
    pub status: String,
    pub message: String,
}

impl DeleteStatus {
    pub fn deleted(what: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: format!("{} deleted successfully", what),
        }
    }
}

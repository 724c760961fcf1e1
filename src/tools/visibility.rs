//! Tool visibility: which catalog entries are listed for this process.
//!
//! Mode flags are resolved once at startup. Filtering only shapes the
//! `tools/list` answer; dispatch never consults it.

use crate::tools::catalog::ToolEntry;
use serde::{Deserialize, Serialize};

/// Boolean switches resolved from the environment at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeFlags {
    /// Expose only the read-only group.
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub wiki: bool,
    #[serde(default)]
    pub pipeline: bool,
    #[serde(default)]
    pub milestone: bool,
}

/// Named set of tool names used purely for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolGroup {
    ReadOnly,
    Wiki,
    Pipeline,
    Milestone,
}

const READ_ONLY_TOOLS: &[&str] = &[
    "search_repositories",
    "get_file_contents",
    "get_repository_tree",
    "get_merge_request",
    "get_merge_request_diffs",
    "mr_discussions",
    "list_issues",
    "get_issue",
    "list_issue_links",
    "get_issue_link",
    "list_namespaces",
    "get_namespace",
    "verify_namespace",
    "get_project",
    "list_projects",
    "list_labels",
    "get_label",
    "list_group_projects",
    "list_wiki_pages",
    "get_wiki_page",
    "list_pipelines",
    "get_pipeline",
    "list_pipeline_jobs",
    "get_pipeline_job",
    "get_pipeline_job_output",
    "list_milestones",
    "get_milestone",
    "get_milestone_issue",
    "get_milestone_merge_requests",
    "get_milestone_burndown_events",
];

const WIKI_TOOLS: &[&str] = &[
    "list_wiki_pages",
    "get_wiki_page",
    "create_wiki_page",
    "update_wiki_page",
    "delete_wiki_page",
];

const PIPELINE_TOOLS: &[&str] = &[
    "list_pipelines",
    "get_pipeline",
    "list_pipeline_jobs",
    "get_pipeline_job",
    "get_pipeline_job_output",
    "create_pipeline",
    "retry_pipeline",
    "cancel_pipeline",
];

const MILESTONE_TOOLS: &[&str] = &[
    "list_milestones",
    "get_milestone",
    "create_milestone",
    "edit_milestone",
    "delete_milestone",
    "get_milestone_issue",
    "get_milestone_merge_requests",
    "promote_milestone",
    "get_milestone_burndown_events",
];

impl ToolGroup {
    pub const ALL: [ToolGroup; 4] = [
        ToolGroup::ReadOnly,
        ToolGroup::Wiki,
        ToolGroup::Pipeline,
        ToolGroup::Milestone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolGroup::ReadOnly => "read-only",
            ToolGroup::Wiki => "wiki",
            ToolGroup::Pipeline => "pipeline",
            ToolGroup::Milestone => "milestone",
        }
    }

    pub fn members(&self) -> &'static [&'static str] {
        match self {
            ToolGroup::ReadOnly => READ_ONLY_TOOLS,
            ToolGroup::Wiki => WIKI_TOOLS,
            ToolGroup::Pipeline => PIPELINE_TOOLS,
            ToolGroup::Milestone => MILESTONE_TOOLS,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members().contains(&name)
    }
}

impl ModeFlags {
    /// Whether `name` passes every active rule.
    pub fn exposes(&self, name: &str) -> bool {
        let disabled = [
            (self.wiki, ToolGroup::Wiki),
            (self.pipeline, ToolGroup::Pipeline),
            (self.milestone, ToolGroup::Milestone),
        ];
        if disabled
            .iter()
            .any(|(enabled, group)| !enabled && group.contains(name))
        {
            return false;
        }
        !self.read_only || ToolGroup::ReadOnly.contains(name)
    }
}

/// Reduce `all` to the entries exposed under `flags`, preserving order.
///
/// Names outside every group are kept.
pub fn filter(all: &[ToolEntry], flags: &ModeFlags) -> Vec<ToolEntry> {
    all.iter()
        .filter(|entry| flags.exposes(&entry.name))
        .cloned()
        .collect()
}

/// Group members that match no cataloged tool, as `(group, name)` pairs.
pub fn unmatched_members<'a, I>(catalog_names: I) -> Vec<(ToolGroup, &'static str)>
where
    I: IntoIterator<Item = &'a str>,
{
    let known: std::collections::HashSet<&str> = catalog_names.into_iter().collect();
    ToolGroup::ALL
        .iter()
        .flat_map(|group| group.members().iter().map(move |name| (*group, *name)))
        .filter(|(_, name)| !known.contains(name))
        .collect()
}

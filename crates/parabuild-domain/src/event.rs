//! Normalized repository events.
//!
//! Host callbacks (post-receive hooks, auto-merge listeners) are translated
//! into a single [`RepositoryEvent`] shape before any job is evaluated.

use serde::{Deserialize, Serialize};

pub const REFS_HEADS: &str = "refs/heads/";
pub const REFS_TAGS: &str = "refs/tags/";

/// Kind of ref change. Exactly one per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

/// The user whose action raised the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub slug: String,
}

impl User {
    pub fn new(slug: impl Into<String>) -> Self {
        Self { slug: slug.into() }
    }
}

/// Pull request details carried by auto-merge notifications.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub id: u64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_branch: String,
    pub target_branch: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "EventRecord")]
pub struct RepositoryEvent {
    pub project_key: String,
    /// Repository slug.
    pub repository: String,
    /// Full ref id, e.g. `refs/heads/main`.
    pub ref_id: String,
    /// Branch or tag name with the ref prefix removed.
    pub branch: String,
    pub is_tag: bool,
    pub change: ChangeKind,
    pub from_revision: String,
    pub to_revision: String,
    /// Acting user; `None` for anonymous pushes.
    pub user: Option<User>,
    pub pull_request: Option<PullRequest>,
}

impl RepositoryEvent {
    /// Build an event from a ref change, deriving branch and tag flag from the ref id.
    pub fn from_ref_change(
        project_key: impl Into<String>,
        repository: impl Into<String>,
        ref_id: impl Into<String>,
        change: ChangeKind,
        from_revision: impl Into<String>,
        to_revision: impl Into<String>,
        user: Option<User>,
    ) -> Self {
        let ref_id = ref_id.into();
        let (branch, is_tag) = split_ref(&ref_id);

        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            ref_id,
            branch,
            is_tag,
            change,
            from_revision: from_revision.into(),
            to_revision: to_revision.into(),
            user,
            pull_request: None,
        }
    }

    /// Build an event for a pull request merged by the host's automatic merge.
    ///
    /// The event's branch is the pull request's target branch.
    pub fn pull_request_auto_merged(
        project_key: impl Into<String>,
        repository: impl Into<String>,
        pull_request: PullRequest,
        merge_revision: impl Into<String>,
        user: Option<User>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            ref_id: format!("{REFS_HEADS}{}", pull_request.target_branch),
            branch: pull_request.target_branch.clone(),
            is_tag: false,
            change: ChangeKind::Update,
            from_revision: String::new(),
            to_revision: merge_revision.into(),
            user,
            pull_request: Some(pull_request),
        }
    }

    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    pub fn user_slug(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.slug.as_str())
    }
}

/// Branch or tag name and tag flag for a full ref id.
fn split_ref(ref_id: &str) -> (String, bool) {
    match ref_id.strip_prefix(REFS_TAGS) {
        Some(tag) => (tag.to_string(), true),
        None => (
            ref_id.strip_prefix(REFS_HEADS).unwrap_or(ref_id).to_string(),
            false,
        ),
    }
}

/// Wire form of [`RepositoryEvent`]. `branch` and `isTag` may be omitted
/// and are then derived from `refId`, or from the pull request's target.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    project_key: String,
    repository: String,
    #[serde(default)]
    ref_id: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    is_tag: Option<bool>,
    change: ChangeKind,
    #[serde(default)]
    from_revision: String,
    #[serde(default)]
    to_revision: String,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    pull_request: Option<PullRequest>,
}

impl From<EventRecord> for RepositoryEvent {
    fn from(record: EventRecord) -> Self {
        let (derived_branch, derived_tag) = match &record.pull_request {
            Some(pr) if record.ref_id.is_empty() => (pr.target_branch.clone(), false),
            _ => split_ref(&record.ref_id),
        };
        Self {
            project_key: record.project_key,
            repository: record.repository,
            ref_id: record.ref_id,
            branch: record.branch.unwrap_or(derived_branch),
            is_tag: record.is_tag.unwrap_or(derived_tag),
            change: record.change,
            from_revision: record.from_revision,
            to_revision: record.to_revision,
            user: record.user,
            pull_request: record.pull_request,
        }
    }
}

//! Build parameter templates.
//!
//! A job's template holds one `key=value` pair per line. Values may refer to
//! event variables such as `$BRANCH`; a value containing `;` is a choice list
//! whose first entry is sent.

use serde::Serialize;

use crate::event::RepositoryEvent;
use crate::job::Trigger;

/// Event metadata substituted into build parameter templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildVariables {
    pub branch: String,
    pub commit: String,
    pub prev_commit: String,
    /// Base url of the originating source-control system.
    pub url: String,
    pub repository: String,
    pub project: String,
    pub trigger: String,
    pub pr_id: Option<u64>,
    pub pr_author: String,
    pub pr_title: String,
    pub pr_description: String,
    pub pr_destination: String,
    pub pr_url: String,
}

impl BuildVariables {
    pub fn from_event(event: &RepositoryEvent, trigger: Trigger, source_url: &str) -> Self {
        let mut vars = Self {
            branch: event.branch.clone(),
            commit: event.to_revision.clone(),
            prev_commit: event.from_revision.clone(),
            url: source_url.to_string(),
            repository: event.repository.clone(),
            project: event.project_key.clone(),
            trigger: trigger.as_str().to_string(),
            ..Default::default()
        };
        if let Some(pr) = &event.pull_request {
            vars.pr_id = Some(pr.id);
            vars.pr_author = pr.author.clone();
            vars.pr_title = pr.title.clone();
            vars.pr_description = pr.description.clone();
            vars.pr_destination = pr.target_branch.clone();
            vars.pr_url = pr.url.clone();
        }
        vars
    }

    // Longer names first so no variable is a prefix of a later one.
    fn substitutions(&self) -> [(&'static str, String); 13] {
        [
            ("$PRDESCRIPTION", self.pr_description.clone()),
            ("$PRDESTINATION", self.pr_destination.clone()),
            ("$REPOSITORY", self.repository.clone()),
            ("$PREVCOMMIT", self.prev_commit.clone()),
            ("$PRAUTHOR", self.pr_author.clone()),
            ("$PRTITLE", self.pr_title.clone()),
            ("$PROJECT", self.project.clone()),
            ("$TRIGGER", self.trigger.clone()),
            ("$BRANCH", self.branch.clone()),
            ("$COMMIT", self.commit.clone()),
            ("$PRURL", self.pr_url.clone()),
            ("$PRID", self.pr_id.map(|id| id.to_string()).unwrap_or_default()),
            ("$URL", self.url.clone()),
        ]
    }

    /// Replace every known `$VARIABLE` in `value`.
    ///
    /// The value is scanned once; substituted text is never rescanned.
    pub fn substitute(&self, value: &str) -> String {
        let substitutions = self.substitutions();
        let mut out = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match substitutions.iter().find(|(name, _)| tail.starts_with(name)) {
                Some((name, replacement)) => {
                    out.push_str(replacement);
                    rest = &tail[name.len()..];
                }
                None => {
                    out.push('$');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Render a parameter template into a percent-encoded query string.
///
/// Returns an empty string when the template has no `key=value` lines.
pub fn render_query(template: &str, vars: &BuildVariables) -> String {
    template
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| {
            let value = value.split(';').next().unwrap_or_default();
            format!(
                "{}={}",
                urlencoding::encode(key.trim()),
                urlencoding::encode(&vars.substitute(value))
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChangeKind, PullRequest};

    fn push_event() -> RepositoryEvent {
        RepositoryEvent::from_ref_change(
            "PROJ",
            "my-repo",
            "refs/heads/feature/login",
            ChangeKind::Update,
            "111",
            "222",
            None,
        )
    }

    #[test]
    fn test_variables_from_push() {
        let vars = BuildVariables::from_event(&push_event(), Trigger::Push, "http://scm");
        assert_eq!(vars.branch, "feature/login");
        assert_eq!(vars.commit, "222");
        assert_eq!(vars.prev_commit, "111");
        assert_eq!(vars.trigger, "PUSH");
        assert!(vars.pr_id.is_none());
    }

    #[test]
    fn test_render_substitutes_and_encodes() {
        let vars = BuildVariables::from_event(&push_event(), Trigger::Push, "http://scm");
        let query = render_query("branch=$BRANCH\r\nsha=$COMMIT\nfrom=$PREVCOMMIT", &vars);
        assert_eq!(query, "branch=feature%2Flogin&sha=222&from=111");
    }

    #[test]
    fn test_render_choice_takes_first() {
        let vars = BuildVariables::default();
        assert_eq!(render_query("env=staging;prod;dev", &vars), "env=staging");
    }

    #[test]
    fn test_render_skips_malformed_lines() {
        let vars = BuildVariables::default();
        assert_eq!(render_query("\n  \nnoequals\n=orphan\nk=v", &vars), "k=v");
        assert_eq!(render_query("", &vars), "");
    }

    #[test]
    fn test_render_encodes_spaces() {
        let vars = BuildVariables {
            pr_title: "Fix the build".to_string(),
            ..Default::default()
        };
        assert_eq!(render_query("title=$PRTITLE", &vars), "title=Fix%20the%20build");
    }

    #[test]
    fn test_pull_request_variables() {
        let pr = PullRequest {
            id: 42,
            author: "bob".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            source_branch: "feature".to_string(),
            target_branch: "main".to_string(),
            url: "http://scm/pr/42".to_string(),
        };
        let event = RepositoryEvent::pull_request_auto_merged("P", "r", pr, "abc", None);
        let vars = BuildVariables::from_event(&event, Trigger::PullRequestAutoMerged, "");
        let query = render_query("id=$PRID\ndest=$PRDESTINATION\nby=$PRAUTHOR", &vars);
        assert_eq!(query, "id=42&dest=main&by=bob");
    }

    #[test]
    fn test_prev_commit_not_clobbered_by_commit() {
        let vars = BuildVariables {
            commit: "NEW".to_string(),
            prev_commit: "OLD".to_string(),
            ..Default::default()
        };
        assert_eq!(vars.substitute("$PREVCOMMIT..$COMMIT"), "OLD..NEW");
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let vars = BuildVariables {
            branch: "main".to_string(),
            commit: "abc".to_string(),
            pr_title: "Revert $COMMIT on $BRANCH".to_string(),
            ..Default::default()
        };
        assert_eq!(
            vars.substitute("$PRTITLE ($COMMIT)"),
            "Revert $COMMIT on $BRANCH (abc)"
        );
        assert_eq!(vars.substitute("cost $5 $UNKNOWN"), "cost $5 $UNKNOWN");
        assert_eq!(vars.substitute("trailing $"), "trailing $");
    }
}

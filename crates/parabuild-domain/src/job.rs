//! Job and trigger configuration.
//!
//! A [`Job`] binds a repository to a remote build. Jobs arrive either as
//! JSON documents or as the host's flat hook-settings map, which stores one
//! indexed key per field (`jobName-0`, `triggers-0`, ...).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Hook-settings key prefixes, one per job field.
pub const JOB_PREFIX: &str = "jobName-";
pub const TRIGGER_PREFIX: &str = "triggers-";
pub const PARAMETERS_PREFIX: &str = "buildParameters-";
pub const BRANCH_PREFIX: &str = "branchRegex-";
pub const PATH_PREFIX: &str = "pathRegex-";
pub const PR_DEST_PREFIX: &str = "prDestinationRegex-";
pub const TAG_PREFIX: &str = "isTag-";

/// Repository activity a job reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    /// A branch or tag was updated.
    Push,
    /// A ref was created.
    Add,
    /// A ref was removed.
    Delete,
    /// A pull request was merged by the host's automatic merge.
    #[serde(rename = "PRAUTOMERGED", alias = "PULL_REQUEST_AUTO_MERGED")]
    PullRequestAutoMerged,
    /// No trigger configured. Only used to flag misconfigured jobs.
    Null,
}

impl Trigger {
    /// Parse a `;`-separated trigger list as stored in hook settings.
    ///
    /// Unknown tokens become [`Trigger::Null`]; a list without any token
    /// yields `[Null]` so validation can report it.
    pub fn parse_list(raw: &str) -> Vec<Trigger> {
        let mut triggers: Vec<Trigger> = Vec::new();
        for token in raw.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            let trigger = token.parse().unwrap_or(Trigger::Null);
            if !triggers.contains(&trigger) {
                triggers.push(trigger);
            }
        }
        if triggers.is_empty() {
            triggers.push(Trigger::Null);
        }
        triggers
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Push => "PUSH",
            Trigger::Add => "ADD",
            Trigger::Delete => "DELETE",
            Trigger::PullRequestAutoMerged => "PRAUTOMERGED",
            Trigger::Null => "NULL",
        }
    }
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(Trigger::Push),
            "add" => Ok(Trigger::Add),
            "delete" => Ok(Trigger::Delete),
            "prautomerged" | "pull_request_auto_merged" => Ok(Trigger::PullRequestAutoMerged),
            "null" => Ok(Trigger::Null),
            other => Err(format!("unknown trigger: {other}")),
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A configured binding between a repository and a remote build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Job name; `/` separates folder segments.
    pub job_name: String,

    /// Build parameter template, one `key=value` per line.
    #[serde(default)]
    pub build_parameters: String,

    /// Branch filter (empty matches every branch).
    #[serde(default)]
    pub branch_regex: String,

    /// Changed-path filter (empty disables path filtering).
    #[serde(default)]
    pub path_regex: String,

    /// Pull-request destination filter (empty matches every target).
    #[serde(default, alias = "prDestinationRegex")]
    pub pr_dest_regex: String,

    pub triggers: Vec<Trigger>,

    /// Whether the job reacts to tag refs instead of branch refs.
    #[serde(default)]
    pub is_tag: bool,
}

impl Job {
    /// Create a job with no filters for the given triggers.
    pub fn new(job_name: impl Into<String>, triggers: &[Trigger]) -> Self {
        Self {
            job_name: job_name.into(),
            build_parameters: String::new(),
            branch_regex: String::new(),
            path_regex: String::new(),
            pr_dest_regex: String::new(),
            triggers: triggers.to_vec(),
            is_tag: false,
        }
    }

    pub fn with_parameters(mut self, template: impl Into<String>) -> Self {
        self.build_parameters = template.into();
        self
    }

    pub fn with_branch_regex(mut self, regex: impl Into<String>) -> Self {
        self.branch_regex = regex.into();
        self
    }

    pub fn with_path_regex(mut self, regex: impl Into<String>) -> Self {
        self.path_regex = regex.into();
        self
    }

    pub fn with_pr_dest_regex(mut self, regex: impl Into<String>) -> Self {
        self.pr_dest_regex = regex.into();
        self
    }

    pub fn for_tags(mut self) -> Self {
        self.is_tag = true;
        self
    }

    pub fn has_trigger(&self, trigger: Trigger) -> bool {
        self.triggers.contains(&trigger)
    }

    /// True when no real trigger is configured.
    pub fn is_misconfigured(&self) -> bool {
        self.triggers.iter().all(|t| *t == Trigger::Null)
    }

    /// Jenkins-style job path: `job/a/job/b` for `a/b`, segments percent-encoded.
    pub fn job_path(&self) -> String {
        self.job_name
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| format!("job/{}", urlencoding::encode(segment)))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Decode the jobs stored in a repository's flat hook-settings map.
///
/// Jobs are returned ordered by their index; an index without a
/// `jobName-N` key is skipped.
pub fn jobs_from_hook_settings(settings: &Map<String, Value>) -> Vec<Job> {
    let mut by_index: BTreeMap<u32, Job> = BTreeMap::new();

    for (key, value) in settings {
        let Some(index) = key
            .strip_prefix(JOB_PREFIX)
            .and_then(|i| i.parse::<u32>().ok())
        else {
            continue;
        };
        let field = |prefix: &str| -> String {
            settings
                .get(&format!("{prefix}{index}"))
                .map(setting_text)
                .unwrap_or_default()
        };
        let is_tag = match settings.get(&format!("{TAG_PREFIX}{index}")) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };

        by_index.insert(
            index,
            Job {
                job_name: setting_text(value),
                build_parameters: field(PARAMETERS_PREFIX),
                branch_regex: field(BRANCH_PREFIX),
                path_regex: field(PATH_PREFIX),
                pr_dest_regex: field(PR_DEST_PREFIX),
                triggers: Trigger::parse_list(&field(TRIGGER_PREFIX)),
                is_tag,
            },
        );
    }

    by_index.into_values().collect()
}

fn setting_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

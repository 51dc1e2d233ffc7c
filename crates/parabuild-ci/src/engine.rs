//! Trigger decisions for repository events.
//!
//! For each configured job the engine applies, in order: the tag gate, the
//! branch filter (PR destination filter for pull-request events), then the
//! trigger and changed-path filters. Firing jobs are dispatched one at a
//! time; the server and credential are resolved once, on the first firing
//! job, and reused for the rest of the event.

use std::sync::Arc;

use futures::StreamExt;
use parabuild_domain::{
    BuildVariables, ChangeKind, Job, RepositoryEvent, Trigger, TriggerOutcome,
};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::changes::ChangeSource;
use crate::dispatcher::Dispatch;
use crate::error::ResolveError;
use crate::resolver::{CredentialResolver, Resolved};

/// Why a job did or did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Matched,
    /// No usable trigger configured.
    NoTriggers,
    TagMismatch,
    BranchMismatch,
    TriggerMismatch,
    NoMatchingPath,
    InvalidRegex,
}

/// Match decision for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDecision {
    pub job_name: String,
    pub fire: bool,
    /// The trigger that fired, when `fire` is set.
    pub trigger: Option<Trigger>,
    pub reason: MatchReason,
}

impl JobDecision {
    fn fired(job: &Job, trigger: Trigger) -> Self {
        Self {
            job_name: job.job_name.clone(),
            fire: true,
            trigger: Some(trigger),
            reason: MatchReason::Matched,
        }
    }

    fn skipped(job: &Job, reason: MatchReason) -> Self {
        Self {
            job_name: job.job_name.clone(),
            fire: false,
            trigger: None,
            reason,
        }
    }
}

/// A job that fired, with the outcome of its dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredJob {
    pub job_name: String,
    pub trigger: Trigger,
    pub outcome: TriggerOutcome,
}

/// Decides which jobs an event fires and dispatches them.
pub struct TriggerEngine {
    resolver: CredentialResolver,
    changes: Arc<dyn ChangeSource>,
    dispatcher: Arc<dyn Dispatch>,
    source_url: String,
}

impl TriggerEngine {
    pub fn new(
        resolver: CredentialResolver,
        changes: Arc<dyn ChangeSource>,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Self {
        Self {
            resolver,
            changes,
            dispatcher,
            source_url: String::new(),
        }
    }

    /// Base url of the source-control system, exposed to templates as `$URL`.
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Match decisions for every job, without dispatching anything.
    #[instrument(skip(self, event, jobs), fields(project = %event.project_key, repository = %event.repository, branch = %event.branch))]
    pub async fn decide(&self, event: &RepositoryEvent, jobs: &[Job]) -> Vec<JobDecision> {
        let mut decisions = Vec::with_capacity(jobs.len());
        for job in jobs {
            decisions.push(self.decide_job(event, job).await);
        }
        decisions
    }

    /// Dispatch every job the event fires, in job order.
    #[instrument(skip(self, event, jobs), fields(project = %event.project_key, repository = %event.repository, branch = %event.branch))]
    pub async fn evaluate(&self, event: &RepositoryEvent, jobs: &[Job]) -> Vec<FiredJob> {
        let resolution: OnceCell<Result<Resolved, TriggerOutcome>> = OnceCell::new();
        let mut fired = Vec::new();

        for job in jobs {
            let decision = self.decide_job(event, job).await;
            let Some(trigger) = decision.trigger else {
                continue;
            };

            let outcome = match resolution.get_or_init(|| self.resolve(event)).await {
                Ok(resolved) => {
                    let vars = BuildVariables::from_event(event, trigger, &self.source_url);
                    self.dispatcher
                        .dispatch(job, &resolved.server, &resolved.credential, &vars)
                        .await
                }
                Err(outcome) => outcome.clone(),
            };

            fired.push(FiredJob {
                job_name: job.job_name.clone(),
                trigger,
                outcome,
            });
        }
        fired
    }

    async fn resolve(&self, event: &RepositoryEvent) -> Result<Resolved, TriggerOutcome> {
        match self
            .resolver
            .resolve(&event.project_key, event.user.as_ref())
            .await
        {
            Ok(resolved) => Ok(resolved),
            Err(ResolveError::NotConfigured { project_key }) => {
                warn!(project = %project_key, "No CI server configured");
                Err(TriggerOutcome::not_configured())
            }
            Err(e) => {
                warn!(project = %event.project_key, error = %e, "Credential resolution failed");
                Err(TriggerOutcome::failed(e.to_string(), false))
            }
        }
    }

    async fn decide_job(&self, event: &RepositoryEvent, job: &Job) -> JobDecision {
        let decision = self.match_job(event, job).await;
        debug!(job = %job.job_name, fire = decision.fire, reason = ?decision.reason, "Job decision");
        decision
    }

    async fn match_job(&self, event: &RepositoryEvent, job: &Job) -> JobDecision {
        if job.is_misconfigured() {
            return JobDecision::skipped(job, MatchReason::NoTriggers);
        }
        if job.is_tag != event.is_tag {
            return JobDecision::skipped(job, MatchReason::TagMismatch);
        }

        let (field, pattern, branch) = match &event.pull_request {
            Some(pr) => ("prDestinationRegex", &job.pr_dest_regex, pr.target_branch.as_str()),
            None => ("branchRegex", &job.branch_regex, event.branch.as_str()),
        };
        match filter_regex(pattern, true) {
            Ok(Some(regex)) if !regex.is_match(branch) => {
                return JobDecision::skipped(job, MatchReason::BranchMismatch);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(job = %job.job_name, field, error = %e, "Invalid job regex");
                return JobDecision::skipped(job, MatchReason::InvalidRegex);
            }
        }

        if event.is_pull_request() {
            return if job.has_trigger(Trigger::PullRequestAutoMerged) {
                JobDecision::fired(job, Trigger::PullRequestAutoMerged)
            } else {
                JobDecision::skipped(job, MatchReason::TriggerMismatch)
            };
        }

        match event.change {
            ChangeKind::Update if job.has_trigger(Trigger::Push) => {
                let regex = match filter_regex(&job.path_regex, false) {
                    Ok(Some(regex)) => regex,
                    Ok(None) => return JobDecision::fired(job, Trigger::Push),
                    Err(e) => {
                        warn!(job = %job.job_name, field = "pathRegex", error = %e, "Invalid job regex");
                        return JobDecision::skipped(job, MatchReason::InvalidRegex);
                    }
                };
                if self.touches_path(event, &regex).await {
                    JobDecision::fired(job, Trigger::Push)
                } else {
                    JobDecision::skipped(job, MatchReason::NoMatchingPath)
                }
            }
            ChangeKind::Add if job.has_trigger(Trigger::Add) => JobDecision::fired(job, Trigger::Add),
            ChangeKind::Delete if job.has_trigger(Trigger::Delete) => {
                JobDecision::fired(job, Trigger::Delete)
            }
            _ => JobDecision::skipped(job, MatchReason::TriggerMismatch),
        }
    }

    /// Scan changed paths until one matches. The stream is dropped on return.
    async fn touches_path(&self, event: &RepositoryEvent, regex: &Regex) -> bool {
        let mut paths = self.changes.changed_paths(
            &event.repository,
            &event.from_revision,
            &event.to_revision,
        );
        while let Some(item) = paths.next().await {
            match item {
                Ok(path) if regex.is_match(&path) => return true,
                Ok(_) => {}
                Err(e) => {
                    warn!(repository = %event.repository, error = %e, "Change listing failed");
                    return false;
                }
            }
        }
        false
    }
}

/// Compile a job filter as a full match. Empty patterns filter nothing.
///
/// Branch and destination filters are case-insensitive; path filters are not.
pub(crate) fn filter_regex(
    pattern: &str,
    case_insensitive: bool,
) -> Result<Option<Regex>, regex::Error> {
    if pattern.is_empty() {
        return Ok(None);
    }
    // The bare pattern must parse too: `a)|(b` only balances once wrapped.
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()?;
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(case_insensitive)
        .build()
        .map(Some)
}

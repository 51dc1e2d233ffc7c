//! Changed-path enumeration for path-filtered jobs.
//!
//! A [`ChangeSource`] yields the paths touched between two revisions as a
//! lazy, finite stream. Consumers stop polling as soon as they have an
//! answer; dropping the stream releases whatever backs it.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::ChangeError;

pub type ChangeStream<'a> = BoxStream<'a, Result<String, ChangeError>>;

/// Source of changed file paths between two revisions.
pub trait ChangeSource: Send + Sync {
    /// Paths changed in `repository` from `since` (exclusive) to `until`.
    ///
    /// The stream is not restartable; call again for a fresh listing.
    fn changed_paths<'a>(
        &'a self,
        repository: &'a str,
        since: &'a str,
        until: &'a str,
    ) -> ChangeStream<'a>;
}

/// A fixed list of paths, counting how many were handed out.
#[derive(Debug, Default, Clone)]
pub struct StaticChangeSource {
    paths: Vec<String>,
    consumed: Arc<AtomicUsize>,
}

impl StaticChangeSource {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            consumed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Total paths yielded across all listings.
    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }
}

impl ChangeSource for StaticChangeSource {
    fn changed_paths<'a>(
        &'a self,
        _repository: &'a str,
        _since: &'a str,
        _until: &'a str,
    ) -> ChangeStream<'a> {
        stream::iter(self.paths.iter())
            .map(move |path| {
                self.consumed.fetch_add(1, Ordering::SeqCst);
                Ok(path.clone())
            })
            .boxed()
    }
}

/// Lists changes with `git` in a local clone.
///
/// Output is read line by line; the child process is killed when the
/// stream is dropped before `git` finishes.
#[derive(Debug, Clone)]
pub struct GitChangeSource {
    workdir: PathBuf,
}

impl GitChangeSource {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn command(&self, since: &str, until: &str) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if is_null_revision(since) {
            // New ref: list what the tip commit touched.
            cmd.args(["show", "--pretty=format:", "--name-only", until]);
        } else {
            cmd.args(["diff", "--name-only", since, until]);
        }
        cmd
    }
}

impl ChangeSource for GitChangeSource {
    fn changed_paths<'a>(
        &'a self,
        repository: &'a str,
        since: &'a str,
        until: &'a str,
    ) -> ChangeStream<'a> {
        debug!(repository, since, until, workdir = %self.workdir.display(), "Listing changes");

        let mut child = match self.command(since, until).spawn() {
            Ok(child) => child,
            Err(e) => return stream::once(async move { Err(ChangeError::Spawn(e)) }).boxed(),
        };
        let Some(stdout) = child.stdout.take() else {
            return stream::once(async {
                Err(ChangeError::Backend("git stdout unavailable".to_string()))
            })
            .boxed();
        };
        let lines = BufReader::new(stdout).lines();

        stream::unfold(Some((child, lines)), |state| async move {
            let (mut child, mut lines) = state?;
            match lines.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some((child, lines)))),
                Ok(None) => match child.wait().await {
                    Ok(status) if status.success() => None,
                    Ok(status) => Some((
                        Err(ChangeError::Backend(format!("git exited with {status}"))),
                        None,
                    )),
                    Err(e) => Some((Err(ChangeError::Read(e)), None)),
                },
                Err(e) => Some((Err(ChangeError::Read(e)), None)),
            }
        })
        .filter(|item| {
            futures::future::ready(!matches!(item, Ok(line) if line.trim().is_empty()))
        })
        .boxed()
    }
}

/// Empty or all-zero revisions mark a ref that did not exist before.
fn is_null_revision(revision: &str) -> bool {
    revision.chars().all(|c| c == '0')
}

//! Parabuild CLI - parameterized CI build triggers
//!
//! The `parabuild` command replays a repository event against a job list
//! and a settings snapshot, all read from JSON files.
//!
//! ## Commands
//!
//! - `trigger`: Dispatch every job the event fires
//! - `decide`: Show per-job match decisions without dispatching
//! - `validate`: Check a job list before saving it
//! - `resolve`: Show which server and credential an event would use
//! - `ping`: Test the connection to the resolved CI server

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use parabuild_ci::telemetry::init_tracing;
use parabuild_ci::{
    validate_jobs, validate_server, ChangeSource, CredentialResolver, DispatcherConfig,
    GitChangeSource, HttpDispatcher, StaticChangeSource, TriggerEngine,
};
use parabuild_domain::{jobs_from_hook_settings, Job, RepositoryEvent, User};
use parabuild_state::JsonFileSettingsStore;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "parabuild")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parameterized CI build triggers for source-control events", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SettingsArgs {
    /// Settings snapshot (JSON object of setting key to value)
    #[arg(short, long, env = "PARABUILD_SETTINGS")]
    settings: PathBuf,
}

#[derive(Args)]
struct EventArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Job list: a JSON array of jobs or a hook-settings map
    #[arg(long)]
    jobs: PathBuf,

    /// Repository event (JSON)
    #[arg(long)]
    event: PathBuf,

    /// File listing the changed paths, one per line
    #[arg(long, conflicts_with = "repo_dir")]
    changes: Option<PathBuf>,

    /// Local clone to list changed paths with git
    #[arg(long)]
    repo_dir: Option<PathBuf>,

    /// Base url of the source-control system, exposed as $URL
    #[arg(long, env = "PARABUILD_SOURCE_URL", default_value = "")]
    source_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch every job the event fires
    Trigger(EventArgs),

    /// Show per-job match decisions without dispatching
    Decide(EventArgs),

    /// Validate a job list against the configured server
    Validate {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Job list: a JSON array of jobs or a hook-settings map
        #[arg(long)]
        jobs: PathBuf,

        /// Project whose server the jobs will use
        #[arg(short, long)]
        project: String,
    },

    /// Show the server and credential used for a project and user
    Resolve {
        #[command(flatten)]
        settings: SettingsArgs,

        #[arg(short, long)]
        project: String,

        /// Acting user slug (anonymous when omitted)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Test the connection to the resolved CI server
    Ping {
        #[command(flatten)]
        settings: SettingsArgs,

        #[arg(short, long)]
        project: String,

        /// Acting user slug (anonymous when omitted)
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let output = match cli.command {
        Commands::Trigger(args) => cmd_trigger(&args).await?,
        Commands::Decide(args) => cmd_decide(&args).await?,
        Commands::Validate {
            settings,
            jobs,
            project,
        } => cmd_validate(&settings.settings, &jobs, &project).await?,
        Commands::Resolve {
            settings,
            project,
            user,
        } => cmd_resolve(&settings.settings, &project, user.as_deref()).await?,
        Commands::Ping {
            settings,
            project,
            user,
        } => cmd_ping(&settings.settings, &project, user.as_deref()).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Dispatch the jobs fired by an event
async fn cmd_trigger(args: &EventArgs) -> Result<Value> {
    let (engine, event, jobs) = load_event_inputs(args).await?;
    let fired = engine.evaluate(&event, &jobs).await;

    let failed = fired.iter().filter(|f| f.outcome.error).count();
    info!(fired = fired.len(), failed, "Trigger complete");
    to_json(&fired)
}

/// Per-job decisions for an event
async fn cmd_decide(args: &EventArgs) -> Result<Value> {
    let (engine, event, jobs) = load_event_inputs(args).await?;
    to_json(&engine.decide(&event, &jobs).await)
}

async fn cmd_validate(settings: &Path, jobs: &Path, project: &str) -> Result<Value> {
    let resolver = load_resolver(settings).await?;
    let jobs = load_jobs(jobs)?;
    let server = resolver
        .server(project)
        .await
        .context("Failed to read server settings")?;

    let server_errors = server.as_ref().map(validate_server).unwrap_or_default();
    let job_errors = validate_jobs(&jobs, server.is_some());
    Ok(json!({
        "valid": server_errors.is_empty() && job_errors.is_empty(),
        "server": server_errors,
        "jobs": job_errors,
    }))
}

async fn cmd_resolve(settings: &Path, project: &str, user: Option<&str>) -> Result<Value> {
    let resolver = load_resolver(settings).await?;
    let user = user.map(User::new);
    let resolved = resolver
        .resolve(project, user.as_ref())
        .await
        .context("Failed to resolve CI server")?;

    Ok(json!({
        "server": resolved.server.base_url,
        "alias": resolved.server.alias,
        "credential": resolved.credential,
        "prompt": resolved.credential.prompt(),
    }))
}

async fn cmd_ping(settings: &Path, project: &str, user: Option<&str>) -> Result<Value> {
    let resolver = load_resolver(settings).await?;
    let user = user.map(User::new);
    let resolved = resolver
        .resolve(project, user.as_ref())
        .await
        .context("Failed to resolve CI server")?;

    let dispatcher = HttpDispatcher::new(DispatcherConfig::from_env())
        .context("Failed to build HTTP client")?;
    let outcome = dispatcher
        .test_connection(&resolved.server, &resolved.credential)
        .await;
    to_json(&outcome)
}

// ---------------------------------------------------------------------------
// Input loading
// ---------------------------------------------------------------------------

async fn load_event_inputs(args: &EventArgs) -> Result<(TriggerEngine, RepositoryEvent, Vec<Job>)> {
    let resolver = load_resolver(&args.settings.settings).await?;
    let event: RepositoryEvent = read_json_file(&args.event)?;
    let jobs = load_jobs(&args.jobs)?;

    let changes: Arc<dyn ChangeSource> = match (&args.changes, &args.repo_dir) {
        (Some(path), _) => Arc::new(load_changes(path)?),
        (None, Some(dir)) => Arc::new(GitChangeSource::new(dir)),
        (None, None) => Arc::new(StaticChangeSource::default()),
    };
    let dispatcher = HttpDispatcher::new(DispatcherConfig::from_env())
        .context("Failed to build HTTP client")?;

    let engine = TriggerEngine::new(resolver, changes, Arc::new(dispatcher))
        .with_source_url(&args.source_url);
    Ok((engine, event, jobs))
}

async fn load_resolver(settings: &Path) -> Result<CredentialResolver> {
    let store = JsonFileSettingsStore::load(settings)
        .await
        .with_context(|| format!("Failed to load settings: {:?}", settings))?;
    Ok(CredentialResolver::new(Arc::new(store)))
}

fn load_jobs(path: &Path) -> Result<Vec<Job>> {
    match read_json_file::<Value>(path)? {
        Value::Array(items) => serde_json::from_value(Value::Array(items))
            .with_context(|| format!("Invalid job list in {:?}", path)),
        Value::Object(settings) => Ok(jobs_from_hook_settings(&settings)),
        _ => bail!("Expected a job array or hook-settings object in {:?}", path),
    }
}

fn load_changes(path: &Path) -> Result<StaticChangeSource> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read change list: {:?}", path))?;
    Ok(StaticChangeSource::new(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty()),
    ))
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to encode output")
}

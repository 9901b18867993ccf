//! CLI entrypoint for seminar
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;
mod viewer;
mod wiring;

use anyhow::{Result, anyhow, bail};
use args::{Cli, Command};
use clap::Parser;
use colored::Colorize;
use seminar_application::{RunOutcome, RunTopicError};
use seminar_infrastructure::{ConfigIssue, ConfigLoader, FileConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use viewer::ConsoleViewer;
use wiring::Runtime;

/// How long the viewer may take to drain after the run returns
const VIEWER_DRAIN: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    let _guard = init_tracing(cli.verbose, cli.log_dir.as_deref());

    info!("Starting seminar");

    let config = ConfigLoader::load(cli.config.as_deref())
        .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

    match cli.command {
        Command::Config => show_config(&config, cli.config.as_deref()),
        Command::Topics => {
            check_config(&config)?;
            list_topics(&config);
            Ok(())
        }
        Command::Run {
            topic,
            owner,
            max_turns,
            replica_id,
            hide_reasoning,
        } => {
            check_config(&config)?;
            run(&config, &topic, owner, max_turns, replica_id, hide_reasoning).await
        }
    }
}

/// `RUST_LOG` wins over `-v`. With `--log-dir`, logs go to a daily rolling
/// file; the returned guard must live until exit so buffered lines are flushed.
fn init_tracing(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    });

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "seminar.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    }
}

/// Print every issue; fail if any is an error.
fn check_config(config: &FileConfig) -> Result<()> {
    let issues = config.validate();
    print_issues(&issues);
    let errors = issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        bail!("Configuration has {} error(s)", errors);
    }
    Ok(())
}

fn print_issues(issues: &[ConfigIssue]) {
    for issue in issues {
        let line = issue.to_string();
        if issue.is_error() {
            eprintln!("{}", line.red());
        } else {
            eprintln!("{}", line.yellow());
        }
    }
}

fn show_config(config: &FileConfig, explicit: Option<&Path>) -> Result<()> {
    println!("{}", "Configuration sources:".bold());
    for line in ConfigLoader::describe_sources(explicit) {
        println!("  {}", line);
    }
    println!();

    let issues = config.validate();
    if issues.is_empty() {
        println!("{}", "No configuration issues.".green());
    } else {
        print_issues(&issues);
    }
    println!();

    println!("{}", "Merged configuration:".bold());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn list_topics(config: &FileConfig) {
    if config.topics.is_empty() {
        println!("No topics configured.");
        return;
    }
    let name_of = |id: &str| {
        config
            .roles
            .iter()
            .find(|r| r.id == id)
            .map_or_else(|| id.to_string(), |r| r.name.clone())
    };
    for topic in &config.topics {
        println!("{}  {}", topic.id.bold(), topic.subject);
        println!("    moderator:    {}", name_of(&topic.moderator));
        println!(
            "    participants: {}",
            topic
                .participants
                .iter()
                .map(|id| name_of(id))
                .collect::<Vec<_>>()
                .join(", ")
        );
        if !topic.documents.is_empty() {
            println!("    documents:    {}", topic.documents.join(", "));
        }
    }
}

async fn run(
    config: &FileConfig,
    topic_id: &str,
    owner: Option<String>,
    max_turns: Option<usize>,
    replica_id: Option<String>,
    hide_reasoning: bool,
) -> Result<()> {
    let Some(topic_config) = config.topic(topic_id) else {
        bail!(
            "Unknown topic '{}'. Use `seminar topics` to list configured topics.",
            topic_id
        );
    };
    let owner = owner
        .or_else(|| Some(topic_config.owner.clone()).filter(|o| !o.is_empty()))
        .unwrap_or_else(|| "cli".to_string());

    let mut params = config.to_params();
    if let Some(max) = max_turns {
        params = params.with_max_turns(max);
    }

    // === Dependency Injection ===
    let runtime = Runtime::build(config, params, replica_id).await?;
    let service = Arc::clone(&runtime.service);

    let cancel = CancellationToken::new();
    let consumers = runtime.start_consumers(cancel.clone()).await?;

    let topic = service.topic(topic_id).await?;
    println!();
    println!("{}", format!("Seminar: {}", topic.subject).bold());
    println!("Owner: {}", owner);
    if !topic.speeches.is_empty() {
        println!("Resuming after {} speech(es)", topic.speeches.len());
    }
    println!("{}", "Press Ctrl-C to pause.".dimmed());

    let viewer = tokio::spawn(
        ConsoleViewer::new()
            .with_reasoning(!hide_reasoning)
            .watch(service.subscribe(topic_id)),
    );

    let stopper = {
        let service = Arc::clone(&service);
        let topic_id = topic_id.to_string();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{}", "Pausing; the turn in progress is discarded.".yellow());
                if let Err(e) = service.stop_topic(&topic_id).await {
                    warn!(topic_id = %topic_id, error = %e, "failed to request pause");
                }
            }
        })
    };

    let result = service.run_topic(topic_id, &owner).await;
    stopper.abort();

    if tokio::time::timeout(VIEWER_DRAIN, viewer).await.is_err() {
        warn!(topic_id, "viewer did not see the end of the run");
    }
    cancel.cancel();
    for handle in consumers {
        let _ = handle.await;
    }

    match result {
        Ok(report) => {
            println!();
            let summary = match report.outcome {
                RunOutcome::Paused => format!("Paused after {} turn(s).", report.turns),
                RunOutcome::TurnLimit => {
                    format!("Stopped at the turn limit after {} turn(s).", report.turns)
                }
            };
            println!("{}", summary.bold());
            if config.storage.history_path.is_some() {
                println!("Run `seminar run --topic {}` to continue.", topic_id);
            } else {
                println!(
                    "{}",
                    "History is kept in memory only; set [storage] history_path to resume later."
                        .dimmed()
                );
            }
            Ok(())
        }
        Err(e @ RunTopicError::TopicLocked { .. }) => {
            bail!("{}. Another run owns this topic; try again once it pauses.", e)
        }
        Err(e) if e.is_unknown_role() => {
            bail!("{}. The moderator designated someone outside the topic.", e)
        }
        Err(e) => Err(e.into()),
    }
}

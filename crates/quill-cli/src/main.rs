//! `quill` command line

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use quill_diff::diff_summary;
use quill_http::HttpBackend;
use quill_session::{LoggingConfig, QuillConfig, SessionHandle, SessionId, SessionPhase};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod replay;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");

    Command::new("quill")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Coordinate and inspect multi-stage generation sessions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("replay")
                .about("Replay a recorded event stream through a session")
                .arg(
                    Arg::new("events")
                        .long("events")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("NDJSON file of raw stream frames"),
                )
                .arg(
                    Arg::new("status")
                        .long("status")
                        .value_parser(value_parser!(PathBuf))
                        .help("NDJSON file of status responses used for recovery"),
                )
                .arg(config_arg.clone()),
        )
        .subcommand(
            Command::new("diff")
                .about("Word-level diff between two text files")
                .arg(
                    Arg::new("old")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Older text"),
                )
                .arg(
                    Arg::new("new")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Newer text"),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Follow a live session over HTTP")
                .arg(
                    Arg::new("base-url")
                        .long("base-url")
                        .required(true)
                        .help("Backend root URL"),
                )
                .arg(
                    Arg::new("session")
                        .long("session")
                        .required(true)
                        .help("Session identifier"),
                )
                .arg(config_arg),
        )
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &ArgMatches) -> Result<QuillConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => QuillConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(QuillConfig::default()),
    }
}

fn exit_code(phase: SessionPhase) -> ExitCode {
    if phase == SessionPhase::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_replay(args: &ArgMatches) -> Result<ExitCode> {
    let config = load_config(args)?;
    init_tracing(&config.logging);

    let events = args
        .get_one::<PathBuf>("events")
        .context("--events is required")?;
    let status = args.get_one::<PathBuf>("status");

    let (report, views) =
        replay::replay_files(events, status.map(PathBuf::as_path), &config).await?;
    let phase = report.state.phase();

    print_json(&json!({
        "phase": phase,
        "state": report.state,
        "attribution": views.attribution,
        "stats": report.stats,
    }))?;
    Ok(exit_code(phase))
}

fn run_diff(args: &ArgMatches) -> Result<ExitCode> {
    init_tracing(&LoggingConfig::default());

    let read = |name: &str| -> Result<String> {
        let path = args
            .get_one::<PathBuf>(name)
            .with_context(|| format!("missing <{name}>"))?;
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    };
    let old = read("old")?;
    let new = read("new")?;

    print_json(&serde_json::to_value(diff_summary(&old, &new))?)?;
    Ok(ExitCode::SUCCESS)
}

async fn run_watch(args: &ArgMatches) -> Result<ExitCode> {
    let config = load_config(args)?;
    init_tracing(&config.logging);

    let base_url = args
        .get_one::<String>("base-url")
        .context("--base-url is required")?;
    let session_id = args
        .get_one::<String>("session")
        .map(|s| SessionId::new(s.as_str()))
        .context("--session is required")?;

    let backend = Arc::new(HttpBackend::new(base_url.as_str())?);
    let mut session = SessionHandle::start(session_id, &config, backend.clone(), backend);
    let mut updates = session.watch();
    let mut last_progress = None;

    loop {
        {
            let state = updates.borrow_and_update();
            let current = (state.progress(), state.phase());
            if last_progress.as_ref() != Some(&current) {
                let (progress, phase) = &current;
                eprintln!(
                    "[{}/{}] {} {}",
                    progress.completed,
                    progress.total,
                    phase,
                    progress.active.as_ref().map_or("", |id| id.as_str()),
                );
                last_progress = Some(current);
            }
            if state.is_terminal() {
                break;
            }
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(session = %session.id(), "interrupted");
                break;
            }
        }
    }

    let attribution = session.attribution();
    let report = session.dispose().await?;
    let phase = report.state.phase();
    print_json(&json!({
        "phase": phase,
        "state": report.state,
        "attribution": *attribution,
        "stats": report.stats,
    }))?;
    Ok(exit_code(phase))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("replay", args)) => run_replay(args).await,
        Some(("diff", args)) => run_diff(args),
        Some(("watch", args)) => run_watch(args).await,
        _ => Ok(ExitCode::FAILURE),
    }
}

//! Run command - hosts the session coordinator and reaper.
//!
//! While running, each line on stdin is one coordinator command and each
//! reply is one JSON object on stdout:
//!
//! ```text
//! join alice abc-1
//! {"ok":true,"session":{"id":"abc-1","status":"WAITING",...}}
//! start abc-1 100
//! fail abc-1 mallory
//! {"ok":false,"error":"User not found: mallory","client_error":true,"retryable":false}
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rollcall_session::{
    InMemoryDirectory, Session, SessionCoordinator, SessionError, User, UserDirectory,
    spawn_reaper,
};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Context;

/// Arguments for the run command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Register a user in the in-memory directory (repeatable)
    #[arg(short, long = "user", value_name = "USERNAME")]
    pub users: Vec<String>,

    /// Reaper period in seconds (overrides config)
    #[arg(long)]
    pub reap_interval: Option<u64>,

    /// Session retention in seconds (overrides config)
    #[arg(long)]
    pub retention: Option<u64>,

    /// Ignore stdin and run until interrupted
    #[arg(long)]
    pub headless: bool,
}

/// One line of input.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct CommandLine {
    #[command(subcommand)]
    op: Op,
}

/// Coordinator commands accepted on stdin.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Op {
    /// Join a session, creating it if needed
    Join { user: String, session_id: String },

    /// Leave a session
    Leave { user: String, session_id: String },

    /// Show a session (null if absent)
    Get { session_id: String },

    /// Start a waiting session with a target
    Start {
        session_id: String,
        #[arg(allow_negative_numbers = true)]
        target: i64,
    },

    /// Mark an active session successful
    Success { session_id: String },

    /// Fail an active session, blaming a registered user
    Fail { session_id: String, username: String },

    /// Return a finished session to waiting
    Reset { session_id: String },

    /// List session ids
    List,

    /// Drop expired sessions now
    Gc,

    /// Show session table statistics
    Stats,

    /// Stop the coordinator
    #[command(alias = "exit")]
    Quit,
}

/// Control flow for the command loop.
#[derive(Debug, PartialEq, Eq)]
enum ControlFlow {
    Continue,
    Exit,
}

pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.load_config()?.session;
    if let Some(secs) = args.reap_interval {
        config.reap_interval_secs = secs;
    }
    if let Some(secs) = args.retention {
        config.retention_secs = secs;
    }

    let directory = InMemoryDirectory::with_users(args.users.iter().map(User::new));
    info!(users = directory.len(), "User directory loaded");

    let directory: Arc<dyn UserDirectory> = Arc::new(directory);
    let coordinator = SessionCoordinator::new(config, directory.clone())?;

    let cancel_token = CancellationToken::new();
    let reaper = spawn_reaper(coordinator.clone(), cancel_token.clone());

    if args.headless {
        info!("Rollcall running, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
    } else {
        info!("Rollcall running, reading commands from stdin");
        command_loop(&coordinator, directory.as_ref()).await?;
    }

    info!("Shutting down");
    cancel_token.cancel();
    reaper.await?;

    info!(sessions = coordinator.session_count().await, "Rollcall stopped");
    Ok(())
}

/// Read commands until EOF, `quit`, or Ctrl-C.
async fn command_loop(coordinator: &SessionCoordinator, directory: &dyn UserDirectory) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Input closed");
                    break;
                };
                if handle_line(coordinator, directory, &line).await == ControlFlow::Exit {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}

async fn handle_line(
    coordinator: &SessionCoordinator,
    directory: &dyn UserDirectory,
    line: &str,
) -> ControlFlow {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return ControlFlow::Continue;
    }

    let reply = match parse_line(line) {
        Ok(Op::Quit) => return ControlFlow::Exit,
        Ok(op) => execute(coordinator, directory, op).await,
        Err(err) if err.kind() == clap::error::ErrorKind::DisplayHelp => {
            json!({ "ok": true, "help": err.render().to_string() })
        }
        Err(err) => {
            let rendered = err.to_string();
            let message = rendered.lines().next().unwrap_or_default();
            json!({ "ok": false, "error": message })
        }
    };

    println!("{reply}");
    ControlFlow::Continue
}

fn parse_line(line: &str) -> std::result::Result<Op, clap::Error> {
    CommandLine::try_parse_from(line.split_whitespace()).map(|parsed| parsed.op)
}

/// Run one command and build its JSON reply.
async fn execute(coordinator: &SessionCoordinator, directory: &dyn UserDirectory, op: Op) -> Value {
    debug!(?op, "Executing command");

    let result = match op {
        Op::Join { user, session_id } => match known_or_new(directory, &user) {
            Ok(user) => coordinator.join(user, &session_id).await.map(session_reply),
            Err(err) => Err(err),
        },
        Op::Leave { user, session_id } => coordinator
            .leave(&User::new(user), &session_id)
            .await
            .map(session_reply),
        Op::Get { session_id } => coordinator
            .get_session(&session_id)
            .await
            .map(|session| json!({ "ok": true, "session": session })),
        Op::Start { session_id, target } => coordinator
            .start(&session_id, target)
            .await
            .map(session_reply),
        Op::Success { session_id } => coordinator.success(&session_id).await.map(session_reply),
        Op::Fail {
            session_id,
            username,
        } => coordinator
            .fail(&session_id, &username)
            .await
            .map(session_reply),
        Op::Reset { session_id } => coordinator.reset(&session_id).await.map(session_reply),
        Op::List => {
            let mut ids = coordinator.session_ids().await;
            ids.sort();
            Ok(json!({ "ok": true, "sessions": ids }))
        }
        Op::Gc => {
            let dropped = coordinator.collect_expired_sessions().await;
            Ok(json!({ "ok": true, "dropped": dropped }))
        }
        Op::Stats => {
            let stats = coordinator.stats().await;
            Ok(json!({
                "ok": true,
                "size": stats.size,
                "capacity": stats.capacity,
                "oldest": stats.oldest.map(|t| t.to_rfc3339()),
            }))
        }
        Op::Quit => Ok(json!({ "ok": true })),
    };

    result.unwrap_or_else(error_reply)
}

/// Use the directory record when the user is registered, so display names
/// carry into the roster.
fn known_or_new(directory: &dyn UserDirectory, username: &str) -> rollcall_session::Result<User> {
    Ok(directory
        .resolve(username)?
        .unwrap_or_else(|| User::new(username)))
}

fn session_reply(session: Session) -> Value {
    json!({ "ok": true, "session": session })
}

fn error_reply(err: SessionError) -> Value {
    json!({
        "ok": false,
        "error": err.to_string(),
        "client_error": err.is_client_error(),
        "retryable": err.is_retryable(),
    })
}

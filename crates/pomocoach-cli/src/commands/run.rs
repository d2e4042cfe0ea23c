//! Foreground session driver.
//!
//! Notifications are written to stdout as JSON lines. Commands are read
//! from stdin one per line; EOF and Ctrl-C behave like `stop`.

use std::sync::Arc;

use clap::Args;
use pomocoach_core::{
    ChannelSink, CoachingKind, EngineConfig, PomodoroConfig, PomodoroScheduler, TemplateCoach,
    TokioClock,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Args)]
pub struct RunArgs {
    /// User the session belongs to
    #[arg(long, default_value = "local")]
    user: String,
    /// Channel notifications are addressed to (defaults to cli.default_channel)
    #[arg(long)]
    channel: Option<String>,
    /// Work phase length in minutes
    #[arg(long)]
    work: Option<u32>,
    /// Short break length in minutes
    #[arg(long)]
    short_break: Option<u32>,
    /// Long break length in minutes
    #[arg(long)]
    long_break: Option<u32>,
    /// Pomodoros per long break
    #[arg(long)]
    interval: Option<u32>,
    /// Emit a status heartbeat every MIN minutes
    #[arg(long, value_name = "MIN")]
    auto_status: Option<u32>,
    /// Attach drift diagnostics to heartbeats
    #[arg(long)]
    logic_check: bool,
    /// Skip coaching messages
    #[arg(long)]
    no_coaching: bool,
}

impl RunArgs {
    fn session_config(&self, defaults: &PomodoroConfig) -> PomodoroConfig {
        let mut config = defaults.clone();
        if let Some(v) = self.work {
            config.work_duration = v;
        }
        if let Some(v) = self.short_break {
            config.short_break_duration = v;
        }
        if let Some(v) = self.long_break {
            config.long_break_duration = v;
        }
        if let Some(v) = self.interval {
            config.long_break_interval = v;
        }
        if let Some(v) = self.auto_status {
            config.enable_auto_status = true;
            config.auto_status_interval = v;
        }
        if self.logic_check {
            config.include_logic_checking = true;
        }
        config.normalized()
    }
}

/// A line read from stdin.
#[derive(Debug, PartialEq, Eq)]
enum StdinCommand {
    Status,
    Pause,
    Resume,
    Stop,
    Thread(String),
    Coach,
}

impl StdinCommand {
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let cmd = match parts.next()? {
            "status" => StdinCommand::Status,
            "pause" => StdinCommand::Pause,
            "resume" => StdinCommand::Resume,
            "stop" | "quit" => StdinCommand::Stop,
            "coach" => StdinCommand::Coach,
            "thread" => StdinCommand::Thread(parts.next()?.to_string()),
            _ => return None,
        };
        Some(cmd)
    }
}

#[derive(Serialize)]
struct Reply<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(flatten)]
    body: T,
}

fn emit<T: Serialize>(kind: &str, body: T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(&Reply { kind, body })?);
    Ok(())
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = EngineConfig::load_or_default();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(drive(args, engine))
}

async fn drive(args: RunArgs, engine: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.session_config(&engine.defaults);
    let channel = args
        .channel
        .clone()
        .unwrap_or_else(|| engine.cli.default_channel.clone());
    let user = args.user.as_str();

    let clock = Arc::new(TokioClock::try_current()?);
    let mut builder = PomodoroScheduler::builder(clock).defaults(engine.defaults.clone());
    if engine.cli.coaching && !args.no_coaching {
        builder = builder.coach(Arc::new(TemplateCoach));
    }
    let scheduler = builder.build();

    let (sink, mut notifications) = ChannelSink::pair();
    scheduler.set_notification_callback(user, Arc::new(sink));
    if !scheduler.start_session(user, &channel, Some(config)) {
        return Err(format!("session for {user} already running").into());
    }
    if let Some(status) = scheduler.get_status(user) {
        emit("started", status)?;
    }
    if let Some(message) = scheduler.coaching_message(user, CoachingKind::Start).await {
        emit("coaching", serde_json::json!({ "kind": CoachingKind::Start, "message": message }))?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(note) = notifications.recv() => {
                println!("{}", serde_json::to_string(&note)?);
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed; stopping session");
                    break;
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match StdinCommand::parse(trimmed) {
                    Some(StdinCommand::Stop) => break,
                    Some(cmd) => handle(&scheduler, user, cmd).await?,
                    None => tracing::warn!(line = %trimmed, "unknown command"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; stopping session");
                break;
            }
        }
    }

    if let Some(message) = scheduler.coaching_message(user, CoachingKind::Completion).await {
        emit("coaching", serde_json::json!({ "kind": CoachingKind::Completion, "message": message }))?;
    }
    if let Some(stats) = scheduler.stop_session(user) {
        emit("stopped", stats)?;
    }
    scheduler.shutdown();
    Ok(())
}

async fn handle(
    scheduler: &PomodoroScheduler,
    user: &str,
    cmd: StdinCommand,
) -> Result<(), serde_json::Error> {
    match cmd {
        StdinCommand::Status => match scheduler.get_status(user) {
            Some(status) => emit("status", status),
            None => emit("status", serde_json::json!({ "is_active": false })),
        },
        StdinCommand::Pause => {
            emit("paused", serde_json::json!({ "ok": scheduler.pause_session(user) }))
        }
        StdinCommand::Resume => {
            emit("resumed", serde_json::json!({ "ok": scheduler.resume_session(user) }))
        }
        StdinCommand::Thread(id) => {
            let ok = scheduler.set_thread_id(user, id.as_str());
            emit("thread", serde_json::json!({ "ok": ok, "thread_id": id }))
        }
        StdinCommand::Coach => {
            let message = scheduler.coaching_message(user, CoachingKind::Motivation).await;
            emit("coaching", serde_json::json!({ "kind": CoachingKind::Motivation, "message": message }))
        }
        StdinCommand::Stop => Ok(()),
    }
}

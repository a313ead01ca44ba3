//! Run command - drive the engine from a recorded trace.
//!
//! The process plays the host role of the control channel:
//!
//! - stdin: one JSON command per line, forwarded undecoded
//! - stdout: one JSON event per line
//! - stderr and the log file: tracing output
//!
//! Ctrl+C stops the engine cleanly (`stopped{is_timeout: false}`).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use shiftgps::notify::TracingNotifier;
use shiftgps::protocol::{
    control_channel, encode_event, CommandSender, EventStream, StartupContext,
    DEFAULT_COMMAND_BUFFER,
};
use shiftgps::time::EngineClock;
use shiftgps::tracking::source::{parse_trace, Platform, ReplaySource, SourceError, TraceEntry};
use shiftgps::tracking::{Engine, EngineOutcome};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
pub struct RunArgs {
    pub context: PathBuf,
    pub trace: PathBuf,
    pub platform: Option<Platform>,
    pub debug: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("run");

    let context = load_context(&args.context)?;
    let entries = load_trace(&args.trace)?;

    let mut settings = runner.config().engine_settings();
    if let Some(platform) = args.platform {
        settings.platform = platform;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let result = runtime.block_on(async move {
        let clock = EngineClock::new();
        let source = ReplaySource::with_clock(entries, clock).map_err(|error| CliError::Trace {
            path: args.trace.clone(),
            error,
        })?;
        tracing::info!(
            trace = %args.trace.display(),
            entries = source.len(),
            platform = %settings.platform,
            "Replaying trace"
        );

        let (host, worker) = control_channel(DEFAULT_COMMAND_BUFFER);
        let shutdown = CancellationToken::new();

        let engine = Engine::new(
            Arc::new(source),
            TracingNotifier::new(),
            worker.events,
            context,
            settings,
        )
        .with_clock(clock);
        let engine_task = engine.spawn(worker.inbound, shutdown.clone());

        tokio::spawn(forward_stdin(host.commands));
        tokio::spawn(stop_on_ctrl_c(shutdown.clone()));

        write_events(host.events).await;

        let outcome = engine_task
            .await
            .map_err(|e| CliError::EngineTask(e.to_string()))??;

        match outcome {
            EngineOutcome::NotApplicable => {
                tracing::info!("Context has no shift to track");
            }
            EngineOutcome::Stopped {
                point_count,
                is_timeout,
            } => {
                tracing::info!(point_count, is_timeout, "Run finished");
            }
        }
        Ok::<(), CliError>(())
    });

    // A pending stdin read would block a normal shutdown
    runtime.shutdown_background();
    result
}

fn load_context(path: &Path) -> Result<StartupContext, CliError> {
    let json = fs::read_to_string(path).map_err(|error| CliError::ContextRead {
        path: path.to_path_buf(),
        error,
    })?;
    StartupContext::from_json(&json).map_err(|error| CliError::ContextParse {
        path: path.to_path_buf(),
        error,
    })
}

fn load_trace(path: &Path) -> Result<Vec<TraceEntry>, CliError> {
    let to_cli = |error: SourceError| CliError::Trace {
        path: path.to_path_buf(),
        error,
    };
    let file = fs::File::open(path).map_err(|e| to_cli(SourceError::from(e)))?;
    parse_trace(std::io::BufReader::new(file)).map_err(to_cli)
}

/// Forward stdin lines to the engine until EOF.
async fn forward_stdin(commands: CommandSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                if commands.send_raw(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!("stdin closed, no more commands");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin");
                break;
            }
        }
    }
}

async fn stop_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Ctrl+C received, stopping");
            shutdown.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

/// Print events as JSON lines until the engine drops its sink.
async fn write_events(mut events: EventStream) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = events.next().await {
        let line = match encode_event(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, event = event.kind(), "Failed to encode event");
                continue;
            }
        };
        if let Err(e) = stdout.write_all(format!("{}\n", line).as_bytes()).await {
            tracing::warn!(error = %e, "stdout closed, dropping events");
            break;
        }
        let _ = stdout.flush().await;
    }
}

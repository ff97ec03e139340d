mod commands;
mod config;
mod delivery;
mod ipc;
mod remote;
mod state;

use std::sync::Arc;
use std::time::Duration;

use config::FerryConfig;
use state::AppState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// How long shutdown waits for in-flight frames to be written.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    // stdout carries the protocol, so logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = match FerryConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fatal: {e}");
            std::process::exit(1);
        }
    };

    run(config).await;
}

async fn run(config: FerryConfig) {
    let (outbox, frames) = mpsc::channel(config.event_buffer);
    let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
    let state = Arc::new(AppState::from_config(&config, event_tx, outbox.clone()));

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        if let Err(e) = delivery::write_frames(frames, &mut stdout).await {
            log::error!("failed to write to stdout: {e}");
        }
    });
    let forwarder = delivery::spawn_event_forwarder(event_rx, outbox.clone());

    log::info!(
        "ferry ready (prefix {}, timeout {}s)",
        config.prefix.display(),
        config.command_timeout_secs
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("failed to read stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match ipc::parse_request(&line) {
            Ok(request) => commands::handle_request(&state, request).await,
            Err(frame) => {
                log::warn!("rejected malformed request line");
                if outbox.send(frame).await.is_err() {
                    break;
                }
            }
        }
    }

    log::info!("stdin closed, shutting down");
    let closed = state.multiplexer.close_all();
    if closed > 0 {
        log::info!("closed {closed} sessions");
    }

    // Dropping the last senders lets the forwarder and writer finish.
    drop(state);
    drop(outbox);
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, forwarder).await;
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, writer).await;
}

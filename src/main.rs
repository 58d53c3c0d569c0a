//! Console front end for voicelog
//!
//! Wires the session manager to its collaborators and drives it from a
//! line-oriented command loop. All rendering decisions live here; the
//! core only emits events.

#![deny(clippy::all)]

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use voicelog::{
    config, DisplayEvent, EventKind, EventSink, HttpTranscriber, MicFactory, SessionManager,
    SqliteHistory,
};

/// Prints events to stdout, notices prefixed with their timestamp
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn on_event(&self, event: DisplayEvent) {
        match event.kind {
            EventKind::SystemNotice => {
                println!("{} - {}", event.timestamp.format("%H:%M:%S"), event.text);
            }
            EventKind::TranscriptLine => {
                println!("{}", event.text);
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    tracing_subscriber::fmt::init();

    let config = config::load_config();

    let db_path = config
        .database_path()
        .context("could not determine a data directory for the history database")?;
    let history = SqliteHistory::open(&db_path)
        .with_context(|| format!("failed to open history database at {:?}", db_path))?;

    let transcriber = HttpTranscriber::new(
        config.recognizer.endpoint.clone(),
        Duration::from_secs(config.recognizer.timeout_secs),
    )
    .context("failed to build recognition client")?;

    let mut manager = SessionManager::new(
        Arc::new(MicFactory),
        Box::new(transcriber),
        Box::new(history),
        Box::new(ConsoleSink),
    );
    info!("Session manager ready (device ready: {})", manager.device_ready());

    println!("voicelog - commands: start, stop, history, quit");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read command")?;
        match line.trim() {
            "start" => {
                if let Err(e) = manager.start() {
                    eprintln!("Cannot start recording: {}", e);
                }
            }
            "stop" => {
                if let Err(e) = manager.stop() {
                    eprintln!("Recording did not finalize cleanly: {}", e);
                }
            }
            "history" => match manager.list_history() {
                Ok(entries) => {
                    for (i, entry) in entries.iter().enumerate() {
                        println!("Recording {}:", i + 1);
                        println!("Start Time: {}", entry.started_at);
                        println!("Transcription:\n{}\n", entry.text);
                    }
                }
                Err(e) => eprintln!("Could not read history: {}", e),
            },
            "quit" | "exit" => break,
            "" => {}
            other => println!("Unknown command: {}", other),
        }
        io::stdout().flush().ok();
    }

    manager.shutdown()?;
    Ok(())
}

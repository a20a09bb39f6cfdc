//! `staybot chat`: interactive or single-message chat in the terminal.
//!
//! Ctrl-C while a reply is streaming stops that reply; Ctrl-C at the prompt
//! exits.

use anyhow::Context;
use async_trait::async_trait;
use staybot_agent::{RoundOutcome, Runtime};
use staybot_core::error::EmitError;
use staybot_core::event::{EventEmitter, SessionEvent};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Prints session events to a terminal as they arrive.
pub struct TerminalEmitter<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write(&mut self, text: &str) -> Result<(), EmitError> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| EmitError::Disconnected(e.to_string()))
    }
}

#[async_trait]
impl<W: Write + Send> EventEmitter for TerminalEmitter<W> {
    async fn emit(&mut self, event: SessionEvent) -> Result<(), EmitError> {
        match event {
            SessionEvent::Start => self.write("\n  Assistant > "),
            SessionEvent::Token(text) => self.write(&text),
            SessionEvent::Complete => self.write("\n\n"),
            SessionEvent::Single(text) => self.write(&format!("\n  Assistant > {text}\n\n")),
        }
    }
}

pub async fn run(config_path: Option<&Path>, message: Option<String>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    if !config.provider.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    STAYBOT_API_KEY");
        eprintln!("    {}", config.provider.kind.api_key_env());
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", super::config_path(config_path).display());
        eprintln!();
        anyhow::bail!("No API key found. See above for setup instructions.");
    }

    let provider_label = format!(
        "{} ({})",
        config.provider.kind.as_str(),
        config.provider.model_name()
    );
    let runtime = Runtime::start(config).await.context("Startup failed")?;
    let mut session = runtime.new_session();
    let mut emitter = TerminalEmitter::new(std::io::stdout());

    if let Some(message) = message {
        runtime
            .engine
            .handle_input(&mut session, &message, &mut emitter)
            .await;
        runtime.shutdown().await;
        return Ok(());
    }

    println!();
    println!("  staybot, interactive mode");
    println!();
    println!("  Provider:  {provider_label}");
    println!("  Rooms:     {}", runtime.rooms.len());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C stops a reply; 'exit' or Ctrl+C at the prompt quits.");
    println!();

    // Ctrl-C stops a streaming reply, or ends the session when idle.
    let (quit_tx, mut quit_rx) = mpsc::channel::<()>(1);
    let control = session.control();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !control.is_busy() {
                let _ = quit_tx.send(()).await;
                break;
            }
            control.stop();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = quit_rx.recv() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }

        if runtime
            .engine
            .handle_input(&mut session, &line, &mut emitter)
            .await
            == RoundOutcome::Cancelled
        {
            println!("\n  [stopped]\n");
        }
    }

    runtime.shutdown().await;
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

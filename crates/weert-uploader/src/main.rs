// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WeeRT uploader CLI
//!
//! Reads newline-delimited JSON weather packets from stdin and uploads them.
//!
//! # Usage
//!
//! ```bash
//! # Upload to a named stream (created on first use)
//! weewx-packets | weert-upload --stream-name backyard
//!
//! # Known stream id, remote server
//! weert-upload --stream-id 5f1c --server-url http://weert.local:3000 < packets.ndjson
//!
//! # Using configuration file
//! weert-upload --config weert.yaml
//!
//! # Generate an example configuration
//! weert-upload gen-config --output weert.yaml
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use weert_uploader::{Record, Uploader, UploaderConfig};

/// WeeRT uploader
#[derive(Parser, Debug)]
#[command(name = "weert-upload")]
#[command(about = "Upload weather packets from stdin to a WeeRT server")]
#[command(version)]
struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stream name to look up or create
    #[arg(long)]
    stream_name: Option<String>,

    /// Identifier of an existing stream (takes precedence over --stream-name)
    #[arg(long)]
    stream_id: Option<String>,

    /// Server base URL
    #[arg(long)]
    server_url: Option<String>,

    /// Seconds to wait for the backlog to drain at end of input
    #[arg(long, default_value = "30")]
    drain_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "weert.yaml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(cmd) = cli.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&cli)?;
    let uploader = Uploader::spawn(config).context("Failed to start uploader")?;
    tracing::info!(endpoint = %uploader.endpoint(), "Uploader running");

    let interrupted = Arc::new(AtomicBool::new(false));
    ctrlc_handler(Arc::clone(&interrupted));

    let lines = spawn_stdin_reader()?;
    let mut accepted = 0u64;
    let mut skipped = 0u64;

    loop {
        if interrupted.load(Ordering::Relaxed) {
            break;
        }
        match lines.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => match parse_packet(&line) {
                Ok(Some(record)) => {
                    if uploader.enqueue(record) {
                        accepted += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping packet: {:#}", e);
                }
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!(accepted, skipped, "End of input, draining backlog");
                if !uploader.flush(Duration::from_secs(cli.drain_timeout)) {
                    tracing::warn!(
                        queued = uploader.queue_len(),
                        "Backlog not drained before timeout"
                    );
                }
                break;
            }
        }
    }

    let stats = uploader.shutdown();
    println!("\nFinal Statistics:");
    println!("  Accepted:  {}", accepted);
    println!("  Skipped:   {}", skipped);
    println!("  Published: {}", stats.published);
    println!("  Failed:    {}", stats.failed);
    println!("  Rejected:  {}", stats.rejected);
    println!("  Stale:     {}", stats.stale);
    println!("  Evicted:   {}", stats.evicted);
    println!("  Discarded: {}", stats.discarded);

    Ok(())
}

fn build_config(cli: &Cli) -> Result<UploaderConfig> {
    let mut config = match cli.config {
        Some(ref path) => UploaderConfig::load_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => UploaderConfig::default(),
    };

    if let Some(ref url) = cli.server_url {
        config.server_url = url.clone();
    }
    if let Some(ref name) = cli.stream_name {
        config.stream_name = Some(name.clone());
    }
    if let Some(ref id) = cli.stream_id {
        config.stream_id = Some(id.clone());
    }

    if config.destination().is_none() {
        bail!("Missing --stream-name or --stream-id (or use --config)");
    }
    config.validate()?;
    Ok(config)
}

/// Parse one input line. Blank lines yield `None`.
fn parse_packet(line: &str) -> Result<Option<Record>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let packet: serde_json::Value = serde_json::from_str(line).context("invalid JSON")?;
    let record = Record::from_packet_json(&packet)?;
    Ok(Some(record))
}

/// Forward stdin lines over a channel; the sender drops at end of input.
fn spawn_stdin_reader() -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("weert-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}

/// Setup Ctrl+C handler.
fn ctrlc_handler(interrupted: Arc<AtomicBool>) {
    let _ = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down...");
        interrupted.store(true, Ordering::Relaxed);
    });
}

fn cmd_gen_config(output: PathBuf) -> Result<()> {
    let config = UploaderConfig {
        stream_name: Some("backyard".into()),
        ..UploaderConfig::default()
    };
    let yaml = config.to_yaml()?;

    let content = format!(
        r#"# WeeRT Uploader Configuration
# Generated by weert-upload gen-config
#
# stream_id wins over stream_name when both are set.
# stale: null disables the staleness check.

{}"#,
        yaml
    );

    std::fs::write(&output, content)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<()> {
    match UploaderConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            if let Some(destination) = config.destination() {
                println!("Destination: {}", destination);
            }
            println!("Server:      {}", config.server_url);
            println!("Fields:      {}", config.obs_types.join(", "));
            println!("Units:       {}", config.target_units);
            println!("Backlog:     {}", config.max_backlog);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

//! Telegate CLI
//!
//! Command-line tooling for the Telegate telemetry gateway: offline decoding
//! of captured payloads and a health check of a running gateway.
//!
//! # Usage
//!
//! ```bash
//! telegate --help
//! telegate health
//! telegate decode --source collectd capture.json
//! telegate sanitize capture.json
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::handler::HandlerRegistry;
use shared::models::{DataSource, EventEnvelope};
use shared::pipeline::{detect_source, sanitizer, DecoderRegistry};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Telegate CLI - telemetry gateway tooling
#[derive(Parser)]
#[command(name = "telegate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Gateway URL
    #[arg(
        short,
        long,
        env = "TELEGATE_GATEWAY_URL",
        default_value = "http://localhost:8080"
    )]
    gateway_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway health
    Health,
    /// Decode a captured message and print one envelope per line
    Decode {
        /// Data source of the message; detected from its shape when omitted
        #[arg(short, long)]
        source: Option<DataSource>,
        /// File holding the raw message, `-` for stdin
        input: PathBuf,
    },
    /// Print the sanitized form of a collectd message
    Sanitize {
        /// File holding the raw message, `-` for stdin
        input: PathBuf,
    },
    /// List the handlers the gateway can run
    Handlers,
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn decode(raw: &[u8], source: Option<DataSource>, out: &mut impl Write) -> Result<usize> {
    let source = source.unwrap_or_else(|| detect_source(raw));
    let decoded = DecoderRegistry::builtin().decode(source, raw)?;

    for entry in &decoded.entry_errors {
        tracing::warn!(%source, error = %entry, context = %entry.context, "entry skipped");
    }
    for message in decoded.messages {
        let document = EventEnvelope::new(source, message).to_document();
        writeln!(out, "{}", serde_json::to_string(&document)?)?;
    }
    Ok(decoded.entry_errors.len())
}

async fn health(gateway_url: &str) -> Result<()> {
    let url = format!("{}/health", gateway_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("gateway at {gateway_url} is unreachable"))?;

    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    anyhow::ensure!(status.is_success(), "gateway answered {status}");

    let handlers: Vec<&str> = body["handlers"]
        .as_array()
        .map(|names| names.iter().filter_map(serde_json::Value::as_str).collect())
        .unwrap_or_default();
    println!(
        "gateway {} is {}, handlers: {}",
        body["version"].as_str().unwrap_or("?"),
        body["status"].as_str().unwrap_or("unknown"),
        handlers.join(", "),
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => health(&cli.gateway_url).await?,
        Some(Commands::Decode { source, input }) => {
            let raw = read_input(&input)?;
            let skipped = decode(&raw, source, &mut std::io::stdout().lock())?;
            if skipped > 0 {
                eprintln!("{skipped} entries skipped");
            }
        }
        Some(Commands::Sanitize { input }) => {
            let raw = read_input(&input)?;
            println!("{}", sanitizer::sanitize_collectd(&raw)?);
        }
        Some(Commands::Handlers) => {
            for name in HandlerRegistry::builtin().names() {
                println!("{name}");
            }
        }
        None => {
            println!("Telegate CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["telegate"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_health_command() {
        let cli = Cli::try_parse_from(["telegate", "-g", "http://gw:9000", "health"]).unwrap();
        assert_eq!(cli.gateway_url, "http://gw:9000");
        assert!(matches!(cli.command, Some(Commands::Health)));
    }

    #[test]
    fn test_cli_decode_source() {
        let cli =
            Cli::try_parse_from(["telegate", "decode", "--source", "ceilometer", "-"]).unwrap();
        match cli.command {
            Some(Commands::Decode { source, input }) => {
                assert_eq!(source, Some(DataSource::Ceilometer));
                assert_eq!(input, PathBuf::from("-"));
            }
            _ => panic!("expected decode command"),
        }

        assert!(Cli::try_parse_from(["telegate", "decode", "--source", "nagios", "-"]).is_err());
    }

    #[test]
    fn test_decode_writes_envelopes() {
        let raw = br#"{"labels":{"alertname":"collectd_cpu_value","severity":"OKAY"},"annotations":{}}"#;
        let mut out = Vec::new();

        let skipped = decode(raw, None, &mut out).unwrap();
        assert_eq!(skipped, 0);

        let line: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["source"], "collectd");
        assert_eq!(line["message"]["index"], "collectd_cpu");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut out = Vec::new();
        assert!(decode(b"{{{", Some(DataSource::Generic), &mut out).is_err());
        assert!(out.is_empty());
    }
}

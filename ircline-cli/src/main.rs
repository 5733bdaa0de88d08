//! ircline: joins channels and prints their topics and text to stdout.
//!
//! Diagnostics go to stderr through tracing (`RUST_LOG`, `IRCLINE_LOG_JSON=1`
//! for JSON lines).

mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ircline_sdk::{Channel, Event};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Resolved};

#[derive(Parser, Debug)]
#[command(name = "ircline", about = "Line-mode IRC client")]
pub struct Cli {
    /// IRC server address (host:port)
    #[arg(long, env = "IRCLINE_SERVER")]
    pub server: Option<String>,

    /// Nickname
    #[arg(long, env = "IRCLINE_NICK")]
    pub nick: Option<String>,

    /// Comma-separated channels to join
    #[arg(long)]
    pub channels: Option<String>,

    /// Config file (default: ~/.config/ircline/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Dispatch inbound lines in arrival order on a single worker
    #[arg(long)]
    pub ordered: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let json_logs = std::env::var("IRCLINE_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ircline=info,ircline_sdk=info".into());
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(config::default_path);
    let resolved = Resolved::merge(&cli, &Config::load(&path));

    tracing::info!(
        server = %resolved.server,
        nick = %resolved.nick,
        channels = ?resolved.channels,
        "Starting ircline"
    );

    let client = ircline_sdk::connect(resolved.client_cfg()).await?;
    let mut events = client.subscribe();

    for name in &resolved.channels {
        let channel = client.join(name).await?;
        tokio::spawn(print_channel(channel));
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            evt = events.recv() => match evt {
                Ok(Event::Disconnected { reason }) => {
                    tracing::warn!(%reason, "Disconnected");
                    break;
                }
                Ok(Event::RawLine(line)) => tracing::trace!(%line, "raw"),
                Ok(other) => tracing::debug!(event = ?other, "Client event"),
                Err(RecvError::Lagged(n)) => tracing::warn!("Skipped {n} client events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.close();
    Ok(())
}

/// Print topic changes and text for one channel until it is closed.
async fn print_channel(channel: Channel) {
    let mut topic = channel.subscribe_topic();
    loop {
        tokio::select! {
            changed = topic.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = topic.borrow_and_update().clone();
                if let Some(text) = current {
                    println!("[{}] topic: {text}", channel.name());
                }
            }
            text = channel.recv_text() => match text {
                Some(text) => println!("[{}] {text}", channel.name()),
                None => break,
            },
        }
    }
}

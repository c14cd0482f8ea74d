//! Incident Console - live client for the incident-management backend
//!
//! Polls the backend state, keeps a headless view of it, and takes
//! operator commands line by line from stdin.

mod approval;
mod channels;
mod config;
mod display;
mod fields;
mod notify;
mod pagination;
mod reconcile;
mod render;
mod scheduler;
mod snapshot;
mod transport;

use channels::{ChannelSet, ChannelStore};
use config::ConsoleConfig;
use reconcile::ConsoleState;
use scheduler::{Command, PollScheduler, SchedulerHandle};
use transport::{Api, HttpTransport};

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("incident_console=info".parse()?),
        )
        .init();

    // Load configuration
    let cfg = ConsoleConfig::load();
    tracing::info!("Starting Incident Console against {}...", cfg.backend_url);
    tracing::info!("Custom channels stored at {}", cfg.channels_path.display());

    let transport = HttpTransport::new(&cfg.backend_url, cfg.request_timeout)?;
    tracing::info!("Backend client ready for {}", transport.base_url());
    let api = Api::new(Arc::new(transport));
    let channels = ChannelSet::load(ChannelStore::new(&cfg.channels_path));

    let (handle, task) = PollScheduler::new(api, ConsoleState::new(channels), &cfg).start();

    tokio::select! {
        result = read_commands(handle.clone()) => result?,
        result = tokio::signal::ctrl_c() => result?,
    }

    tracing::info!("Shutting down...");
    handle.shutdown();
    task.await?;

    Ok(())
}

/// Feed stdin lines to the scheduler until EOF or `quit`.
async fn read_commands(
    handle: SchedulerHandle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "status" => {
                let screen = handle.inspect(render::render_status).await?;
                println!("{}", screen);
            }
            input => match input.parse::<Command>() {
                Ok(Command::RefreshNow { silent }) => handle.refresh_now(silent).await?,
                Ok(command) => handle.send(command).await?,
                Err(e) => tracing::warn!("{}", e),
            },
        }
    }
    Ok(())
}

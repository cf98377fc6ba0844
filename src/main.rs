//! taskvoice: backend for a voice-controlled task manager
//!
//! This daemon provides:
//! - Static hosting for the browser UI (`/` and `/dist`)
//! - An in-memory task list mutated by voice function calls and manual edits
//! - An explicit voice session state machine driving the browser voice SDK
//! - A WebSocket endpoint carrying notifications, UI commands and SDK traffic
//!
//! Out of scope: persistence, multiple users, authentication.

mod config;
mod events;
mod ipc;
mod lifecycle;
mod state;
mod tasks;
mod voice;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::Notification;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::state::StateMachine;
use crate::tasks::TaskStore;
use crate::voice::{AssistantConfig, BridgeSdk, SdkCommand};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "taskvoice starting");

    // Load configuration; a missing API key stops us here
    let config = Config::load()?;
    info!(?config, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Connections -> state machine
    let (inbox_tx, inbox_rx) = mpsc::channel(64);
    // State machine -> connections
    let (event_tx, _) = broadcast::channel::<Notification>(64);
    // State machine -> voice bridges; no receiver until a bridge attaches
    let (command_tx, _) = broadcast::channel::<SdkCommand>(32);

    let sdk = Arc::new(BridgeSdk::new(config.vapi_api_key.clone(), command_tx.clone()));
    let store = TaskStore::new(event_tx.clone());
    let mut state_machine = StateMachine::new(
        store,
        sdk,
        AssistantConfig::default(),
        event_tx.clone(),
        config.unmute_delay,
    );

    let server = Server::new(config, inbox_tx, event_tx, command_tx);

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = state_machine.run(inbox_rx) => {
            info!("state machine exited");
        }

        result = server.run(shutdown.wait()) => {
            if let Err(e) = result {
                error!(?e, "server error");
                return Err(e);
            }
        }
    }

    info!("taskvoice stopped");

    Ok(())
}

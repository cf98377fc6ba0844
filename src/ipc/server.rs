//! HTTP server: static UI assets and the WebSocket endpoint
//!
//! Every WebSocket connection receives change notifications. The first
//! connection that sends `attach_voice` becomes the voice bridge: it also
//! receives SDK commands and is the only connection whose SDK callbacks are
//! accepted. When it goes away the state machine is told.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events::Notification;
use crate::voice::SdkCommand;

use super::protocol::{ClientMessage, ServerMessage};

/// Largest accepted client frame
const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Channels shared by every connection
#[derive(Clone)]
struct Hub {
    inbox_tx: mpsc::Sender<ClientMessage>,
    event_tx: broadcast::Sender<Notification>,
    command_tx: broadcast::Sender<SdkCommand>,
    /// Held by the one connection acting as the voice bridge
    bridge_claimed: Arc<AtomicBool>,
}

/// HTTP/WebSocket server
pub struct Server {
    config: Config,
    hub: Hub,
}

impl Server {
    /// Create a server feeding `inbox_tx` and relaying both broadcast channels
    pub fn new(
        config: Config,
        inbox_tx: mpsc::Sender<ClientMessage>,
        event_tx: broadcast::Sender<Notification>,
        command_tx: broadcast::Sender<SdkCommand>,
    ) -> Self {
        Self {
            config,
            hub: Hub {
                inbox_tx,
                event_tx,
                command_tx,
                bridge_claimed: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route_service("/", ServeFile::new(self.config.index_path()))
            .nest_service("/dist", ServeDir::new(&self.config.dist_dir))
            .fallback_service(ServeDir::new(&self.config.static_dir))
            .layer(TraceLayer::new_for_http())
            .with_state(self.hub.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        info!(%addr, "server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server error")?;

        info!("server shutdown complete");
        Ok(())
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Hub>) -> impl IntoResponse {
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| async move {
            if let Err(e) = handle_client(socket, hub).await {
                warn!(?e, "client handler error");
            }
        })
}

/// Handle a single client connection
async fn handle_client(socket: WebSocket, hub: Hub) -> Result<()> {
    debug!("client connected");
    let mut connection = Connection::new(hub);
    let result = connection.serve(socket).await;
    connection.detach().await;
    result
}

/// Routing state of one WebSocket connection
struct Connection {
    hub: Hub,
    /// SDK command stream, present only while this connection is the voice bridge
    command_rx: Option<broadcast::Receiver<SdkCommand>>,
}

impl Connection {
    fn new(hub: Hub) -> Self {
        Self {
            hub,
            command_rx: None,
        }
    }

    fn is_bridge(&self) -> bool {
        self.command_rx.is_some()
    }

    async fn serve(&mut self, socket: WebSocket) -> Result<()> {
        let (mut sender, mut receiver) = socket.split();

        // Subscribe before asking for a snapshot so it cannot be missed
        let mut event_rx = self.hub.event_tx.subscribe();
        self.forward(ClientMessage::Sync).await?;

        loop {
            tokio::select! {
                frame = receiver.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(message) = self.route(&text) {
                            self.forward(message).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },

                event = event_rx.recv() => match event {
                    Ok(event) => send_message(&mut sender, &ServerMessage::Event(event)).await?,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "client lagged, resynchronising");
                        self.forward(ClientMessage::Sync).await?;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                command = next_command(&mut self.command_rx) => match command {
                    Ok(command) => send_message(&mut sender, &ServerMessage::Sdk(command)).await?,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "voice bridge lagged, SDK commands dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        Ok(())
    }

    /// Decide what a text frame means; returns the message for the state machine, if any
    fn route(&mut self, text: &str) -> Option<ClientMessage> {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(%e, "failed to parse client message");
                return None;
            }
        };

        if message == ClientMessage::AttachVoice {
            self.attach();
            return None;
        }
        if message.is_bridge_callback() && !self.is_bridge() {
            warn!(?message, "SDK callback from a connection that is not the voice bridge, dropped");
            return None;
        }
        Some(message)
    }

    /// Claim the voice bridge role; only one connection holds it at a time
    fn attach(&mut self) {
        if self.is_bridge() {
            return;
        }
        if self
            .hub
            .bridge_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("a voice bridge is already attached, attach refused");
            return;
        }
        self.command_rx = Some(self.hub.command_tx.subscribe());
        info!("voice bridge attached");
    }

    /// Give up the bridge role and tell the state machine its session is gone
    async fn detach(&mut self) {
        if self.command_rx.take().is_none() {
            return;
        }
        info!("voice bridge detached");

        // Report before releasing the claim so a new bridge's traffic queues after it
        if self.hub.inbox_tx.send(ClientMessage::BridgeDetached).await.is_err() {
            debug!("state machine is gone, bridge detach not delivered");
        }
        self.hub.bridge_claimed.store(false, Ordering::Release);
    }

    async fn forward(&self, message: ClientMessage) -> Result<()> {
        self.hub
            .inbox_tx
            .send(message)
            .await
            .context("state machine is gone")
    }
}

async fn next_command(
    rx: &mut Option<broadcast::Receiver<SdkCommand>>,
) -> Result<SdkCommand, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Send a JSON text frame
async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<()> {
    let text = serde_json::to_string(message)?;
    sender.send(Message::Text(text)).await?;
    Ok(())
}

//! Voice SDK seam
//!
//! The assistant SDK runs inside the browser. The daemon drives it through
//! [`VoiceSdk`]; the production implementation forwards commands to the
//! browser connections that attached themselves as the voice bridge.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use super::assistant::AssistantConfig;

/// Transport failures talking to the SDK
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("no voice bridge is attached")]
    NotConnected,
}

/// Message injected into the assistant's conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SdkMessage {
    AddMessage { message: ConversationMessage },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub name: String,
    pub content: String,
}

impl SdkMessage {
    /// A `function` role message answering a function call
    pub fn function_result(name: &str, content: String) -> Self {
        SdkMessage::AddMessage {
            message: ConversationMessage {
                role: "function".to_string(),
                name: name.to_string(),
                content,
            },
        }
    }
}

/// Commands sent to the voice bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SdkCommand {
    /// Open a session with the given assistant
    Start {
        #[serde(rename = "apiKey")]
        api_key: String,
        assistant: AssistantConfig,
    },
    Stop,
    SetMuted { muted: bool },
    Send { payload: SdkMessage },
}

impl SdkCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            SdkCommand::Start { .. } => CommandKind::Start,
            SdkCommand::Stop => CommandKind::Stop,
            SdkCommand::SetMuted { .. } => CommandKind::SetMuted,
            SdkCommand::Send { .. } => CommandKind::Send,
        }
    }
}

/// Which command a bridge reported as rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Start,
    Stop,
    SetMuted,
    Send,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Start => write!(f, "start"),
            CommandKind::Stop => write!(f, "stop"),
            CommandKind::SetMuted => write!(f, "set_muted"),
            CommandKind::Send => write!(f, "send"),
        }
    }
}

/// Operations the session controller needs from the voice SDK.
///
/// All calls are requests: `start` succeeding only means the request was
/// handed over, confirmation arrives later as a `call_start` callback.
#[async_trait]
pub trait VoiceSdk: Send + Sync {
    async fn start(&self, assistant: &AssistantConfig) -> Result<(), SdkError>;
    async fn stop(&self) -> Result<(), SdkError>;
    async fn set_muted(&self, muted: bool) -> Result<(), SdkError>;
    async fn send(&self, message: SdkMessage) -> Result<(), SdkError>;
}

/// [`VoiceSdk`] backed by attached browser connections
pub struct BridgeSdk {
    api_key: String,
    command_tx: broadcast::Sender<SdkCommand>,
}

impl BridgeSdk {
    pub fn new(api_key: String, command_tx: broadcast::Sender<SdkCommand>) -> Self {
        Self { api_key, command_tx }
    }

    fn forward(&self, command: SdkCommand) -> Result<(), SdkError> {
        let kind = command.kind();
        let bridges = self
            .command_tx
            .send(command)
            .map_err(|_| SdkError::NotConnected)?;
        debug!(command = %kind, bridges, "forwarded SDK command");
        Ok(())
    }
}

#[async_trait]
impl VoiceSdk for BridgeSdk {
    async fn start(&self, assistant: &AssistantConfig) -> Result<(), SdkError> {
        self.forward(SdkCommand::Start {
            api_key: self.api_key.clone(),
            assistant: assistant.clone(),
        })
    }

    async fn stop(&self) -> Result<(), SdkError> {
        self.forward(SdkCommand::Stop)
    }

    async fn set_muted(&self, muted: bool) -> Result<(), SdkError> {
        self.forward(SdkCommand::SetMuted { muted })
    }

    async fn send(&self, message: SdkMessage) -> Result<(), SdkError> {
        self.forward(SdkCommand::Send { payload: message })
    }
}

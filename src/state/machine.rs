//! Core voice session state machine
//!
//! Owns the task store and the session state. Every client message and
//! SDK callback is handled here, one at a time, so neither needs locking.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::events::Notification;
use crate::ipc::{ClientMessage, TranscriptKind};
use crate::tasks::{Lookup, TaskStore};
use crate::voice::{self, AssistantConfig, CommandKind, VoiceSdk};

/// Lifecycle of the voice session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No session
    #[default]
    Idle,
    /// Start requested, waiting for the SDK to confirm
    Starting,
    /// Session confirmed live
    Active,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Starting => write!(f, "Starting"),
            SessionState::Active => write!(f, "Active"),
        }
    }
}

/// How the microphone is gated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoiceMode {
    /// The SDK detects voice activity on its own
    #[default]
    Automatic,
    /// The user holds a control to talk
    PushToTalk,
}

impl std::fmt::Display for VoiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceMode::Automatic => write!(f, "automatic"),
            VoiceMode::PushToTalk => write!(f, "push-to-talk"),
        }
    }
}

/// Outbound microphone state while a push-to-talk session is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicState {
    Muted,
    Unmuted,
}

/// The voice session controller
pub struct StateMachine {
    /// Current session state
    state: SessionState,
    mode: VoiceMode,
    mic: MicState,
    /// The user wants the microphone open once the session allows it
    talk_requested: bool,
    /// Pending deferred unmute
    unmute_at: Option<Instant>,
    unmute_delay: Duration,
    /// Time when the current non-Idle state was entered
    state_entered_at: Option<Instant>,
    store: TaskStore,
    sdk: Arc<dyn VoiceSdk>,
    assistant: AssistantConfig,
    /// Channel for emitting notifications
    event_tx: broadcast::Sender<Notification>,
}

impl StateMachine {
    /// Create a new state machine
    pub fn new(
        store: TaskStore,
        sdk: Arc<dyn VoiceSdk>,
        assistant: AssistantConfig,
        event_tx: broadcast::Sender<Notification>,
        unmute_delay: Duration,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            mode: VoiceMode::default(),
            mic: MicState::Unmuted,
            talk_requested: false,
            unmute_at: None,
            unmute_delay,
            state_entered_at: None,
            store,
            sdk,
            assistant,
            event_tx,
        }
    }

    /// Get the current state
    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub fn mode(&self) -> VoiceMode {
        self.mode
    }

    /// Microphone gate, only meaningful for an active push-to-talk session
    #[cfg(test)]
    pub fn mic_state(&self) -> Option<MicState> {
        (self.state == SessionState::Active && self.mode == VoiceMode::PushToTalk).then_some(self.mic)
    }

    /// When the deferred unmute will fire, if one is pending
    #[cfg(test)]
    pub fn unmute_deadline(&self) -> Option<Instant> {
        self.unmute_at
    }

    #[cfg(test)]
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Run the state machine, processing client messages until the inbox closes
    pub async fn run(&mut self, mut inbox: mpsc::Receiver<ClientMessage>) {
        info!("state machine started in Idle state");

        loop {
            let deadline = self.unmute_at;
            tokio::select! {
                message = inbox.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_deferred_unmute().await;
                }
            }
        }

        info!("state machine stopped");
    }

    /// Handle one message from a client
    pub async fn handle_message(&mut self, message: ClientMessage) {
        debug!(?message, "handling client message");

        match message {
            ClientMessage::StartSession => self.start_session().await,
            ClientMessage::StopSession => self.stop_session().await,
            ClientMessage::PushToTalkStart => self.begin_push_to_talk().await,
            ClientMessage::PushToTalkEnd => self.end_push_to_talk().await,
            ClientMessage::SetVoiceMode { mode } => self.set_mode(mode).await,
            // Lookup misses on manual edits are logged by the store
            ClientMessage::ToggleTask { task_id } => {
                let _ = self.store.toggle(&task_id.into(), None);
            }
            ClientMessage::ToggleSubtask {
                task_id,
                subtask_id,
            } => {
                let _ = self
                    .store
                    .toggle(&task_id.into(), Some(&subtask_id.into()));
            }
            ClientMessage::EditTask {
                task_id,
                subtask_id,
                updates,
            } => {
                let subtask = subtask_id.map(Lookup::Id);
                let _ = self
                    .store
                    .update(&task_id.into(), subtask.as_ref(), &updates);
            }
            ClientMessage::DeleteTask {
                task_id,
                subtask_id,
            } => {
                let subtask = subtask_id.map(Lookup::Id);
                let _ = self.store.delete(&task_id.into(), subtask.as_ref());
            }
            ClientMessage::Sync => self.sync(),
            ClientMessage::AttachVoice => {
                debug!("attach_voice is handled by the connection");
            }
            ClientMessage::CallStart => self.on_call_start().await,
            ClientMessage::CallEnd => self.on_call_end(),
            ClientMessage::SpeechStart => self.on_speech(true),
            ClientMessage::SpeechEnd => self.on_speech(false),
            ClientMessage::FunctionCall { name, parameters } => {
                self.on_function_call(&name, parameters).await;
            }
            ClientMessage::Transcript {
                transcript,
                transcript_type,
            } => self.on_transcript(transcript, transcript_type == TranscriptKind::Final),
            ClientMessage::SdkError { message } => self.on_sdk_error(&message),
            ClientMessage::CommandRejected { command, message } => {
                self.on_command_rejected(command, &message);
            }
            ClientMessage::BridgeDetached => self.on_bridge_detached(),
        }
    }

    /// Request a new session from the SDK
    pub async fn start_session(&mut self) {
        if self.state != SessionState::Idle {
            debug!(state = %self.state, "start ignored, session already requested");
            return;
        }

        if self.mode == VoiceMode::PushToTalk {
            self.talk_requested = true;
        }
        self.transition_to(SessionState::Starting);

        if let Err(e) = self.sdk.start(&self.assistant).await {
            warn!(%e, "failed to start voice session");
            self.talk_requested = false;
            self.transition_to(SessionState::Idle);
        }
    }

    /// Request teardown and go Idle, whatever the current state
    pub async fn stop_session(&mut self) {
        self.talk_requested = false;
        self.unmute_at = None;

        if let Err(e) = self.sdk.stop().await {
            warn!(%e, "failed to stop voice session");
        }
        self.transition_to(SessionState::Idle);
    }

    /// Open the microphone, starting a session first if needed
    pub async fn begin_push_to_talk(&mut self) {
        if self.mode != VoiceMode::PushToTalk {
            debug!(mode = %self.mode, "push-to-talk start ignored");
            return;
        }

        self.talk_requested = true;
        match self.state {
            SessionState::Idle => self.start_session().await,
            SessionState::Starting => debug!("talk requested, waiting for session confirmation"),
            SessionState::Active => {
                self.unmute_at = None;
                self.set_mic(MicState::Unmuted).await;
            }
        }
    }

    /// Close the microphone
    pub async fn end_push_to_talk(&mut self) {
        if self.mode != VoiceMode::PushToTalk {
            debug!(mode = %self.mode, "push-to-talk end ignored");
            return;
        }

        self.talk_requested = false;
        self.unmute_at = None;
        if self.state == SessionState::Active {
            self.set_mic(MicState::Muted).await;
        } else {
            debug!(state = %self.state, "push-to-talk end without an active session");
        }
    }

    /// Switch voice mode without starting or stopping the session
    pub async fn set_mode(&mut self, mode: VoiceMode) {
        let previous = self.mode;
        self.mode = mode;
        info!(from = %previous, to = %mode, "voice mode set");

        if previous != mode {
            self.talk_requested = false;
            self.unmute_at = None;
            if self.state == SessionState::Active {
                let gate = match mode {
                    VoiceMode::PushToTalk => MicState::Muted,
                    VoiceMode::Automatic => MicState::Unmuted,
                };
                self.set_mic(gate).await;
            }
        }

        self.emit(Notification::VoiceModeChanged { mode });
    }

    /// The SDK confirmed the session is live
    pub async fn on_call_start(&mut self) {
        if self.state == SessionState::Active {
            debug!("duplicate call-start ignored");
            return;
        }

        self.transition_to(SessionState::Active);
        match self.mode {
            VoiceMode::Automatic => self.mic = MicState::Unmuted,
            VoiceMode::PushToTalk => {
                self.set_mic(MicState::Muted).await;
                if self.talk_requested {
                    self.unmute_at = Some(Instant::now() + self.unmute_delay);
                    debug!(delay_ms = self.unmute_delay.as_millis() as u64, "unmute scheduled");
                }
            }
        }
    }

    /// The SDK reports the session ended
    pub fn on_call_end(&mut self) {
        self.talk_requested = false;
        self.unmute_at = None;
        self.transition_to(SessionState::Idle);
    }

    /// The SDK reported an error; the session is gone
    pub fn on_sdk_error(&mut self, message: &str) {
        error!(message, "voice SDK error");
        self.on_call_end();
    }

    /// A bridge could not carry out a command
    pub fn on_command_rejected(&mut self, command: CommandKind, message: &str) {
        warn!(%command, message, "voice SDK rejected command");
        if command == CommandKind::Start && self.state == SessionState::Starting {
            self.talk_requested = false;
            self.transition_to(SessionState::Idle);
        }
    }

    /// The voice bridge disconnected; whatever session it held is gone
    pub fn on_bridge_detached(&mut self) {
        if self.state == SessionState::Idle {
            debug!("voice bridge detached while idle");
            return;
        }

        warn!(state = %self.state, "voice bridge detached, session lost");
        self.on_call_end();
    }

    /// Fire the unmute scheduled after session confirmation
    pub async fn fire_deferred_unmute(&mut self) {
        self.unmute_at = None;
        if self.state == SessionState::Active
            && self.mode == VoiceMode::PushToTalk
            && self.talk_requested
        {
            self.set_mic(MicState::Unmuted).await;
        } else {
            debug!(state = %self.state, "deferred unmute no longer wanted");
        }
    }

    pub fn on_speech(&mut self, is_speaking: bool) {
        self.emit(Notification::SpeechStateChanged { is_speaking });
    }

    pub fn on_transcript(&mut self, text: String, is_final: bool) {
        self.emit(Notification::TranscriptUpdated { text, is_final });
    }

    /// Apply an assistant function call and acknowledge it
    pub async fn on_function_call(&mut self, name: &str, args: Value) {
        let Some(ack) = voice::dispatch(&mut self.store, name, args) else {
            return;
        };

        let function = ack.function;
        if let Err(e) = self.sdk.send(ack.into_message()).await {
            warn!(%function, %e, "failed to acknowledge function call");
        }
    }

    /// Re-publish everything a fresh client needs
    pub fn sync(&mut self) {
        self.store.publish();
        self.emit(Notification::CallStateChanged {
            is_active: self.state == SessionState::Active,
        });
        self.emit(Notification::VoiceModeChanged { mode: self.mode });
    }

    async fn set_mic(&mut self, target: MicState) {
        match self.sdk.set_muted(target == MicState::Muted).await {
            Ok(()) => {
                debug!(?target, "microphone gated");
                self.mic = target;
            }
            Err(e) => warn!(%e, ?target, "failed to gate microphone"),
        }
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: SessionState) {
        let old_state = self.state;
        let duration_ms = self
            .state_entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );

        self.state = new_state;
        self.state_entered_at = if new_state != SessionState::Idle {
            Some(Instant::now())
        } else {
            None
        };

        // Starting is not visible to the UI
        match new_state {
            SessionState::Starting => {}
            SessionState::Idle => self.emit(Notification::CallStateChanged { is_active: false }),
            SessionState::Active => self.emit(Notification::CallStateChanged { is_active: true }),
        }
    }

    fn emit(&self, event: Notification) {
        debug!(%event, "emitting notification");
        let _ = self.event_tx.send(event);
    }
}

//! Change notifications pushed to the UI
//!
//! Each notification serialises as `{"event": <name>, "detail": <payload>}`,
//! the same shape the browser turns into a DOM `CustomEvent`.

use serde::{Deserialize, Serialize};

use crate::state::VoiceMode;
use crate::tasks::Task;

/// Events published by the task store and the voice session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "detail", rename_all = "camelCase")]
pub enum Notification {
    /// The complete task list after a mutation
    TasksUpdated(Vec<Task>),

    /// Voice session became active or inactive
    CallStateChanged {
        #[serde(rename = "isActive")]
        is_active: bool,
    },

    /// Voice mode switched
    VoiceModeChanged { mode: VoiceMode },

    /// Speech recognised from the user
    TranscriptUpdated {
        text: String,
        #[serde(rename = "isFinal")]
        is_final: bool,
    },

    /// Assistant started or stopped speaking
    SpeechStateChanged {
        #[serde(rename = "isSpeaking")]
        is_speaking: bool,
    },
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::TasksUpdated(tasks) => write!(f, "TASKS_UPDATED ({} tasks)", tasks.len()),
            Notification::CallStateChanged { is_active } => {
                write!(f, "CALL_STATE_CHANGED (active={})", is_active)
            }
            Notification::VoiceModeChanged { mode } => write!(f, "VOICE_MODE_CHANGED ({})", mode),
            Notification::TranscriptUpdated { is_final, .. } => {
                write!(f, "TRANSCRIPT_UPDATED (final={})", is_final)
            }
            Notification::SpeechStateChanged { is_speaking } => {
                write!(f, "SPEECH_STATE_CHANGED (speaking={})", is_speaking)
            }
        }
    }
}

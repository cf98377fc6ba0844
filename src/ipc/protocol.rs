//! WebSocket message protocol definitions
//!
//! All frames are JSON text. Browser → daemon frames are [`ClientMessage`]s,
//! daemon → browser frames are [`ServerMessage`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::events::Notification;
use crate::state::VoiceMode;
use crate::tasks::TaskUpdates;
use crate::voice::{CommandKind, SdkCommand};

/// Whether a transcript is still being revised
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptKind {
    Final,
    #[default]
    #[serde(other)]
    Partial,
}

/// Messages from the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    // Voice controls from the UI
    StartSession,
    StopSession,
    PushToTalkStart,
    PushToTalkEnd,
    SetVoiceMode {
        mode: VoiceMode,
    },

    // Manual edits, addressed by id
    ToggleTask {
        task_id: Uuid,
    },
    ToggleSubtask {
        task_id: Uuid,
        subtask_id: Uuid,
    },
    EditTask {
        task_id: Uuid,
        #[serde(default)]
        subtask_id: Option<Uuid>,
        updates: TaskUpdates,
    },
    DeleteTask {
        task_id: Uuid,
        #[serde(default)]
        subtask_id: Option<Uuid>,
    },

    /// Re-publish the full state
    Sync,

    /// Register this connection as the voice bridge
    AttachVoice,

    // SDK callbacks relayed by the bridge
    CallStart,
    CallEnd,
    SpeechStart,
    SpeechEnd,
    FunctionCall {
        name: String,
        #[serde(default)]
        parameters: Value,
    },
    Transcript {
        transcript: String,
        #[serde(rename = "transcriptType", default)]
        transcript_type: TranscriptKind,
    },
    SdkError {
        message: String,
    },
    CommandRejected {
        command: CommandKind,
        message: String,
    },

    /// The attached voice bridge went away. Raised by the server, never
    /// accepted from the wire.
    #[serde(skip)]
    BridgeDetached,
}

impl ClientMessage {
    /// SDK callbacks, only meaningful from the attached voice bridge
    pub fn is_bridge_callback(&self) -> bool {
        matches!(
            self,
            ClientMessage::CallStart
                | ClientMessage::CallEnd
                | ClientMessage::SpeechStart
                | ClientMessage::SpeechEnd
                | ClientMessage::FunctionCall { .. }
                | ClientMessage::Transcript { .. }
                | ClientMessage::SdkError { .. }
                | ClientMessage::CommandRejected { .. }
        )
    }
}

/// Messages to the browser
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A change notification, for every connection
    Event(Notification),
    /// An SDK command, for voice bridges only
    Sdk(SdkCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ui_command_deserialization() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"set_voice_mode","mode":"push-to-talk"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SetVoiceMode {
                mode: VoiceMode::PushToTalk
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"push_to_talk_start"}"#).unwrap();
        assert_eq!(msg, ClientMessage::PushToTalkStart);
    }

    #[test]
    fn test_edit_without_subtask() {
        let id = Uuid::new_v4();
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "edit_task",
            "task_id": id,
            "updates": {"newTitle": "Tidy kitchen", "deadline": null}
        }))
        .unwrap();

        match msg {
            ClientMessage::EditTask {
                task_id,
                subtask_id,
                updates,
            } => {
                assert_eq!(task_id, id);
                assert_eq!(subtask_id, None);
                assert_eq!(updates.new_title.as_deref(), Some("Tidy kitchen"));
                assert_eq!(updates.deadline, Some(None));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_transcript_kinds() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "transcript", "transcript": "hello", "transcriptType": "final"
        }))
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Transcript {
                transcript_type: TranscriptKind::Final,
                ..
            }
        ));

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "transcript", "transcript": "hel", "transcriptType": "interim"
        }))
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Transcript {
                transcript_type: TranscriptKind::Partial,
                ..
            }
        ));
    }

    #[test]
    fn test_function_call_without_parameters() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"function_call","name":"add_task"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::FunctionCall {
                name: "add_task".to_string(),
                parameters: Value::Null
            }
        );
    }

    #[test]
    fn test_bridge_callbacks_are_classified() {
        assert!(ClientMessage::CallStart.is_bridge_callback());
        assert!(ClientMessage::SdkError {
            message: "boom".to_string()
        }
        .is_bridge_callback());
        assert!(!ClientMessage::StartSession.is_bridge_callback());
        assert!(!ClientMessage::AttachVoice.is_bridge_callback());
    }

    #[test]
    fn test_bridge_detached_is_not_accepted_from_clients() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"bridge_detached"}"#).is_err());
    }

    #[test]
    fn test_server_message_serialization() {
        let event = ServerMessage::Event(Notification::CallStateChanged { is_active: false });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["channel"], "event");
        assert_eq!(json["event"], "callStateChanged");
        assert_eq!(json["detail"]["isActive"], false);

        let sdk = ServerMessage::Sdk(SdkCommand::SetMuted { muted: true });
        let json = serde_json::to_value(&sdk).unwrap();
        assert_eq!(json["channel"], "sdk");
        assert_eq!(json["command"], "set_muted");
    }
}

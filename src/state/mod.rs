//! Voice session state machine
//!
//! Provides an explicit session lifecycle with three states:
//! - Idle: no session
//! - Starting: start requested, waiting for the SDK to confirm
//! - Active: session live; in push-to-talk mode the microphone is
//!   additionally gated Muted/Unmuted

mod machine;

pub use machine::{StateMachine, VoiceMode};

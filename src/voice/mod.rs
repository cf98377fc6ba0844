//! Voice assistant integration
//!
//! The assistant definition, the function-call contract and the seam to
//! the external voice SDK.

mod assistant;
mod functions;
mod sdk;

pub use assistant::AssistantConfig;
pub use functions::dispatch;
pub use sdk::{BridgeSdk, CommandKind, SdkCommand, VoiceSdk};

#[cfg(test)]
pub use sdk::{SdkError, SdkMessage};

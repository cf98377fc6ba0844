//! Browser-facing interface: WebSocket protocol and HTTP server

mod protocol;
mod server;

pub use protocol::{ClientMessage, TranscriptKind};
pub use server::Server;

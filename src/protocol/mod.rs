mod errors;
mod frames;

pub use errors::{ApiError, error_body};
pub use frames::{
    ChatBroadcast, ChatInbound, ChatMessagePayload, DocBroadcast, DocInbound, TerminalInbound,
    TerminalOutbound,
};

/// Close code used when the server abandons a realtime connection after a
/// persistence or lookup failure.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Workspace terminal close codes, matching the browser client contract.
pub const CLOSE_TERMINAL_UNAUTHENTICATED: u16 = 4001;
pub const CLOSE_TERMINAL_NOT_FOUND: u16 = 4003;
pub const CLOSE_TERMINAL_NOT_RUNNING: u16 = 4004;

//! Error types surfaced by the SDK.

use std::io;

/// Why a single inbound line could not be turned into a [`Message`](crate::message::Message).
///
/// Parse errors never leave the read pump: the line is reported on the
/// diagnostics stream and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty IRC message")]
    Empty,
    #[error("no command token in message")]
    MissingCommand,
    #[error("expected a command after the prefix")]
    MalformedPrefix,
    #[error("IRC message not terminated")]
    Unterminated,
}

/// Failures of the client itself (transport setup and lifecycle misuse).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The TCP connection could not be established.
    #[error("TCP connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("client is already connected")]
    AlreadyConnected,
    /// The client was closed; its queues no longer accept work.
    #[error("client has been closed")]
    Closed,
}

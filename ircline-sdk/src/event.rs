//! Diagnostics emitted by the client for the application to observe.
//!
//! Channel content (topics, text) is never sent here; it goes to the
//! [`Channel`](crate::channel::Channel) handles. This stream carries
//! everything else the pipeline wants to report: lifecycle changes, lines it
//! could not parse or route, and traffic it does not handle.

use std::fmt;

use tokio::sync::broadcast;

use crate::error::ParseError;

/// Events that the SDK emits to subscribers (CLI, bot, tests, etc.)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Transport is up and both pumps are running.
    Connected {
        network: String,
    },

    /// Raw inbound line with the terminator trimmed (for debugging).
    RawLine(String),

    /// An inbound line was discarded because it could not be parsed.
    ParseFailed {
        line: String,
        error: ParseError,
    },

    /// A topic reply or channel message lacked a field it needs.
    MissingField {
        command: String,
        field: Field,
    },

    /// A topic reply or channel message named a channel we have not joined.
    RoutingMiss {
        command: String,
        channel: String,
    },

    /// A message the dispatcher does not act on.
    Unhandled {
        prefix: String,
        command: String,
    },

    /// Connection was closed, by either side.
    Disconnected {
        reason: String,
    },
}

/// Structured field of a topic reply or channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Reply target (our own nick) in a topic reply.
    Target,
    /// Channel name.
    Channel,
    TopicText,
    Text,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Target => "target",
            Field::Channel => "channel",
            Field::TopicText => "topic text",
            Field::Text => "text",
        };
        f.write_str(name)
    }
}

/// Sending half of the diagnostics stream.
///
/// Emitting never blocks; with no subscribers the event is dropped and slow
/// subscribers observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: broadcast::Sender<Event>,
}

impl EventSink {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

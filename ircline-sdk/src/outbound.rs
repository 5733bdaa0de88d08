//! Producer side of the outbound queue.
//!
//! A single write pump drains the queue, so lines reach the transport in the
//! order they were enqueued regardless of which task produced them.

use tokio::sync::mpsc;

use crate::command;
use crate::error::ClientError;

/// Cloneable handle for enqueueing raw lines onto the outbound queue.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<String>,
}

impl Outbound {
    /// Create a queue with room for `capacity` pending lines.
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue one line. Fails with [`ClientError::Closed`] once the write
    /// pump is gone.
    pub async fn send(&self, line: impl Into<String>) -> Result<(), ClientError> {
        self.tx
            .send(line.into())
            .await
            .map_err(|_| ClientError::Closed)
    }

    pub async fn nick(&self, nick: &str) -> Result<(), ClientError> {
        self.send(command::nick(nick)).await
    }

    pub async fn user(&self, nick: &str, realname: &str) -> Result<(), ClientError> {
        self.send(command::user(nick, realname)).await
    }

    pub async fn join(&self, channel: &str) -> Result<(), ClientError> {
        self.send(command::join(channel)).await
    }

    pub async fn pong(&self, payload: &str) -> Result<(), ClientError> {
        self.send(command::pong(payload)).await
    }

    pub async fn privmsg(&self, target: &str, text: &str) -> Result<(), ClientError> {
        self.send(command::privmsg(target, text)).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

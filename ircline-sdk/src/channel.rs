//! Joined channels and the registry that owns them.
//!
//! Names are case-folded to upper case before they are used as keys, so
//! `#foo`, `#Foo` and `#FOO` are the same channel.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::error::ClientError;
use crate::outbound::Outbound;

/// Registry key for a channel name.
pub fn normalize(name: &str) -> String {
    name.to_uppercase()
}

/// Consumer handle for one joined channel.
///
/// Clones share the same state: every handle returned for the same name sees
/// the same topic and reads from the same text queue.
#[derive(Debug, Clone)]
pub struct Channel {
    inner: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    name: String,
    outbound: Outbound,
    topic_rx: watch::Receiver<Option<String>>,
    // Senders are taken on close so that consumers see end-of-stream.
    topic_tx: Mutex<Option<watch::Sender<Option<String>>>>,
    text_tx: Mutex<Option<mpsc::Sender<String>>>,
    text_rx: tokio::sync::Mutex<mpsc::Receiver<String>>,
}

impl Channel {
    fn new(name: String, outbound: Outbound, text_buffer: usize) -> Self {
        let (topic_tx, topic_rx) = watch::channel(None);
        let (text_tx, text_rx) = mpsc::channel(text_buffer.max(1));
        Self {
            inner: Arc::new(Shared {
                name,
                outbound,
                topic_rx,
                topic_tx: Mutex::new(Some(topic_tx)),
                text_tx: Mutex::new(Some(text_tx)),
                text_rx: tokio::sync::Mutex::new(text_rx),
            }),
        }
    }

    /// Normalized (upper-case) channel name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Latest topic reported by the server, if any.
    pub fn topic(&self) -> Option<String> {
        self.inner.topic_rx.borrow().clone()
    }

    /// Watch the topic slot. `changed()` resolves once a topic has been
    /// reported since the channel was created and errors after close.
    pub fn subscribe_topic(&self) -> watch::Receiver<Option<String>> {
        self.inner.topic_rx.clone()
    }

    /// Next text payload sent to this channel, in delivery order.
    /// Returns `None` once the client is closed and the queue is drained.
    pub async fn recv_text(&self) -> Option<String> {
        self.inner.text_rx.lock().await.recv().await
    }

    /// Send a message to the channel.
    pub async fn say(&self, text: &str) -> Result<(), ClientError> {
        let closed = self.inner.text_tx.lock().is_none();
        if closed {
            return Err(ClientError::Closed);
        }
        self.inner.outbound.privmsg(&self.inner.name, text).await
    }

    /// Both handles refer to the same registry entry.
    pub fn same_channel(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_topic(&self, topic: String) -> bool {
        match self.inner.topic_tx.lock().as_ref() {
            Some(tx) => {
                tx.send_replace(Some(topic));
                true
            }
            None => false,
        }
    }

    /// Push a text payload, waiting for queue space. Returns `false` if the
    /// channel was closed.
    pub(crate) async fn deliver_text(&self, text: String) -> bool {
        // Clone out of the lock; the send may wait on a slow consumer.
        let tx = self.inner.text_tx.lock().clone();
        match tx {
            Some(tx) => tx.send(text).await.is_ok(),
            None => false,
        }
    }

    pub(crate) fn close(&self) {
        self.inner.topic_tx.lock().take();
        self.inner.text_tx.lock().take();
    }
}

/// Joined channels, keyed by normalized name.
///
/// Dispatch units only read from the registry; entries are added by
/// [`Registry::join`], which the owning client calls.
#[derive(Debug)]
pub struct Registry {
    channels: DashMap<String, Channel>,
    outbound: Outbound,
    text_buffer: usize,
}

impl Registry {
    pub(crate) fn new(outbound: Outbound, text_buffer: usize) -> Self {
        Self {
            channels: DashMap::new(),
            outbound,
            text_buffer,
        }
    }

    /// Return the channel for `name`, creating it on first use.
    pub fn join(&self, name: &str) -> Channel {
        let key = normalize(name);
        self.channels
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(channel = %key, "Registered channel");
                Channel::new(key, self.outbound.clone(), self.text_buffer)
            })
            .value()
            .clone()
    }

    /// Case-insensitive lookup. Never creates.
    pub fn lookup(&self, name: &str) -> Option<Channel> {
        self.channels.get(&normalize(name)).map(|c| c.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Close every channel and forget them.
    pub(crate) fn close(&self) {
        for entry in self.channels.iter() {
            entry.value().close();
        }
        self.channels.clear();
    }
}

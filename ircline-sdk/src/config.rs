//! Client configuration.

use serde::{Deserialize, Serialize};

/// How inbound lines are scheduled onto the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Every line gets its own task. Highest throughput; lines may be
    /// dispatched out of arrival order, also within one channel.
    #[default]
    Concurrent,
    /// One dispatch worker per client. Lines are handled in arrival order,
    /// except `PING`, which is answered as soon as it is read.
    Ordered,
}

/// Configuration for connecting to an IRC server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCfg {
    /// Server address (host:port).
    pub network: String,
    /// Desired nickname.
    pub nick: String,
    /// Real name sent with USER. Defaults to the nick.
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub dispatch: DispatchMode,
    /// Pending text payloads per channel before delivery waits on the consumer.
    #[serde(default = "default_buffer")]
    pub text_buffer: usize,
    #[serde(default = "default_buffer")]
    pub outbound_buffer: usize,
    /// Lines waiting for the dispatch worker in [`DispatchMode::Ordered`].
    #[serde(default = "default_buffer")]
    pub dispatch_buffer: usize,
    /// Diagnostics kept for slow subscribers before they lag.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_buffer() -> usize {
    256
}

fn default_event_buffer() -> usize {
    1024
}

impl ClientCfg {
    pub fn new(network: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            nick: nick.into(),
            ..Self::default()
        }
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nick)
    }
}

impl Default for ClientCfg {
    fn default() -> Self {
        Self {
            network: "127.0.0.1:6667".to_string(),
            nick: "ircline".to_string(),
            realname: None,
            dispatch: DispatchMode::default(),
            text_buffer: default_buffer(),
            outbound_buffer: default_buffer(),
            dispatch_buffer: default_buffer(),
            event_buffer: default_event_buffer(),
        }
    }
}

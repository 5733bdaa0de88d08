//! Classification and routing of parsed messages.
//!
//! Topic replies and channel text go to the matching [`Channel`], keep-alive
//! probes are answered on the outbound queue, and everything else is only
//! reported. Nothing here is fatal: a line that cannot be routed is reported
//! on the diagnostics stream and dropped.

use std::sync::Arc;

use crate::channel::{Channel, Registry, normalize};
use crate::event::{Event, EventSink, Field};
use crate::message::Message;
use crate::outbound::Outbound;

/// RPL_TOPIC
const RPL_TOPIC: &str = "332";

/// What a message is, as far as routing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    TopicReply,
    ChannelText,
    KeepAlive,
    Other,
}

impl Route {
    pub fn of(msg: &Message) -> Self {
        match msg.command.as_str() {
            RPL_TOPIC => Route::TopicReply,
            "PRIVMSG" => Route::ChannelText,
            "PING" => Route::KeepAlive,
            _ => Route::Other,
        }
    }
}

/// `me #chan :topic text` → (`#CHAN`, `topic text`).
fn topic_fields(params: &str) -> Result<(String, &str), Field> {
    let (_target, rest) = params.split_once(' ').ok_or(Field::Target)?;
    let (channel, rest) = rest.split_once(' ').ok_or(Field::Channel)?;
    let (_, topic) = rest.split_once(':').ok_or(Field::TopicText)?;
    Ok((normalize(channel), topic))
}

/// `#chan :text` → (`#CHAN`, `text`).
fn text_fields(params: &str) -> Result<(String, &str), Field> {
    let (target, _) = params.split_once(' ').ok_or(Field::Target)?;
    let (_, text) = params.split_once(':').ok_or(Field::Text)?;
    Ok((normalize(target), text))
}

/// PING payload with the trailing-parameter marker removed.
///
/// A payload that contains spaces keeps its marker so it stays one
/// parameter on the way back out.
fn pong_payload(params: &str) -> &str {
    match params.strip_prefix(':') {
        Some(token) if !token.contains(' ') => token,
        _ => params,
    }
}

/// Routes parsed messages for one client.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    registry: Arc<Registry>,
    outbound: Outbound,
    events: EventSink,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<Registry>, outbound: Outbound, events: EventSink) -> Self {
        Self {
            registry,
            outbound,
            events,
        }
    }

    /// Parse one raw line and dispatch it. Parse failures are reported and
    /// the line is discarded.
    pub(crate) async fn handle_line(&self, raw: String) {
        match Message::parse(&raw) {
            Ok(msg) => self.dispatch(msg).await,
            Err(error) => {
                let line = raw.trim_end().to_string();
                tracing::warn!(%line, %error, "Discarding unparseable line");
                self.events.emit(Event::ParseFailed { line, error });
            }
        }
    }

    pub(crate) async fn dispatch(&self, msg: Message) {
        match Route::of(&msg) {
            Route::TopicReply => match topic_fields(&msg.params) {
                Ok((name, topic)) => {
                    if let Some(channel) = self.route(&msg, &name) {
                        if channel.set_topic(topic.to_string()) {
                            tracing::debug!(channel = %name, %topic, "Topic updated");
                        } else {
                            tracing::debug!(channel = %name, "Channel closed, dropping topic");
                        }
                    }
                }
                Err(field) => self.missing(&msg, field),
            },
            Route::ChannelText => match text_fields(&msg.params) {
                Ok((name, text)) => {
                    if let Some(channel) = self.route(&msg, &name)
                        && !channel.deliver_text(text.to_string()).await
                    {
                        tracing::debug!(channel = %name, "Channel closed, dropping text");
                    }
                }
                Err(field) => self.missing(&msg, field),
            },
            Route::KeepAlive => {
                let payload = pong_payload(&msg.params);
                if let Err(e) = self.outbound.pong(payload).await {
                    tracing::debug!("Could not answer PING: {e}");
                }
            }
            Route::Other => {
                tracing::debug!(prefix = %msg.prefix, command = %msg.command, "Unhandled message");
                self.events.emit(Event::Unhandled {
                    prefix: msg.prefix,
                    command: msg.command,
                });
            }
        }
    }

    fn route(&self, msg: &Message, channel: &str) -> Option<Channel> {
        let found = self.registry.lookup(channel);
        if found.is_none() {
            tracing::warn!(command = %msg.command, %channel, "No joined channel for message");
            self.events.emit(Event::RoutingMiss {
                command: msg.command.clone(),
                channel: channel.to_string(),
            });
        }
        found
    }

    fn missing(&self, msg: &Message, field: Field) {
        tracing::warn!(command = %msg.command, %field, line = %msg.raw.trim_end(), "Could not get field");
        self.events.emit(Event::MissingField {
            command: msg.command.clone(),
            field,
        });
    }
}

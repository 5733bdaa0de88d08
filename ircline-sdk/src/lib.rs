//! ircline-sdk: client engine for IRC.
//!
//! Connects to one server, joins channels and turns the inbound byte stream
//! into per-channel topic and text deliveries, answering keep-alive probes
//! along the way:
//! - `message`: raw line → [`Message`]
//! - `dispatch`: routing of parsed messages
//! - `channel`: [`Channel`] handles and their [`Registry`]
//! - `client`: transport, pumps and lifecycle

pub mod channel;
pub mod client;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod message;
pub mod outbound;

pub use channel::{Channel, Registry};
pub use client::{Client, connect};
pub use config::{ClientCfg, DispatchMode};
pub use error::{ClientError, ParseError};
pub use event::{Event, Field};
pub use message::Message;
pub use outbound::Outbound;

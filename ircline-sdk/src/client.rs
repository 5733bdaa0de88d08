//! IRC client: transport, pumps and the channel registry.
//!
//! This is the main entry point for SDK consumers. A [`Client`] owns one
//! connection. Once connected it runs two pumps:
//!
//! - the **read pump** splits the stream into lines and hands each one to the
//!   dispatcher (see [`DispatchMode`] for how lines are scheduled);
//! - the **write pump** sends `NICK`/`USER`, then drains the outbound queue
//!   one line at a time, in submission order.
//!
//! Channel content is read from the [`Channel`] handles returned by
//! [`Client::join`]. Everything else the pipeline wants to report is on the
//! diagnostics stream from [`Client::subscribe`].
//!
//! ## Reconnection
//!
//! A client is not reusable. After [`Event::Disconnected`] the consumer
//! should [`close`](Client::close) it and build a new one.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::channel::{Channel, Registry};
use crate::command;
use crate::config::{ClientCfg, DispatchMode};
use crate::dispatch::{Dispatcher, Route};
use crate::error::ClientError;
use crate::event::{Event, EventSink};
use crate::message::Message;
use crate::outbound::Outbound;

/// Create a client and connect it over TCP.
pub async fn connect(config: ClientCfg) -> Result<Client, ClientError> {
    let client = Client::new(config);
    client.connect().await?;
    Ok(client)
}

enum Lifecycle {
    /// Not connected yet; the outbound receiver waits for the write pump.
    Idle(mpsc::Receiver<String>),
    Running(Vec<JoinHandle<()>>),
    Closed,
}

/// A single IRC connection and the channels joined on it.
pub struct Client {
    config: ClientCfg,
    registry: Arc<Registry>,
    outbound: Outbound,
    events: EventSink,
    state: Mutex<Lifecycle>,
}

impl Client {
    /// Build a client without touching the network.
    ///
    /// Lines enqueued before [`connect`](Self::connect) are held and sent
    /// after `NICK`/`USER`.
    pub fn new(config: ClientCfg) -> Self {
        let (outbound, outbound_rx) = Outbound::channel(config.outbound_buffer);
        let registry = Arc::new(Registry::new(outbound.clone(), config.text_buffer));
        let events = EventSink::new(config.event_buffer);
        Self {
            config,
            registry,
            outbound,
            events,
            state: Mutex::new(Lifecycle::Idle(outbound_rx)),
        }
    }

    /// Open a TCP connection to `config.network` and start the pumps.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.ensure_idle()?;

        let addr = &self.config.network;
        tracing::debug!("Connecting to {addr}...");
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.clone(),
                source,
            })?;
        tracing::debug!("TCP connected to {addr}");

        self.connect_with_stream(tcp)
    }

    /// Start the pumps on an already established transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_with_stream<S>(&self, stream: S) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut state = self.state.lock();
        let outbound_rx = match std::mem::replace(&mut *state, Lifecycle::Closed) {
            Lifecycle::Idle(rx) => rx,
            other => {
                let err = if matches!(other, Lifecycle::Running(_)) {
                    ClientError::AlreadyConnected
                } else {
                    ClientError::Closed
                };
                *state = other;
                return Err(err);
            }
        };

        self.events.emit(Event::Connected {
            network: self.config.network.clone(),
        });

        let (reader, writer) = tokio::io::split(stream);
        let greeting = vec![
            command::nick(&self.config.nick),
            command::user(&self.config.nick, self.config.realname()),
        ];
        let dispatcher = Dispatcher::new(
            self.registry.clone(),
            self.outbound.clone(),
            self.events.clone(),
        );

        let mut tasks = Vec::with_capacity(3);
        tasks.push(tokio::spawn(write_loop(
            writer,
            greeting,
            outbound_rx,
            self.events.clone(),
        )));
        let lines = match self.config.dispatch {
            DispatchMode::Concurrent => LineSink::Spawn(dispatcher),
            DispatchMode::Ordered => {
                let (tx, rx) = mpsc::channel(self.config.dispatch_buffer.max(1));
                tasks.push(tokio::spawn(dispatch_loop(rx, dispatcher.clone())));
                LineSink::Worker {
                    tx,
                    keep_alive: dispatcher,
                }
            }
        };
        tasks.push(tokio::spawn(read_loop(
            BufReader::new(reader),
            lines,
            self.events.clone(),
        )));
        *state = Lifecycle::Running(tasks);

        tracing::info!(
            network = %self.config.network,
            nick = %self.config.nick,
            dispatch = ?self.config.dispatch,
            "Connected"
        );
        Ok(())
    }

    /// Join a channel, returning its handle.
    ///
    /// Joining the same name again (in any case) returns a handle to the
    /// same channel, but `JOIN` is sent every time.
    pub async fn join(&self, name: &str) -> Result<Channel, ClientError> {
        // Registered under the lifecycle lock so `close` can't miss it.
        let channel = {
            let state = self.state.lock();
            if matches!(*state, Lifecycle::Closed) {
                return Err(ClientError::Closed);
            }
            self.registry.join(name)
        };
        self.outbound.join(channel.name()).await?;
        Ok(channel)
    }

    /// Close the transport, the outbound queue and every channel.
    ///
    /// Dispatch units already in flight may still finish after this returns.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), Lifecycle::Closed);
        match previous {
            Lifecycle::Closed => return,
            Lifecycle::Running(tasks) => {
                for task in tasks {
                    task.abort();
                }
            }
            Lifecycle::Idle(_) => {}
        }
        self.registry.close();
        tracing::info!(network = %self.config.network, "Client closed");
        self.events.emit(Event::Disconnected {
            reason: "closed by client".to_string(),
        });
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), Lifecycle::Closed)
    }

    /// Subscribe to the diagnostics stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Handle for sending raw lines and commands.
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    /// Already joined channel, by case-insensitive name.
    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.registry.lookup(name)
    }

    /// Names of all joined channels, normalized and sorted.
    pub fn channels(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn config(&self) -> &ClientCfg {
        &self.config
    }

    fn ensure_idle(&self) -> Result<(), ClientError> {
        match *self.state.lock() {
            Lifecycle::Idle(_) => Ok(()),
            Lifecycle::Running(_) => Err(ClientError::AlreadyConnected),
            Lifecycle::Closed => Err(ClientError::Closed),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// Where the read pump sends each line.
enum LineSink {
    /// One task per line.
    Spawn(Dispatcher),
    /// A single dispatch worker. `PING` is answered on the read pump so a
    /// channel nobody reads can't hold up the `PONG`.
    Worker {
        tx: mpsc::Sender<String>,
        keep_alive: Dispatcher,
    },
}

impl LineSink {
    async fn submit(&self, line: String) -> bool {
        match self {
            LineSink::Spawn(dispatcher) => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.handle_line(line).await });
                true
            }
            LineSink::Worker { tx, keep_alive } => {
                if let Ok(msg) = Message::parse(&line)
                    && Route::of(&msg) == Route::KeepAlive
                {
                    keep_alive.dispatch(msg).await;
                    return true;
                }
                tx.send(line).await.is_ok()
            }
        }
    }
}

async fn read_loop<R>(mut reader: R, lines: LineSink, events: EventSink)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let reason = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break "EOF".to_string(),
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Error reading from connection: {e}");
                break format!("read failed: {e}");
            }
        }

        // Lossy so that one stray byte doesn't end the session.
        let line = String::from_utf8_lossy(&buf).into_owned();
        tracing::trace!(line = %line.trim_end(), "<-");
        events.emit(Event::RawLine(line.trim_end().to_string()));

        if !lines.submit(line).await {
            break "dispatch worker stopped".to_string();
        }
    };

    tracing::info!(%reason, "Read pump stopped");
    events.emit(Event::Disconnected { reason });
}

async fn dispatch_loop(mut rx: mpsc::Receiver<String>, dispatcher: Dispatcher) {
    while let Some(line) = rx.recv().await {
        dispatcher.handle_line(line).await;
    }
}

async fn write_loop<W>(
    mut writer: W,
    greeting: Vec<String>,
    mut rx: mpsc::Receiver<String>,
    events: EventSink,
) where
    W: AsyncWrite + Unpin,
{
    let result: io::Result<()> = async {
        for line in &greeting {
            write_line(&mut writer, line).await?;
        }
        while let Some(line) = rx.recv().await {
            write_line(&mut writer, &line).await?;
        }
        Ok::<(), io::Error>(())
    }
    .await;

    match result {
        Ok(()) => tracing::debug!("Outbound queue closed"),
        Err(e) => {
            tracing::error!("Error writing to connection: {e}");
            events.emit(Event::Disconnected {
                reason: format!("write failed: {e}"),
            });
        }
    }
}

/// Write one queued line unchanged, terminated with CRLF.
///
/// CRLF is the line ending IRC servers expect. The ones that also accept a
/// bare LF take CRLF too.
async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    tracing::trace!(%line, "->");
    writer.write_all(format!("{line}\r\n").as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_before_connect_is_queued() {
        let client = Client::new(ClientCfg::new("127.0.0.1:1", "me"));
        let chan = client.join("#early").await.unwrap();
        assert_eq!(chan.name(), "#EARLY");
        assert_eq!(client.channels(), vec!["#EARLY".to_string()]);
    }

    #[tokio::test]
    async fn lifecycle_errors() {
        let client = Client::new(ClientCfg::default());
        let (ours, _theirs) = tokio::io::duplex(1024);
        client.connect_with_stream(ours).unwrap();

        let (again, _) = tokio::io::duplex(1024);
        assert!(matches!(
            client.connect_with_stream(again),
            Err(ClientError::AlreadyConnected)
        ));

        client.close();
        assert!(client.is_closed());
        assert!(matches!(client.join("#x").await, Err(ClientError::Closed)));
        assert!(matches!(client.connect().await, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn join_after_close_registers_nothing() {
        let client = Client::new(ClientCfg::default());
        client.close();
        assert!(matches!(client.join("#late").await, Err(ClientError::Closed)));
        assert!(client.channels().is_empty());
        assert!(client.channel("#late").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn joins_racing_close_leave_no_open_channel() {
        let client = Arc::new(Client::new(ClientCfg::default()));
        let joins: Vec<_> = (0..64)
            .map(|i| {
                let client = client.clone();
                tokio::spawn(async move { client.join(&format!("#c{i}")).await })
            })
            .collect();
        tokio::task::yield_now().await;
        client.close();

        for join in joins {
            // Outbound is gone after close, so a registered join may still
            // report Closed. Any handle that did come back must be closed.
            if let Ok(channel) = join.await.unwrap() {
                assert!(!channel.set_topic("late".into()));
            }
        }
        assert!(client.channels().is_empty());
    }
}

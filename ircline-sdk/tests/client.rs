//! End-to-end tests for the client pipeline.
//!
//! The server side is played by the test over a `tokio::io::duplex` pipe
//! (or a local TCP listener for the connect tests): it reads what the client
//! writes and feeds it raw protocol lines.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

use ircline_sdk::{Client, ClientCfg, ClientError, DispatchMode, Event};

const TIMEOUT: Duration = Duration::from_secs(5);

// ── Helpers ──────────────────────────────────────────────────────

/// Server end of a piped connection.
struct FakeServer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    async fn next_line(&mut self) -> String {
        timeout(TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for client line")
            .expect("read failed")
            .expect("client closed the connection")
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Consume NICK + USER.
    async fn expect_greeting(&mut self, nick: &str) {
        assert_eq!(self.next_line().await, format!("NICK {nick}"));
        assert_eq!(self.next_line().await, format!("USER {nick} 0 * :{nick}"));
    }
}

fn connect_piped(cfg: ClientCfg) -> (Client, FakeServer, broadcast::Receiver<Event>) {
    let client = Client::new(cfg);
    let events = client.subscribe();
    let (ours, theirs) = tokio::io::duplex(64 * 1024);
    client.connect_with_stream(ours).unwrap();
    let (reader, writer) = tokio::io::split(theirs);
    let server = FakeServer {
        lines: BufReader::new(reader).lines(),
        writer,
    };
    (client, server, events)
}

/// Wait for a specific event, ignoring others.
async fn wait_for<F: Fn(&Event) -> bool>(
    rx: &mut broadcast::Receiver<Event>,
    predicate: F,
    desc: &str,
) -> Event {
    let result = timeout(TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(evt) if predicate(&evt) => return evt,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("Event stream closed while waiting for: {desc}")
                }
            }
        }
    })
    .await;

    result.unwrap_or_else(|_| panic!("Timeout waiting for: {desc}"))
}

// ── Tests ────────────────────────────────────────────────────────

#[tokio::test]
async fn identity_is_sent_before_queued_commands() {
    let client = Client::new(ClientCfg::new("unused:6667", "me"));
    // Queued before the transport exists.
    let _chan = client.join("#early").await.unwrap();

    let (ours, theirs) = tokio::io::duplex(4096);
    client.connect_with_stream(ours).unwrap();
    let (reader, writer) = tokio::io::split(theirs);
    let mut server = FakeServer {
        lines: BufReader::new(reader).lines(),
        writer,
    };

    server.expect_greeting("me").await;
    assert_eq!(server.next_line().await, "JOIN #EARLY");
}

#[tokio::test]
async fn join_twice_shares_channel_but_sends_join_twice() {
    let (client, mut server, _events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    server.expect_greeting("me").await;

    let a = client.join("#foo").await.unwrap();
    let b = client.join("#Foo").await.unwrap();

    assert!(a.same_channel(&b));
    assert_eq!(client.channels(), vec!["#FOO".to_string()]);
    assert_eq!(server.next_line().await, "JOIN #FOO");
    assert_eq!(server.next_line().await, "JOIN #FOO");
}

#[tokio::test]
async fn topic_reply_reaches_channel() {
    let (client, mut server, _events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    let chan = client.join("#FOO").await.unwrap();
    let mut topic = chan.subscribe_topic();

    server.send(":server 332 me #foo :Welcome to foo\r\n").await;

    timeout(TIMEOUT, topic.changed()).await.unwrap().unwrap();
    assert_eq!(topic.borrow().as_deref(), Some("Welcome to foo"));
    assert_eq!(chan.topic().as_deref(), Some("Welcome to foo"));
}

#[tokio::test]
async fn channel_text_reaches_channel() {
    let (client, mut server, _events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    let chan = client.join("#rust").await.unwrap();

    server.send(":alice!a@host PRIVMSG #RUST :borrowck says hi\r\n").await;

    let text = timeout(TIMEOUT, chan.recv_text()).await.unwrap();
    assert_eq!(text.as_deref(), Some("borrowck says hi"));
}

#[tokio::test]
async fn ping_is_answered_with_one_pong() {
    let (_client, mut server, _events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    server.expect_greeting("me").await;

    server.send("PING :abc123\n").await;
    assert_eq!(server.next_line().await, "PONG abc123");

    // Nothing else was queued behind it.
    assert!(
        timeout(Duration::from_millis(100), server.lines.next_line())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn text_for_unknown_channel_is_a_logged_miss() {
    let (client, mut server, mut events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    let joined = client.join("#joined").await.unwrap();

    server.send(":bob PRIVMSG #other :not for you\n").await;

    let miss = wait_for(&mut events, |e| matches!(e, Event::RoutingMiss { .. }), "RoutingMiss").await;
    assert_eq!(
        miss,
        Event::RoutingMiss {
            command: "PRIVMSG".to_string(),
            channel: "#OTHER".to_string(),
        }
    );
    assert!(
        timeout(Duration::from_millis(100), joined.recv_text())
            .await
            .is_err()
    );
    assert_eq!(client.channels(), vec!["#JOINED".to_string()]);
}

#[tokio::test]
async fn topic_for_unknown_channel_is_a_logged_miss() {
    let (client, mut server, mut events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    let joined = client.join("#joined").await.unwrap();

    server.send(":server 332 me #nope :Not ours\r\n").await;

    let miss = wait_for(&mut events, |e| matches!(e, Event::RoutingMiss { .. }), "RoutingMiss").await;
    assert_eq!(
        miss,
        Event::RoutingMiss {
            command: "332".to_string(),
            channel: "#NOPE".to_string(),
        }
    );
    assert_eq!(joined.topic(), None);
    assert_eq!(client.channels(), vec!["#JOINED".to_string()]);
    assert!(client.channel("#nope").is_none());
}

#[tokio::test]
async fn malformed_line_does_not_stop_the_pipeline() {
    let (client, mut server, mut events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    let chan = client.join("#a").await.unwrap();

    server.send(":onlyprefix\n").await;
    wait_for(&mut events, |e| matches!(e, Event::ParseFailed { .. }), "ParseFailed").await;

    server.send(":n PRIVMSG #a :still alive\n").await;
    let text = timeout(TIMEOUT, chan.recv_text()).await.unwrap();
    assert_eq!(text.as_deref(), Some("still alive"));
}

#[tokio::test]
async fn outbound_is_fifo_under_inbound_load() {
    let (client, mut server, _events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    server.expect_greeting("me").await;
    let _chan = client.join("#busy").await.unwrap();
    assert_eq!(server.next_line().await, "JOIN #BUSY");

    for i in 0..20 {
        server.send(&format!(":n PRIVMSG #busy :noise {i}\n")).await;
    }
    let out = client.outbound();
    out.send("PRIVMSG #busy :one").await.unwrap();
    out.send("PRIVMSG #busy :two").await.unwrap();
    out.send("PRIVMSG #busy :three").await.unwrap();

    assert_eq!(server.next_line().await, "PRIVMSG #busy :one");
    assert_eq!(server.next_line().await, "PRIVMSG #busy :two");
    assert_eq!(server.next_line().await, "PRIVMSG #busy :three");
}

#[tokio::test]
async fn ordered_mode_keeps_arrival_order_within_a_channel() {
    let cfg = ClientCfg::new("unused:6667", "me").with_dispatch(DispatchMode::Ordered);
    let (client, mut server, _events) = connect_piped(cfg);
    let chan = client.join("#seq").await.unwrap();

    for i in 0..50 {
        server.send(&format!(":n PRIVMSG #seq :{i}\n")).await;
    }
    for i in 0..50 {
        let text = timeout(TIMEOUT, chan.recv_text()).await.unwrap();
        assert_eq!(text, Some(i.to_string()));
    }
}

#[tokio::test]
async fn ordered_mode_answers_ping_while_a_channel_is_backed_up() {
    let cfg = ClientCfg {
        text_buffer: 4,
        ..ClientCfg::new("unused:6667", "me").with_dispatch(DispatchMode::Ordered)
    };
    let (client, mut server, _events) = connect_piped(cfg);
    server.expect_greeting("me").await;
    // Joined but never read.
    let idle = client.join("#idle").await.unwrap();
    assert_eq!(server.next_line().await, "JOIN #IDLE");

    for i in 0..10 {
        server.send(&format!(":n PRIVMSG #idle :{i}\n")).await;
    }
    server.send("PING :alive\n").await;
    assert_eq!(server.next_line().await, "PONG alive");

    // The backlog is still delivered in order once someone reads.
    for i in 0..10 {
        let text = timeout(TIMEOUT, idle.recv_text()).await.unwrap();
        assert_eq!(text, Some(i.to_string()));
    }
}

#[tokio::test]
async fn server_eof_is_reported() {
    let (_client, server, mut events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    drop(server);

    // The write pump may also notice the broken pipe; only the read side
    // reports EOF.
    wait_for(
        &mut events,
        |e| matches!(e, Event::Disconnected { reason } if reason == "EOF"),
        "Disconnected(EOF)",
    )
    .await;
}

#[tokio::test]
async fn close_wakes_blocked_consumers() {
    let (client, _server, _events) = connect_piped(ClientCfg::new("unused:6667", "me"));
    let chan = client.join("#quiet").await.unwrap();

    let consumer = tokio::spawn({
        let chan = chan.clone();
        async move { chan.recv_text().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.close();

    let got = timeout(TIMEOUT, consumer).await.unwrap().unwrap();
    assert_eq!(got, None);
    assert!(matches!(chan.say("anyone?").await, Err(ClientError::Closed)));
    assert!(matches!(client.join("#quiet").await, Err(ClientError::Closed)));
}

#[tokio::test]
async fn connects_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let client = ircline_sdk::connect(ClientCfg::new(addr, "tcpme")).await.unwrap();
    let (sock, _) = timeout(TIMEOUT, listener.accept()).await.unwrap().unwrap();
    let mut lines = BufReader::new(sock).lines();

    let first = timeout(TIMEOUT, lines.next_line()).await.unwrap().unwrap();
    assert_eq!(first.as_deref(), Some("NICK tcpme"));
    client.close();
}

#[tokio::test]
async fn connect_failure_is_surfaced() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    match ircline_sdk::connect(ClientCfg::new(addr.clone(), "me")).await {
        Err(ClientError::Connect { addr: failed, .. }) => assert_eq!(failed, addr),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("connect to a closed port succeeded"),
    }
}

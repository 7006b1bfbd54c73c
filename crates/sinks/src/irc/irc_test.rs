//! Tests for the IRC sink against a scripted in-process server

use std::sync::Arc;
use std::time::{Duration, Instant};

use rcgen::{CertifiedKey, generate_simple_self_signed};
use rustls::RootCertStore;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use sysrelay_protocol::Event;
use sysrelay_routing::Destination;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::*;

const WAIT: Duration = Duration::from_secs(2);

/// One accepted client connection, seen from the server side
struct Client {
    reader: BufReader<Box<dyn AsyncRead + Unpin + Send>>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
}

impl Client {
    async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = timeout(WAIT, listener.accept())
            .await
            .expect("sink never connected")
            .unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(Box::new(read_half)),
            writer: Box::new(writer),
        }
    }

    async fn accept_tls(listener: &TcpListener, acceptor: &TlsAcceptor) -> Self {
        let (stream, _) = timeout(WAIT, listener.accept())
            .await
            .expect("sink never connected")
            .unwrap();
        let stream = timeout(WAIT, acceptor.accept(stream))
            .await
            .expect("TLS handshake timed out")
            .unwrap();
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(Box::new(read_half)),
            writer: Box::new(writer),
        }
    }

    /// Next line from the sink, without CRLF
    async fn line(&mut self) -> String {
        let mut line = String::new();
        let read = timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        assert!(read > 0, "connection closed");
        line.trim_end_matches(['\r', '\n']).to_owned()
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Consume NICK and USER, then welcome `nick`
    async fn register(&mut self, nick: &str) {
        assert_eq!(self.line().await, format!("NICK {nick}"));
        assert!(self.line().await.starts_with(&format!("USER {nick} 0 * :")));
        self.send(&format!(":irc.test 001 {nick} :Welcome")).await;
    }
}

struct Harness {
    listener: TcpListener,
    sink: IrcSink,
    events: mpsc::Receiver<Event>,
    shutdown: CancellationToken,
}

impl Harness {
    async fn next_ready(&mut self) -> String {
        match timeout(WAIT, self.events.recv()).await.unwrap() {
            Some(Event::DestinationReady(name)) => name,
            other => panic!("expected destination ready, got {other:?}"),
        }
    }
}

/// Server acceptor and a client config trusting only its self-signed cert
fn tls_pair() -> (TlsAcceptor, Arc<rustls::ClientConfig>) {
    let CertifiedKey { cert, key_pair } =
        generate_simple_self_signed(vec!["127.0.0.1".to_owned()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let server = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(cert.der().clone()).unwrap();
    let client = TlsClientConfigBuilder::new()
        .with_root_cert_store(roots)
        .build()
        .unwrap();

    (TlsAcceptor::from(Arc::new(server)), client)
}

fn never() -> ShutdownPredicate {
    Arc::new(|_: &str, _: &str| false)
}

fn test_config(address: String) -> IrcSinkConfig {
    IrcSinkConfig {
        channels: vec![
            Destination::new("#ops"),
            Destination::with_secret("#net", "key"),
        ],
        reconnect_interval: Duration::from_millis(50),
        connect_timeout: Duration::from_secs(1),
        quit_timeout: Duration::from_secs(1),
        ..IrcSinkConfig::new(address, "bot")
    }
}

async fn harness_with(
    configure: impl FnOnce(&mut IrcSinkConfig),
    predicate: ShutdownPredicate,
) -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = test_config(listener.local_addr().unwrap().to_string());
    configure(&mut config);

    let sink = IrcSink::new(config, predicate);
    let (tx, events) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    sink.start(SinkEvents::new(tx, shutdown.clone()))
        .await
        .unwrap();

    Harness {
        listener,
        sink,
        events,
        shutdown,
    }
}

async fn harness() -> Harness {
    harness_with(|_| {}, never()).await
}

/// Register and join both channels
async fn joined(h: &mut Harness) -> Client {
    let mut client = Client::accept(&h.listener).await;
    client.register("bot").await;
    assert_eq!(client.line().await, "JOIN #ops");
    assert_eq!(client.line().await, "JOIN #net key");
    client.send(":bot!bot@host JOIN #ops").await;
    client.send(":bot!bot@host JOIN :#net").await;
    assert_eq!(h.next_ready().await, "#ops");
    assert_eq!(h.next_ready().await, "#net");
    client
}

// =============================================================================
// Registration and joining
// =============================================================================

#[tokio::test]
async fn test_register_join_and_report_ready() {
    let mut h = harness().await;
    let _client = joined(&mut h).await;
    assert_eq!(h.sink.metrics().snapshot().connections, 1);
}

#[tokio::test]
async fn test_password_and_commands() {
    let h = harness_with(
        |config| {
            config.password = Some("secret".into());
            config.realname = "Monsieur Syslog".into();
            config.commands = vec!["MODE bot +i".into()];
        },
        never(),
    )
    .await;

    let mut client = Client::accept(&h.listener).await;
    assert_eq!(client.line().await, "PASS secret");
    assert_eq!(client.line().await, "NICK bot");
    assert_eq!(client.line().await, "USER bot 0 * :Monsieur Syslog");
    client.send(":irc.test 001 bot :Welcome").await;
    assert_eq!(client.line().await, "MODE bot +i");
    assert_eq!(client.line().await, "JOIN #ops");

    h.sink.disconnect("bye").await;
}

#[tokio::test]
async fn test_nickname_in_use_appends_underscore() {
    let mut h = harness().await;
    let mut client = Client::accept(&h.listener).await;

    assert_eq!(client.line().await, "NICK bot");
    client.line().await;
    client.send(":irc.test 433 * bot :Nickname is already in use").await;
    assert_eq!(client.line().await, "NICK bot_");

    client.send(":irc.test 001 bot_ :Welcome").await;
    assert_eq!(client.line().await, "JOIN #ops");
    client.line().await;
    client.send(":bot_!bot@host JOIN #ops").await;
    assert_eq!(h.next_ready().await, "#ops");
}

#[tokio::test]
async fn test_bad_key_channel_never_ready() {
    let mut h = harness().await;
    let mut client = Client::accept(&h.listener).await;
    client.register("bot").await;
    client.line().await;
    client.line().await;

    client.send(":irc.test 475 bot #net :Cannot join channel (+k)").await;
    client.send(":bot!bot@host JOIN #ops").await;
    assert_eq!(h.next_ready().await, "#ops");
    assert!(h.events.try_recv().is_err());
}

#[tokio::test]
async fn test_join_by_other_user_ignored() {
    let mut h = harness().await;
    let mut client = Client::accept(&h.listener).await;
    client.register("bot").await;
    client.line().await;
    client.line().await;

    client.send(":alice!a@host JOIN #ops").await;
    client.send(":BOT!bot@host JOIN #OPS").await;
    // Case-insensitive match reports the configured spelling
    assert_eq!(h.next_ready().await, "#ops");
    assert!(h.events.try_recv().is_err());
}

#[tokio::test]
async fn test_overlong_server_line_skipped() {
    let h = harness().await;
    let mut client = Client::accept(&h.listener).await;
    client.line().await;
    client.line().await;

    let flood = format!(":irc.test NOTICE bot :{}", "x".repeat(4 * MAX_INBOUND_LINE_LENGTH));
    client.send(&flood).await;
    client.send("PING :after").await;
    assert_eq!(client.line().await, "PONG :after");
    assert_eq!(h.sink.metrics().snapshot().connections, 1);
}

#[tokio::test]
async fn test_ping_answered() {
    let h = harness().await;
    let mut client = Client::accept(&h.listener).await;
    client.line().await;
    client.line().await;

    client.send("PING :irc.test").await;
    assert_eq!(client.line().await, "PONG :irc.test");
}

// =============================================================================
// Sending
// =============================================================================

#[tokio::test]
async fn test_send_delivers_privmsg() {
    let mut h = harness().await;
    let mut client = joined(&mut h).await;

    h.sink.send("#ops", "10.0.0.5:514 [critical]: disk\nfull");
    assert_eq!(
        client.line().await,
        "PRIVMSG #ops :10.0.0.5:514 [critical]: disk full"
    );

    timeout(WAIT, async {
        while h.sink.metrics().snapshot().messages_sent < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_messages_wait_for_registration() {
    let h = harness().await;
    let mut client = Client::accept(&h.listener).await;
    client.line().await;
    client.line().await;

    h.sink.send("#ops", "early");
    client.send(":irc.test 001 bot :Welcome").await;

    assert_eq!(client.line().await, "JOIN #ops");
    assert_eq!(client.line().await, "JOIN #net key");
    assert_eq!(client.line().await, "PRIVMSG #ops :early");
}

#[tokio::test]
async fn test_rate_limit_spaces_messages() {
    let mut h = harness_with(
        |config| config.rate_limit = Some(10.0),
        never(),
    )
    .await;
    let mut client = joined(&mut h).await;

    for i in 0..3 {
        h.sink.send("#ops", &format!("message {i}"));
    }

    assert_eq!(client.line().await, "PRIVMSG #ops :message 0");
    let start = Instant::now();
    assert_eq!(client.line().await, "PRIVMSG #ops :message 1");
    assert_eq!(client.line().await, "PRIVMSG #ops :message 2");
    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_full_queue_drops() {
    let config = IrcSinkConfig {
        queue_size: 1,
        ..IrcSinkConfig::new("127.0.0.1:1", "bot")
    };
    let sink = IrcSink::new(config, never());

    sink.send("#ops", "first");
    sink.send("#ops", "second");
    assert_eq!(sink.metrics().snapshot().messages_dropped, 1);
}

// =============================================================================
// Private messages
// =============================================================================

#[tokio::test]
async fn test_ctcp_version_reply() {
    let mut h = harness().await;
    let mut client = joined(&mut h).await;

    client.send(":alice!a@host PRIVMSG bot :\x01VERSION\x01").await;
    let reply = client.line().await;
    assert!(reply.starts_with("NOTICE alice :\x01VERSION sysrelay "));
    assert!(reply.ends_with('\x01'));
}

#[tokio::test]
async fn test_shutdown_command_in_private() {
    let mut h = harness_with(
        |_| {},
        Arc::new(|mask: &str, text: &str| mask.starts_with("admin!") && text == "shutdown!"),
    )
    .await;
    let mut client = joined(&mut h).await;

    // Not private, not from admin: ignored
    client.send(":admin!a@host PRIVMSG #ops :shutdown!").await;
    client.send(":alice!a@host PRIVMSG bot :shutdown!").await;
    client.send("PING :sync").await;
    assert_eq!(client.line().await, "PONG :sync");
    assert!(!h.shutdown.is_cancelled());

    client.send(":admin!a@host PRIVMSG bot :shutdown!").await;
    timeout(WAIT, h.shutdown.cancelled())
        .await
        .expect("shutdown should be requested");
}

// =============================================================================
// Connection lifecycle
// =============================================================================

#[tokio::test]
async fn test_disconnect_sends_quit() {
    let mut h = harness().await;
    let mut client = joined(&mut h).await;

    timeout(WAIT, h.sink.disconnect("Shutting down."))
        .await
        .expect("disconnect should finish");
    assert_eq!(client.line().await, "QUIT :Shutting down.");

    // Writer was shut down after QUIT
    let mut rest = String::new();
    assert_eq!(client.reader.read_line(&mut rest).await.unwrap(), 0);
}

#[tokio::test]
async fn test_reconnect_rejoins_and_reports_ready_again() {
    let mut h = harness().await;
    let client = joined(&mut h).await;
    drop(client);

    let _client = joined(&mut h).await;
    assert_eq!(h.sink.metrics().snapshot().connections, 2);
}

#[tokio::test]
async fn test_tls_session() {
    let (acceptor, client_tls) = tls_pair();
    let mut h = harness_with(|config| config.tls = Some(client_tls), never()).await;

    let mut client = Client::accept_tls(&h.listener, &acceptor).await;
    client.register("bot").await;
    assert_eq!(client.line().await, "JOIN #ops");
    assert_eq!(client.line().await, "JOIN #net key");
    client.send(":bot!bot@host JOIN #ops").await;
    assert_eq!(h.next_ready().await, "#ops");

    h.sink.send("#ops", "over tls");
    assert_eq!(client.line().await, "PRIVMSG #ops :over tls");

    timeout(WAIT, h.sink.disconnect("bye")).await.unwrap();
    assert_eq!(client.line().await, "QUIT :bye");
}

#[tokio::test]
async fn test_tls_untrusted_certificate_fails() {
    let (acceptor, _) = tls_pair();
    let (_, other_roots) = tls_pair();
    let h = harness_with(|config| config.tls = Some(other_roots), never()).await;

    // The sink rejects the server certificate, so the handshake fails
    let (stream, _) = timeout(WAIT, h.listener.accept()).await.unwrap().unwrap();
    assert!(acceptor.accept(stream).await.is_err());

    timeout(WAIT, async {
        while h.sink.metrics().snapshot().errors < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("failed handshake should count as an error");
    assert_eq!(h.sink.metrics().snapshot().connections, 0);
}

#[tokio::test]
async fn test_disconnect_while_server_unreachable() {
    let address = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let config = IrcSinkConfig {
        reconnect_interval: Duration::from_secs(60),
        ..test_config(address)
    };
    let sink = IrcSink::new(config, never());
    let (tx, _rx) = mpsc::channel(4);
    sink.start(SinkEvents::new(tx, CancellationToken::new()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    timeout(WAIT, sink.disconnect("bye"))
        .await
        .expect("disconnect should not wait for the reconnect interval");
    assert!(sink.metrics().snapshot().errors >= 1);
}

#[tokio::test]
async fn test_start_twice_fails() {
    let h = harness().await;
    let (tx, _rx) = mpsc::channel(1);
    let err = h
        .sink
        .start(SinkEvents::new(tx, CancellationToken::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::AlreadyStarted(_)));
}

#[tokio::test]
async fn test_disconnect_before_start() {
    let sink = IrcSink::new(IrcSinkConfig::new("127.0.0.1:1", "bot"), never());
    timeout(WAIT, sink.disconnect("bye")).await.unwrap();
}

#[test]
fn test_config_debug_redacts_password() {
    let config = IrcSinkConfig {
        password: Some("hunter2".into()),
        ..IrcSinkConfig::new("irc.example.test:6667", "bot")
    };
    let debug = format!("{config:?}");
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("<redacted>"));
    assert!(debug.contains("tls: false"));
}

#[test]
fn test_send_interval() {
    let mut config = IrcSinkConfig::new("irc.example.test:6667", "bot");
    assert_eq!(config.send_interval(), Duration::ZERO);
    config.rate_limit = Some(0.5);
    assert_eq!(config.send_interval(), Duration::from_secs(2));
}

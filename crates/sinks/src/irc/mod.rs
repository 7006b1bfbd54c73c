//! IRC Sink - relays messages into IRC channels
//!
//! A single connection to one IRC server, plain TCP or TLS when
//! [`IrcSinkConfig::tls`] is set. Each configured channel
//! is a destination; it is reported ready once the server confirms our
//! `JOIN`. Lost connections are re-established after `reconnect_interval`
//! and every channel is joined (and reported ready) again.
//!
//! # Protocol
//!
//! ```text
//! -> PASS <password>                  (optional)
//! -> NICK <nickname>
//! -> USER <nickname> 0 * :<realname>
//! <- :server 001 <nickname> :Welcome
//! -> <configured commands>
//! -> JOIN <channel> [key]
//! <- :<nickname>!user@host JOIN <channel>   => destination ready
//! -> PRIVMSG <channel> :<text>
//! -> QUIT :<reason>
//! ```
//!
//! # Example
//!
//! ```ignore
//! let config = IrcSinkConfig::new("irc.example.net:6667", "Syslogger");
//! let sink = IrcSink::new(config, Arc::new(|_, _| false));
//! sink.start(SinkEvents::new(events_tx, shutdown.clone())).await?;
//! ```

pub mod message;
mod tls;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use socket2::{SockRef, TcpKeepalive};
use sysrelay_routing::Destination;
use rustls::ClientConfig;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::sync::CancellationToken;

use crate::common::{Sink, SinkError, SinkEvents};
use message::{LineReader, MAX_INBOUND_LINE_LENGTH, Message, privmsg_line};
pub use tls::TlsClientConfigBuilder;

/// Keepalive idle time for the server connection
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Decides whether a private message is a shutdown request
///
/// Called with the sender's `nick!user@host` and the message text.
pub type ShutdownPredicate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Configuration for the IRC sink
#[derive(Clone)]
pub struct IrcSinkConfig {
    /// Server address (host:port)
    pub address: String,

    /// Server password sent with `PASS`
    pub password: Option<String>,

    /// TLS settings; plain TCP when `None`
    pub tls: Option<Arc<ClientConfig>>,

    /// Initial nickname; `_` is appended while it is taken
    pub nickname: String,

    pub realname: String,

    /// Raw lines sent after registration, before joining
    pub commands: Vec<String>,

    /// Channels to join, with optional keys
    pub channels: Vec<Destination>,

    /// Maximum messages per second, unlimited when `None`
    pub rate_limit: Option<f64>,

    pub connect_timeout: Duration,

    pub reconnect_interval: Duration,

    /// How long `disconnect` waits for the connection to close
    pub quit_timeout: Duration,

    /// Outbound messages buffered while the server is slow or away
    pub queue_size: usize,
}

impl IrcSinkConfig {
    pub fn new(address: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: None,
            tls: None,
            nickname: nickname.into(),
            realname: "syslog".into(),
            commands: Vec::new(),
            channels: Vec::new(),
            rate_limit: None,
            connect_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(10),
            quit_timeout: Duration::from_secs(5),
            queue_size: 1000,
        }
    }

    /// Minimum spacing between two messages
    fn send_interval(&self) -> Duration {
        match self.rate_limit {
            Some(rate) if rate > 0.0 => Duration::from_secs_f64(1.0 / rate),
            _ => Duration::ZERO,
        }
    }
}

impl std::fmt::Debug for IrcSinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrcSinkConfig")
            .field("address", &self.address)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls.is_some())
            .field("nickname", &self.nickname)
            .field("realname", &self.realname)
            .field("commands", &self.commands)
            .field("channels", &self.channels)
            .field("rate_limit", &self.rate_limit)
            .field("connect_timeout", &self.connect_timeout)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("quit_timeout", &self.quit_timeout)
            .field("queue_size", &self.queue_size)
            .finish()
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Metrics for the IRC sink
#[derive(Debug, Default)]
pub struct IrcSinkMetrics {
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
    connections: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`IrcSinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrcSinkMetricsSnapshot {
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub connections: u64,
    pub errors: u64,
}

impl IrcSinkMetrics {
    #[inline]
    fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IrcSinkMetricsSnapshot {
        IrcSinkMetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

/// A message waiting to be sent
#[derive(Debug)]
struct Outgoing {
    target: String,
    text: String,
}

/// IRC sink
///
/// `send` only queues; the connection task writes to the server.
pub struct IrcSink {
    config: IrcSinkConfig,
    is_shutdown_request: ShutdownPredicate,
    outgoing: mpsc::Sender<Outgoing>,
    pending_receiver: Mutex<Option<mpsc::Receiver<Outgoing>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    quit: CancellationToken,
    quit_reason: Arc<Mutex<Option<String>>>,
    metrics: Arc<IrcSinkMetrics>,
}

impl IrcSink {
    pub fn new(config: IrcSinkConfig, is_shutdown_request: ShutdownPredicate) -> Self {
        let (outgoing, receiver) = mpsc::channel(config.queue_size.max(1));
        Self {
            config,
            is_shutdown_request,
            outgoing,
            pending_receiver: Mutex::new(Some(receiver)),
            task: Mutex::new(None),
            quit: CancellationToken::new(),
            quit_reason: Arc::new(Mutex::new(None)),
            metrics: Arc::new(IrcSinkMetrics::default()),
        }
    }

    pub fn metrics(&self) -> &Arc<IrcSinkMetrics> {
        &self.metrics
    }
}

#[async_trait]
impl Sink for IrcSink {
    fn name(&self) -> &str {
        "irc"
    }

    async fn start(&self, events: SinkEvents) -> Result<(), SinkError> {
        let Some(outgoing) = self.pending_receiver.lock().take() else {
            return Err(SinkError::AlreadyStarted(self.name().to_owned()));
        };

        tracing::info!(
            server = %self.config.address,
            tls = self.config.tls.is_some(),
            nickname = %self.config.nickname,
            channels = self.config.channels.len(),
            "IRC sink starting"
        );

        let connection = Connection {
            config: self.config.clone(),
            is_shutdown_request: Arc::clone(&self.is_shutdown_request),
            events,
            outgoing,
            quit: self.quit.clone(),
            quit_reason: Arc::clone(&self.quit_reason),
            metrics: Arc::clone(&self.metrics),
        };
        *self.task.lock() = Some(tokio::spawn(connection.run()));
        Ok(())
    }

    fn send(&self, destination: &str, text: &str) {
        let message = Outgoing {
            target: destination.to_owned(),
            text: text.to_owned(),
        };
        match self.outgoing.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.metrics.record_dropped();
                tracing::debug!(destination = %destination, "IRC send queue full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.record_dropped();
            }
        }
    }

    async fn disconnect(&self, reason: &str) {
        let Some(mut handle) = self.task.lock().take() else {
            return;
        };

        *self.quit_reason.lock() = Some(reason.to_owned());
        self.quit.cancel();

        match timeout(self.config.quit_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "IRC connection task failed");
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.config.quit_timeout,
                    "IRC connection did not close in time, aborting"
                );
                handle.abort();
            }
        }
    }
}

// =============================================================================
// Connection Task
// =============================================================================

/// How a session ended
enum SessionEnd {
    /// We quit; do not reconnect
    Quit,
    /// Server closed the connection
    Closed,
}

/// An established server connection
enum IrcStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// Per-connection protocol state
struct Session<W> {
    writer: W,
    nickname: String,
    registered: bool,
}

impl<W: AsyncWrite + Unpin> Session<W> {
    async fn send(&mut self, line: &str) -> io::Result<()> {
        tracing::trace!(line = %line, "IRC >>");
        self.write_line(line).await
    }

    /// Write without logging the line
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 2);
        buf.push_str(line);
        buf.push_str("\r\n");
        self.writer.write_all(buf.as_bytes()).await
    }

    async fn quit(&mut self, reason: &str) -> io::Result<()> {
        self.send(&format!("QUIT :{reason}")).await?;
        self.writer.shutdown().await
    }

    fn is_self(&self, message: &Message<'_>) -> bool {
        message
            .source_nick()
            .is_some_and(|nick| nick.eq_ignore_ascii_case(&self.nickname))
    }
}

struct Connection {
    config: IrcSinkConfig,
    is_shutdown_request: ShutdownPredicate,
    events: SinkEvents,
    outgoing: mpsc::Receiver<Outgoing>,
    quit: CancellationToken,
    quit_reason: Arc<Mutex<Option<String>>>,
    metrics: Arc<IrcSinkMetrics>,
}

impl Connection {
    async fn run(mut self) {
        loop {
            let connected = tokio::select! {
                biased;
                _ = self.quit.cancelled() => break,
                result = self.connect() => result,
            };

            match connected {
                Ok(stream) => {
                    self.metrics.record_connection();
                    let ended = match stream {
                        IrcStream::Plain(stream) => self.session(stream).await,
                        IrcStream::Tls(stream) => self.session(*stream).await,
                    };
                    match ended {
                        Ok(SessionEnd::Quit) => break,
                        Ok(SessionEnd::Closed) => {
                            tracing::warn!(server = %self.config.address, "IRC server closed the connection");
                        }
                        Err(e) => {
                            self.metrics.record_error();
                            tracing::warn!(server = %self.config.address, error = %e, "IRC connection lost");
                        }
                    }
                }
                Err(e) => {
                    self.metrics.record_error();
                    tracing::warn!(error = %e, "IRC connection failed");
                }
            }

            if !self.wait_before_reconnect().await {
                break;
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            server = %self.config.address,
            messages_sent = snapshot.messages_sent,
            messages_dropped = snapshot.messages_dropped,
            connections = snapshot.connections,
            "IRC sink stopped"
        );
    }

    async fn connect(&self) -> Result<IrcStream, SinkError> {
        let stream = match timeout(
            self.config.connect_timeout,
            TcpStream::connect(&self.config.address),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(SinkError::connection_failed(&self.config.address, e)),
            Err(_) => {
                return Err(SinkError::connection_failed(
                    &self.config.address,
                    io::Error::new(io::ErrorKind::TimedOut, "connection timed out"),
                ));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }
        let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_INTERVAL);
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            tracing::debug!(error = %e, "failed to set TCP keep-alive");
        }

        let Some(tls) = &self.config.tls else {
            tracing::info!(server = %self.config.address, "connected to IRC server");
            return Ok(IrcStream::Plain(stream));
        };

        let server_name = tls::server_name(&self.config.address)?;
        let connector = TlsConnector::from(Arc::clone(tls));
        let stream = match timeout(
            self.config.connect_timeout,
            connector.connect(server_name, stream),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(SinkError::connection_failed(&self.config.address, e)),
            Err(_) => {
                return Err(SinkError::connection_failed(
                    &self.config.address,
                    io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"),
                ));
            }
        };

        tracing::info!(server = %self.config.address, "connected to IRC server over TLS");
        Ok(IrcStream::Tls(Box::new(stream)))
    }

    /// Sleep out the reconnect interval; false when we should stop instead
    ///
    /// Messages queued meanwhile are discarded, the channels are not joined.
    async fn wait_before_reconnect(&mut self) -> bool {
        tracing::debug!(interval = ?self.config.reconnect_interval, "reconnecting to IRC server later");

        let sleep = tokio::time::sleep(self.config.reconnect_interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                _ = self.quit.cancelled() => return false,
                _ = &mut sleep => return true,
                message = self.outgoing.recv() => match message {
                    Some(_) => self.metrics.record_dropped(),
                    None => return false,
                },
            }
        }
    }

    async fn session<S>(&mut self, stream: S) -> io::Result<SessionEnd>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (read_half, writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);
        let mut lines = LineReader::new(MAX_INBOUND_LINE_LENGTH);
        let mut session = Session {
            writer,
            nickname: self.config.nickname.clone(),
            registered: false,
        };

        if let Some(password) = &self.config.password {
            session.write_line(&format!("PASS {password}")).await?;
        }
        let nick = format!("NICK {}", session.nickname);
        session.send(&nick).await?;
        let user = format!("USER {} 0 * :{}", session.nickname, self.config.realname);
        session.send(&user).await?;

        let interval = self.config.send_interval();
        let mut next_send = Instant::now();
        let mut pending: Option<Outgoing> = None;

        loop {
            tokio::select! {
                biased;

                _ = self.quit.cancelled() => {
                    let reason = self.quit_reason.lock().clone().unwrap_or_default();
                    session.quit(&reason).await?;
                    return Ok(SessionEnd::Quit);
                }

                read = lines.next_line(&mut reader) => {
                    let Some(line) = read? else {
                        return Ok(SessionEnd::Closed);
                    };
                    tracing::trace!(line = %line.trim_end(), "IRC <<");
                    if let Some(message) = Message::parse(&line) {
                        self.handle_message(&mut session, &message).await?;
                    }
                }

                _ = tokio::time::sleep_until(next_send), if pending.is_some() => {
                    if let Some(message) = pending.take() {
                        session.send(&privmsg_line(&message.target, &message.text)).await?;
                        self.metrics.record_sent();
                        next_send = Instant::now() + interval;
                    }
                }

                message = self.outgoing.recv(), if session.registered && pending.is_none() => {
                    match message {
                        Some(message) => pending = Some(message),
                        None => {
                            session.quit("").await?;
                            return Ok(SessionEnd::Quit);
                        }
                    }
                }
            }
        }
    }

    async fn handle_message<W>(&self, session: &mut Session<W>, message: &Message<'_>) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match message.command {
            "PING" => {
                let pong = format!("PONG :{}", message.param(0));
                session.send(&pong).await?;
            }
            "001" => self.on_welcome(session, message).await?,
            "433" if !session.registered => {
                session.nickname.push('_');
                tracing::warn!(nickname = %session.nickname, "IRC nickname in use, retrying");
                let nick = format!("NICK {}", session.nickname);
                session.send(&nick).await?;
            }
            "NICK" if session.is_self(message) => {
                session.nickname = message.param(0).to_owned();
            }
            "JOIN" if session.is_self(message) => self.on_join(message.param(0)).await,
            "471" | "473" | "474" | "475" => {
                tracing::warn!(
                    channel = %message.param(1),
                    reason = %message.param(2),
                    "cannot join IRC channel"
                );
            }
            "PRIVMSG" => self.on_privmsg(session, message).await?,
            "ERROR" => {
                tracing::warn!(message = %message.param(0), "IRC server error");
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_welcome<W>(&self, session: &mut Session<W>, message: &Message<'_>) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let confirmed = message.param(0);
        if !confirmed.is_empty() {
            session.nickname = confirmed.to_owned();
        }
        session.registered = true;
        tracing::info!(nickname = %session.nickname, "registered with IRC server");

        for command in &self.config.commands {
            session.send(command).await?;
        }
        for channel in &self.config.channels {
            let join = match channel.secret() {
                Some(key) => format!("JOIN {} {key}", channel.name()),
                None => format!("JOIN {}", channel.name()),
            };
            session.write_line(&join).await?;
        }
        Ok(())
    }

    async fn on_join(&self, channel: &str) {
        let configured = self
            .config
            .channels
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(channel));

        match configured {
            Some(destination) => {
                tracing::info!(channel = %destination.name(), "joined IRC channel");
                self.events.destination_ready(destination.name()).await;
            }
            None => {
                tracing::debug!(channel = %channel, "joined unconfigured IRC channel");
            }
        }
    }

    async fn on_privmsg<W>(&self, session: &mut Session<W>, message: &Message<'_>) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if !message.param(0).eq_ignore_ascii_case(&session.nickname) {
            return Ok(());
        }
        let Some(sender) = message.source_nick() else {
            return Ok(());
        };
        let text = message.param(1);

        if text == "\x01VERSION\x01" {
            let reply = format!(
                "NOTICE {sender} :\x01VERSION sysrelay {}\x01",
                env!("CARGO_PKG_VERSION")
            );
            session.send(&reply).await?;
        } else if (self.is_shutdown_request)(message.prefix.unwrap_or(sender), text) {
            tracing::info!(from = %sender, "shutdown requested over IRC");
            self.events.request_shutdown();
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "irc_test.rs"]
mod irc_test;

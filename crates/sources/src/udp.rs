//! Syslog UDP listener
//!
//! One datagram is one message. Several workers share a single socket and
//! receive concurrently, so there is no ordering between datagrams.
//!
//! Delivery into the dispatcher is best effort: when its queue is full the
//! message is dropped and counted rather than stalling the socket.
//!
//! # Example
//!
//! ```ignore
//! let listener = UdpListener::bind(ListenerConfig::with_port(Port::udp(514))).await?;
//! tokio::spawn(listener.run(events_tx, cancel.clone()));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use sysrelay_protocol::{Envelope, Event, Port, decode};
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::common::{ListenerConfig, ListenerMetrics, trim_trailing_newline};
use crate::error::ListenerError;

/// A bound syslog UDP listener
pub struct UdpListener {
    config: ListenerConfig,
    socket: Arc<UdpSocket>,
    metrics: Arc<ListenerMetrics>,
}

impl UdpListener {
    /// Bind the socket
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Bind` naming the port if the address does not
    /// resolve or the socket cannot be bound.
    pub async fn bind(config: ListenerConfig) -> Result<Self, ListenerError> {
        let bind_addr = config.bind_address();
        let bind_error = |e| ListenerError::bind(config.port, &bind_addr, e);

        let addr = lookup_host(&bind_addr)
            .await
            .map_err(bind_error)?
            .next()
            .ok_or_else(|| {
                bind_error(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "address did not resolve",
                ))
            })?;

        let socket = create_socket(addr, config.socket_buffer_size).map_err(bind_error)?;

        tracing::info!(
            port = %config.port,
            address = %bind_addr,
            workers = config.udp_workers,
            "syslog UDP listener bound"
        );

        Ok(Self {
            config,
            socket: Arc::new(socket),
            metrics: Arc::new(ListenerMetrics::new()),
        })
    }

    /// Address actually bound (useful when binding port 0)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    #[inline]
    pub fn port(&self) -> Port {
        self.config.port
    }

    pub fn metrics(&self) -> &Arc<ListenerMetrics> {
        &self.metrics
    }

    /// Receive until cancelled or the dispatcher goes away
    pub async fn run(self, events: mpsc::Sender<Event>, cancel: CancellationToken) {
        let workers = self.config.udp_workers.max(1);
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let worker = UdpWorker {
                id,
                port: self.config.port,
                max_message_size: self.config.max_message_size,
                socket: Arc::clone(&self.socket),
                events: events.clone(),
                metrics: Arc::clone(&self.metrics),
                cancel: cancel.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        drop(events);

        for handle in handles {
            let _ = handle.await;
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            port = %self.config.port,
            messages_received = snapshot.messages_received,
            messages_malformed = snapshot.messages_malformed,
            messages_dropped = snapshot.messages_dropped,
            "syslog UDP listener stopped"
        );
    }
}

/// Create a UDP socket with an enlarged receive buffer
///
/// No address reuse: a port already bound by another socket must fail.
fn create_socket(addr: SocketAddr, recv_buffer_size: usize) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
        tracing::warn!(
            error = %e,
            requested_size = recv_buffer_size,
            "failed to set UDP SO_RCVBUF"
        );
    }

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

// =============================================================================
// UDP Worker
// =============================================================================

struct UdpWorker {
    id: usize,
    port: Port,
    max_message_size: usize,
    socket: Arc<UdpSocket>,
    events: mpsc::Sender<Event>,
    metrics: Arc<ListenerMetrics>,
    cancel: CancellationToken,
}

impl UdpWorker {
    async fn run(self) {
        // One extra byte so oversized datagrams are detectable
        let mut recv_buf = vec![0u8; self.max_message_size + 1];

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                recv_result = self.socket.recv_from(&mut recv_buf) => {
                    match recv_result {
                        Ok((len, peer)) => {
                            if !self.process_packet(&recv_buf[..len], peer) {
                                break;
                            }
                        }
                        Err(e) => {
                            self.metrics.error();
                            tracing::debug!(
                                worker_id = self.id,
                                port = %self.port,
                                error = %e,
                                "syslog UDP recv error"
                            );
                        }
                    }
                }
            }
        }

        tracing::debug!(worker_id = self.id, port = %self.port, "syslog UDP worker stopped");
    }

    /// Decode and forward one datagram; returns false once the dispatcher is gone
    fn process_packet(&self, data: &[u8], peer: SocketAddr) -> bool {
        self.metrics.bytes_read(data.len() as u64);

        if data.len() > self.max_message_size {
            self.metrics.message_malformed();
            tracing::debug!(
                port = %self.port,
                peer = %peer,
                size = data.len(),
                max = self.max_message_size,
                "syslog UDP packet too large, dropped"
            );
            return true;
        }

        let message = trim_trailing_newline(data);
        if message.is_empty() {
            return true;
        }

        let record = match decode(message) {
            Ok(record) => record,
            Err(e) => {
                self.metrics.message_malformed();
                tracing::debug!(port = %self.port, peer = %peer, error = %e, "undecodable syslog message dropped");
                return true;
            }
        };

        let event = Event::Received(Envelope::new(self.port, peer, record));
        match self.events.try_send(event) {
            Ok(()) => {
                self.metrics.message_received();
                true
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.message_dropped();
                tracing::debug!(port = %self.port, peer = %peer, "dispatcher queue full, syslog message dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[cfg(test)]
#[path = "udp_test.rs"]
mod udp_test;

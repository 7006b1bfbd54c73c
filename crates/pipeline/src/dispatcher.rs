//! Dispatcher - the single consumer of relay events
//!
//! Listeners and the sink all feed one queue. The dispatcher handles events
//! strictly in arrival order and is the only owner of the routing table,
//! so the readiness gate needs no locking.
//!
//! - `Received`: look up the port's destinations, skip those not ready,
//!   format once and hand the text to the sink.
//! - `DestinationReady`: open the gate for that destination.

use std::sync::Arc;

use sysrelay_protocol::{Envelope, Event};
use sysrelay_routing::RoutingTable;
use sysrelay_sinks::Sink;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::format::format_message;
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};

/// Reason given to the sink when the dispatcher stops
pub const DEFAULT_DISCONNECT_REASON: &str = "Shutting down.";

pub struct Dispatcher {
    routing_table: RoutingTable,
    sink: Arc<dyn Sink>,
    metrics: Arc<DispatcherMetrics>,
    disconnect_reason: String,
}

impl Dispatcher {
    pub fn new(routing_table: RoutingTable, sink: Arc<dyn Sink>) -> Self {
        Self {
            routing_table,
            sink,
            metrics: Arc::new(DispatcherMetrics::new()),
            disconnect_reason: DEFAULT_DISCONNECT_REASON.to_owned(),
        }
    }

    #[must_use]
    pub fn with_disconnect_reason(mut self, reason: impl Into<String>) -> Self {
        self.disconnect_reason = reason.into();
        self
    }

    /// Shared metrics, still readable after `run` consumes the dispatcher
    pub fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.metrics
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    /// Process events until cancelled or every producer is gone, then
    /// disconnect the sink
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<Event>,
        cancel: CancellationToken,
    ) -> MetricsSnapshot {
        tracing::info!(
            sink = %self.sink.name(),
            ports = self.routing_table.port_count(),
            routes = self.routing_table.route_count(),
            "dispatcher starting"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }

        self.sink.disconnect(&self.disconnect_reason).await;

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            envelopes_received = snapshot.envelopes_received,
            messages_delivered = snapshot.messages_delivered,
            messages_gated = snapshot.messages_gated,
            envelopes_unrouted = snapshot.envelopes_unrouted,
            "dispatcher stopped"
        );
        snapshot
    }

    /// Handle one event
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Received(envelope) => self.deliver(&envelope),
            Event::DestinationReady(name) => self.enable_destination(&name),
        }
    }

    fn deliver(&self, envelope: &Envelope) {
        self.metrics.record_received();

        let destinations = self.routing_table.destinations_for_port(&envelope.port);
        if destinations.is_empty() {
            self.metrics.record_unrouted();
            tracing::debug!(port = %envelope.port, "no route for port, message dropped");
            return;
        }

        // Formatted on first use, shared by all ready destinations
        let mut text: Option<String> = None;

        for destination in destinations {
            if !self.routing_table.is_enabled(destination) {
                self.metrics.record_gated();
                tracing::debug!(
                    port = %envelope.port,
                    destination = %destination,
                    "destination not ready, message dropped"
                );
                continue;
            }

            let text = text.get_or_insert_with(|| format_message(envelope.source, &envelope.record));
            self.sink.send(destination, text);
            self.metrics.record_delivered();
            tracing::debug!(
                port = %envelope.port,
                source = %envelope.source,
                destination = %destination,
                "message relayed"
            );
        }
    }

    fn enable_destination(&mut self, name: &str) {
        match self.routing_table.enable(name) {
            Ok(ports) => {
                let ports = ports
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                tracing::info!(destination = %name, ports = %ports, "destination enabled");
            }
            Err(e) => {
                self.metrics.record_unknown_destination();
                tracing::warn!(destination = %name, error = %e, "ready destination has no routes");
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod dispatcher_test;

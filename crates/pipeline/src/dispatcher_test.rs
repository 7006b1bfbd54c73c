//! Dispatcher tests
//!
//! Routing, the readiness gate, and the run loop's shutdown behavior.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sysrelay_protocol::{Envelope, Event, Facility, LogRecord, Port, Severity};
use sysrelay_routing::{Route, RoutingTable};
use sysrelay_sinks::{Sink, SinkError, SinkEvents};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::Dispatcher;

/// Sink that records every call
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    disconnects: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    fn sent_to(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(d, _)| d.clone()).collect()
    }

    fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self, _events: SinkEvents) -> Result<(), SinkError> {
        Ok(())
    }

    fn send(&self, destination: &str, text: &str) {
        self.sent.lock().push((destination.to_owned(), text.to_owned()));
    }

    async fn disconnect(&self, reason: &str) {
        self.disconnects.lock().push(reason.to_owned());
    }
}

/// Routes: 514/udp -> #ops, #net; 55514/udp -> #net
fn scenario_table() -> RoutingTable {
    RoutingTable::from_routes([
        Route::new(Port::udp(514), "#ops"),
        Route::new(Port::udp(514), "#net"),
        Route::new(Port::udp(55514), "#net"),
    ])
}

fn dispatcher() -> (Dispatcher, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = Dispatcher::new(scenario_table(), sink.clone());
    (dispatcher, sink)
}

fn received(port: Port, payload: &str) -> Event {
    let source: SocketAddr = "10.0.0.5:41000".parse().unwrap();
    let record = LogRecord::new(Facility::User, Severity::Notice, payload.as_bytes().to_vec());
    Event::Received(Envelope::new(port, source, record))
}

// =============================================================================
// Routing and gate
// =============================================================================

#[test]
fn test_example_scenario() {
    let (mut dispatcher, sink) = dispatcher();

    dispatcher.handle(received(Port::udp(514), "a"));
    assert!(sink.sent().is_empty());

    dispatcher.handle(Event::destination_ready("#ops"));
    dispatcher.handle(received(Port::udp(514), "b"));
    assert_eq!(sink.sent_to(), vec!["#ops"]);
    sink.clear();

    dispatcher.handle(Event::destination_ready("#net"));
    dispatcher.handle(received(Port::udp(514), "c"));
    let mut to = sink.sent_to();
    to.sort();
    assert_eq!(to, vec!["#net", "#ops"]);
    sink.clear();

    dispatcher.handle(received(Port::udp(55514), "d"));
    assert_eq!(sink.sent_to(), vec!["#net"]);
}

#[test]
fn test_sent_text_is_formatted() {
    let (mut dispatcher, sink) = dispatcher();
    dispatcher.handle(Event::destination_ready("#ops"));
    dispatcher.handle(received(Port::udp(514), "disk full\n"));

    assert_eq!(
        sink.sent(),
        vec![("#ops".to_owned(), "10.0.0.5:41000 [notice]: disk full".to_owned())]
    );
}

#[test]
fn test_gate_drops_until_ready() {
    let (mut dispatcher, sink) = dispatcher();

    for _ in 0..10 {
        dispatcher.handle(received(Port::udp(55514), "early"));
    }
    assert!(sink.sent().is_empty());
    assert_eq!(dispatcher.metrics().snapshot().messages_gated, 10);
}

#[test]
fn test_gate_is_monotonic() {
    let (mut dispatcher, sink) = dispatcher();

    dispatcher.handle(Event::destination_ready("#net"));
    // A second ready (e.g. after the sink rejoined) changes nothing
    dispatcher.handle(Event::destination_ready("#net"));
    dispatcher.handle(received(Port::udp(55514), "one"));
    dispatcher.handle(received(Port::udp(55514), "two"));

    assert_eq!(sink.sent_to(), vec!["#net", "#net"]);
    assert!(dispatcher.routing_table().is_enabled("#net"));
}

#[test]
fn test_unknown_destination_ready_is_noop() {
    let (mut dispatcher, sink) = dispatcher();

    dispatcher.handle(Event::destination_ready("#nowhere"));
    dispatcher.handle(received(Port::udp(514), "x"));

    assert!(sink.sent().is_empty());
    assert_eq!(dispatcher.routing_table().enabled_count(), 0);
    assert_eq!(dispatcher.metrics().snapshot().unknown_destinations, 1);
}

#[test]
fn test_unrouted_port() {
    let (mut dispatcher, sink) = dispatcher();
    dispatcher.handle(Event::destination_ready("#ops"));
    dispatcher.handle(received(Port::tcp(514), "wrong transport"));

    assert!(sink.sent().is_empty());
    assert_eq!(dispatcher.metrics().snapshot().envelopes_unrouted, 1);
}

// =============================================================================
// Run loop
// =============================================================================

#[tokio::test]
async fn test_run_processes_in_order() {
    let (dispatcher, sink) = dispatcher();
    let (tx, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();

    // Ready event queued between messages: only later messages pass the gate
    tx.send(received(Port::udp(55514), "before")).await.unwrap();
    tx.send(Event::destination_ready("#net")).await.unwrap();
    tx.send(received(Port::udp(55514), "after")).await.unwrap();
    drop(tx);

    let snapshot = timeout(Duration::from_secs(1), dispatcher.run(rx, cancel))
        .await
        .unwrap();

    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.ends_with("after"));
    assert_eq!(snapshot.envelopes_received, 2);
    assert_eq!(snapshot.messages_delivered, 1);
}

#[tokio::test]
async fn test_cancel_disconnects_sink() {
    let (dispatcher, sink) = dispatcher();
    let dispatcher = dispatcher.with_disconnect_reason("bye");
    let (_tx, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(dispatcher.run(rx, cancel.clone()));
    cancel.cancel();
    timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

    assert_eq!(*sink.disconnects.lock(), vec!["bye".to_owned()]);
}

#[tokio::test]
async fn test_closed_queue_disconnects_with_default_reason() {
    let (dispatcher, sink) = dispatcher();
    let (tx, rx) = mpsc::channel(1);
    drop(tx);

    dispatcher.run(rx, CancellationToken::new()).await;
    assert_eq!(*sink.disconnects.lock(), vec!["Shutting down.".to_owned()]);
}

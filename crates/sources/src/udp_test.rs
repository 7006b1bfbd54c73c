//! Tests for the syslog UDP listener

use std::net::SocketAddr;
use std::time::Duration;

use sysrelay_protocol::{Event, Port, Severity};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::common::ListenerConfig;
use crate::error::ListenerError;
use crate::udp::UdpListener;

fn test_config() -> ListenerConfig {
    ListenerConfig {
        address: "127.0.0.1".into(),
        udp_workers: 1,
        max_message_size: 1024,
        ..ListenerConfig::with_port(Port::udp(0))
    }
}

async fn start(
    config: ListenerConfig,
    queue: usize,
) -> (
    SocketAddr,
    mpsc::Receiver<Event>,
    CancellationToken,
    tokio::task::JoinHandle<()>,
) {
    let listener = UdpListener::bind(config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(queue);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(listener.run(tx, cancel.clone()));
    (addr, rx, cancel, handle)
}

async fn send(addr: SocketAddr, data: &[u8]) {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(data, addr).await.unwrap();
}

async fn next_event(rx: &mut mpsc::Receiver<Event>) -> Event {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

#[tokio::test]
async fn test_receives_and_decodes_datagram() {
    let (addr, mut rx, cancel, handle) = start(test_config(), 10).await;

    send(addr, b"<134>Dec 20 12:34:56 host test: Hello syslog UDP\n").await;

    let Event::Received(envelope) = next_event(&mut rx).await else {
        panic!("expected a received event");
    };
    assert_eq!(envelope.port, Port::udp(0));
    assert_eq!(envelope.source.ip(), addr.ip());
    assert_eq!(envelope.record.severity, Severity::Informational);
    assert_eq!(envelope.record.hostname.as_deref(), Some("host"));
    assert_eq!(envelope.record.payload, b"test: Hello syslog UDP");

    cancel.cancel();
    timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_undecodable_datagram_dropped() {
    let listener = UdpListener::bind(test_config()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let metrics = listener.metrics().clone();
    let (tx, mut rx) = mpsc::channel(10);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(listener.run(tx, cancel.clone()));

    send(addr, b"no priority here").await;
    send(addr, b"<13>valid").await;

    let Event::Received(envelope) = next_event(&mut rx).await else {
        panic!("expected a received event");
    };
    assert_eq!(envelope.record.payload, b"valid");
    assert!(rx.try_recv().is_err());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.messages_malformed, 1);
    assert_eq!(snapshot.messages_received, 1);

    cancel.cancel();
    let _ = timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn test_oversized_datagram_dropped() {
    let config = ListenerConfig {
        max_message_size: 32,
        ..test_config()
    };
    let (addr, mut rx, cancel, handle) = start(config, 10).await;

    let mut big = b"<13>".to_vec();
    big.resize(64, b'x');
    send(addr, &big).await;
    send(addr, b"<13>small").await;

    let Event::Received(envelope) = next_event(&mut rx).await else {
        panic!("expected a received event");
    };
    assert_eq!(envelope.record.payload, b"small");

    cancel.cancel();
    let _ = timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn test_full_queue_drops_instead_of_blocking() {
    let listener = UdpListener::bind(test_config()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let metrics = listener.metrics().clone();
    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(listener.run(tx, cancel.clone()));

    for i in 0..5 {
        send(addr, format!("<13>message {i}").as_bytes()).await;
    }

    // Wait until every datagram has been accounted for
    timeout(Duration::from_secs(2), async {
        loop {
            let s = metrics.snapshot();
            if s.messages_received + s.messages_dropped >= 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.messages_received, 1);
    assert_eq!(snapshot.messages_dropped, 4);
    assert!(rx.try_recv().is_ok());

    cancel.cancel();
    let _ = timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn test_bind_conflict_names_port() {
    let occupied = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let number = occupied.local_addr().unwrap().port();

    let config = ListenerConfig {
        address: "127.0.0.1".into(),
        ..ListenerConfig::with_port(Port::udp(number))
    };
    let err = match UdpListener::bind(config).await {
        Err(e) => e,
        Ok(_) => panic!("bind should fail while the port is taken"),
    };
    assert!(matches!(err, ListenerError::Bind { .. }));
    assert!(err.to_string().contains(&format!("{number}/udp")));
}

#[tokio::test]
async fn test_second_listener_on_same_port_fails() {
    let first = UdpListener::bind(test_config()).await.unwrap();
    let number = first.local_addr().unwrap().port();

    let config = ListenerConfig {
        address: "127.0.0.1".into(),
        ..ListenerConfig::with_port(Port::udp(number))
    };
    let err = match UdpListener::bind(config).await {
        Err(e) => e,
        Ok(_) => panic!("second listener bound {number}/udp while the first holds it"),
    };
    assert!(matches!(err, ListenerError::Bind { .. }));
    assert!(err.to_string().contains(&format!("{number}/udp")));
}

#[tokio::test]
async fn test_unresolvable_address() {
    let config = ListenerConfig {
        address: "not an address".into(),
        ..test_config()
    };
    let err = match UdpListener::bind(config).await {
        Err(e) => e,
        Ok(_) => panic!("bind should fail"),
    };
    assert!(matches!(err, ListenerError::Bind { .. }));
}

#[tokio::test]
async fn test_stops_when_dispatcher_gone() {
    let (addr, rx, _cancel, handle) = start(test_config(), 10).await;
    drop(rx);

    send(addr, b"<13>nobody listens").await;
    timeout(Duration::from_secs(2), handle)
        .await
        .expect("listener should stop once the channel is closed")
        .unwrap();
}

//! Draining listener over real TCP sockets.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use graceful_drain::net::{ListenerError, ListenerMetrics, TrackedConnection};
use graceful_drain::DrainingListener;

async fn bound() -> (Arc<DrainingListener<TcpListener>>, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (Arc::new(DrainingListener::new(listener)), addr)
}

async fn accept_n(
    listener: &DrainingListener<TcpListener>,
    addr: std::net::SocketAddr,
    n: usize,
) -> (Vec<TcpStream>, Vec<TrackedConnection<TcpStream>>) {
    let mut clients = Vec::with_capacity(n);
    let mut accepted = Vec::with_capacity(n);
    for _ in 0..n {
        clients.push(TcpStream::connect(addr).await.unwrap());
        accepted.push(listener.accept().await.unwrap().0);
    }
    (clients, accepted)
}

#[tokio::test]
async fn close_returns_promptly_when_all_closed() {
    let (listener, addr) = bound().await;
    let (_clients, mut accepted) = accept_n(&listener, addr, 3).await;

    for conn in &mut accepted {
        conn.close().await.unwrap();
    }
    assert_eq!(listener.metrics(), ListenerMetrics { accepted: 3, closed: 3 });

    tokio::time::timeout(Duration::from_millis(500), listener.close())
        .await
        .expect("close should not wait")
        .unwrap();
}

#[tokio::test]
async fn close_waits_for_last_connection() {
    let (listener, addr) = bound().await;
    let (_clients, mut accepted) = accept_n(&listener, addr, 3).await;
    let mut last = accepted.pop().unwrap();
    for conn in &mut accepted {
        conn.close().await.unwrap();
    }

    let closer = Arc::clone(&listener);
    let closing = tokio::spawn(async move { closer.close().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!closing.is_finished());
    assert!(listener.is_closed());
    assert_eq!(listener.open_connections(), 1);

    last.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), closing)
        .await
        .expect("close did not finish after last connection closed")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn dropping_a_connection_counts_as_close() {
    let (listener, addr) = bound().await;
    let (_clients, accepted) = accept_n(&listener, addr, 2).await;

    drop(accepted);

    assert_eq!(listener.metrics(), ListenerMetrics { accepted: 2, closed: 2 });
    tokio::time::timeout(Duration::from_millis(500), listener.close())
        .await
        .expect("close should not wait")
        .unwrap();
}

#[tokio::test]
async fn accept_after_close_is_rejected() {
    let (listener, addr) = bound().await;
    listener.close().await.unwrap();

    assert!(matches!(listener.accept().await, Err(ListenerError::Closed)));
    // The socket is released once the listener is dropped from the slot.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn tracked_connection_carries_traffic() {
    let (listener, addr) = bound().await;
    let (mut clients, mut accepted) = accept_n(&listener, addr, 1).await;
    let client = &mut clients[0];
    let server = &mut accepted[0];

    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    server.write_all(b"pong").await.unwrap();
    server.close().await.unwrap();

    let mut reply = Vec::new();
    client.read_to_end(&mut reply).await.unwrap();
    assert_eq!(reply, b"pong");
    assert_eq!(listener.open_connections(), 0);
}

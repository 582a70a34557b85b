#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use alertfeed::feed::{FeedEvent, FeedUpdate, LiveFeed, ReconnectPolicy};
use alertfeed::types::{ConnectionState, Level};
use async_channel::{Receiver, bounded};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const ALERT_FRAME: &str =
    r#"{"type":"alert","payload":{"level":"critical","message":"over temp"}}"#;

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        base: Duration::from_millis(20),
        max: Duration::from_millis(100),
    }
}

async fn listen() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let url = Url::parse(&format!("ws://{addr}/ws")).expect("url");
    (listener, url)
}

async fn next(rx: &Receiver<FeedUpdate>) -> FeedUpdate {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("feed update in time")
        .expect("feed channel open")
}

async fn next_event(rx: &Receiver<FeedUpdate>) -> FeedEvent {
    loop {
        if let FeedUpdate::Event(event) = next(rx).await {
            return event;
        }
    }
}

async fn wait_for_state(rx: &Receiver<FeedUpdate>, wanted: ConnectionState) {
    loop {
        if next(rx).await == FeedUpdate::State(wanted) {
            return;
        }
    }
}

#[tokio::test]
async fn malformed_frames_are_skipped_and_connection_stays_open() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        ws.send(Message::Text("not json".into())).await.expect("send");
        ws.send(Message::Text(r#"{"type":"heartbeat"}"#.into()))
            .await
            .expect("send");
        ws.send(Message::Text(ALERT_FRAME.into())).await.expect("send");
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (tx, rx) = bounded(16);
    let handle = LiveFeed::new(url, fast_policy()).start(tx);

    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Connecting));
    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Open));
    match next(&rx).await {
        FeedUpdate::Event(FeedEvent::Alert(alert)) => {
            assert_eq!(alert.level, Level::Critical);
            assert_eq!(alert.message, "over temp");
            assert!(!alert.id.is_empty());
        }
        other => panic!("expected the alert right after open, got {other:?}"),
    }

    handle.stop().await;
    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Closed));
    assert!(rx.recv().await.is_err(), "no reconnect after stop");
    server.await.expect("server task");
}

#[tokio::test]
async fn reconnects_after_server_closes() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        ws.close(None).await.expect("close");
        drop(ws);

        let (stream, _) = listener.accept().await.expect("second accept");
        let mut ws = accept_async(stream).await.expect("second handshake");
        ws.send(Message::Text(ALERT_FRAME.into())).await.expect("send");
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (tx, rx) = bounded(16);
    let handle = LiveFeed::new(url, fast_policy()).start(tx);

    wait_for_state(&rx, ConnectionState::Open).await;
    wait_for_state(&rx, ConnectionState::Closed).await;
    wait_for_state(&rx, ConnectionState::Connecting).await;
    wait_for_state(&rx, ConnectionState::Open).await;
    assert!(matches!(next_event(&rx).await, FeedEvent::Alert(_)));

    handle.stop().await;
    server.await.expect("server task");
}

#[tokio::test]
async fn stop_cancels_a_pending_reconnect() {
    let (listener, url) = listen().await;
    drop(listener);

    let (tx, rx) = bounded(16);
    let slow = ReconnectPolicy {
        base: Duration::from_secs(60),
        max: Duration::from_secs(60),
    };
    let handle = LiveFeed::new(url, slow).start(tx);

    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Connecting));
    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Closed));

    timeout(Duration::from_secs(2), handle.stop())
        .await
        .expect("stop does not wait for the backoff");
    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Closed));
    assert!(rx.recv().await.is_err());
}

#[tokio::test]
async fn connector_stops_when_consumer_goes_away() {
    let (listener, url) = listen().await;
    drop(listener);

    let (tx, rx) = bounded(1);
    let handle = LiveFeed::new(url, fast_policy()).start(tx);
    drop(rx);

    timeout(Duration::from_secs(2), async {
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connector exits once nobody listens");
}

#[tokio::test]
async fn silent_handshake_times_out_and_retries() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (stream, _) = listener.accept().await.expect("accept");
            held.push(stream);
        }
    });

    let (tx, rx) = bounded(16);
    let handle = LiveFeed::new(url, fast_policy())
        .with_connect_timeout(Duration::from_millis(100))
        .start(tx);

    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Connecting));
    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Closed));
    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Connecting));

    handle.stop().await;
    server.abort();
}

#[tokio::test]
async fn unresponsive_open_connection_is_dropped() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let ws = accept_async(stream).await.expect("handshake");
        // never polled again, so pings go unanswered
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(ws);
    });

    let (tx, rx) = bounded(16);
    let handle = LiveFeed::new(url, fast_policy())
        .with_keepalive(Duration::from_millis(50))
        .start(tx);

    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Connecting));
    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Open));
    assert_eq!(next(&rx).await, FeedUpdate::State(ConnectionState::Closed));

    handle.stop().await;
    server.abort();
}

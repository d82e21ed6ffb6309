use std::time::Duration;

use console_ws::domains::ChannelFeed;
use console_ws::testing::{MockListener, MockTransport};
use console_ws::ws::{
    FeedClient, FeedClientOptions, LinearBackoffReconnect, WebSocketBufferConfig,
    WsConnectionStatus, WsTlsConfig,
};
use url::Url;

const BASE: Duration = Duration::from_millis(100);

type TestClient = FeedClient<ChannelFeed, LinearBackoffReconnect, MockTransport>;

fn spawn_client() -> (TestClient, MockTransport, MockListener) {
    let (transport, listener) = MockTransport::new();
    let client = FeedClient::spawn(FeedClientOptions {
        base_url: Url::parse("ws://console.test").expect("base url"),
        transport: transport.clone(),
        reconnect: LinearBackoffReconnect::new(BASE, 5),
        buffers: WebSocketBufferConfig::default(),
        tls: WsTlsConfig::default(),
    });
    (client, transport, listener)
}

/// Let the clock run to `at` after the start of the test, with the actor settled.
async fn settle_at(client: &TestClient, start: tokio::time::Instant, at: Duration) {
    tokio::time::sleep_until(start + at).await;
    client.current_status().await.expect("status");
}

#[tokio::test(start_paused = true)]
async fn attempt_counter_steps_by_one_per_failed_attempt() {
    let (client, transport, _listener) = spawn_client();
    transport.set_refuse(true);
    let start = tokio::time::Instant::now();
    client.connect(None).await.expect("connect");

    // Attempt n is due n * BASE after the previous failure: t = 100, 300, 600, 1000, 1500.
    let checkpoints = [
        (50, 1, 1),
        (150, 2, 2),
        (350, 3, 3),
        (650, 4, 4),
        (1050, 5, 5),
    ];
    for (at_ms, connects, attempt) in checkpoints {
        settle_at(&client, start, Duration::from_millis(at_ms)).await;
        assert_eq!(transport.connect_count(), connects, "connects at {at_ms}ms");
        assert_eq!(
            client.status(),
            WsConnectionStatus::Reconnecting { attempt },
            "status at {at_ms}ms"
        );
    }

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_five_reconnect_attempts() {
    let (client, transport, _listener) = spawn_client();
    transport.set_refuse(true);
    client.connect(None).await.expect("connect");

    let status = tokio::time::timeout(
        Duration::from_secs(30),
        client.wait_for_status(|s| *s == WsConnectionStatus::Exhausted),
    )
    .await
    .expect("feed should give up")
    .expect("status");
    assert_eq!(status, WsConnectionStatus::Exhausted);
    // One initial attempt plus five reconnects.
    assert_eq!(transport.connect_count(), 6);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.connect_count(), 6);
    assert_eq!(client.stats().await.expect("stats").reconnects, 5);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_the_attempt_counter() {
    let (client, _transport, mut listener) = spawn_client();
    client.connect(None).await.expect("connect");
    let mut server = listener.accept().await.expect("first connection");
    client
        .wait_for_status(WsConnectionStatus::is_open)
        .await
        .expect("open");

    for round in 0..3 {
        server.drop_socket();
        let status = client
            .wait_for_status(|s| matches!(s, WsConnectionStatus::Reconnecting { .. }))
            .await
            .expect("reconnecting");
        assert_eq!(
            status,
            WsConnectionStatus::Reconnecting { attempt: 1 },
            "round {round}"
        );
        server = listener.accept().await.expect("reconnected");
        client
            .wait_for_status(WsConnectionStatus::is_open)
            .await
            .expect("open again");
    }

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manual_connect_after_exhaustion_starts_a_fresh_cycle() {
    let (client, transport, mut listener) = spawn_client();
    transport.set_refuse(true);
    client.connect(None).await.expect("connect");
    client
        .wait_for_status(|s| *s == WsConnectionStatus::Exhausted)
        .await
        .expect("exhausted");

    transport.set_refuse(false);
    client.connect(None).await.expect("reconnect");
    let _server = listener.accept().await.expect("connection");
    client
        .wait_for_status(WsConnectionStatus::is_open)
        .await
        .expect("open");
    assert_eq!(transport.connect_count(), 7);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_a_pending_reconnect() {
    let (client, transport, _listener) = spawn_client();
    transport.set_refuse(true);
    client.connect(None).await.expect("connect");
    client
        .wait_for_status(|s| matches!(s, WsConnectionStatus::Reconnecting { .. }))
        .await
        .expect("reconnecting");

    client.disconnect().await.expect("disconnect");
    assert_eq!(client.status(), WsConnectionStatus::Idle);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(client.current_status().await.expect("status"), WsConnectionStatus::Idle);

    client.shutdown().await;
}

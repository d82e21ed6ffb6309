use std::time::Duration;

use bytes::Bytes;
use console_ws::domains::{Channel, ChannelAlert, ChannelFeed, ChannelStats, ChannelStatus};
use console_ws::testing::{MockListener, MockServer, MockTransport};
use console_ws::ws::{
    CLOSE_NORMAL, CommandOutcome, FeedClient, FeedClientOptions, LinearBackoffReconnect,
    WebSocketBufferConfig, WsConnectionStatus, WsFrame, WsTlsConfig,
};
use tokio::sync::mpsc;
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(2);

type TestClient = FeedClient<ChannelFeed, LinearBackoffReconnect, MockTransport>;

fn spawn_client() -> (TestClient, MockTransport, MockListener) {
    let (transport, listener) = MockTransport::new();
    let client = FeedClient::spawn(FeedClientOptions {
        base_url: Url::parse("ws://console.test").expect("base url"),
        transport: transport.clone(),
        reconnect: LinearBackoffReconnect::new(Duration::from_millis(20), 5),
        buffers: WebSocketBufferConfig::default(),
        tls: WsTlsConfig::default(),
    });
    (client, transport, listener)
}

async fn open(client: &TestClient, listener: &mut MockListener, scope: Option<&str>) -> MockServer {
    client.connect(scope).await.expect("connect");
    let server = listener
        .accept_timeout(TIMEOUT)
        .await
        .expect("connection accepted");
    tokio::time::timeout(TIMEOUT, client.wait_for_status(WsConnectionStatus::is_open))
        .await
        .expect("open in time")
        .expect("status");
    server
}

fn forward_updates(client: &TestClient) -> mpsc::UnboundedReceiver<Channel> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _sub = client.on_update(move |channel: &Channel| {
        let _ = tx.send(channel.clone());
    });
    rx
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await
        .expect("event in time")
        .expect("channel open")
}

#[tokio::test]
async fn connects_to_the_scoped_domain_endpoint() {
    let (client, _transport, mut listener) = spawn_client();
    let server = open(&client, &mut listener, Some("acme")).await;
    assert_eq!(server.url(), "ws://console.test/ws/channels?customerId=acme");
    client.shutdown().await;
}

#[tokio::test]
async fn routes_each_category_to_its_listeners() {
    let (client, _transport, mut listener) = spawn_client();
    let mut updates = forward_updates(&client);
    let (stats_tx, mut stats) = mpsc::unbounded_channel();
    let _stats_sub = client.on_stats(move |s: &ChannelStats| {
        let _ = stats_tx.send(s.clone());
    });
    let (alert_tx, mut alerts) = mpsc::unbounded_channel();
    let _alert_sub = client.on_alert(move |a: &ChannelAlert| {
        let _ = alert_tx.send(a.clone());
    });

    let server = open(&client, &mut listener, None).await;
    server
        .send_text(r#"{"type":"channel_update","data":{"id":"c1","name":"orders","status":"running"}}"#)
        .expect("send update");
    server
        .send_text(r#"{"type":"stats_update","data":{"totalChannels":3,"running":2}}"#)
        .expect("send stats");
    server
        .send_text(r#"{"type":"channel_alert","data":{"channelId":"c1","severity":"error","message":"adapter down"}}"#)
        .expect("send alert");

    let channel = next(&mut updates).await;
    assert_eq!(channel.id, "c1");
    assert_eq!(channel.status, Some(ChannelStatus::Running));
    assert_eq!(next(&mut stats).await.total_channels, 3);
    assert_eq!(next(&mut alerts).await.message, "adapter down");

    let counters = client.stats().await.expect("stats");
    assert_eq!(counters.events_dispatched, 3);
    client.shutdown().await;
}

#[tokio::test]
async fn unknown_and_malformed_frames_are_dropped_quietly() {
    let (client, _transport, mut listener) = spawn_client();
    let mut updates = forward_updates(&client);
    let server = open(&client, &mut listener, None).await;

    server
        .send_text(r#"{"type":"bogus_type","data":{"id":"x"}}"#)
        .expect("send bogus");
    server.send_text("{not json").expect("send garbage");
    server
        .send_text(r#"{"type":"channel_update","data":{"id":"c2"}}"#)
        .expect("send update");

    assert_eq!(next(&mut updates).await.id, "c2");
    assert!(updates.try_recv().is_err());

    let counters = client.stats().await.expect("stats");
    assert_eq!(counters.ignored_frames, 1);
    assert_eq!(counters.parse_failures, 1);
    assert_eq!(counters.events_dispatched, 1);
    assert!(client.is_connected());
    client.shutdown().await;
}

#[tokio::test]
async fn command_is_written_while_open() {
    let (client, _transport, mut listener) = spawn_client();
    let mut server = open(&client, &mut listener, None).await;

    let outcome = client
        .send_command(ChannelFeed::subscribe_logs("c1"))
        .await
        .expect("send");
    assert_eq!(outcome, CommandOutcome::Sent);

    let frame = server
        .recv_outbound_timeout(TIMEOUT)
        .await
        .expect("command frame");
    assert_eq!(
        frame,
        WsFrame::text(r#"{"command":"subscribe_channel_logs","data":{"channelId":"c1"}}"#)
    );
    client.shutdown().await;
}

#[tokio::test]
async fn command_is_a_no_op_when_not_connected() {
    let (client, transport, _listener) = spawn_client();

    let outcome = client
        .send_command(ChannelFeed::filter_status("running"))
        .await
        .expect("send");
    assert_eq!(outcome, CommandOutcome::NotConnected);
    assert_eq!(transport.connect_count(), 0);
    assert_eq!(client.stats().await.expect("stats").commands_dropped, 1);
    client.shutdown().await;
}

#[tokio::test]
async fn connect_while_active_is_ignored() {
    let (client, transport, mut listener) = spawn_client();
    let _server = open(&client, &mut listener, None).await;

    client.connect(None).await.expect("second connect");
    client.connect(Some("other")).await.expect("third connect");
    assert!(listener.accept_timeout(Duration::from_millis(100)).await.is_none());
    assert_eq!(transport.connect_count(), 1);
    client.shutdown().await;
}

#[tokio::test]
async fn disconnect_sends_normal_close_and_clears_listeners() {
    let (client, transport, mut listener) = spawn_client();
    let _updates = forward_updates(&client);
    let _stats = client.on_stats(|_: &ChannelStats| {});
    let mut server = open(&client, &mut listener, None).await;
    assert_eq!(client.listeners().len(), 2);

    client.disconnect().await.expect("disconnect");

    match server.recv_outbound_timeout(TIMEOUT).await {
        Some(WsFrame::Close(Some(close))) => assert_eq!(close.code, CLOSE_NORMAL),
        other => panic!("expected close frame, got {other:?}"),
    }
    assert!(client.listeners().is_empty());
    assert_eq!(client.status(), WsConnectionStatus::Idle);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.connect_count(), 1);
    client.shutdown().await;
}

#[tokio::test]
async fn unsubscribe_removes_exactly_one_listener() {
    let (client, _transport, mut listener) = spawn_client();
    let (tx, mut kept) = mpsc::unbounded_channel();
    let _kept = client.on_update(move |c: &Channel| {
        let _ = tx.send(c.id.clone());
    });
    let removed = client.on_update(|_: &Channel| panic!("removed listener invoked"));

    assert!(removed.unsubscribe());
    assert!(!removed.unsubscribe());
    assert_eq!(client.listeners().updates.len(), 1);

    let server = open(&client, &mut listener, None).await;
    server
        .send_text(r#"{"type":"channel_update","data":{"id":"c3"}}"#)
        .expect("send");
    assert_eq!(next(&mut kept).await, "c3");
    client.shutdown().await;
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (client, _transport, mut listener) = spawn_client();
    let mut server = open(&client, &mut listener, None).await;

    server
        .send_inbound(WsFrame::Ping(Bytes::from_static(b"hb")))
        .expect("send ping");
    let frame = server.recv_outbound_timeout(TIMEOUT).await.expect("pong");
    assert_eq!(frame, WsFrame::Pong(Bytes::from_static(b"hb")));
    client.shutdown().await;
}

#[tokio::test]
async fn remote_close_triggers_reconnect_and_keeps_listeners() {
    let (client, transport, mut listener) = spawn_client();
    let mut updates = forward_updates(&client);
    let mut server = open(&client, &mut listener, Some("acme")).await;

    server.close(1001, "going away").expect("close");
    let superseded = server;
    let server = listener
        .accept_timeout(TIMEOUT)
        .await
        .expect("reconnected");
    assert_eq!(server.url(), "ws://console.test/ws/channels?customerId=acme");
    tokio::time::timeout(TIMEOUT, client.wait_for_status(WsConnectionStatus::is_open))
        .await
        .expect("open in time")
        .expect("status");

    server
        .send_text(r#"{"type":"channel_update","data":{"id":"c4"}}"#)
        .expect("send");
    assert_eq!(next(&mut updates).await.id, "c4");
    assert!(
        superseded
            .send_text(r#"{"type":"channel_update","data":{"id":"stale"}}"#)
            .is_err()
    );
    assert_eq!(transport.connect_count(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn write_failure_reconnects_and_ignores_the_old_socket() {
    let (client, transport, mut listener) = spawn_client();
    let mut updates = forward_updates(&client);
    let old = open(&client, &mut listener, None).await;

    transport.set_fail_writes(true);
    let outcome = client
        .send_command(ChannelFeed::subscribe_logs("c1"))
        .await
        .expect("send");
    assert_eq!(outcome, CommandOutcome::NotConnected);
    assert!(!client.is_connected());
    transport.set_fail_writes(false);

    let server = listener
        .accept_timeout(TIMEOUT)
        .await
        .expect("reconnected after write failure");
    tokio::time::timeout(TIMEOUT, client.wait_for_status(WsConnectionStatus::is_open))
        .await
        .expect("open in time")
        .expect("status");

    // The old socket's reader is gone; anything it still carries must not be routed.
    let _ = old.send_text(r#"{"type":"channel_update","data":{"id":"stale"}}"#);
    server
        .send_text(r#"{"type":"channel_update","data":{"id":"fresh"}}"#)
        .expect("send");
    assert_eq!(next(&mut updates).await.id, "fresh");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(updates.try_recv().is_err());

    assert_eq!(
        client
            .send_command(ChannelFeed::subscribe_logs("c1"))
            .await
            .expect("send again"),
        CommandOutcome::Sent
    );
    assert_eq!(transport.connect_count(), 2);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn handshake_in_flight_at_disconnect_never_opens() {
    let (client, transport, mut listener) = spawn_client();
    transport.set_handshake_delay(Duration::from_millis(200));

    client.connect(None).await.expect("connect");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(client.status(), WsConnectionStatus::Connecting);

    client.disconnect().await.expect("disconnect");
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        client.current_status().await.expect("status"),
        WsConnectionStatus::Idle
    );
    assert!(listener.accept_timeout(Duration::from_millis(10)).await.is_none());

    // A fresh connect after the abandoned handshake opens normally.
    transport.set_handshake_delay(Duration::ZERO);
    let _server = open(&client, &mut listener, None).await;
    assert_eq!(transport.connect_count(), 2);
    client.shutdown().await;
}

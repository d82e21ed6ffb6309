use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use console_ws::core::{FeedListeners, FeedRouter, decode_frame};
use console_ws::domains::{Channel, ChannelFeed, ChannelStats};

const FRAMES: usize = 1000;

fn update_frames() -> Vec<Vec<u8>> {
    (0..FRAMES)
        .map(|i| {
            format!(
                r#"{{"type":"channel_update","data":{{"id":"ch-{i}","name":"orders-{i}","status":"running","customerId":"acme","messagesProcessed":{i},"errorCount":0,"lastActivity":"2024-05-01T10:00:00Z"}}}}"#
            )
            .into_bytes()
        })
        .collect()
}

fn mixed_frames() -> Vec<Vec<u8>> {
    (0..FRAMES)
        .map(|i| match i % 4 {
            0 => format!(r#"{{"type":"channel_update","data":{{"id":"ch-{i}","status":"stopped"}}}}"#),
            1 => r#"{"type":"stats_update","data":{"totalChannels":40,"running":38,"messagesPerMinute":1520.5}}"#.to_string(),
            2 => r#"{"type":"heartbeat","data":{}}"#.to_string(),
            _ => format!(
                r#"{{"type":"channel_alert","data":{{"channelId":"ch-{i}","severity":"warning","message":"queue depth high"}}}}"#
            ),
        })
        .map(String::into_bytes)
        .collect()
}

fn bench_decode_updates(c: &mut Criterion) {
    let frames = update_frames();
    c.bench_function("decode_1000_channel_updates", |b| {
        b.iter(|| {
            for frame in &frames {
                let decoded = decode_frame::<ChannelFeed>(black_box(frame.as_slice()));
                black_box(decoded.is_ok());
            }
        })
    });
}

fn bench_route_mixed(c: &mut Criterion) {
    let frames = mixed_frames();
    let listeners = FeedListeners::<ChannelFeed>::new();
    let seen = Arc::new(AtomicU64::new(0));
    for _ in 0..4 {
        let seen = Arc::clone(&seen);
        let _ = listeners.updates.add(move |c: &Channel| {
            seen.fetch_add(c.messages_processed + 1, Ordering::Relaxed);
        });
    }
    let stats_seen = Arc::clone(&seen);
    let _ = listeners.stats.add(move |s: &ChannelStats| {
        stats_seen.fetch_add(s.running, Ordering::Relaxed);
    });
    let router = FeedRouter::new(listeners);

    c.bench_function("route_1000_mixed_frames_5_listeners", |b| {
        b.iter(|| {
            for frame in &frames {
                black_box(router.route(black_box(frame.as_slice())));
            }
        })
    });
    black_box(seen.load(Ordering::Relaxed));
}

criterion_group!(benches, bench_decode_updates, bench_route_mixed);
criterion_main!(benches);

use std::time::Instant;

use super::circular_buffer::CircularBuffer;
use super::types::WsConnectionStats;

const MAX_RECENT_ERRORS: usize = 100;
const MAX_ERROR_TEXT_BYTES: usize = 1024;

#[derive(Debug, Clone)]
struct ErrorRec {
    _timestamp: Instant,
    context: &'static str,
    error: String,
}

fn truncate_string(s: &str) -> String {
    if s.len() <= MAX_ERROR_TEXT_BYTES {
        return s.to_string();
    }

    let mut end = MAX_ERROR_TEXT_BYTES;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Per-connection counters owned by the feed actor.
///
/// Counters survive reconnects; `reset` only restarts the uptime and message-age clocks.
#[derive(Debug)]
pub struct WsHealthMonitor {
    connection_started: Instant,
    last_message_received: Instant,
    frames_received: u64,
    events_dispatched: u64,
    parse_failures: u64,
    ignored_frames: u64,
    reconnects: u64,
    commands_sent: u64,
    commands_dropped: u64,
    recent_errors: CircularBuffer<ErrorRec>,
}

impl Default for WsHealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl WsHealthMonitor {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            connection_started: now,
            last_message_received: now,
            frames_received: 0,
            events_dispatched: 0,
            parse_failures: 0,
            ignored_frames: 0,
            reconnects: 0,
            commands_sent: 0,
            commands_dropped: 0,
            recent_errors: CircularBuffer::new(MAX_RECENT_ERRORS),
        }
    }

    pub fn reset(&mut self) {
        let now = Instant::now();
        self.connection_started = now;
        self.last_message_received = now;
    }

    pub fn record_frame(&mut self) {
        self.last_message_received = Instant::now();
        self.frames_received = self.frames_received.saturating_add(1);
    }

    pub fn record_dispatch(&mut self) {
        self.events_dispatched = self.events_dispatched.saturating_add(1);
    }

    pub fn record_ignored(&mut self) {
        self.ignored_frames = self.ignored_frames.saturating_add(1);
    }

    pub fn record_parse_failure(&mut self, error: &str) {
        self.parse_failures = self.parse_failures.saturating_add(1);
        self.record_error("parse", error);
    }

    pub fn record_error(&mut self, context: &'static str, error: &str) {
        self.recent_errors.push(ErrorRec {
            _timestamp: Instant::now(),
            context,
            error: truncate_string(error),
        });
    }

    pub fn record_command(&mut self, sent: bool) {
        if sent {
            self.commands_sent = self.commands_sent.saturating_add(1);
        } else {
            self.commands_dropped = self.commands_dropped.saturating_add(1);
        }
    }

    pub fn increment_reconnect(&mut self) {
        self.reconnects = self.reconnects.saturating_add(1);
    }

    /// Most recent error as `(context, message)`.
    pub fn last_error(&self) -> Option<(&'static str, &str)> {
        self.recent_errors
            .back()
            .map(|rec| (rec.context, rec.error.as_str()))
    }

    pub fn get_stats(&self) -> WsConnectionStats {
        WsConnectionStats {
            uptime: self.connection_started.elapsed(),
            last_message_age: self.last_message_received.elapsed(),
            frames_received: self.frames_received,
            events_dispatched: self.events_dispatched,
            parse_failures: self.parse_failures,
            ignored_frames: self.ignored_frames,
            reconnects: self.reconnects,
            commands_sent: self.commands_sent,
            commands_dropped: self.commands_dropped,
            recent_errors: self.recent_errors.len(),
        }
    }
}

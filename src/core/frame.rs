use bytes::Bytes;

/// Transport-neutral websocket frame.
///
/// Transports convert their native message type into/from `WsFrame`; everything above the
/// transport boundary (router, actor, tests) only sees this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsFrame {
    Text(Bytes),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<WsCloseFrame>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsCloseFrame {
    pub code: u16,
    pub reason: Bytes,
}

/// Normal closure status code.
pub const CLOSE_NORMAL: u16 = 1000;

impl WsFrame {
    #[inline]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(Bytes::from(s.into()))
    }

    #[inline]
    pub fn close(code: u16, reason: &'static str) -> Self {
        Self::Close(Some(WsCloseFrame {
            code,
            reason: Bytes::from_static(reason.as_bytes()),
        }))
    }
}

/// Human readable close reason used in logs.
pub fn describe_close(frame: Option<&WsCloseFrame>) -> String {
    match frame {
        Some(f) => format!(
            "code={} reason={}",
            f.code,
            String::from_utf8_lossy(f.reason.as_ref())
        ),
        None => "remote closed".to_string(),
    }
}

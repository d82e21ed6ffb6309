use url::Url;

use crate::core::{FeedDomain, WebSocketError, WebSocketResult};

/// Build the feed url for domain `D`: `{base}{PATH}[?{SCOPE_PARAM}={scope}]`.
///
/// Any path prefix on `base` is kept. An empty scope is treated as no scope.
pub fn feed_endpoint<D: FeedDomain>(base: &Url, scope: Option<&str>) -> WebSocketResult<Url> {
    match base.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(WebSocketError::InvalidEndpoint(format!(
                "unsupported scheme `{other}` in {base}"
            )));
        }
    }

    let mut root = base.clone();
    root.set_query(None);
    root.set_fragment(None);
    let joined = format!("{}{}", root.as_str().trim_end_matches('/'), D::PATH);
    let mut url =
        Url::parse(&joined).map_err(|err| WebSocketError::InvalidEndpoint(err.to_string()))?;

    if let Some(scope) = scope.filter(|s| !s.is_empty()) {
        url.query_pairs_mut().append_pair(D::SCOPE_PARAM, scope);
    }
    Ok(url)
}

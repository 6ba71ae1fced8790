//! `/__live` websocket endpoint backing live code panels.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use folio_live::{Evaluator, EvaluatorSet, LiveRequest, LiveSession, LiveUpdate};

struct LiveState<E: Evaluator> {
    evaluators: Arc<EvaluatorSet<E>>,
    evaluate_on_mount: bool,
}

impl<E: Evaluator> Clone for LiveState<E> {
    fn clone(&self) -> Self {
        Self {
            evaluators: Arc::clone(&self.evaluators),
            evaluate_on_mount: self.evaluate_on_mount,
        }
    }
}

/// Router serving the live panel websocket.
///
/// Each connection owns one [`LiveSession`]; its panels are discarded when
/// the connection closes. Upgrades from a page on another origin are refused,
/// since every edit runs a local command.
pub fn live_router<E, S>(evaluators: Arc<EvaluatorSet<E>>, evaluate_on_mount: bool) -> Router<S>
where
    E: Evaluator,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/__live", get(live_handler::<E>))
        .with_state(LiveState {
            evaluators,
            evaluate_on_mount,
        })
}

async fn live_handler<E: Evaluator>(
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(state): State<LiveState<E>>,
) -> Response {
    if !same_origin(&headers) {
        tracing::warn!(
            "Refused live connection from origin {:?}",
            headers.get(header::ORIGIN)
        );
        return (StatusCode::FORBIDDEN, "cross-origin live connections are not allowed")
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_live(socket, state))
}

/// True when the request has no `Origin` or its host matches `Host`.
fn same_origin(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };

    let origin_host = origin.to_str().ok().and_then(|origin| {
        origin
            .strip_prefix("http://")
            .or_else(|| origin.strip_prefix("https://"))
    });
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());

    match (origin_host, host) {
        (Some(origin_host), Some(host)) => origin_host.eq_ignore_ascii_case(host),
        _ => false,
    }
}

async fn handle_live<E: Evaluator>(mut socket: WebSocket, state: LiveState<E>) {
    let mut session =
        LiveSession::new(state.evaluators).evaluate_on_mount(state.evaluate_on_mount);

    tracing::debug!("Live connection opened");

    loop {
        let update = tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text(&mut session, text.as_str()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => None,
            },
            Some(update) = session.next_update() => Some(update),
        };

        if let Some(update) = update {
            if send_update(&mut socket, &update).await.is_err() {
                break;
            }
        }
    }

    tracing::debug!("Live connection closed");
}

/// Apply one client message to the session.
fn handle_text<E: Evaluator>(session: &mut LiveSession<E>, text: &str) -> Option<LiveUpdate> {
    match serde_json::from_str::<LiveRequest>(text) {
        Ok(request) => session.handle(request),
        Err(e) => {
            tracing::warn!("Ignoring malformed live message: {}", e);
            None
        }
    }
}

async fn send_update(socket: &mut WebSocket, update: &LiveUpdate) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(update) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to encode live update: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use folio_live::{EvaluationError, PanelStatus, RenderedOutput};
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct Upper;

    impl Evaluator for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        async fn evaluate(&self, source: &str) -> Result<RenderedOutput, EvaluationError> {
            Ok(RenderedOutput::new(source.to_uppercase()))
        }
    }

    fn session() -> LiveSession<Upper> {
        let mut set = EvaluatorSet::new();
        set.insert("js", Upper);
        LiveSession::new(Arc::new(set))
    }

    #[tokio::test]
    async fn mounts_from_json() {
        let mut session = session();

        let update = handle_text(
            &mut session,
            r#"{"type":"mount","panel":"block-3","language":"js","text":"x"}"#,
        );

        match update {
            Some(LiveUpdate::State { panel, view }) => {
                assert_eq!(panel, "block-3");
                assert_eq!(view.status, PanelStatus::Idle);
            }
            other => panic!("expected state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn edit_round_trips_through_session() {
        let mut session = session();
        handle_text(
            &mut session,
            r#"{"type":"mount","panel":"p","language":"js","text":""}"#,
        );

        handle_text(&mut session, r#"{"type":"edit","panel":"p","text":"hi"}"#);
        let update = session.next_update().await;

        match update {
            Some(LiveUpdate::State { view, .. }) => {
                assert_eq!(view.preview.as_deref(), Some("HI"));
            }
            other => panic!("expected state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn ignores_malformed_messages() {
        let mut session = session();

        assert_eq!(handle_text(&mut session, "not json"), None);
        assert_eq!(handle_text(&mut session, r#"{"type":"explode"}"#), None);
    }

    fn headers(origin: Option<&'static str>, host: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static(host));
        if let Some(origin) = origin {
            headers.insert(header::ORIGIN, HeaderValue::from_static(origin));
        }
        headers
    }

    #[test]
    fn checks_origin_against_host() {
        assert!(same_origin(&headers(None, "127.0.0.1:7777")));
        assert!(same_origin(&headers(
            Some("http://127.0.0.1:7777"),
            "127.0.0.1:7777"
        )));
        assert!(same_origin(&headers(
            Some("https://Blog.Example"),
            "blog.example"
        )));
        assert!(!same_origin(&headers(
            Some("https://evil.example"),
            "127.0.0.1:7777"
        )));
        assert!(!same_origin(&headers(
            Some("http://127.0.0.1:8080"),
            "127.0.0.1:7777"
        )));
        assert!(!same_origin(&headers(Some("null"), "127.0.0.1:7777")));
    }

    async fn serve_live() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut set = EvaluatorSet::new();
        set.insert("js", Upper);
        let app: Router = live_router(Arc::new(set), false);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    /// Send a websocket upgrade request and return the response status line.
    async fn upgrade_status(addr: SocketAddr, origin: Option<&str>) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();

        let mut request = format!(
            "GET /__live HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\
             Sec-WebSocket-Version: 13\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n",
            addr
        );
        if let Some(origin) = origin {
            request.push_str(&format!("Origin: {}\r\n", origin));
        }
        request.push_str("\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut buf = vec![0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n])
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn refuses_cross_origin_upgrade() {
        let addr = serve_live().await;

        let status = upgrade_status(addr, Some("https://evil.example")).await;

        assert!(status.starts_with("HTTP/1.1 403"), "got {}", status);
    }

    #[tokio::test]
    async fn accepts_same_origin_upgrade() {
        let addr = serve_live().await;

        let same = upgrade_status(addr, Some(&format!("http://{}", addr))).await;
        let none = upgrade_status(addr, None).await;

        assert!(same.starts_with("HTTP/1.1 101"), "got {}", same);
        assert!(none.starts_with("HTTP/1.1 101"), "got {}", none);
    }
}

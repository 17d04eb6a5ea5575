//! Dev server with live reload
//!
//! Serves the output tree as static content and injects a small client
//! script into HTML pages. Connected clients listen on a WebSocket
//! endpoint; pipelines push `Reload` messages through a broadcast hub when
//! they rewrite output.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, oneshot};

use crate::error::{KilnError, KilnResult};

/// WebSocket endpoint the injected client connects to
pub const LIVE_ENDPOINT: &str = "/__kiln__/live";

/// How connected browsers should react to a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    /// Full page refresh
    Page,
    /// Swap stylesheets in place, no refresh
    Styles,
}

impl Reload {
    pub fn to_json(self) -> String {
        match self {
            Reload::Page => r#"{"type":"reload"}"#.to_string(),
            Reload::Styles => r#"{"type":"css"}"#.to_string(),
        }
    }
}

/// Broadcast hub connecting pipelines to WebSocket clients
///
/// Cheap to clone; notifying without any connected client is a no-op.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<Reload>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn notify(&self, reload: Reload) {
        let _ = self.tx.send(reload);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Reload> {
        self.tx.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Server binding and document root
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
}

struct ServerState {
    root: PathBuf,
    hub: ReloadHub,
}

/// Client script injected into served HTML pages
const CLIENT_JS: &str = r#"(() => {
  const proto = location.protocol === 'https:' ? 'wss' : 'ws';
  const socket = new WebSocket(proto + '://' + location.host + '/__kiln__/live');
  socket.addEventListener('message', (event) => {
    let msg;
    try { msg = JSON.parse(event.data); } catch { return; }
    if (msg.type === 'reload') location.reload();
    if (msg.type === 'css') {
      for (const link of document.querySelectorAll('link[rel="stylesheet"]')) {
        const url = new URL(link.href, location.href);
        url.searchParams.set('kiln', Date.now().toString());
        link.href = url.toString();
      }
    }
  });
})();
"#;

/// Insert the live-reload client before `</body>` (appended when absent)
fn inject_client(page: &str) -> String {
    let script = format!("<script>{CLIENT_JS}</script>");
    match page.rfind("</body>") {
        Some(at) => format!("{}{}{}", &page[..at], script, &page[at..]),
        None => format!("{page}{script}"),
    }
}

fn content_type(ext: Option<&str>) -> &'static str {
    match ext {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") | Some("map") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

async fn serve_asset(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    let requested = uri.path().trim_start_matches('/');
    let relative = if requested.is_empty() {
        Path::new("index.html")
    } else {
        Path::new(requested)
    };

    // Only plain path segments may address files under the root
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    let mut full = state.root.join(relative);
    if full.is_dir() {
        full = full.join("index.html");
    }

    let content = match tokio::fs::read(&full).await {
        Ok(content) => content,
        Err(_) => return (StatusCode::NOT_FOUND, "not found").into_response(),
    };

    let ext = full.extension().and_then(|e| e.to_str());
    let mime = content_type(ext);

    if matches!(ext, Some("html") | Some("htm")) {
        let page = String::from_utf8_lossy(&content);
        let injected = inject_client(&page);
        return ([(header::CONTENT_TYPE, mime)], injected).into_response();
    }

    ([(header::CONTENT_TYPE, mime)], content).into_response()
}

async fn live_ws(State(state): State<Arc<ServerState>>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: ReloadHub) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = hub.subscribe();

    if sender
        .send(Message::Text(r#"{"type":"connected"}"#.to_string()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            reload = rx.recv() => match reload {
                Ok(reload) => {
                    if sender.send(Message::Text(reload.to_json())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(_)) => continue,
                _ => break,
            },
        }
    }
}

/// Serve the output root until the shutdown signal fires
///
/// Builds its own tokio runtime so callers stay synchronous.
pub fn serve(
    options: ServerOptions,
    hub: ReloadHub,
    shutdown: oneshot::Receiver<()>,
) -> KilnResult<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve_async(options, hub, shutdown))
}

async fn serve_async(
    options: ServerOptions,
    hub: ReloadHub,
    shutdown: oneshot::Receiver<()>,
) -> KilnResult<()> {
    let state = Arc::new(ServerState {
        root: options.root.clone(),
        hub,
    });

    let app = Router::new()
        .route(LIVE_ENDPOINT, get(live_ws))
        .fallback(get(serve_asset))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind((options.host.as_str(), options.port))
        .await
        .map_err(|e| KilnError::Server {
            message: format!("failed to bind {}:{}: {}", options.host, options.port, e),
        })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
        })
        .await
        .map_err(|e| KilnError::Server {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_to_json() {
        assert_eq!(Reload::Page.to_json(), r#"{"type":"reload"}"#);
        assert_eq!(Reload::Styles.to_json(), r#"{"type":"css"}"#);
    }

    #[test]
    fn test_hub_broadcasts_to_subscribers() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();
        hub.notify(Reload::Styles);
        assert_eq!(rx.try_recv().unwrap(), Reload::Styles);
    }

    #[test]
    fn test_hub_without_clients_is_noop() {
        let hub = ReloadHub::new();
        hub.notify(Reload::Page);
    }

    #[test]
    fn test_inject_before_body_close() {
        let page = "<html><body><p>hi</p></body></html>";
        let out = inject_client(page);
        let script_at = out.find("<script>").unwrap();
        let body_close_at = out.find("</body>").unwrap();
        assert!(script_at < body_close_at);
        assert!(out.contains(LIVE_ENDPOINT));
    }

    #[test]
    fn test_inject_appends_without_body() {
        let fragment = "<p>partial</p>";
        let out = inject_client(fragment);
        assert!(out.starts_with(fragment));
        assert!(out.ends_with("</script>"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type(Some("html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Some("css")), "text/css; charset=utf-8");
        assert_eq!(content_type(Some("woff2")), "font/woff2");
        assert_eq!(content_type(None), "application/octet-stream");
    }
}

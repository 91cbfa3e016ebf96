//! Development server implementation.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, Method},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use mantle_codegen::{build_widgets, BuildConfig, BuildMode, BuiltWidget};

use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{hmr_client_script, HmrHub, HmrMessage};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory holding one subdirectory per widget
    pub widgets_dir: PathBuf,

    /// Directory generated modules are written to and served from
    pub out_dir: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    pub mode: BuildMode,

    /// Import map entries for the bare specifiers generated modules use
    pub imports: BTreeMap<String, String>,
}

/// Import map resolving React from a CDN.
pub fn default_imports() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("react".to_string(), "https://esm.sh/react@19".to_string()),
        (
            "react-dom/client".to_string(),
            "https://esm.sh/react-dom@19/client".to_string(),
        ),
    ])
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            widgets_dir: PathBuf::from("src/widgets"),
            out_dir: PathBuf::from("dist"),
            port: 5175,
            host: "127.0.0.1".to_string(),
            open: false,
            mode: BuildMode::Development,
            imports: default_imports(),
        }
    }
}

impl DevServerConfig {
    fn build_config(&self) -> BuildConfig {
        BuildConfig {
            widgets_dir: self.widgets_dir.clone(),
            out_dir: self.out_dir.clone(),
            mode: self.mode,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Build error: {0}")]
    BuildError(String),
}

/// Shared server state.
struct ServerState {
    config: DevServerConfig,
    hmr: HmrHub,
    widgets: Vec<BuiltWidget>,
}

type SharedState = Arc<RwLock<ServerState>>;

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build once, then serve and rebuild on change until the process exits.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                ServerError::InvalidAddress(format!("{}:{}", self.config.host, self.config.port))
            })?;

        let report = rebuild(self.config.build_config())
            .await
            .map_err(ServerError::BuildError)?;

        let state: SharedState = Arc::new(RwLock::new(ServerState {
            config: self.config.clone(),
            hmr: HmrHub::new(),
            widgets: report,
        }));

        let (watcher, mut rx) = FileWatcher::new(&self.config.widgets_dir)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let state_clone = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_watch_event(&state_clone, event).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = router(state, &self.config);

        tracing::info!("Serving widgets at http://{}", addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

fn router(state: SharedState, config: &DevServerConfig) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/__hmr", get(ws_handler))
        .route("/__hmr.js", get(hmr_script_handler))
        .fallback_service(ServeDir::new(&config.out_dir))
        .layer(cors_layer())
        .with_state(state)
}

/// Widgets are embedded from arbitrary host pages, so any origin may load them.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn rebuild(config: BuildConfig) -> Result<Vec<BuiltWidget>, String> {
    let report = tokio::task::spawn_blocking(move || build_widgets(&config))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    tracing::info!(
        "Built {} widgets in {}ms",
        report.widgets.len(),
        report.duration_ms
    );
    for skipped in &report.skipped {
        tracing::warn!("Skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    Ok(report.widgets)
}

/// Handle file watch events.
async fn handle_watch_event(state: &SharedState, event: WatchEvent) {
    tracing::info!("Changed: {}", event.path().display());

    let config = state.read().await.config.build_config();

    match rebuild(config).await {
        Ok(widgets) => {
            let tags = widgets.iter().map(|w| w.tag.clone()).collect();
            let mut state = state.write().await;
            state.widgets = widgets;
            state.hmr.send(HmrMessage::Rebuilt { tags });
        }
        Err(message) => {
            tracing::warn!("Rebuild failed: {}", message);
            state.read().await.hmr.send(HmrMessage::BuildFailed { message });
        }
    }
}

/// Handler for the index page.
async fn index_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    Html(index_html(&state.widgets, &state.config.imports))
}

/// Page that loads every widget module and places one instance of each.
fn index_html(widgets: &[BuiltWidget], imports: &BTreeMap<String, String>) -> String {
    let import_map = serde_json::json!({ "imports": imports })
        .to_string()
        .replace("</", "<\\/");

    let scripts: String = widgets
        .iter()
        .map(|w| format!("  <script type=\"module\" src=\"/{}\"></script>\n", html_escape(&w.file)))
        .collect();

    let sections: String = if widgets.is_empty() {
        "  <p>No widgets found. Add a widget.toml to a widget directory.</p>\n".to_string()
    } else {
        widgets
            .iter()
            .map(|w| {
                format!(
                    "  <section>\n    <h2>&lt;{tag}&gt;</h2>\n    <{tag}></{tag}>\n  </section>\n",
                    tag = w.tag
                )
            })
            .collect()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Mantle Dev</title>
  <style>
    body {{ font-family: system-ui, sans-serif; max-width: 800px; margin: 2rem auto; padding: 0 1rem; }}
    section {{ border: 1px solid #e5e5e5; border-radius: 0.5rem; padding: 1rem; margin-bottom: 1rem; }}
    h2 {{ font-size: 1rem; font-family: monospace; }}
  </style>
  <script type="importmap">{import_map}</script>
{scripts}</head>
<body>
{sections}  <script src="/__hmr.js"></script>
</body>
</html>"#
    )
}

/// Handler for the HMR WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: SharedState) {
    let mut rx = {
        let state = state.read().await;
        state.hmr.subscribe()
    };

    if send_message(&mut socket, &HmrMessage::Connected).await.is_err() {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if send_message(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &HmrMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).unwrap_or_default();
    socket.send(Message::Text(json.into())).await
}

/// Handler for the HMR client script.
async fn hmr_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        hmr_client_script("/__hmr"),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

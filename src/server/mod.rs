//! Development server with live reload
//!
//! Provides a local development server with:
//! - Static file serving from the site directory
//! - Live-reload client injected into every HTML page
//! - WebSocket channel pushing reload and stylesheet messages

mod reload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use colored::Colorize;
use percent_encoding::percent_decode_str;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::runner::TaskContext;
use crate::utils::{clean_path, extension};

pub use reload::{inject_reload_client, ReloadMessage, RELOAD_PATH};

/// Shared server state
pub struct ServerState {
    /// Folder served at `/`
    site_dir: PathBuf,

    /// Live-reload broadcast channel
    reload_tx: broadcast::Sender<ReloadMessage>,
}

/// Development server
pub struct DevServer {
    ctx: TaskContext,
}

impl DevServer {
    /// Create a new development server
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }

    /// Build the router without binding a socket
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            site_dir: self.ctx.config.site_dir(),
            reload_tx: self.ctx.reload_sender(),
        });

        Router::new()
            .route(RELOAD_PATH, get(reload::reload_websocket))
            .fallback(serve_site)
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Start the development server; runs until the process exits
    pub async fn start(&self) -> Result<()> {
        let server = &self.ctx.config.server;

        let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", server.host, server.port))?;

        let url = format!("http://{}:{}", server.host, server.port);

        eprintln!(
            "  {} Serving {} at {}",
            "→".blue(),
            self.ctx.display_path(&self.ctx.config.site_dir()).cyan(),
            url.cyan().underline()
        );

        if server.open {
            if let Err(e) = webbrowser_open(&url) {
                debug!("Failed to open browser: {}", e);
            }
        }

        info!("Server listening on {}", url);

        axum::serve(listener, self.router())
            .await
            .context("Development server stopped")?;

        Ok(())
    }
}

/// Serve a file from the site directory; HTML gets the reload client
async fn serve_site(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let decoded = match percent_decode_str(request.uri().path()).decode_utf8() {
        Ok(path) => path,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid path").into_response(),
    };
    let relative = clean_path(&decoded);
    let mut file_path = state.site_dir.join(relative.trim_start_matches('/'));

    if file_path.is_dir() {
        file_path = file_path.join("index.html");
    }

    if matches!(extension(&file_path).as_str(), "html" | "htm") {
        return serve_html(&file_path).await;
    }

    match ServeDir::new(&state.site_dir).oneshot(request).await {
        Ok(response) => response.map(Body::new).into_response(),
        Err(never) => match never {},
    }
}

async fn serve_html(path: &Path) -> Response {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Html(inject_reload_client(&content)).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
        }
    }
}

/// Open URL in browser (simple implementation)
fn webbrowser_open(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::header;
    use std::fs;

    fn server_for(root: &Path) -> DevServer {
        let site = root.join("app");
        fs::create_dir_all(site.join("css")).unwrap();
        fs::write(site.join("index.html"), "<html><body>home</body></html>").unwrap();
        fs::write(site.join("css/style.min.css"), "body{color:red}").unwrap();
        fs::write(root.join("secret.html"), "<body>secret</body>").unwrap();

        DevServer::new(TaskContext::new(Arc::new(Config::with_root(root))))
    }

    async fn get_path(server: &DevServer, path: &str) -> (StatusCode, String, String) {
        let response = server
            .router()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, content_type, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn test_index_gets_reload_client() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_for(dir.path());

        let (status, content_type, body) = get_path(&server, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains("home"));
        assert!(body.contains(RELOAD_PATH));
    }

    #[tokio::test]
    async fn test_static_files_served_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_for(dir.path());

        let (status, content_type, body) = get_path(&server, "/css/style.min.css").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/css"));
        assert_eq!(body, "body{color:red}");
    }

    #[tokio::test]
    async fn test_traversal_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_for(dir.path());

        let (status, _, _) = get_path(&server, "/../secret.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = get_path(&server, "/%2e%2e/secret.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = get_path(&server, "/missing.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_encoded_html_path_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_for(dir.path());
        fs::write(dir.path().join("app/about us.html"), "<body>about</body>").unwrap();

        let (status, _, body) = get_path(&server, "/about%20us.html").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("about"));
        assert!(body.contains(RELOAD_PATH));
    }

    type Socket = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

    async fn next_message(socket: &mut Socket) -> ReloadMessage {
        use futures_util::StreamExt;
        use tokio_tungstenite::tungstenite::Message;

        match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reload_socket_forwards_messages() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::new(Arc::new(Config::with_root(dir.path())));
        let server = DevServer::new(ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, server.router()).await });

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}{}", addr, RELOAD_PATH))
            .await
            .unwrap();

        assert_eq!(next_message(&mut socket).await, ReloadMessage::Connected);

        ctx.notify(ReloadMessage::Css {
            path: "css/style.min.css".to_string(),
        });
        assert_eq!(
            next_message(&mut socket).await,
            ReloadMessage::Css {
                path: "css/style.min.css".to_string()
            }
        );
    }
}

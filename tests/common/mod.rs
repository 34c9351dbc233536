//! Shared utilities for the integration tests.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use ollama_interceptor::config::InterceptorConfig;
use ollama_interceptor::http::HttpServer;
use ollama_interceptor::lifecycle::{startup, Shutdown};

/// Chunks streamed by the mock `/api/chat` endpoint, one JSON document each.
pub const CHAT_CHUNKS: [&str; 3] = [
    "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
    "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
    "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"eval_count\":2}\n",
];

/// Start a mock inference server on an ephemeral port.
///
/// Routes:
/// - `GET /` plain text banner
/// - `GET /api/tags` single JSON object
/// - `POST /api/chat` NDJSON stream of [`CHAT_CHUNKS`]
/// - `ANY /echo` JSON description of the request it received
/// - anything else: 404 with a plain text body
pub async fn start_mock_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/", get(|| async { "Ollama is running" }))
        .route(
            "/api/tags",
            get(|| async { Json(json!({"models": [{"name": "llama3:latest"}]})) }),
        )
        .route("/api/chat", post(chat_stream))
        .route("/echo", any(echo))
        .fallback(|| async { (StatusCode::NOT_FOUND, "404 page not found") });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn chat_stream() -> impl IntoResponse {
    let stream = futures_util::stream::unfold(0usize, |i| async move {
        if i >= CHAT_CHUNKS.len() {
            return None;
        }
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Some((Ok::<_, Infallible>(Bytes::from_static(CHAT_CHUNKS[i].as_bytes())), i + 1))
    });
    (
        [("content-type", "application/x-ndjson")],
        Body::from_stream(stream),
    )
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let mut seen = serde_json::Map::new();
    for name in headers.keys() {
        let values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        seen.insert(name.as_str().to_string(), Value::Array(values));
    }
    Json(json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "headers": seen,
        "body": String::from_utf8_lossy(&body),
    }))
}

/// Start a raw backend that promises `declared` bytes but sends only
/// `partial` before closing the connection.
pub async fn start_truncating_backend(declared: usize, partial: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    declared, partial
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// A running interceptor writing captures to its own directory.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub log_dir: PathBuf,
    shutdown: Shutdown,
    server: Option<tokio::task::JoinHandle<()>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait until the server has fully stopped.
    pub async fn stop(&mut self) {
        self.shutdown.trigger();
        if let Some(server) = self.server.take() {
            server.await.unwrap();
        }
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
        let _ = std::fs::remove_dir_all(&self.log_dir);
    }
}

/// Start an interceptor in front of `target`.
pub async fn start_proxy(target: &str) -> TestProxy {
    let log_dir = std::env::temp_dir().join(format!("interceptor_it_{}", uuid::Uuid::new_v4()));
    startup::prepare_log_dir(&log_dir).unwrap();
    start_proxy_in(target, log_dir).await
}

/// Start an interceptor capturing into `log_dir`, which is not created.
pub async fn start_proxy_in(target: &str, log_dir: PathBuf) -> TestProxy {
    let mut config = InterceptorConfig::default();
    config.upstream.target = target.to_string();
    config.upstream.connect_timeout_secs = Some(2);
    config.capture.log_dir = log_dir.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let rx = shutdown.subscribe();
    let server = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestProxy {
        addr,
        log_dir,
        shutdown,
        server: Some(server),
    }
}

/// HTTP client that never goes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Poll `dir` until it holds `count` fully written captures, sorted by name.
pub async fn wait_for_captures(dir: &Path, count: usize) -> Vec<(String, Value)> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let captures = read_captures(dir);
        if captures.len() >= count || tokio::time::Instant::now() >= deadline {
            return captures;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Captures currently on disk. Files still being written are skipped.
pub fn read_captures(dir: &Path) -> Vec<(String, Value)> {
    let mut captures: Vec<(String, Value)> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    let data = std::fs::read(e.path()).ok()?;
                    let value = serde_json::from_slice(&data).ok()?;
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default();
    captures.sort_by(|a, b| a.0.cmp(&b.0));
    captures
}

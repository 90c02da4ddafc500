//! Mock troubleshooting backend serving the scripted SSE transcript.

pub mod script;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::CorsLayer;

use crate::agent::config::ServerSettings;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Deserialize)]
struct FreestyleRequest {
    #[serde(default)]
    query: String,
}

#[derive(Clone)]
pub struct MockServer {
    settings: Arc<ServerSettings>,
}

impl MockServer {
    pub fn new(settings: ServerSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/freestyle", post(freestyle))
            .route("/api/replay", get(replay))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .with_state(self.clone())
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("mock backend listening on http://{addr}");
        info!("  POST http://{addr}/freestyle");
        info!("  GET  http://{addr}/api/replay");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .context("mock backend stopped unexpectedly")
    }
}

fn sse_headers() -> [(HeaderName, &'static str); 4] {
    [
        (CONTENT_TYPE, "text/event-stream"),
        (CACHE_CONTROL, "no-cache"),
        (CONNECTION, "keep-alive"),
        (X_ACCEL_BUFFERING, "no"),
    ]
}

async fn freestyle(
    State(server): State<MockServer>,
    Json(request): Json<FreestyleRequest>,
) -> Response {
    info!("received query: {}", request.query);
    let stream_delay = Duration::from_millis(server.settings.stream_delay_ms);
    let step_delay = Duration::from_millis(server.settings.step_delay_ms);

    let (tx, rx) = mpsc::unbounded_channel::<Result<Event, Infallible>>();
    tokio::spawn(async move {
        for emission in script::timeline(stream_delay, step_delay) {
            if !emission.delay.is_zero() {
                tokio::time::sleep(emission.delay).await;
            }
            if tx.send(Ok(Event::default().data(emission.data))).is_err() {
                warn!("client disconnected before the script finished");
                return;
            }
        }
    });

    (sse_headers(), Sse::new(UnboundedReceiverStream::new(rx))).into_response()
}

async fn replay(State(server): State<MockServer>) -> Response {
    let transcript = match &server.settings.transcript {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) => {
                warn!("failed to read transcript {}: {err}", path.display());
                return (StatusCode::INTERNAL_SERVER_ERROR, "transcript unavailable")
                    .into_response();
            }
        },
        None => script::render_transcript(),
    };
    (sse_headers(), transcript).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! HTTP slice/transcript server: a small `axum::Router` exposing health,
//! stream listing, audio slice, and transcript routes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{MatchedPath, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use jamie_core::model::StreamId;
use jamie_core::JamieError;
use jamie_store::Store;
use jamie_transcript::{render_segment, DEFAULT_CONFIDENCE_FLOOR};
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn};

struct AppState {
    store: Arc<Store>,
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_streams_handler(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, AppError> {
    let streams = state.store.list_all_voice_streams().await?;
    Ok(Json(serde_json::json!(streams)))
}

async fn slice_handler(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let start = parse_required_u32(&params, "start")?;
    let end = parse_required_u32(&params, "end")?;

    let stream_id = StreamId::new(stream_id);
    let bytes = jamie_audio::build_slice(&state.store, &stream_id, start, end).await?;

    Ok(([(header::CONTENT_TYPE, "audio/ogg")], bytes).into_response())
}

async fn transcript_handler(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let stream_id = StreamId::new(stream_id);
    let segments = state.store.get_transcript_for_stream(&stream_id).await?;
    let rendered: Vec<_> = segments.iter().map(|s| render_segment(s, DEFAULT_CONFIDENCE_FLOOR)).collect();
    let json = rendered
        .iter()
        .map(|segment| {
            serde_json::json!({
                "id": segment.id.as_str(),
                "isFinal": segment.is_final,
                "version": segment.version,
                "words": segment.words.iter().map(|w| serde_json::json!({
                    "content": w.content,
                    "confidence": w.confidence,
                    "startTime": w.start_time,
                    "duration": w.duration,
                    "isEndOfSentence": w.is_end_of_sentence,
                })).collect::<Vec<_>>(),
            })
        })
        .collect::<Vec<_>>();
    Ok(Json(serde_json::json!(json)))
}

fn parse_required_u32(params: &HashMap<String, String>, key: &str) -> Result<u32, AppError> {
    params
        .get(key)
        .ok_or_else(|| AppError(JamieError::Config(format!("missing query parameter {key:?}"))))?
        .parse()
        .map_err(|_| AppError(JamieError::Config(format!("query parameter {key:?} is not a valid integer"))))
}

struct AppError(JamieError);

impl From<JamieError> for AppError {
    fn from(error: JamieError) -> Self {
        Self(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            JamieError::NotFound(_) => StatusCode::NOT_FOUND,
            JamieError::Config(_) | JamieError::Protocol(_) => StatusCode::BAD_REQUEST,
            JamieError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %self.0, "http request failed");
        (status, self.0.to_string()).into_response()
    }
}

fn create_app(store: Arc<Store>) -> Router {
    let state = Arc::new(AppState { store });

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/streams", get(list_streams_handler))
        .route("/streams/{id}/slice", get(slice_handler))
        .route("/streams/{id}/transcript", get(transcript_handler))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let route = request
                        .extensions()
                        .get::<MatchedPath>()
                        .map_or_else(|| request.uri().path(), MatchedPath::as_str);
                    tracing::info_span!("http_request", http_method = %request.method(), http_route = %route)
                })
                .on_response(DefaultOnResponse::new().level(tracing::Level::DEBUG))
                .on_failure(DefaultOnFailure::new().level(tracing::Level::WARN)),
        )
}

/// Serves the slice/transcript HTTP endpoints on `port`, blocking until a
/// shutdown signal arrives.
///
/// # Errors
/// Returns a `JamieError::Transport`-shaped protocol error if the listener
/// cannot bind, or propagates whatever `axum::serve` surfaces.
pub async fn start_server(store: Arc<Store>, port: u16) -> jamie_core::Result<()> {
    let app = create_app(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| JamieError::Protocol(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, "starting http api server");

    let shutdown_signal = async {
        let ctrl_c = async {
            #[allow(clippy::expect_used)]
            tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
        };

        #[cfg(unix)]
        let terminate = async {
            #[allow(clippy::expect_used)]
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("received ctrl-c; shutting down"),
            () = terminate => info!("received sigterm; shutting down"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| JamieError::Protocol(format!("http server error: {e}")))?;

    warn!("http api server stopped");
    Ok(())
}

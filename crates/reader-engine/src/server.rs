//! Optional local control-plane HTTP API, so a UI shell (out of scope here)
//! can drive the engine/queue over loopback HTTP instead of linking the
//! crate directly.
//!
//! Route shape and CORS-permissive setup are the direct carry-over from
//! `nayru-app`'s own `/speak /stop /skip /pause /resume /status` router,
//! just re-pointed at [`PlaybackEngine`] and [`QueueController`] instead of
//! the old Kokoro `TtsEngine`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::engine::{EngineStatus, PlaybackEngine};
use crate::queue::QueueController;

#[derive(Clone)]
pub struct ApiState {
    pub engine: PlaybackEngine,
    pub queue: Arc<QueueController>,
}

/// Default port for the local control-plane API.
pub const DEFAULT_PORT: u16 = 4417;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/play", post(play))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/stop", post(stop))
        .route("/skip", post(skip_forward))
        .route("/skip-back", post(skip_backward))
        .route("/status", get(status))
        .route("/queue", get(queue_list))
        .route("/queue/{id}/play", post(queue_play))
        .route("/queue/next", post(queue_next))
        .route("/queue/previous", post(queue_previous))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct OkResponse {
    ok: bool,
}

async fn play(State(state): State<ApiState>) -> Json<OkResponse> {
    state.engine.play();
    Json(OkResponse { ok: true })
}

async fn pause(State(state): State<ApiState>) -> Json<OkResponse> {
    state.engine.pause();
    Json(OkResponse { ok: true })
}

async fn resume(State(state): State<ApiState>) -> Json<OkResponse> {
    state.engine.resume();
    Json(OkResponse { ok: true })
}

async fn stop(State(state): State<ApiState>) -> Json<OkResponse> {
    state.engine.stop();
    Json(OkResponse { ok: true })
}

async fn skip_forward(State(state): State<ApiState>) -> Json<OkResponse> {
    state.engine.skip_forward();
    Json(OkResponse { ok: true })
}

async fn skip_backward(State(state): State<ApiState>) -> Json<OkResponse> {
    state.engine.skip_backward();
    Json(OkResponse { ok: true })
}

async fn status(State(state): State<ApiState>) -> Json<EngineStatus> {
    Json(state.engine.status())
}

async fn queue_list(State(state): State<ApiState>) -> Json<Vec<reader_core::types::QueueItem>> {
    Json(state.queue.items())
}

async fn queue_play(State(state): State<ApiState>, Path(id): Path<String>) -> Json<OkResponse> {
    let ok = state.queue.play_item(&id).await.is_ok();
    if ok {
        state.engine.play();
    }
    Json(OkResponse { ok })
}

async fn queue_next(State(state): State<ApiState>) -> Json<OkResponse> {
    let ok = state.queue.play_next().await.is_ok();
    Json(OkResponse { ok })
}

async fn queue_previous(State(state): State<ApiState>) -> Json<OkResponse> {
    let ok = state.queue.play_previous().await.is_ok();
    Json(OkResponse { ok })
}

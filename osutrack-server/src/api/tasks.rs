//! Pipeline triggers and progress polling
//!
//! Only one run per pipeline kind may be active. The check happens here,
//! before the coordinator is spawned, so a second request gets 409 instead
//! of queueing.

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use osutrack_common::progress::TaskRegistrySnapshot;
use osutrack_ingest::{ScanCoordinator, SyncCoordinator, SyncOptions};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{ApiError, ApiResult, AppState};

/// Response for an accepted trigger
#[derive(Debug, Serialize)]
pub struct TaskStarted {
    pub status: &'static str,
    pub task: &'static str,
}

/// POST /api/sync-beatmaps
pub async fn start_sync(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<TaskStarted>)> {
    let paths = state.osu_paths().await?;
    let progress = state.tasks.sync.clone();
    if !progress.try_begin("Starting beatmap sync...") {
        return Err(ApiError::Conflict("Beatmap sync is already running".to_string()));
    }

    let options = SyncOptions::from_config(&state.pipeline_config().await);
    let coordinator = SyncCoordinator::new(state.db.clone(), Arc::clone(&state.calculator), progress, options);
    info!(folder = %paths.root().display(), "Beatmap sync requested");

    tokio::spawn(async move {
        if let Ok(summary) = coordinator.run(&paths).await {
            debug!(?summary, "Background beatmap sync done");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TaskStarted {
            status: "started",
            task: "sync",
        }),
    ))
}

/// POST /api/scan
pub async fn start_scan(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<TaskStarted>)> {
    let paths = state.osu_paths().await?;
    let progress = state.tasks.scan.clone();
    if !progress.try_begin("Starting replay scan...") {
        return Err(ApiError::Conflict("Replay scan is already running".to_string()));
    }

    let pipeline = state.pipeline_config().await;
    let coordinator = ScanCoordinator::from_config(state.db.clone(), Arc::clone(&state.calculator), progress, &pipeline);
    info!(folder = %paths.root().display(), "Replay scan requested");

    tokio::spawn(async move {
        if let Ok(summary) = coordinator.run(&paths).await {
            debug!(?summary, "Background replay scan done");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TaskStarted {
            status: "started",
            task: "scan",
        }),
    ))
}

/// GET /api/progress-status
pub async fn progress_status(State(state): State<AppState>) -> Json<TaskRegistrySnapshot> {
    Json(state.tasks.snapshot())
}

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sync-beatmaps", post(start_sync))
        .route("/api/scan", post(start_scan))
        .route("/api/progress-status", get(progress_status))
}

//! Static files (audio, backgrounds) from the Songs folder

use axum::{
    extract::{Path, Request, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use osutrack_common::config::safe_join;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{ApiError, ApiResult, AppState};

/// GET /api/songs/*path
pub async fn serve_song_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let songs_dir = state.osu_paths().await?.songs_dir();
    let parts: Vec<&str> = path.split('/').collect();
    let file = safe_join(&songs_dir, &parts)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid file path: {path}")))?;
    if !file.is_file() {
        return Err(ApiError::NotFound(format!("No such file: {path}")));
    }

    match ServeFile::new(file).oneshot(request).await {
        Ok(response) => Ok(response.into_response()),
        Err(never) => match never {},
    }
}

pub fn song_routes() -> Router<AppState> {
    Router::new().route("/api/songs/*path", get(serve_song_file))
}

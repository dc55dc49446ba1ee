//! Player listing, statistics and difficulty suggestions

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use osutrack_common::db::replays::list_players;
use osutrack_common::mods::parse_mods;
use osutrack_recommend::{player_stats, suggest_stars, PlayerStats, StarSuggestion};
use serde::{Deserialize, Serialize};

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct PlayersResponse {
    pub players: Vec<String>,
    pub default_player: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestParams {
    /// Integer mask or acronyms ("HDDT")
    pub mods: Option<String>,
}

/// GET /api/players
pub async fn get_players(State(state): State<AppState>) -> ApiResult<Json<PlayersResponse>> {
    let players = list_players(&state.db).await?;
    Ok(Json(PlayersResponse {
        players,
        default_player: state.default_player().await,
    }))
}

/// GET /api/players/:name/stats
pub async fn get_player_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<PlayerStats>> {
    Ok(Json(player_stats(&state.db, &name).await?))
}

/// GET /api/players/:name/suggest-sr?mods
pub async fn get_star_suggestion(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<SuggestParams>,
) -> ApiResult<Json<StarSuggestion>> {
    let mods = parse_mods(params.mods.as_deref().unwrap_or_default())?;
    suggest_stars(&state.db, &name, mods)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No analyzed plays for {name} with these mods")))
}

pub fn player_routes() -> Router<AppState> {
    Router::new()
        .route("/api/players", get(get_players))
        .route("/api/players/:name/stats", get(get_player_stats))
        .route("/api/players/:name/suggest-sr", get(get_star_suggestion))
}

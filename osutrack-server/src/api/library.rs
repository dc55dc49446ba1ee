//! Beatmap and replay browsing

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use osutrack_common::db::beatmaps::{list_beatmaps, load_beatmap};
use osutrack_common::db::replays::{latest_replay, list_replays};
use osutrack_common::db::{BeatmapRecord, Page, PageQuery, ReplayRecord};
use osutrack_common::scoring::{accuracy, replay_rank, round2};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::{ApiError, ApiResult, AppState};

/// Replay listing filter
///
/// An absent `player_name` means the configured default player; an empty one
/// lists every player.
#[derive(Debug, Default, Deserialize)]
pub struct ReplayListParams {
    pub player_name: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

impl ReplayListParams {
    fn page_query(&self) -> PageQuery {
        let defaults = PageQuery::default();
        PageQuery {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
            search: self.search.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestReplayParams {
    pub player_name: Option<String>,
}

/// A replay with the values computed for display
#[derive(Debug, Serialize)]
pub struct ReplayView {
    #[serde(flatten)]
    pub replay: ReplayRecord,
    pub rank: &'static str,
    /// Percent, two decimals
    pub accuracy: f64,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub difficulty: Option<String>,
}

impl ReplayView {
    fn new(replay: ReplayRecord, beatmap: Option<&BeatmapRecord>) -> Self {
        Self {
            rank: replay_rank(&replay, beatmap),
            accuracy: round2(accuracy(replay.game_mode, &replay.hits)),
            artist: beatmap.map(|b| b.artist.clone()),
            title: beatmap.map(|b| b.title.clone()),
            difficulty: beatmap.map(|b| b.difficulty.clone()),
            replay,
        }
    }
}

async fn resolve_player(state: &AppState, requested: Option<String>) -> Option<String> {
    match requested {
        Some(name) if name.trim().is_empty() => None,
        Some(name) => Some(name),
        None => state.default_player().await,
    }
}

async fn replay_views(pool: &SqlitePool, replays: Vec<ReplayRecord>) -> ApiResult<Vec<ReplayView>> {
    let mut beatmaps: HashMap<String, Option<BeatmapRecord>> = HashMap::new();
    let mut views = Vec::with_capacity(replays.len());
    for replay in replays {
        if !beatmaps.contains_key(&replay.beatmap_md5) {
            let beatmap = load_beatmap(pool, &replay.beatmap_md5).await?;
            beatmaps.insert(replay.beatmap_md5.clone(), beatmap);
        }
        let beatmap = beatmaps.get(&replay.beatmap_md5).and_then(Option::as_ref);
        views.push(ReplayView::new(replay, beatmap));
    }
    Ok(views)
}

/// GET /api/beatmaps?page&limit&search
pub async fn get_beatmaps(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<BeatmapRecord>>> {
    Ok(Json(list_beatmaps(&state.db, &query).await?))
}

/// GET /api/replays?player_name&page&limit&search
pub async fn get_replays(
    State(state): State<AppState>,
    Query(params): Query<ReplayListParams>,
) -> ApiResult<Json<Page<ReplayView>>> {
    let query = params.page_query();
    let player = resolve_player(&state, params.player_name).await;

    let page = list_replays(&state.db, player.as_deref(), &query).await?;
    let items = replay_views(&state.db, page.items).await?;

    Ok(Json(Page {
        items,
        total: page.total,
        page: page.page,
        limit: page.limit,
    }))
}

/// GET /api/replays/latest?player_name
pub async fn get_latest_replay(
    State(state): State<AppState>,
    Query(params): Query<LatestReplayParams>,
) -> ApiResult<Json<ReplayView>> {
    let player = resolve_player(&state, params.player_name).await;
    let replay = latest_replay(&state.db, player.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound("No replays recorded yet".to_string()))?;

    let mut views = replay_views(&state.db, vec![replay]).await?;
    views
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No replays recorded yet".to_string()))
}

pub fn library_routes() -> Router<AppState> {
    Router::new()
        .route("/api/beatmaps", get(get_beatmaps))
        .route("/api/replays", get(get_replays))
        .route("/api/replays/latest", get(get_latest_replay))
}

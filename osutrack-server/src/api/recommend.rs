//! Beatmap recommendation endpoint

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use osutrack_common::mods::parse_mods;
use osutrack_recommend::{Focus, RecommendQuery, Recommendation};
use serde::Deserialize;

use crate::{ApiError, ApiResult, AppState};

/// Raw query parameters; numbers are parsed here so bad values get a JSON error
#[derive(Debug, Default, Deserialize)]
pub struct RecommendParams {
    pub sr: Option<String>,
    pub bpm: Option<String>,
    pub mods: Option<String>,
    pub focus: Option<String>,
    /// Comma-separated beatmap hashes
    pub exclude: Option<String>,
}

impl RecommendParams {
    fn to_query(&self) -> ApiResult<RecommendQuery> {
        let target = required_number("sr", self.sr.as_deref())?;
        let max_bpm = required_number("bpm", self.bpm.as_deref())?;
        let mods = parse_mods(self.mods.as_deref().unwrap_or_default())?;
        let focus = Focus::parse_optional(self.focus.as_deref())?;
        let exclude = self
            .exclude
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty());

        Ok(RecommendQuery::new(target, max_bpm)
            .with_mods(mods)
            .with_focus(focus)
            .excluding(exclude))
    }
}

fn required_number(name: &str, value: Option<&str>) -> ApiResult<f64> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing parameter: {name}")))?;
    value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid number for {name}: {value}")))
}

/// GET /api/recommend?sr&bpm&mods&focus&exclude
pub async fn get_recommendation(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> ApiResult<Json<Recommendation>> {
    let query = params.to_query()?;
    let recommender = state.recommender().await?;
    recommender
        .recommend(&query)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No beatmap matches the requested difficulty".to_string()))
}

pub fn recommend_routes() -> Router<AppState> {
    Router::new().route("/api/recommend", get(get_recommendation))
}

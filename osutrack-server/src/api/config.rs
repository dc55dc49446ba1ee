//! Configuration read and update

use axum::{extract::State, routing::get, Json, Router};
use osutrack_common::config::{write_toml_config, TomlConfig};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use crate::{ApiError, ApiResult, AppState};

/// Partial update; an empty string clears the field
#[derive(Debug, Default, Deserialize)]
pub struct ConfigUpdate {
    pub osu_folder: Option<String>,
    pub default_player: Option<String>,
}

/// GET /api/config
pub async fn get_config(State(state): State<AppState>) -> Json<TomlConfig> {
    Json(state.config.read().await.clone())
}

/// POST /api/config
pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> ApiResult<Json<TomlConfig>> {
    let mut config = state.config.write().await;
    let mut updated = config.clone();

    if let Some(folder) = update.osu_folder.map(|f| f.trim().to_string()) {
        if folder.is_empty() {
            updated.osu_folder = None;
        } else {
            let folder = PathBuf::from(folder);
            if !folder.is_dir() {
                return Err(ApiError::BadRequest(format!(
                    "osu! folder does not exist: {}",
                    folder.display()
                )));
            }
            updated.osu_folder = Some(folder);
        }
    }

    if let Some(player) = update.default_player.map(|p| p.trim().to_string()) {
        updated.default_player = (!player.is_empty()).then_some(player);
    }

    write_toml_config(&updated, &state.config_path)?;
    info!(path = %state.config_path.display(), "Configuration updated");
    *config = updated.clone();

    Ok(Json(updated))
}

pub fn config_routes() -> Router<AppState> {
    Router::new().route("/api/config", get(get_config).post(update_config))
}

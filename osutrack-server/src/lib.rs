//! # osutrack server
//!
//! Application state and HTTP router behind the `osutrack serve` command.
//! The pipelines run in background tasks; callers poll their progress.

pub mod api;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use osutrack_common::config::{resolve_default_player, resolve_osu_folder, OsuPaths, PipelineConfig, TomlConfig};
use osutrack_common::difficulty::DifficultyCalculator;
use osutrack_common::TaskRegistry;
use osutrack_recommend::{Recommender, RecommenderOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// One progress handle per pipeline kind
    pub tasks: TaskRegistry,
    pub calculator: Arc<dyn DifficultyCalculator>,
    /// Live configuration, rewritten by `POST /api/config`
    pub config: Arc<RwLock<TomlConfig>>,
    pub config_path: PathBuf,
    /// osu! folder given on the command line; wins over env and TOML
    pub osu_folder_override: Option<PathBuf>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        calculator: Arc<dyn DifficultyCalculator>,
        config: TomlConfig,
        config_path: PathBuf,
    ) -> Self {
        Self {
            db,
            tasks: TaskRegistry::new(),
            calculator,
            config: Arc::new(RwLock::new(config)),
            config_path,
            osu_folder_override: None,
            startup_time: Utc::now(),
        }
    }

    pub fn with_osu_folder(mut self, folder: Option<PathBuf>) -> Self {
        self.osu_folder_override = folder;
        self
    }

    /// Paths inside the resolved osu! folder
    pub async fn osu_paths(&self) -> ApiResult<OsuPaths> {
        let config = self.config.read().await;
        resolve_osu_folder(self.osu_folder_override.as_deref(), &config)
            .map(OsuPaths::new)
            .ok_or_else(|| ApiError::BadRequest("osu! folder is not configured".to_string()))
    }

    pub async fn pipeline_config(&self) -> PipelineConfig {
        self.config.read().await.pipeline.clone()
    }

    pub async fn default_player(&self) -> Option<String> {
        resolve_default_player(&*self.config.read().await)
    }

    pub async fn recommender(&self) -> ApiResult<Recommender> {
        let paths = self.osu_paths().await?;
        let options = RecommenderOptions::from_config(&self.pipeline_config().await);
        Ok(Recommender::new(
            self.db.clone(),
            Arc::clone(&self.calculator),
            paths.songs_dir(),
            options,
        ))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::task_routes())
        .merge(api::library_routes())
        .merge(api::player_routes())
        .merge(api::recommend_routes())
        .merge(api::config_routes())
        .merge(api::song_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

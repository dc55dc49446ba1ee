//! Database initialization
//!
//! Opens (creating if needed) the SQLite file and creates every table
//! idempotently, so startup is safe against both fresh and existing files.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a writer waits on a locked database before failing
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_beatmaps_table(pool).await?;
    create_beatmap_mod_cache_table(pool).await?;
    create_replays_table(pool).await?;
    create_replay_sources_table(pool).await?;
    Ok(())
}

async fn create_beatmaps_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS beatmaps (
            md5_hash TEXT PRIMARY KEY,
            artist TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            creator TEXT NOT NULL DEFAULT '',
            difficulty TEXT NOT NULL DEFAULT '',
            folder_name TEXT NOT NULL DEFAULT '',
            osu_file_name TEXT NOT NULL DEFAULT '',
            game_mode INTEGER NOT NULL DEFAULT 0,
            num_hitcircles INTEGER NOT NULL DEFAULT 0,
            num_sliders INTEGER NOT NULL DEFAULT 0,
            num_spinners INTEGER NOT NULL DEFAULT 0,
            ar REAL NOT NULL DEFAULT 0,
            cs REAL NOT NULL DEFAULT 0,
            hp REAL NOT NULL DEFAULT 0,
            od REAL NOT NULL DEFAULT 0,
            grades TEXT NOT NULL DEFAULT '{}',
            last_played_at TIMESTAMP,
            bpm REAL NOT NULL DEFAULT 0,
            bpm_min REAL,
            bpm_max REAL,
            audio_file TEXT,
            background_file TEXT,
            stars REAL,
            max_combo INTEGER,
            aim REAL,
            speed REAL,
            slider_factor REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_beatmaps_mode_stars ON beatmaps(game_mode, stars)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_beatmap_mod_cache_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS beatmap_mod_cache (
            md5_hash TEXT NOT NULL REFERENCES beatmaps(md5_hash) ON DELETE CASCADE,
            mods INTEGER NOT NULL,
            stars REAL NOT NULL,
            ar REAL NOT NULL,
            od REAL NOT NULL,
            cs REAL NOT NULL,
            hp REAL NOT NULL,
            bpm REAL NOT NULL,
            max_combo INTEGER NOT NULL,
            aim REAL NOT NULL,
            speed REAL NOT NULL,
            slider_factor REAL NOT NULL,
            PRIMARY KEY (md5_hash, mods)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mod_cache_mods_stars ON beatmap_mod_cache(mods, stars)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_replays_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS replays (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            replay_md5 TEXT NOT NULL UNIQUE,
            beatmap_md5 TEXT NOT NULL,
            source_file TEXT,
            game_mode INTEGER NOT NULL,
            game_version INTEGER NOT NULL,
            player_name TEXT NOT NULL,
            num_300s INTEGER NOT NULL,
            num_100s INTEGER NOT NULL,
            num_50s INTEGER NOT NULL,
            num_gekis INTEGER NOT NULL,
            num_katus INTEGER NOT NULL,
            num_misses INTEGER NOT NULL,
            total_score INTEGER NOT NULL,
            max_combo INTEGER NOT NULL,
            perfect INTEGER NOT NULL,
            mods_used INTEGER NOT NULL,
            played_at TIMESTAMP,
            pp REAL,
            stars REAL,
            map_max_combo INTEGER,
            bpm REAL,
            bpm_min REAL,
            bpm_max REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_replays_player ON replays(player_name, played_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_replays_source_file ON replays(source_file)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Every scanned file stem, including extra copies of an already stored replay
async fn create_replay_sources_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS replay_sources (
            stem TEXT PRIMARY KEY,
            replay_md5 TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

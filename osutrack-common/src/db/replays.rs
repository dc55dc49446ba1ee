//! Replay (session record) persistence
//!
//! Derived fields are only written while the stored `pp` is still NULL, so
//! backfilling never downgrades an enriched record.

use super::models::{HitCounts, Page, PageQuery, ReplayRecord};
use crate::mods::STANDARD_MODE;
use crate::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;

const REPLAY_COLUMNS: &str = "r.replay_md5, r.beatmap_md5, r.source_file, r.game_mode, \
    r.game_version, r.player_name, r.num_300s, r.num_100s, r.num_50s, r.num_gekis, r.num_katus, \
    r.num_misses, r.total_score, r.max_combo, r.perfect, r.mods_used, r.played_at, r.pp, r.stars, \
    r.map_max_combo, r.bpm, r.bpm_min, r.bpm_max";

/// Insert a replay, or backfill derived fields of an unenriched one
pub async fn upsert_replay(conn: &mut SqliteConnection, replay: &ReplayRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO replays (
            replay_md5, beatmap_md5, source_file, game_mode, game_version, player_name,
            num_300s, num_100s, num_50s, num_gekis, num_katus, num_misses,
            total_score, max_combo, perfect, mods_used, played_at,
            pp, stars, map_max_combo, bpm, bpm_min, bpm_max
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(replay_md5) DO UPDATE SET
            pp = excluded.pp,
            stars = excluded.stars,
            map_max_combo = excluded.map_max_combo,
            bpm = excluded.bpm,
            bpm_min = excluded.bpm_min,
            bpm_max = excluded.bpm_max,
            source_file = COALESCE(replays.source_file, excluded.source_file)
        WHERE replays.pp IS NULL
        "#,
    )
    .bind(&replay.replay_md5)
    .bind(&replay.beatmap_md5)
    .bind(&replay.source_file)
    .bind(replay.game_mode)
    .bind(replay.game_version)
    .bind(&replay.player_name)
    .bind(replay.hits.n300)
    .bind(replay.hits.n100)
    .bind(replay.hits.n50)
    .bind(replay.hits.n_geki)
    .bind(replay.hits.n_katu)
    .bind(replay.hits.n_miss)
    .bind(replay.total_score)
    .bind(replay.max_combo)
    .bind(replay.perfect)
    .bind(replay.mods_used)
    .bind(replay.played_at)
    .bind(replay.pp)
    .bind(replay.stars)
    .bind(replay.map_max_combo)
    .bind(replay.bpm)
    .bind(replay.bpm_min)
    .bind(replay.bpm_max)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Remember that the file `stem` decoded to `replay_md5`
///
/// Written apart from the replay upsert so a second file carrying an already
/// enriched replay is still recorded as scanned.
pub async fn record_replay_source(
    conn: &mut SqliteConnection,
    stem: &str,
    replay_md5: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO replay_sources (stem, replay_md5) VALUES (?, ?)
        ON CONFLICT(stem) DO UPDATE SET replay_md5 = excluded.replay_md5
        "#,
    )
    .bind(stem)
    .bind(replay_md5)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Replay hashes and scanned file stems already persisted
///
/// Scan deltas are computed against this set from file names alone.
pub async fn known_replay_keys(pool: &SqlitePool) -> Result<HashSet<String>> {
    let rows = sqlx::query(
        r#"
        SELECT replay_md5 AS key FROM replays
        UNION
        SELECT source_file AS key FROM replays WHERE source_file IS NOT NULL
        UNION
        SELECT stem AS key FROM replay_sources
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| Ok(row.try_get::<String, _>("key")?))
        .collect()
}

pub async fn load_replay(pool: &SqlitePool, replay_md5: &str) -> Result<Option<ReplayRecord>> {
    let sql = format!("SELECT {REPLAY_COLUMNS} FROM replays r WHERE r.replay_md5 = ?");
    let row = sqlx::query(&sql)
        .bind(replay_md5)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(replay_from_row).transpose()
}

pub async fn count_replays(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM replays")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Paged replay listing, newest first
///
/// The search term matches the referenced beatmap's artist, title or
/// difficulty name.
pub async fn list_replays(
    pool: &SqlitePool,
    player_name: Option<&str>,
    query: &PageQuery,
) -> Result<Page<ReplayRecord>> {
    const FILTER: &str = "(?1 IS NULL OR r.player_name = ?1) AND (?2 IS NULL \
        OR b.artist LIKE ?2 OR b.title LIKE ?2 OR b.difficulty LIKE ?2)";

    let pattern = query.like_pattern();
    let limit = query.effective_limit();

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM replays r LEFT JOIN beatmaps b ON b.md5_hash = r.beatmap_md5 \
         WHERE {FILTER}"
    ))
    .bind(player_name)
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT {REPLAY_COLUMNS} FROM replays r LEFT JOIN beatmaps b ON b.md5_hash = r.beatmap_md5 \
         WHERE {FILTER} ORDER BY r.played_at DESC, r.id DESC LIMIT ?3 OFFSET ?4"
    );
    let rows = sqlx::query(&sql)
        .bind(player_name)
        .bind(&pattern)
        .bind(i64::from(limit))
        .bind(query.offset())
        .fetch_all(pool)
        .await?;

    let items = rows.iter().map(replay_from_row).collect::<Result<Vec<_>>>()?;

    Ok(Page {
        items,
        total,
        page: query.page.max(1),
        limit,
    })
}

/// Most recent replay, optionally for one player
pub async fn latest_replay(
    pool: &SqlitePool,
    player_name: Option<&str>,
) -> Result<Option<ReplayRecord>> {
    let sql = format!(
        "SELECT {REPLAY_COLUMNS} FROM replays r WHERE (?1 IS NULL OR r.player_name = ?1) \
         ORDER BY r.played_at DESC, r.id DESC LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(player_name)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(replay_from_row).transpose()
}

/// Distinct player names, alphabetical
pub async fn list_players(pool: &SqlitePool) -> Result<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT player_name FROM replays WHERE player_name != '' ORDER BY player_name",
    )
    .fetch_all(pool)
    .await?;
    Ok(names)
}

/// Performance values of a player's enriched plays
pub async fn player_pp_values(pool: &SqlitePool, player_name: &str) -> Result<Vec<f64>> {
    let values: Vec<f64> = sqlx::query_scalar(
        "SELECT pp FROM replays WHERE player_name = ? AND pp IS NOT NULL ORDER BY pp DESC",
    )
    .bind(player_name)
    .fetch_all(pool)
    .await?;
    Ok(values)
}

pub async fn player_play_count(pool: &SqlitePool, player_name: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM replays WHERE player_name = ?")
        .bind(player_name)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Difficulty scores of the player's most recent standard-mode plays whose
/// `mask` bits equal `mods`
pub async fn recent_play_stars(
    pool: &SqlitePool,
    player_name: &str,
    mask: u32,
    mods: u32,
    limit: u32,
) -> Result<Vec<f64>> {
    let values: Vec<f64> = sqlx::query_scalar(
        r#"
        SELECT stars FROM replays
        WHERE player_name = ? AND game_mode = ? AND stars IS NOT NULL
          AND (mods_used & ?) = ?
        ORDER BY played_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(player_name)
    .bind(STANDARD_MODE)
    .bind(mask)
    .bind(mods & mask)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(values)
}

/// Map a row selected with the replay column list
pub fn replay_from_row(row: &SqliteRow) -> Result<ReplayRecord> {
    Ok(ReplayRecord {
        replay_md5: row.try_get("replay_md5")?,
        beatmap_md5: row.try_get("beatmap_md5")?,
        source_file: row.try_get("source_file")?,
        game_mode: row.try_get("game_mode")?,
        game_version: row.try_get("game_version")?,
        player_name: row.try_get("player_name")?,
        hits: HitCounts {
            n300: row.try_get("num_300s")?,
            n100: row.try_get("num_100s")?,
            n50: row.try_get("num_50s")?,
            n_geki: row.try_get("num_gekis")?,
            n_katu: row.try_get("num_katus")?,
            n_miss: row.try_get("num_misses")?,
        },
        total_score: row.try_get("total_score")?,
        max_combo: row.try_get("max_combo")?,
        perfect: row.try_get("perfect")?,
        mods_used: row.try_get("mods_used")?,
        played_at: row.try_get("played_at")?,
        pp: row.try_get("pp")?,
        stars: row.try_get("stars")?,
        map_max_combo: row.try_get("map_max_combo")?,
        bpm: row.try_get("bpm")?,
        bpm_min: row.try_get("bpm_min")?,
        bpm_max: row.try_get("bpm_max")?,
    })
}

//! Modifier difficulty cache
//!
//! Derived data only: an upsert replaces every field of the snapshot.

use super::models::ModDifficultySnapshot;
use crate::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Insert or fully overwrite one snapshot
pub async fn upsert_mod_snapshot(
    conn: &mut SqliteConnection,
    snapshot: &ModDifficultySnapshot,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO beatmap_mod_cache (
            md5_hash, mods, stars, ar, od, cs, hp, bpm, max_combo, aim, speed, slider_factor
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(md5_hash, mods) DO UPDATE SET
            stars = excluded.stars,
            ar = excluded.ar,
            od = excluded.od,
            cs = excluded.cs,
            hp = excluded.hp,
            bpm = excluded.bpm,
            max_combo = excluded.max_combo,
            aim = excluded.aim,
            speed = excluded.speed,
            slider_factor = excluded.slider_factor
        "#,
    )
    .bind(&snapshot.md5_hash)
    .bind(snapshot.mods)
    .bind(snapshot.stars)
    .bind(snapshot.ar)
    .bind(snapshot.od)
    .bind(snapshot.cs)
    .bind(snapshot.hp)
    .bind(snapshot.bpm)
    .bind(snapshot.max_combo)
    .bind(snapshot.aim)
    .bind(snapshot.speed)
    .bind(snapshot.slider_factor)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load the snapshot for one (beatmap, modifier mask) key
pub async fn load_mod_snapshot(
    pool: &SqlitePool,
    md5_hash: &str,
    mods: u32,
) -> Result<Option<ModDifficultySnapshot>> {
    let row = sqlx::query(
        r#"
        SELECT md5_hash, mods, stars, ar, od, cs, hp, bpm, max_combo, aim, speed, slider_factor
        FROM beatmap_mod_cache
        WHERE md5_hash = ? AND mods = ?
        "#,
    )
    .bind(md5_hash)
    .bind(mods)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(snapshot_from_row).transpose()
}

/// Number of cached snapshots
pub async fn count_mod_snapshots(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM beatmap_mod_cache")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Map a `beatmap_mod_cache` row
pub fn snapshot_from_row(row: &SqliteRow) -> Result<ModDifficultySnapshot> {
    Ok(ModDifficultySnapshot {
        md5_hash: row.try_get("md5_hash")?,
        mods: row.try_get("mods")?,
        stars: row.try_get("stars")?,
        ar: row.try_get("ar")?,
        od: row.try_get("od")?,
        cs: row.try_get("cs")?,
        hp: row.try_get("hp")?,
        bpm: row.try_get("bpm")?,
        max_combo: row.try_get("max_combo")?,
        aim: row.try_get("aim")?,
        speed: row.try_get("speed")?,
        slider_factor: row.try_get("slider_factor")?,
    })
}

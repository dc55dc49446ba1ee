//! Beatmap (content record) persistence
//!
//! Authoritative fields are overwritten on every upsert; enrichment fields
//! keep their stored value when the incoming record leaves them empty.

use super::models::{BeatmapDetails, BeatmapRecord, Grades, Page, PageQuery};
use crate::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};

/// Column list matching [`beatmap_from_row`]
pub const BEATMAP_COLUMNS: &str = "b.md5_hash, b.artist, b.title, b.creator, b.difficulty, \
    b.folder_name, b.osu_file_name, b.game_mode, b.num_hitcircles, b.num_sliders, b.num_spinners, \
    b.ar, b.cs, b.hp, b.od, b.grades, b.last_played_at, b.bpm, b.bpm_min, b.bpm_max, \
    b.audio_file, b.background_file, b.stars, b.max_combo, b.aim, b.speed, b.slider_factor";

/// Insert or update one beatmap
pub async fn upsert_beatmap(conn: &mut SqliteConnection, beatmap: &BeatmapRecord) -> Result<()> {
    let grades = serde_json::to_string(&beatmap.grades)?;

    sqlx::query(
        r#"
        INSERT INTO beatmaps (
            md5_hash, artist, title, creator, difficulty, folder_name, osu_file_name,
            game_mode, num_hitcircles, num_sliders, num_spinners, ar, cs, hp, od,
            grades, last_played_at, bpm, bpm_min, bpm_max, audio_file, background_file,
            stars, max_combo, aim, speed, slider_factor
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(md5_hash) DO UPDATE SET
            artist = excluded.artist,
            title = excluded.title,
            creator = excluded.creator,
            difficulty = excluded.difficulty,
            folder_name = excluded.folder_name,
            osu_file_name = excluded.osu_file_name,
            game_mode = excluded.game_mode,
            num_hitcircles = excluded.num_hitcircles,
            num_sliders = excluded.num_sliders,
            num_spinners = excluded.num_spinners,
            ar = excluded.ar,
            cs = excluded.cs,
            hp = excluded.hp,
            od = excluded.od,
            grades = excluded.grades,
            last_played_at = excluded.last_played_at,
            bpm = excluded.bpm,
            bpm_min = COALESCE(excluded.bpm_min, beatmaps.bpm_min),
            bpm_max = COALESCE(excluded.bpm_max, beatmaps.bpm_max),
            audio_file = COALESCE(excluded.audio_file, beatmaps.audio_file),
            background_file = COALESCE(excluded.background_file, beatmaps.background_file),
            stars = COALESCE(excluded.stars, beatmaps.stars),
            max_combo = COALESCE(excluded.max_combo, beatmaps.max_combo),
            aim = COALESCE(excluded.aim, beatmaps.aim),
            speed = COALESCE(excluded.speed, beatmaps.speed),
            slider_factor = COALESCE(excluded.slider_factor, beatmaps.slider_factor)
        "#,
    )
    .bind(&beatmap.md5_hash)
    .bind(&beatmap.artist)
    .bind(&beatmap.title)
    .bind(&beatmap.creator)
    .bind(&beatmap.difficulty)
    .bind(&beatmap.folder_name)
    .bind(&beatmap.osu_file_name)
    .bind(beatmap.game_mode)
    .bind(beatmap.num_hitcircles)
    .bind(beatmap.num_sliders)
    .bind(beatmap.num_spinners)
    .bind(beatmap.ar)
    .bind(beatmap.cs)
    .bind(beatmap.hp)
    .bind(beatmap.od)
    .bind(grades)
    .bind(beatmap.last_played_at)
    .bind(beatmap.bpm)
    .bind(beatmap.bpm_min)
    .bind(beatmap.bpm_max)
    .bind(&beatmap.audio_file)
    .bind(&beatmap.background_file)
    .bind(beatmap.stars)
    .bind(beatmap.max_combo)
    .bind(beatmap.aim)
    .bind(beatmap.speed)
    .bind(beatmap.slider_factor)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Upsert many beatmaps in one transaction; returns the number written
pub async fn upsert_beatmaps<'a, I>(pool: &SqlitePool, beatmaps: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a BeatmapRecord>,
{
    let mut tx = pool.begin().await?;
    let mut written = 0;
    for beatmap in beatmaps {
        upsert_beatmap(&mut tx, beatmap).await?;
        written += 1;
    }
    tx.commit().await?;
    Ok(written)
}

/// Backfill detail-file attributes without erasing known values
pub async fn backfill_details(
    conn: &mut SqliteConnection,
    md5_hash: &str,
    details: &BeatmapDetails,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE beatmaps SET
            audio_file = COALESCE(?, audio_file),
            background_file = COALESCE(?, background_file),
            bpm_min = COALESCE(?, bpm_min),
            bpm_max = COALESCE(?, bpm_max)
        WHERE md5_hash = ?
        "#,
    )
    .bind(&details.audio_file)
    .bind(&details.background_file)
    .bind(details.bpm_min)
    .bind(details.bpm_max)
    .bind(md5_hash)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Hashes that already carry derived difficulty data (the sync checkpoint)
pub async fn analyzed_hashes(pool: &SqlitePool) -> Result<HashSet<String>> {
    let rows = sqlx::query(
        r#"
        SELECT md5_hash FROM beatmaps WHERE stars IS NOT NULL
        UNION
        SELECT md5_hash FROM beatmap_mod_cache
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| Ok(row.try_get::<String, _>("md5_hash")?))
        .collect()
}

/// Load one beatmap by hash
pub async fn load_beatmap(pool: &SqlitePool, md5_hash: &str) -> Result<Option<BeatmapRecord>> {
    let sql = format!("SELECT {BEATMAP_COLUMNS} FROM beatmaps b WHERE b.md5_hash = ?");
    let row = sqlx::query(&sql)
        .bind(md5_hash)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(beatmap_from_row).transpose()
}

/// Load every beatmap keyed by hash
pub async fn load_all_beatmaps(pool: &SqlitePool) -> Result<HashMap<String, BeatmapRecord>> {
    let sql = format!("SELECT {BEATMAP_COLUMNS} FROM beatmaps b");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    rows.iter()
        .map(|row| beatmap_from_row(row).map(|b| (b.md5_hash.clone(), b)))
        .collect()
}

/// Paged beatmap listing, optionally filtered by metadata text
pub async fn list_beatmaps(pool: &SqlitePool, query: &PageQuery) -> Result<Page<BeatmapRecord>> {
    const FILTER: &str = "(?1 IS NULL OR b.artist LIKE ?1 OR b.title LIKE ?1 \
        OR b.creator LIKE ?1 OR b.difficulty LIKE ?1)";

    let pattern = query.like_pattern();
    let limit = query.effective_limit();

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM beatmaps b WHERE {FILTER}"))
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

    let sql = format!(
        "SELECT {BEATMAP_COLUMNS} FROM beatmaps b WHERE {FILTER} \
         ORDER BY b.artist, b.title, b.difficulty LIMIT ?2 OFFSET ?3"
    );
    let rows = sqlx::query(&sql)
        .bind(&pattern)
        .bind(i64::from(limit))
        .bind(query.offset())
        .fetch_all(pool)
        .await?;

    let items = rows.iter().map(beatmap_from_row).collect::<Result<Vec<_>>>()?;

    Ok(Page {
        items,
        total,
        page: query.page.max(1),
        limit,
    })
}

/// Map a row selected with [`BEATMAP_COLUMNS`]
pub fn beatmap_from_row(row: &SqliteRow) -> Result<BeatmapRecord> {
    let grades: String = row.try_get("grades")?;
    let grades: Grades = serde_json::from_str(&grades)?;

    Ok(BeatmapRecord {
        md5_hash: row.try_get("md5_hash")?,
        artist: row.try_get("artist")?,
        title: row.try_get("title")?,
        creator: row.try_get("creator")?,
        difficulty: row.try_get("difficulty")?,
        folder_name: row.try_get("folder_name")?,
        osu_file_name: row.try_get("osu_file_name")?,
        game_mode: row.try_get("game_mode")?,
        num_hitcircles: row.try_get("num_hitcircles")?,
        num_sliders: row.try_get("num_sliders")?,
        num_spinners: row.try_get("num_spinners")?,
        ar: row.try_get("ar")?,
        cs: row.try_get("cs")?,
        hp: row.try_get("hp")?,
        od: row.try_get("od")?,
        grades,
        last_played_at: row.try_get("last_played_at")?,
        bpm: row.try_get("bpm")?,
        bpm_min: row.try_get("bpm_min")?,
        bpm_max: row.try_get("bpm_max")?,
        audio_file: row.try_get("audio_file")?,
        background_file: row.try_get("background_file")?,
        stars: row.try_get("stars")?,
        max_combo: row.try_get("max_combo")?,
        aim: row.try_get("aim")?,
        speed: row.try_get("speed")?,
        slider_factor: row.try_get("slider_factor")?,
    })
}

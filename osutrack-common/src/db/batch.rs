//! Atomic batch flushes used by the ingestion pipelines
//!
//! Each flush is one transaction: either the whole batch is visible or none
//! of it is. Batches committed earlier in a run are unaffected by a later
//! failure.

use super::beatmaps::{backfill_details, upsert_beatmap};
use super::mod_cache::upsert_mod_snapshot;
use super::models::{BeatmapDetails, BeatmapRecord, ModDifficultySnapshot, ReplayRecord};
use super::replays::{record_replay_source, upsert_replay};
use crate::Result;
use sqlx::SqlitePool;
use tracing::debug;

/// Persist analyzed beatmaps and their modifier snapshots together
pub async fn flush_analysis_batch(
    pool: &SqlitePool,
    beatmaps: &[BeatmapRecord],
    snapshots: &[ModDifficultySnapshot],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    // Parents first so the cache's foreign key holds
    for beatmap in beatmaps {
        upsert_beatmap(&mut tx, beatmap).await?;
    }
    for snapshot in snapshots {
        upsert_mod_snapshot(&mut tx, snapshot).await?;
    }

    tx.commit().await?;

    debug!(
        beatmaps = beatmaps.len(),
        snapshots = snapshots.len(),
        "Flushed analysis batch"
    );
    Ok(())
}

/// Persist decoded replays plus any detail-file backfills for their beatmaps
pub async fn flush_replay_batch(
    pool: &SqlitePool,
    replays: &[ReplayRecord],
    details: &[(String, BeatmapDetails)],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for replay in replays {
        upsert_replay(&mut tx, replay).await?;
        if let Some(stem) = &replay.source_file {
            record_replay_source(&mut tx, stem, &replay.replay_md5).await?;
        }
    }
    for (md5_hash, detail) in details {
        backfill_details(&mut tx, md5_hash, detail).await?;
    }

    tx.commit().await?;

    debug!(
        replays = replays.len(),
        backfills = details.len(),
        "Flushed replay batch"
    );
    Ok(())
}

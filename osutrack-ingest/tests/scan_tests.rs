//! Replay scan pipeline tests

mod helpers;

use helpers::{attrs, create_test_db, encode_replay, sample_replay, write_osu_file};
use osutrack_common::config::OsuPaths;
use osutrack_common::db::beatmaps::{load_beatmap, upsert_beatmaps};
use osutrack_common::db::replays::{count_replays, load_replay};
use osutrack_common::db::BeatmapRecord;
use osutrack_common::difficulty::{ScriptedCalculator, UnconfiguredCalculator};
use osutrack_common::mods::DOUBLE_TIME;
use osutrack_common::{Error, ProgressHandle, TaskStatus};
use osutrack_ingest::ScanCoordinator;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const MAP_MD5: &str = "map00000000000000000000000000001";
const FOLDER: &str = "7 Artist - Song";

struct Install {
    _dir: TempDir,
    pool: SqlitePool,
    paths: OsuPaths,
}

impl Install {
    fn replays(&self) -> PathBuf {
        self.paths.replays_dir()
    }

    fn songs(&self) -> PathBuf {
        self.paths.songs_dir()
    }

    fn write_replay(&self, file_stem: &str, replay_md5: &str, mods: u32) -> PathBuf {
        let mut replay = sample_replay(replay_md5, MAP_MD5);
        replay.mods_used = mods;
        let path = self.replays().join(format!("{file_stem}.osr"));
        std::fs::write(&path, encode_replay(&replay)).unwrap();
        path
    }
}

/// Installation with one known, analyzable beatmap at 200 BPM
async fn install() -> Install {
    let (dir, pool) = create_test_db().await;
    let paths = OsuPaths::new(dir.path().join("osu!"));
    std::fs::create_dir_all(paths.replays_dir()).unwrap();
    write_osu_file(&paths.songs_dir(), FOLDER, "map.osu", 200.0);

    let beatmap = BeatmapRecord {
        md5_hash: MAP_MD5.to_string(),
        title: "Song".to_string(),
        folder_name: FOLDER.to_string(),
        osu_file_name: "map.osu".to_string(),
        num_hitcircles: 300,
        num_sliders: 150,
        num_spinners: 2,
        bpm: 150.0,
        ..BeatmapRecord::default()
    };
    upsert_beatmaps(&pool, [&beatmap]).await.unwrap();

    Install {
        _dir: dir,
        pool,
        paths,
    }
}

fn scanner(pool: &SqlitePool, calculator: Arc<ScriptedCalculator>, batch_size: usize) -> ScanCoordinator {
    ScanCoordinator::new(pool.clone(), calculator, ProgressHandle::new(), batch_size)
}

fn scripted() -> Arc<ScriptedCalculator> {
    Arc::new(ScriptedCalculator::new().with_fallback(attrs(5.0)))
}

#[tokio::test]
async fn test_scan_ingests_and_enriches() {
    let env = install().await;
    env.write_replay("first", "r1", 0);
    env.write_replay("second", "r2", DOUBLE_TIME);
    let calculator = scripted();

    let scan = scanner(&env.pool, Arc::clone(&calculator), 10);
    let summary = scan.run(&env.paths).await.unwrap();

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.ingested, 2);
    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.flushed_batches, vec![2]);
    assert_eq!(calculator.performance_calls(), 2);

    let nomod = load_replay(&env.pool, "r1").await.unwrap().unwrap();
    assert_eq!(nomod.source_file.as_deref(), Some("first"));
    assert_eq!(nomod.stars, Some(5.0));
    assert_eq!(nomod.map_max_combo, Some(700));
    assert!(nomod.pp.unwrap() > 0.0);
    assert_eq!(nomod.bpm, Some(200.0));
    assert_eq!(nomod.bpm_min, Some(100.0));
    assert_eq!(nomod.bpm_max, Some(200.0));

    let dt = load_replay(&env.pool, "r2").await.unwrap().unwrap();
    assert_eq!(dt.stars, Some(7.0));
    assert_eq!(dt.bpm, Some(300.0));
    assert_eq!(dt.bpm_min, Some(150.0));

    let progress = scan.progress().snapshot();
    assert_eq!(progress.status, TaskStatus::Complete);
    assert_eq!(progress.current, 2);
    assert_eq!(progress.total, 2);
}

#[tokio::test]
async fn test_scan_backfills_beatmap_details() {
    let env = install().await;
    env.write_replay("first", "r1", 0);

    scanner(&env.pool, scripted(), 10).run(&env.paths).await.unwrap();

    let beatmap = load_beatmap(&env.pool, MAP_MD5).await.unwrap().unwrap();
    assert_eq!(beatmap.audio_file.as_deref(), Some("audio.mp3"));
    assert_eq!(beatmap.background_file.as_deref(), Some("bg.jpg"));
    assert_eq!(beatmap.bpm_min, Some(100.0));
    assert_eq!(beatmap.bpm_max, Some(200.0));
    assert_eq!(beatmap.stars, None);
}

#[tokio::test]
async fn test_truncated_file_counts_toward_progress_only() {
    let env = install().await;
    env.write_replay("a", "ra", 0);
    env.write_replay("c", "rc", 0);
    let broken = encode_replay(&sample_replay("rb", MAP_MD5));
    std::fs::write(env.replays().join("b.osr"), &broken[..20]).unwrap();

    let scan = scanner(&env.pool, scripted(), 10);
    let summary = scan.run(&env.paths).await.unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.ingested, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(count_replays(&env.pool).await.unwrap(), 2);

    let progress = scan.progress().snapshot();
    assert_eq!(progress.total, 3);
    assert_eq!(progress.current, 3);
    assert_eq!(progress.status, TaskStatus::Complete);
}

#[tokio::test]
async fn test_unknown_beatmap_leaves_replay_unenriched() {
    let env = install().await;
    let replay = sample_replay("stray", "not-in-library");
    std::fs::write(env.replays().join("stray.osr"), encode_replay(&replay)).unwrap();
    let calculator = scripted();

    let summary = scanner(&env.pool, Arc::clone(&calculator), 10)
        .run(&env.paths)
        .await
        .unwrap();

    assert_eq!(summary.ingested, 1);
    assert_eq!(summary.enriched, 0);
    assert_eq!(calculator.calls(), 0);
    let stored = load_replay(&env.pool, "stray").await.unwrap().unwrap();
    assert_eq!(stored.pp, None);
    assert_eq!(stored.stars, None);
    assert_eq!(stored.bpm, None);
}

#[tokio::test]
async fn test_rescan_skips_known_files() {
    let env = install().await;
    // File stem differs from the replay hash
    env.write_replay("peppy - Song [Hard] (2024-01-01)", "hash-1", 0);
    env.write_replay("hash-2", "hash-2", 0);

    scanner(&env.pool, scripted(), 10).run(&env.paths).await.unwrap();

    let calculator = scripted();
    let summary = scanner(&env.pool, Arc::clone(&calculator), 10)
        .run(&env.paths)
        .await
        .unwrap();
    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.pending, 0);
    assert!(summary.flushed_batches.is_empty());
    assert_eq!(calculator.calls(), 0);
}

#[tokio::test]
async fn test_duplicate_copy_of_enriched_replay_is_scanned_once() {
    let env = install().await;
    env.write_replay("first", "dup-hash", 0);
    scanner(&env.pool, scripted(), 10).run(&env.paths).await.unwrap();
    assert!(load_replay(&env.pool, "dup-hash").await.unwrap().unwrap().pp.is_some());

    // Same replay exported again under another name
    env.write_replay("copy", "dup-hash", 0);
    let calculator = scripted();
    let summary = scanner(&env.pool, Arc::clone(&calculator), 10)
        .run(&env.paths)
        .await
        .unwrap();
    assert_eq!(summary.pending, 1);
    assert_eq!(calculator.performance_calls(), 1);

    let calculator = scripted();
    let summary = scanner(&env.pool, Arc::clone(&calculator), 10)
        .run(&env.paths)
        .await
        .unwrap();
    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.pending, 0);
    assert_eq!(calculator.calls(), 0);
    assert_eq!(count_replays(&env.pool).await.unwrap(), 1);

    let stored = load_replay(&env.pool, "dup-hash").await.unwrap().unwrap();
    assert_eq!(stored.source_file.as_deref(), Some("first"));
}

#[tokio::test]
async fn test_scan_flushes_in_batches() {
    let env = install().await;
    for i in 0..5 {
        env.write_replay(&format!("replay{i}"), &format!("hash{i}"), 0);
    }

    let scan = scanner(&env.pool, scripted(), 2);
    let summary = scan.run(&env.paths).await.unwrap();

    assert_eq!(summary.flushed_batches, vec![2, 2, 1]);
    assert_eq!(scan.progress().snapshot().batches_done, 3);
    assert_eq!(count_replays(&env.pool).await.unwrap(), 5);
}

#[tokio::test]
async fn test_non_replay_files_ignored() {
    let env = install().await;
    env.write_replay("real", "real", 0);
    std::fs::write(env.replays().join("notes.txt"), b"hello").unwrap();
    std::fs::create_dir_all(env.replays().join("nested.osr")).unwrap();

    let summary = scanner(&env.pool, scripted(), 10).run(&env.paths).await.unwrap();
    assert_eq!(summary.discovered, 1);
}

#[tokio::test]
async fn test_missing_replays_dir_fails_run() {
    let (dir, pool) = create_test_db().await;
    let scan = scanner(&pool, scripted(), 10);

    let err = scan
        .scan_directory(&dir.path().join("nope"), &dir.path().join("Songs"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingResource(_)));
    assert_eq!(scan.progress().snapshot().status, TaskStatus::Error);
}

#[tokio::test]
async fn test_single_file_ingestion_never_downgrades_performance() {
    let env = install().await;
    let path = env.write_replay("live", "live", 0);

    let enriched = scanner(&env.pool, scripted(), 10)
        .ingest_replay_file(&path, &env.songs())
        .await
        .unwrap();
    let pp = enriched.pp.unwrap();

    // A later ingestion without a working calculator must not clear it
    let unconfigured = ScanCoordinator::new(
        env.pool.clone(),
        Arc::new(UnconfiguredCalculator),
        ProgressHandle::new(),
        10,
    );
    let again = unconfigured
        .ingest_replay_file(&path, &env.songs())
        .await
        .unwrap();
    assert_eq!(again.pp, None);

    let stored = load_replay(&env.pool, "live").await.unwrap().unwrap();
    assert_eq!(stored.pp, Some(pp));
    assert_eq!(stored.stars, Some(5.0));
}

#[tokio::test]
async fn test_single_file_ingestion_enriches_missing_performance() {
    let env = install().await;
    let path = env.write_replay("late", "late", 0);

    let unconfigured = ScanCoordinator::new(
        env.pool.clone(),
        Arc::new(UnconfiguredCalculator),
        ProgressHandle::new(),
        10,
    );
    unconfigured
        .ingest_replay_file(&path, &env.songs())
        .await
        .unwrap();
    assert_eq!(load_replay(&env.pool, "late").await.unwrap().unwrap().pp, None);

    scanner(&env.pool, scripted(), 10)
        .ingest_replay_file(&path, &env.songs())
        .await
        .unwrap();
    assert!(load_replay(&env.pool, "late").await.unwrap().unwrap().pp.is_some());
}

#[tokio::test]
async fn test_single_file_ingestion_propagates_decode_errors() {
    let env = install().await;
    let path = env.replays().join("bad.osr");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();

    let err = scanner(&env.pool, scripted(), 10)
        .ingest_replay_file(&path, Path::new("/nonexistent"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
    assert_eq!(count_replays(&env.pool).await.unwrap(), 0);
}

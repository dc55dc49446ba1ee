//! Recommendation engine tests against a temporary library

use osutrack_common::db::beatmaps::upsert_beatmaps;
use osutrack_common::db::{flush_analysis_batch, init_database, BeatmapRecord, ModDifficultySnapshot};
use osutrack_common::difficulty::{DifficultyAttributes, ScriptedCalculator};
use osutrack_common::mods::{DOUBLE_TIME, HARD_ROCK, HIDDEN};
use osutrack_common::Error;
use osutrack_recommend::{
    Focus, RecommendQuery, RecommendationSource, Recommender, RecommenderOptions,
};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const FOLDER: &str = "9 Artist - Set";

struct Library {
    dir: TempDir,
    pool: SqlitePool,
}

impl Library {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("recommend.db")).await.unwrap();
        std::fs::create_dir_all(dir.path().join("Songs").join(FOLDER)).unwrap();
        Self { dir, pool }
    }

    fn songs(&self) -> PathBuf {
        self.dir.path().join("Songs")
    }

    fn write_detail_file(&self, md5: &str) {
        let path = self.songs().join(FOLDER).join(format!("{md5}.osu"));
        std::fs::write(path, "osu file format v14\n").unwrap();
    }

    async fn add(&self, beatmaps: &[BeatmapRecord]) {
        flush_analysis_batch(&self.pool, beatmaps, &[]).await.unwrap();
    }

    fn recommender(&self, calculator: Arc<ScriptedCalculator>) -> Recommender {
        Recommender::new(
            self.pool.clone(),
            calculator,
            self.songs(),
            RecommenderOptions::default(),
        )
    }
}

fn analyzed(md5: &str, stars: f64, bpm: f64) -> BeatmapRecord {
    BeatmapRecord {
        md5_hash: md5.to_string(),
        title: format!("Song {md5}"),
        folder_name: FOLDER.to_string(),
        osu_file_name: format!("{md5}.osu"),
        ar: 9.0,
        od: 8.0,
        cs: 4.0,
        hp: 6.0,
        bpm,
        stars: Some(stars),
        max_combo: Some(800),
        aim: Some(stars * 0.5),
        speed: Some(stars * 0.5),
        slider_factor: Some(0.9),
        ..BeatmapRecord::default()
    }
}

fn calculator() -> Arc<ScriptedCalculator> {
    Arc::new(ScriptedCalculator::new())
}

#[tokio::test]
async fn test_nomod_picks_record_in_band() {
    let lib = Library::new().await;
    lib.add(&[
        analyzed("low", 2.1, 180.0),
        analyzed("mid", 3.4, 180.0),
        analyzed("high", 5.9, 180.0),
    ])
    .await;
    let recommender = lib.recommender(calculator());

    for _ in 0..10 {
        let picked = recommender
            .recommend(&RecommendQuery::new(3.3, 400.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.beatmap.md5_hash, "mid");
        assert_eq!(picked.effective_stars, 3.4);
        assert_eq!(picked.source, RecommendationSource::Nomod);
    }

    let none = recommender
        .recommend(&RecommendQuery::new(10.0, 400.0))
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_band_upper_edge_is_exclusive() {
    let lib = Library::new().await;
    lib.add(&[analyzed("edge", 3.5, 180.0)]).await;
    let recommender = lib.recommender(calculator());

    let picked = recommender.recommend(&RecommendQuery::new(3.35, 400.0)).await.unwrap();
    assert!(picked.is_none());
    let picked = recommender.recommend(&RecommendQuery::new(3.5, 400.0)).await.unwrap();
    assert!(picked.is_some());
}

#[tokio::test]
async fn test_tempo_ceiling_and_exclusions() {
    let lib = Library::new().await;
    lib.add(&[
        analyzed("fast", 4.0, 240.0),
        analyzed("slow", 4.05, 160.0),
        analyzed("seen", 4.1, 170.0),
    ])
    .await;
    let recommender = lib.recommender(calculator());

    let query = RecommendQuery::new(4.0, 200.0).excluding(["seen"]);
    for _ in 0..10 {
        let picked = recommender.recommend(&query).await.unwrap().unwrap();
        assert_eq!(picked.beatmap.md5_hash, "slow");
    }

    let everything_seen = RecommendQuery::new(4.0, 200.0).excluding(["seen", "slow"]);
    assert!(recommender.recommend(&everything_seen).await.unwrap().is_none());
}

#[tokio::test]
async fn test_other_game_modes_never_recommended() {
    let lib = Library::new().await;
    let mut taiko = analyzed("taiko", 4.0, 180.0);
    taiko.game_mode = 1;
    lib.add(&[taiko]).await;

    let picked = lib
        .recommender(calculator())
        .recommend(&RecommendQuery::new(4.0, 400.0))
        .await
        .unwrap();
    assert!(picked.is_none());
}

#[tokio::test]
async fn test_selection_covers_every_candidate() {
    let lib = Library::new().await;
    let beatmaps: Vec<_> = (0..4)
        .map(|i| analyzed(&format!("c{i}"), 4.0 + f64::from(i) * 0.01, 180.0))
        .collect();
    lib.add(&beatmaps).await;
    let recommender = lib.recommender(calculator());

    let mut seen = HashSet::new();
    for _ in 0..200 {
        let picked = recommender
            .recommend(&RecommendQuery::new(4.0, 400.0))
            .await
            .unwrap()
            .unwrap();
        seen.insert(picked.beatmap.md5_hash);
    }
    assert_eq!(seen.len(), 4, "selection skipped candidates: {seen:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_selection_stable_while_library_changes() {
    let lib = Library::new().await;
    let movers: Vec<_> = (0..5)
        .map(|i| analyzed(&format!("m{i}"), 4.05, 180.0))
        .collect();
    lib.add(&movers).await;
    lib.add(&[analyzed("z-stable", 4.0, 180.0)]).await;

    // Moves every other record in and out of the band
    let writer_pool = lib.pool.clone();
    let writer = tokio::spawn(async move {
        for round in 0..200 {
            let stars = if round % 2 == 0 { 9.0 } else { 4.05 };
            let batch: Vec<_> = (0..5)
                .map(|i| analyzed(&format!("m{i}"), stars, 180.0))
                .collect();
            flush_analysis_batch(&writer_pool, &batch, &[]).await.unwrap();
        }
    });

    let recommender = lib.recommender(calculator());
    for _ in 0..200 {
        let picked = recommender
            .recommend(&RecommendQuery::new(4.0, 400.0))
            .await
            .unwrap();
        assert!(picked.is_some(), "a qualifying record always exists");
    }
    writer.await.unwrap();
}

#[tokio::test]
async fn test_focus_filters_candidates() {
    let lib = Library::new().await;
    let mut jumpy = analyzed("jumpy", 4.0, 180.0);
    jumpy.aim = Some(2.6);
    jumpy.speed = Some(1.8);
    let mut streamy = analyzed("streamy", 4.05, 180.0);
    streamy.aim = Some(1.7);
    streamy.speed = Some(2.5);
    lib.add(&[jumpy, streamy]).await;
    let recommender = lib.recommender(calculator());

    for _ in 0..10 {
        let aim = recommender
            .recommend(&RecommendQuery::new(4.0, 400.0).with_focus(Some(Focus::Aim)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(aim.beatmap.md5_hash, "jumpy");

        let speed = recommender
            .recommend(&RecommendQuery::new(4.0, 400.0).with_focus(Some(Focus::Speed)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(speed.beatmap.md5_hash, "streamy");
    }

    let technical = recommender
        .recommend(&RecommendQuery::new(4.0, 400.0).with_focus(Some(Focus::Technical)))
        .await
        .unwrap();
    assert!(technical.is_none());
}

#[tokio::test]
async fn test_cached_path_uses_snapshot_values() {
    let lib = Library::new().await;
    let beatmaps = vec![analyzed("dt-fit", 4.0, 160.0), analyzed("dt-hard", 4.0, 160.0)];
    let snapshots = vec![
        ModDifficultySnapshot {
            md5_hash: "dt-fit".to_string(),
            mods: DOUBLE_TIME,
            stars: 5.6,
            ar: 10.33,
            od: 9.44,
            cs: 4.0,
            hp: 6.0,
            bpm: 240.0,
            max_combo: 800,
            aim: 2.8,
            speed: 2.8,
            slider_factor: 0.9,
        },
        ModDifficultySnapshot {
            md5_hash: "dt-hard".to_string(),
            mods: DOUBLE_TIME,
            stars: 7.2,
            bpm: 240.0,
            ..ModDifficultySnapshot::default()
        },
    ];
    flush_analysis_batch(&lib.pool, &beatmaps, &snapshots).await.unwrap();
    let calc = calculator();
    let recommender = lib.recommender(Arc::clone(&calc));

    // Hidden does not change difficulty, so HDDT resolves to the DT snapshot
    let query = RecommendQuery::new(5.5, 250.0).with_mods(DOUBLE_TIME | HIDDEN);
    let picked = recommender.recommend(&query).await.unwrap().unwrap();

    assert_eq!(picked.beatmap.md5_hash, "dt-fit");
    assert_eq!(picked.source, RecommendationSource::Cached);
    assert_eq!(picked.mods, DOUBLE_TIME | HIDDEN);
    assert_eq!(picked.effective_stars, 5.6);
    assert_eq!(picked.effective_bpm, 240.0);
    assert_eq!(picked.effective_ar, 10.33);
    assert_eq!(picked.beatmap.stars, Some(4.0));
    assert_eq!(calc.calls(), 0);

    let too_slow = RecommendQuery::new(5.5, 200.0).with_mods(DOUBLE_TIME);
    assert!(recommender.recommend(&too_slow).await.unwrap().is_none());
}

#[tokio::test]
async fn test_live_path_computes_exact_combination() {
    let lib = Library::new().await;
    lib.add(&[
        analyzed("live-fit", 3.0, 150.0),
        analyzed("no-file", 3.0, 150.0),
        analyzed("far-away", 12.0, 150.0),
    ])
    .await;
    lib.write_detail_file("live-fit");
    lib.write_detail_file("far-away");

    let base = DifficultyAttributes {
        stars: 3.0,
        max_combo: 800,
        aim: 1.5,
        speed: 1.5,
        slider_factor: 0.9,
        ar: 9.0,
        od: 8.0,
        cs: 4.0,
        hp: 6.0,
        clock_rate: 1.0,
        ..DifficultyAttributes::default()
    };
    let calc = Arc::new(ScriptedCalculator::new().with_fallback(base));
    let recommender = lib.recommender(Arc::clone(&calc));

    // HRDT is not cached: 3.0 * 1.1 * 1.4 = 4.62 stars at 225 BPM
    let query = RecommendQuery::new(4.6, 230.0).with_mods(HARD_ROCK | DOUBLE_TIME);
    let picked = recommender.recommend(&query).await.unwrap().unwrap();

    assert_eq!(picked.beatmap.md5_hash, "live-fit");
    assert_eq!(picked.source, RecommendationSource::Live);
    assert_eq!(picked.effective_stars, 4.62);
    assert_eq!(picked.effective_bpm, 225.0);
    assert_eq!(picked.effective_ar, 10.0);
    assert!(calc.difficulty_calls() >= 1);

    let too_slow = RecommendQuery::new(4.6, 200.0).with_mods(HARD_ROCK | DOUBLE_TIME);
    assert!(recommender.recommend(&too_slow).await.unwrap().is_none());
}

#[tokio::test]
async fn test_live_path_skips_failing_calculations() {
    let lib = Library::new().await;
    lib.add(&[analyzed("broken", 3.0, 150.0)]).await;
    lib.write_detail_file("broken");
    let calc = Arc::new(ScriptedCalculator::new().failing_on("broken.osu"));

    let picked = lib
        .recommender(Arc::clone(&calc))
        .recommend(&RecommendQuery::new(4.6, 300.0).with_mods(HARD_ROCK | DOUBLE_TIME))
        .await
        .unwrap();
    assert!(picked.is_none());
    assert_eq!(calc.difficulty_calls(), 1);
}

#[tokio::test]
async fn test_invalid_query_rejected() {
    let lib = Library::new().await;
    upsert_beatmaps(&lib.pool, [&analyzed("any", 4.0, 180.0)]).await.unwrap();

    let err = lib
        .recommender(calculator())
        .recommend(&RecommendQuery::new(f64::NAN, 180.0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

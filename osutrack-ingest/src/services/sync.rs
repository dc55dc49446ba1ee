//! Library sync: snapshot → persisted, difficulty-enriched beatmaps
//!
//! Run sequence:
//! 1. Persist the raw snapshot (metadata is queryable even if analysis fails)
//! 2. Delta = standard-mode beatmaps without derived difficulty data
//! 3. Verify detail files sequentially; missing ones are skipped this run
//! 4. Analyze on a bounded worker pool, consuming results in completion order
//! 5. Flush analysis results in fixed-size transactional batches
//!
//! A failing unit is logged and left unanalyzed, so the next run retries it.

use super::join_error;
use crate::parsers::{read_library, read_osu_file, safe_join};
use futures::stream::{self, StreamExt};
use osutrack_common::config::{OsuPaths, PipelineConfig};
use osutrack_common::db::beatmaps::{analyzed_hashes, upsert_beatmaps};
use osutrack_common::db::{flush_analysis_batch, BeatmapRecord, ModDifficultySnapshot};
use osutrack_common::difficulty::DifficultyCalculator;
use osutrack_common::mods::{CACHED_MOD_COMBINATIONS, STANDARD_MODE};
use osutrack_common::scoring::round2;
use osutrack_common::{Error, ProgressHandle, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tuning for one sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Analyzed beatmaps per persistence flush
    pub batch_size: usize,
    /// Concurrent analysis units
    pub workers: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl SyncOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.sync_batch_size.max(1),
            workers: config.worker_count(),
        }
    }
}

/// Outcome of a completed sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Beatmaps in the snapshot (all modes)
    pub snapshot_beatmaps: usize,
    /// Standard-mode beatmaps lacking difficulty data
    pub delta: usize,
    /// Delta entries whose detail file exists
    pub verified: usize,
    pub missing_files: usize,
    pub analyzed: usize,
    pub failed: usize,
    /// Size of each analysis flush, in order
    pub flushed_batches: Vec<usize>,
}

/// Result of analyzing one beatmap
struct AnalysisUnit {
    beatmap: BeatmapRecord,
    snapshots: Vec<ModDifficultySnapshot>,
}

/// Drives library sync runs
pub struct SyncCoordinator {
    db: SqlitePool,
    calculator: Arc<dyn DifficultyCalculator>,
    progress: ProgressHandle,
    options: SyncOptions,
}

impl SyncCoordinator {
    pub fn new(
        db: SqlitePool,
        calculator: Arc<dyn DifficultyCalculator>,
        progress: ProgressHandle,
        options: SyncOptions,
    ) -> Self {
        Self {
            db,
            calculator,
            progress,
            options,
        }
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    /// Sync from an osu! installation folder
    pub async fn run(&self, paths: &OsuPaths) -> Result<SyncSummary> {
        self.progress.start("Reading osu!.db...");
        let result = self.run_from_folder(paths).await;
        self.finish(result)
    }

    /// Sync an already decoded snapshot against `songs_dir`
    pub async fn sync_snapshot(
        &self,
        beatmaps: HashMap<String, BeatmapRecord>,
        songs_dir: &Path,
    ) -> Result<SyncSummary> {
        self.progress.start("Saving beatmap metadata...");
        let result = self.process_snapshot(beatmaps, songs_dir).await;
        self.finish(result)
    }

    fn finish(&self, result: Result<SyncSummary>) -> Result<SyncSummary> {
        match &result {
            Ok(summary) => {
                info!(
                    analyzed = summary.analyzed,
                    failed = summary.failed,
                    missing_files = summary.missing_files,
                    batches = summary.flushed_batches.len(),
                    "Beatmap sync complete"
                );
                self.progress.complete(format!(
                    "Sync complete. Analyzed {} beatmaps ({} failed, {} missing files).",
                    summary.analyzed, summary.failed, summary.missing_files
                ));
            }
            Err(e) => {
                error!(error = %e, "Beatmap sync failed");
                self.progress.fail(format!("Sync failed: {e}"));
            }
        }
        result
    }

    async fn run_from_folder(&self, paths: &OsuPaths) -> Result<SyncSummary> {
        let songs_dir = paths.songs_dir();
        if !songs_dir.is_dir() {
            return Err(Error::MissingResource(format!(
                "Songs directory not found: {}",
                songs_dir.display()
            )));
        }

        let library_db = paths.library_db();
        let snapshot = tokio::task::spawn_blocking(move || read_library(&library_db))
            .await
            .map_err(join_error)??;

        self.progress.set_message("Saving beatmap metadata...");
        self.process_snapshot(snapshot.beatmaps, &songs_dir).await
    }

    async fn process_snapshot(
        &self,
        beatmaps: HashMap<String, BeatmapRecord>,
        songs_dir: &Path,
    ) -> Result<SyncSummary> {
        if !songs_dir.is_dir() {
            return Err(Error::MissingResource(format!(
                "Songs directory not found: {}",
                songs_dir.display()
            )));
        }

        let mut summary = SyncSummary {
            snapshot_beatmaps: beatmaps.len(),
            ..SyncSummary::default()
        };

        // Step 0: raw metadata
        let persisted = upsert_beatmaps(&self.db, beatmaps.values()).await?;
        info!(persisted, "Saved beatmap metadata");

        // Step 1: delta against the analyzed checkpoint
        let analyzed = analyzed_hashes(&self.db).await?;
        let mut delta: Vec<BeatmapRecord> = beatmaps
            .into_values()
            .filter(|b| b.game_mode == STANDARD_MODE && !analyzed.contains(&b.md5_hash))
            .collect();
        delta.sort_by(|a, b| a.md5_hash.cmp(&b.md5_hash));
        summary.delta = delta.len();
        info!(delta = summary.delta, already_analyzed = analyzed.len(), "Computed sync delta");

        // Step 2: detail file verification
        let verified = self
            .verify_detail_files(delta, songs_dir, &mut summary)
            .await?;

        // Step 3: analysis
        self.analyze(verified, &mut summary).await?;

        Ok(summary)
    }

    async fn verify_detail_files(
        &self,
        delta: Vec<BeatmapRecord>,
        songs_dir: &Path,
        summary: &mut SyncSummary,
    ) -> Result<Vec<(BeatmapRecord, PathBuf)>> {
        self.progress
            .begin_phase(delta.len(), "Step 1/2: Verifying beatmap files...");

        let progress = self.progress.clone();
        let songs_dir = songs_dir.to_path_buf();
        let (verified, missing) =
            tokio::task::spawn_blocking(move || verify_files(&progress, delta, &songs_dir))
                .await
                .map_err(join_error)?;

        summary.missing_files += missing;
        summary.verified = verified.len();
        if summary.missing_files > 0 {
            warn!(missing = summary.missing_files, "Detail files missing for some beatmaps");
        }
        Ok(verified)
    }

    async fn analyze(
        &self,
        verified: Vec<(BeatmapRecord, PathBuf)>,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        self.progress
            .begin_phase(verified.len(), "Step 2/2: Analyzing beatmaps...");
        info!(
            units = verified.len(),
            workers = self.options.workers,
            batch_size = self.options.batch_size,
            "Starting beatmap analysis"
        );

        let mut results = stream::iter(verified)
            .map(|(beatmap, path)| {
                let calculator = Arc::clone(&self.calculator);
                async move {
                    let md5 = beatmap.md5_hash.clone();
                    let outcome = tokio::task::spawn_blocking(move || {
                        analyze_beatmap(calculator.as_ref(), beatmap, &path)
                    })
                    .await
                    .map_err(join_error)
                    .and_then(|r| r);
                    (md5, outcome)
                }
            })
            .buffer_unordered(self.options.workers.max(1));

        let mut batch_beatmaps = Vec::with_capacity(self.options.batch_size);
        let mut batch_snapshots = Vec::with_capacity(self.options.batch_size * CACHED_MOD_COMBINATIONS.len());

        while let Some((md5, outcome)) = results.next().await {
            match outcome {
                Ok(unit) => {
                    batch_beatmaps.push(unit.beatmap);
                    batch_snapshots.extend(unit.snapshots);
                    summary.analyzed += 1;
                }
                Err(e) => {
                    warn!(md5 = %md5, error = %e, "Beatmap analysis failed");
                    summary.failed += 1;
                }
            }
            self.progress.advance(|current, total| {
                format!("Step 2/2: Analyzing ({current}/{total}): {md5}")
            });

            if batch_beatmaps.len() >= self.options.batch_size {
                self.flush(&mut batch_beatmaps, &mut batch_snapshots, summary)
                    .await?;
            }
        }

        if !batch_beatmaps.is_empty() {
            self.flush(&mut batch_beatmaps, &mut batch_snapshots, summary)
                .await?;
        }
        Ok(())
    }

    async fn flush(
        &self,
        beatmaps: &mut Vec<BeatmapRecord>,
        snapshots: &mut Vec<ModDifficultySnapshot>,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        flush_analysis_batch(&self.db, beatmaps, snapshots).await?;
        summary.flushed_batches.push(beatmaps.len());
        self.progress.record_batch();
        info!(
            batch = summary.flushed_batches.len(),
            beatmaps = beatmaps.len(),
            snapshots = snapshots.len(),
            "Saved analysis batch"
        );
        beatmaps.clear();
        snapshots.clear();
        Ok(())
    }
}

/// Split `delta` into beatmaps with a detail file on disk and a missing count
fn verify_files(
    progress: &ProgressHandle,
    delta: Vec<BeatmapRecord>,
    songs_dir: &Path,
) -> (Vec<(BeatmapRecord, PathBuf)>, usize) {
    let mut verified = Vec::with_capacity(delta.len());
    let mut missing = 0;
    for beatmap in delta {
        let md5 = beatmap.md5_hash.clone();
        let path = safe_join(songs_dir, &[beatmap.folder_name.as_str(), beatmap.osu_file_name.as_str()])
            .filter(|p| p.is_file());
        match path {
            Some(path) => verified.push((beatmap, path)),
            None => {
                debug!(
                    md5 = %md5,
                    file = %beatmap.detail_file_path().display(),
                    "Detail file missing, skipping"
                );
                missing += 1;
            }
        }
        progress.advance(|current, total| {
            format!("Step 1/2: Verifying files ({current}/{total}): {md5}")
        });
    }
    (verified, missing)
}

/// Analyze one beatmap: detail file, nomod difficulty, cached combinations
fn analyze_beatmap(
    calculator: &dyn DifficultyCalculator,
    mut beatmap: BeatmapRecord,
    path: &Path,
) -> Result<AnalysisUnit> {
    let details = read_osu_file(path)?;
    let base_bpm = details.bpm.unwrap_or(beatmap.bpm);

    let nomod = calculator.difficulty(path, 0)?;
    beatmap.stars = Some(round2(nomod.stars));
    beatmap.max_combo = Some(nomod.max_combo);
    beatmap.aim = Some(round2(nomod.aim));
    beatmap.speed = Some(round2(nomod.speed));
    beatmap.slider_factor = Some(round2(nomod.slider_factor));
    beatmap.audio_file = details.audio_file;
    beatmap.background_file = details.background_file;
    beatmap.bpm_min = details.bpm_min.map(round2);
    beatmap.bpm_max = details.bpm_max.map(round2);

    let snapshots = CACHED_MOD_COMBINATIONS
        .iter()
        .map(|&mods| -> Result<ModDifficultySnapshot> {
            let attrs = calculator.difficulty(path, mods)?;
            Ok(ModDifficultySnapshot {
                md5_hash: beatmap.md5_hash.clone(),
                mods,
                stars: round2(attrs.stars),
                ar: round2(attrs.ar),
                od: round2(attrs.od),
                cs: round2(attrs.cs),
                hp: round2(attrs.hp),
                bpm: round2(base_bpm * attrs.clock_rate),
                max_combo: attrs.max_combo,
                aim: round2(attrs.aim),
                speed: round2(attrs.speed),
                slider_factor: round2(attrs.slider_factor),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AnalysisUnit { beatmap, snapshots })
}

//! Replay scan: session files → persisted, performance-enriched replays
//!
//! New files are found by file name alone (stem vs. stored replay hashes and
//! source files), then decoded and enriched one at a time and flushed in
//! fixed-size batches. Decode failures are counted toward progress but never
//! persisted.

use super::join_error;
use crate::parsers::{read_osu_file, read_replay, safe_join};
use osutrack_common::config::{OsuPaths, PipelineConfig};
use osutrack_common::db::beatmaps::{load_all_beatmaps, load_beatmap};
use osutrack_common::db::replays::known_replay_keys;
use osutrack_common::db::{flush_replay_batch, BeatmapDetails, BeatmapRecord, ReplayRecord};
use osutrack_common::difficulty::DifficultyCalculator;
use osutrack_common::mods::clock_rate;
use osutrack_common::scoring::round2;
use osutrack_common::{Error, ProgressHandle, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Replay file extension
const REPLAY_EXTENSION: &str = "osr";

/// Outcome of a completed scan run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Replay files found on disk
    pub discovered: usize,
    /// Files not yet persisted
    pub pending: usize,
    /// Records decoded and persisted
    pub ingested: usize,
    /// Records that received a performance value
    pub enriched: usize,
    /// Files that failed to decode
    pub failed: usize,
    /// Size of each flush, in order
    pub flushed_batches: Vec<usize>,
}

/// Decoded replay plus the detail-file data gathered while enriching it
struct IngestedReplay {
    replay: ReplayRecord,
    details: Option<(String, BeatmapDetails)>,
}

/// Drives replay scan runs and single-file ingestion
pub struct ScanCoordinator {
    db: SqlitePool,
    calculator: Arc<dyn DifficultyCalculator>,
    progress: ProgressHandle,
    batch_size: usize,
}

impl ScanCoordinator {
    pub fn new(
        db: SqlitePool,
        calculator: Arc<dyn DifficultyCalculator>,
        progress: ProgressHandle,
        batch_size: usize,
    ) -> Self {
        Self {
            db,
            calculator,
            progress,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(
        db: SqlitePool,
        calculator: Arc<dyn DifficultyCalculator>,
        progress: ProgressHandle,
        config: &PipelineConfig,
    ) -> Self {
        Self::new(db, calculator, progress, config.scan_batch_size)
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    /// Scan the replay folder of an osu! installation
    pub async fn run(&self, paths: &OsuPaths) -> Result<ScanSummary> {
        self.scan_directory(&paths.replays_dir(), &paths.songs_dir())
            .await
    }

    /// Scan `replays_dir`, enriching against detail files under `songs_dir`
    pub async fn scan_directory(&self, replays_dir: &Path, songs_dir: &Path) -> Result<ScanSummary> {
        self.progress.start("Finding new replays...");
        let result = self.scan_inner(replays_dir, songs_dir).await;

        match &result {
            Ok(summary) => {
                info!(
                    discovered = summary.discovered,
                    ingested = summary.ingested,
                    enriched = summary.enriched,
                    failed = summary.failed,
                    "Replay scan complete"
                );
                self.progress.complete(format!(
                    "Scan complete. Added {} new replays ({} failed).",
                    summary.ingested, summary.failed
                ));
            }
            Err(e) => {
                error!(error = %e, "Replay scan failed");
                self.progress.fail(format!("Scan failed: {e}"));
            }
        }
        result
    }

    async fn scan_inner(&self, replays_dir: &Path, songs_dir: &Path) -> Result<ScanSummary> {
        if !replays_dir.is_dir() {
            return Err(Error::MissingResource(format!(
                "Replays directory not found: {}",
                replays_dir.display()
            )));
        }

        let dir = replays_dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || discover_replay_files(&dir))
            .await
            .map_err(join_error)?;
        let known = known_replay_keys(&self.db).await?;
        let pending: Vec<PathBuf> = files
            .iter()
            .filter(|path| {
                path.file_stem()
                    .map(|stem| !known.contains(&*stem.to_string_lossy()))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let mut summary = ScanSummary {
            discovered: files.len(),
            pending: pending.len(),
            ..ScanSummary::default()
        };
        info!(
            discovered = summary.discovered,
            pending = summary.pending,
            "Found new replays"
        );
        if pending.is_empty() {
            return Ok(summary);
        }

        let beatmaps = Arc::new(load_all_beatmaps(&self.db).await?);
        self.progress
            .begin_phase(pending.len(), format!("Processing {} new replays...", pending.len()));

        let mut batch: Vec<ReplayRecord> = Vec::with_capacity(self.batch_size);
        let mut backfills: Vec<(String, BeatmapDetails)> = Vec::new();

        for path in pending {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let calculator = Arc::clone(&self.calculator);
            let beatmaps = Arc::clone(&beatmaps);
            let songs = songs_dir.to_path_buf();
            let outcome = tokio::task::spawn_blocking(move || {
                decode_and_enrich(calculator.as_ref(), &path, &songs, |md5| beatmaps.get(md5).cloned())
            })
            .await
            .map_err(join_error)
            .and_then(|r| r);

            match outcome {
                Ok(ingested) => {
                    if ingested.replay.pp.is_some() {
                        summary.enriched += 1;
                    }
                    summary.ingested += 1;
                    backfills.extend(ingested.details);
                    batch.push(ingested.replay);
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Could not process replay");
                    summary.failed += 1;
                }
            }
            self.progress
                .advance(|current, total| format!("Processing replay {current}/{total}: {file_name}"));

            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut backfills, &mut summary).await?;
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &mut backfills, &mut summary).await?;
        }

        Ok(summary)
    }

    async fn flush(
        &self,
        batch: &mut Vec<ReplayRecord>,
        backfills: &mut Vec<(String, BeatmapDetails)>,
        summary: &mut ScanSummary,
    ) -> Result<()> {
        flush_replay_batch(&self.db, batch, backfills).await?;
        summary.flushed_batches.push(batch.len());
        self.progress.record_batch();
        info!(
            batch = summary.flushed_batches.len(),
            replays = batch.len(),
            "Saved replay batch"
        );
        batch.clear();
        backfills.clear();
        Ok(())
    }

    /// Decode, enrich and persist one replay file
    ///
    /// Used for files that appear while the application is running. The
    /// upsert rule makes repeated ingestion of the same file harmless.
    pub async fn ingest_replay_file(&self, path: &Path, songs_dir: &Path) -> Result<ReplayRecord> {
        let decode_path = path.to_path_buf();
        let replay = tokio::task::spawn_blocking(move || read_replay(&decode_path))
            .await
            .map_err(join_error)??;

        let beatmap = load_beatmap(&self.db, &replay.beatmap_md5).await?;

        let calculator = Arc::clone(&self.calculator);
        let songs = songs_dir.to_path_buf();
        let ingested = tokio::task::spawn_blocking(move || {
            let mut replay = replay;
            let details = beatmap
                .as_ref()
                .and_then(|b| enrich_replay(calculator.as_ref(), b, &mut replay, &songs));
            IngestedReplay { replay, details }
        })
        .await
        .map_err(join_error)?;

        let backfills: Vec<_> = ingested.details.into_iter().collect();
        flush_replay_batch(&self.db, std::slice::from_ref(&ingested.replay), &backfills).await?;

        info!(
            replay = %ingested.replay.replay_md5,
            player = %ingested.replay.player_name,
            pp = ?ingested.replay.pp,
            "Ingested replay {}",
            path.display()
        );
        Ok(ingested.replay)
    }
}

/// Replay files directly inside `dir`, sorted by name
fn discover_replay_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case(REPLAY_EXTENSION))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn decode_and_enrich(
    calculator: &dyn DifficultyCalculator,
    path: &Path,
    songs_dir: &Path,
    lookup: impl Fn(&str) -> Option<BeatmapRecord>,
) -> Result<IngestedReplay> {
    let mut replay = read_replay(path)?;
    let details = lookup(&replay.beatmap_md5)
        .and_then(|beatmap| enrich_replay(calculator, &beatmap, &mut replay, songs_dir));
    Ok(IngestedReplay { replay, details })
}

/// Attach performance, difficulty and tempo data to a decoded replay
///
/// Returns the parsed detail file for backfilling the beatmap. Leaves the
/// derived fields empty when the detail file is missing or the calculator
/// fails.
fn enrich_replay(
    calculator: &dyn DifficultyCalculator,
    beatmap: &BeatmapRecord,
    replay: &mut ReplayRecord,
    songs_dir: &Path,
) -> Option<(String, BeatmapDetails)> {
    let path = safe_join(
        songs_dir,
        &[beatmap.folder_name.as_str(), beatmap.osu_file_name.as_str()],
    )
    .filter(|p| p.is_file());
    let Some(path) = path else {
        debug!(
            replay = %replay.replay_md5,
            beatmap = %beatmap.md5_hash,
            "Detail file missing, replay left unenriched"
        );
        return None;
    };

    match calculator.difficulty(&path, replay.mods_used) {
        Ok(attrs) => {
            replay.stars = Some(round2(attrs.stars));
            replay.map_max_combo = Some(attrs.max_combo);
            match calculator.performance(&attrs, &replay.hits, u32::from(replay.max_combo)) {
                Ok(perf) => replay.pp = Some(round2(perf.pp)),
                Err(e) => warn!(replay = %replay.replay_md5, error = %e, "Performance calculation failed"),
            }
        }
        Err(e) => {
            warn!(replay = %replay.replay_md5, error = %e, "Difficulty calculation failed");
        }
    }

    let details = match read_osu_file(&path) {
        Ok(details) => details,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Could not parse detail file");
            return None;
        }
    };

    let rate = clock_rate(replay.mods_used);
    let base_bpm = details.bpm.or((beatmap.bpm > 0.0).then_some(beatmap.bpm));
    replay.bpm = base_bpm.map(|b| round2(b * rate));
    replay.bpm_min = details.bpm_min.map(|b| round2(b * rate));
    replay.bpm_max = details.bpm_max.map(|b| round2(b * rate));

    Some((beatmap.md5_hash.clone(), details))
}

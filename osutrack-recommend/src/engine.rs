//! Recommendation engine
//!
//! The requested modifier mask picks one of three lookup paths:
//! - nomod: the beatmap rows' own difficulty columns
//! - cached: the precomputed snapshot for one cached combination
//! - live: any other combination, computed on demand over a random pool
//!
//! Every path returns at most one beatmap, chosen uniformly among the
//! qualifying candidates.

use crate::focus::{Focus, FocusThresholds};
use osutrack_common::config::{safe_join, PipelineConfig};
use osutrack_common::db::beatmaps::{beatmap_from_row, BEATMAP_COLUMNS};
use osutrack_common::db::BeatmapRecord;
use osutrack_common::difficulty::DifficultyCalculator;
use osutrack_common::mods::{difficulty_key, DifficultyKey, STANDARD_MODE};
use osutrack_common::scoring::round2;
use osutrack_common::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Live prefilter: nomod score in `[target * LOW, target * HIGH + band)`
const LIVE_PREFILTER_LOW: f64 = 0.5;
const LIVE_PREFILTER_HIGH: f64 = 2.0;

const MOD_CACHE_FROM: &str = "FROM beatmap_mod_cache m JOIN beatmaps b ON b.md5_hash = m.md5_hash";
const MOD_CACHE_COLUMNS: &str = "m.stars AS mod_stars, m.bpm AS mod_bpm, \
    m.ar AS mod_ar, m.od AS mod_od, m.cs AS mod_cs, m.hp AS mod_hp";

/// What the player asked for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendQuery {
    /// Lower edge of the accepted difficulty band
    pub target_stars: f64,
    /// Highest accepted effective tempo
    pub max_bpm: f64,
    #[serde(default)]
    pub mods: u32,
    #[serde(default)]
    pub focus: Option<Focus>,
    /// Beatmap hashes already shown to the player
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl RecommendQuery {
    pub fn new(target_stars: f64, max_bpm: f64) -> Self {
        Self {
            target_stars,
            max_bpm,
            ..Self::default()
        }
    }

    pub fn with_mods(mut self, mods: u32) -> Self {
        self.mods = mods;
        self
    }

    pub fn with_focus(mut self, focus: Option<Focus>) -> Self {
        self.focus = focus;
        self
    }

    pub fn excluding<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(ids.into_iter().map(Into::into));
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.target_stars.is_finite() || self.target_stars < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Target difficulty must be a non-negative number, got {}",
                self.target_stars
            )));
        }
        if !self.max_bpm.is_finite() || self.max_bpm < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Tempo ceiling must be a non-negative number, got {}",
                self.max_bpm
            )));
        }
        Ok(())
    }
}

/// Lookup path that produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Nomod,
    Cached,
    Live,
}

/// A recommended beatmap with its difficulty under the requested modifiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub beatmap: BeatmapRecord,
    pub mods: u32,
    pub effective_stars: f64,
    pub effective_bpm: f64,
    pub effective_ar: f64,
    pub effective_od: f64,
    pub effective_cs: f64,
    pub effective_hp: f64,
    pub source: RecommendationSource,
}

/// Recommendation tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommenderOptions {
    /// Width of the accepted difficulty band above the target
    pub star_band: f64,
    /// Candidates evaluated on the live path
    pub live_candidate_pool: usize,
    pub thresholds: FocusThresholds,
}

impl Default for RecommenderOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl RecommenderOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            star_band: config.star_band,
            live_candidate_pool: config.live_candidate_pool.max(1),
            thresholds: FocusThresholds::default(),
        }
    }
}

pub struct Recommender {
    db: SqlitePool,
    calculator: Arc<dyn DifficultyCalculator>,
    songs_dir: PathBuf,
    options: RecommenderOptions,
}

impl Recommender {
    pub fn new(
        db: SqlitePool,
        calculator: Arc<dyn DifficultyCalculator>,
        songs_dir: impl Into<PathBuf>,
        options: RecommenderOptions,
    ) -> Self {
        Self {
            db,
            calculator,
            songs_dir: songs_dir.into(),
            options,
        }
    }

    pub fn options(&self) -> &RecommenderOptions {
        &self.options
    }

    /// Pick one beatmap matching `query`, or `None` when nothing qualifies
    pub async fn recommend(&self, query: &RecommendQuery) -> Result<Option<Recommendation>> {
        query.validate()?;

        let key = difficulty_key(query.mods);
        let picked = match key {
            DifficultyKey::Nomod => self.pick_nomod(query).await?,
            DifficultyKey::Cached(mask) => self.pick_cached(query, mask).await?,
            DifficultyKey::Uncached(mods) => self.pick_live(query, mods).await?,
        };

        match &picked {
            Some(r) => info!(
                md5 = %r.beatmap.md5_hash,
                stars = r.effective_stars,
                bpm = r.effective_bpm,
                source = ?r.source,
                "Recommended beatmap"
            ),
            None => debug!(
                target = query.target_stars,
                max_bpm = query.max_bpm,
                mods = query.mods,
                ?key,
                "No beatmap qualifies"
            ),
        }
        Ok(picked)
    }

    async fn pick_nomod(&self, query: &RecommendQuery) -> Result<Option<Recommendation>> {
        let from = "FROM beatmaps b";
        let Some(row) = self.pick_uniform(from, BEATMAP_COLUMNS, query, "b", None).await? else {
            return Ok(None);
        };

        let beatmap = beatmap_from_row(&row)?;
        Ok(Some(Recommendation {
            mods: query.mods,
            effective_stars: beatmap.stars.unwrap_or_default(),
            effective_bpm: beatmap.bpm,
            effective_ar: beatmap.ar,
            effective_od: beatmap.od,
            effective_cs: beatmap.cs,
            effective_hp: beatmap.hp,
            source: RecommendationSource::Nomod,
            beatmap,
        }))
    }

    async fn pick_cached(&self, query: &RecommendQuery, mask: u32) -> Result<Option<Recommendation>> {
        let columns = format!("{BEATMAP_COLUMNS}, {MOD_CACHE_COLUMNS}");
        let Some(row) = self
            .pick_uniform(MOD_CACHE_FROM, &columns, query, "m", Some(mask))
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(Recommendation {
            beatmap: beatmap_from_row(&row)?,
            mods: query.mods,
            effective_stars: row.try_get("mod_stars")?,
            effective_bpm: row.try_get("mod_bpm")?,
            effective_ar: row.try_get("mod_ar")?,
            effective_od: row.try_get("mod_od")?,
            effective_cs: row.try_get("mod_cs")?,
            effective_hp: row.try_get("mod_hp")?,
            source: RecommendationSource::Cached,
        }))
    }

    /// Count the qualifying rows, then fetch one at a random offset
    ///
    /// Both statements share one read transaction so a concurrent flush cannot
    /// shrink the set between them.
    async fn pick_uniform(
        &self,
        from: &str,
        columns: &str,
        query: &RecommendQuery,
        alias: &str,
        cached_mask: Option<u32>,
    ) -> Result<Option<SqliteRow>> {
        let mut count_qb = QueryBuilder::new(format!("SELECT COUNT(*) {from}"));
        self.push_qualifying(&mut count_qb, query, alias, cached_mask);
        let mut tx = self.db.begin().await?;
        let count: i64 = count_qb.build_query_scalar().fetch_one(&mut *tx).await?;
        if count == 0 {
            return Ok(None);
        }

        let offset = rand::thread_rng().gen_range(0..count);
        debug!(count, offset, "Picking among qualifying beatmaps");

        let mut pick_qb = QueryBuilder::new(format!("SELECT {columns} {from}"));
        self.push_qualifying(&mut pick_qb, query, alias, cached_mask);
        pick_qb
            .push(" ORDER BY b.md5_hash LIMIT 1 OFFSET ")
            .push_bind(offset);
        let row = pick_qb.build().fetch_optional(&mut *tx).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// WHERE clause for the SQL paths; `alias` owns the difficulty columns
    fn push_qualifying(
        &self,
        qb: &mut QueryBuilder<'_, Sqlite>,
        query: &RecommendQuery,
        alias: &str,
        cached_mask: Option<u32>,
    ) {
        qb.push(" WHERE b.game_mode = ")
            .push_bind(i64::from(STANDARD_MODE));
        if let Some(mask) = cached_mask {
            qb.push(" AND m.mods = ").push_bind(i64::from(mask));
        }
        qb.push(format!(" AND {alias}.stars >= "))
            .push_bind(query.target_stars);
        qb.push(format!(" AND {alias}.stars < "))
            .push_bind(query.target_stars + self.options.star_band);
        qb.push(format!(" AND {alias}.bpm <= "))
            .push_bind(query.max_bpm);
        if let Some(focus) = query.focus {
            self.options.thresholds.push_condition(qb, focus, alias);
        }
        push_exclusions(qb, &query.exclude);
    }

    /// Evaluate a random nomod-prefiltered pool with the exact mask
    async fn pick_live(&self, query: &RecommendQuery, mods: u32) -> Result<Option<Recommendation>> {
        let band = self.options.star_band;
        let mut qb = QueryBuilder::new(format!("SELECT {BEATMAP_COLUMNS} FROM beatmaps b"));
        qb.push(" WHERE b.game_mode = ")
            .push_bind(i64::from(STANDARD_MODE))
            .push(" AND b.stars >= ")
            .push_bind(query.target_stars * LIVE_PREFILTER_LOW)
            .push(" AND b.stars < ")
            .push_bind(query.target_stars * LIVE_PREFILTER_HIGH + band);
        push_exclusions(&mut qb, &query.exclude);
        qb.push(" ORDER BY RANDOM() LIMIT ")
            .push_bind(i64::try_from(self.options.live_candidate_pool).unwrap_or(i64::MAX));

        let rows = qb.build().fetch_all(&self.db).await?;
        let candidates = rows
            .iter()
            .map(beatmap_from_row)
            .collect::<Result<Vec<_>>>()?;
        debug!(candidates = candidates.len(), mods, "Evaluating live candidates");

        for beatmap in candidates {
            let path = safe_join(
                &self.songs_dir,
                &[beatmap.folder_name.as_str(), beatmap.osu_file_name.as_str()],
            )
            .filter(|p| p.is_file());
            let Some(path) = path else {
                continue;
            };

            let calculator = Arc::clone(&self.calculator);
            let computed = tokio::task::spawn_blocking(move || calculator.difficulty(&path, mods))
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            let attrs = match computed {
                Ok(attrs) => attrs,
                Err(e) => {
                    warn!(md5 = %beatmap.md5_hash, error = %e, "Live difficulty calculation failed");
                    continue;
                }
            };

            let stars = round2(attrs.stars);
            let bpm = round2(beatmap.bpm * attrs.clock_rate);
            let in_band = stars >= query.target_stars && stars < query.target_stars + band;
            let focus_ok = query.focus.map_or(true, |focus| {
                self.options
                    .thresholds
                    .matches(focus, attrs.aim, attrs.speed, attrs.slider_factor)
            });
            if !(in_band && bpm <= query.max_bpm && focus_ok) {
                continue;
            }

            return Ok(Some(Recommendation {
                mods: query.mods,
                effective_stars: stars,
                effective_bpm: bpm,
                effective_ar: round2(attrs.ar),
                effective_od: round2(attrs.od),
                effective_cs: round2(attrs.cs),
                effective_hp: round2(attrs.hp),
                source: RecommendationSource::Live,
                beatmap,
            }));
        }
        Ok(None)
    }
}

fn push_exclusions(qb: &mut QueryBuilder<'_, Sqlite>, exclude: &[String]) {
    if exclude.is_empty() {
        return;
    }
    qb.push(" AND b.md5_hash NOT IN (");
    let mut separated = qb.separated(", ");
    for md5 in exclude {
        separated.push_bind(md5.clone());
    }
    separated.push_unseparated(")");
}

//! Player statistics and difficulty suggestions

use crate::focus::{Focus, FocusThresholds};
use osutrack_common::db::replays::{player_play_count, player_pp_values, recent_play_stars};
use osutrack_common::mods::{CORE_MOD_MASK, STANDARD_MODE};
use osutrack_common::scoring::{round2, weighted_performance};
use osutrack_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

/// Recent plays averaged into a difficulty suggestion
pub const SUGGESTION_WINDOW: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStats {
    pub player_name: String,
    pub play_count: i64,
    pub top_play_pp: f64,
    /// `sum(pp_i * 0.95^i)` over plays sorted by performance
    pub total_pp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StarSuggestion {
    pub suggested_sr: f64,
    pub plays_considered: usize,
    pub mods: u32,
}

/// Analyzed standard-mode beatmaps per skill focus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FocusReport {
    pub analyzed: usize,
    pub aim: usize,
    pub speed: usize,
    pub technical: usize,
    pub balanced: usize,
}

impl FocusReport {
    fn record(&mut self, focus: Option<Focus>) {
        self.analyzed += 1;
        match focus {
            Some(Focus::Aim) => self.aim += 1,
            Some(Focus::Speed) => self.speed += 1,
            Some(Focus::Technical) => self.technical += 1,
            None => self.balanced += 1,
        }
    }
}

pub async fn player_stats(pool: &SqlitePool, player_name: &str) -> Result<PlayerStats> {
    let play_count = player_play_count(pool, player_name).await?;
    let pp_values = player_pp_values(pool, player_name).await?;

    let top_play_pp = pp_values.iter().copied().fold(0.0, f64::max);
    Ok(PlayerStats {
        player_name: player_name.to_string(),
        play_count,
        top_play_pp: round2(top_play_pp),
        total_pp: round2(weighted_performance(&pp_values)),
    })
}

/// Average difficulty of the player's recent plays with the same core modifiers
///
/// `None` when no analyzed standard-mode play matches.
pub async fn suggest_stars(
    pool: &SqlitePool,
    player_name: &str,
    mods: u32,
) -> Result<Option<StarSuggestion>> {
    let stars = recent_play_stars(pool, player_name, CORE_MOD_MASK, mods, SUGGESTION_WINDOW).await?;
    if stars.is_empty() {
        debug!(player = player_name, mods, "No plays to base a suggestion on");
        return Ok(None);
    }

    let average = stars.iter().sum::<f64>() / stars.len() as f64;
    Ok(Some(StarSuggestion {
        suggested_sr: round2(average),
        plays_considered: stars.len(),
        mods: mods & CORE_MOD_MASK,
    }))
}

/// Classify every analyzed standard-mode beatmap
pub async fn focus_report(pool: &SqlitePool, thresholds: &FocusThresholds) -> Result<FocusReport> {
    let rows: Vec<(f64, f64, f64)> = sqlx::query_as(
        r#"
        SELECT aim, speed, slider_factor FROM beatmaps
        WHERE game_mode = ? AND aim IS NOT NULL AND speed IS NOT NULL
          AND slider_factor IS NOT NULL
        "#,
    )
    .bind(i64::from(STANDARD_MODE))
    .fetch_all(pool)
    .await?;

    let mut report = FocusReport::default();
    for (aim, speed, slider_factor) in rows {
        report.record(thresholds.classify(aim, speed, slider_factor));
    }
    Ok(report)
}

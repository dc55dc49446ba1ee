//! Accuracy, rank and weighted performance helpers

use crate::db::{BeatmapRecord, Grade, HitCounts, ReplayRecord};
use crate::mods::STANDARD_MODE;

/// Weight decay applied per position when summing sorted performance values
pub const PERFORMANCE_WEIGHT_DECAY: f64 = 0.95;

/// osu!standard accuracy in percent (0.0 for other modes or empty plays)
pub fn accuracy(game_mode: u8, hits: &HitCounts) -> f64 {
    if game_mode != STANDARD_MODE {
        return 0.0;
    }
    let total = u32::from(hits.n300) + u32::from(hits.n100) + u32::from(hits.n50) + u32::from(hits.n_miss);
    if total == 0 {
        return 0.0;
    }
    let points = 300 * u32::from(hits.n300) + 100 * u32::from(hits.n100) + 50 * u32::from(hits.n50);
    f64::from(points) / f64::from(total * 300) * 100.0
}

/// Rank label for a play
///
/// Standard-mode plays whose hit total matches the map's object count get a
/// live rank from hit ratios; everything else falls back to the grade the
/// game client stored for that mode.
pub fn replay_rank(replay: &ReplayRecord, beatmap: Option<&BeatmapRecord>) -> &'static str {
    if replay.game_mode == STANDARD_MODE {
        if let Some(rank) = beatmap.and_then(|b| live_rank(&replay.hits, b)) {
            return rank;
        }
    }

    beatmap
        .and_then(|b| b.grades.for_mode(replay.game_mode))
        .and_then(Grade::rank_label)
        .unwrap_or("N/A")
}

fn live_rank(hits: &HitCounts, beatmap: &BeatmapRecord) -> Option<&'static str> {
    let total_objects = u32::from(beatmap.num_hitcircles)
        + u32::from(beatmap.num_sliders)
        + u32::from(beatmap.num_spinners);
    let judged = u32::from(hits.n300) + u32::from(hits.n100) + u32::from(hits.n50) + u32::from(hits.n_miss);
    if total_objects == 0 || judged != total_objects {
        return None;
    }

    let total = f64::from(total_objects);
    let ratio_300 = f64::from(hits.n300) / total;
    let ratio_50 = f64::from(hits.n50) / total;
    let no_miss = hits.n_miss == 0;

    let rank = if u32::from(hits.n300) == total_objects {
        "SS"
    } else if ratio_300 > 0.9 && ratio_50 < 0.01 && no_miss {
        "S"
    } else if (ratio_300 > 0.8 && no_miss) || ratio_300 > 0.9 {
        "A"
    } else if (ratio_300 > 0.7 && no_miss) || ratio_300 > 0.8 {
        "B"
    } else if ratio_300 > 0.6 {
        "C"
    } else {
        "D"
    };
    Some(rank)
}

/// Sum of performance values weighted by `0.95^i` after sorting descending
pub fn weighted_performance(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
        .iter()
        .zip(0..)
        .map(|(pp, i)| pp * PERFORMANCE_WEIGHT_DECAY.powi(i))
        .sum()
}

/// Round to two decimals, the precision derived values are stored at
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Grades;

    fn hits(n300: u16, n100: u16, n50: u16, n_miss: u16) -> HitCounts {
        HitCounts {
            n300,
            n100,
            n50,
            n_miss,
            ..HitCounts::default()
        }
    }

    fn beatmap_with_objects(circles: u16) -> BeatmapRecord {
        BeatmapRecord {
            md5_hash: "map".to_string(),
            num_hitcircles: circles,
            ..BeatmapRecord::default()
        }
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(0, &hits(100, 0, 0, 0)), 100.0);
        let acc = accuracy(0, &hits(90, 10, 0, 0));
        assert!((acc - 93.333).abs() < 0.01);
        assert_eq!(accuracy(0, &hits(0, 0, 0, 0)), 0.0);
        assert_eq!(accuracy(1, &hits(100, 0, 0, 0)), 0.0);
    }

    #[test]
    fn test_live_rank_thresholds() {
        let beatmap = beatmap_with_objects(100);
        let mut replay = ReplayRecord::default();

        replay.hits = hits(100, 0, 0, 0);
        assert_eq!(replay_rank(&replay, Some(&beatmap)), "SS");

        replay.hits = hits(95, 5, 0, 0);
        assert_eq!(replay_rank(&replay, Some(&beatmap)), "S");

        replay.hits = hits(95, 4, 0, 1);
        assert_eq!(replay_rank(&replay, Some(&beatmap)), "A");

        replay.hits = hits(75, 25, 0, 0);
        assert_eq!(replay_rank(&replay, Some(&beatmap)), "B");

        replay.hits = hits(65, 30, 0, 5);
        assert_eq!(replay_rank(&replay, Some(&beatmap)), "C");

        replay.hits = hits(50, 40, 5, 5);
        assert_eq!(replay_rank(&replay, Some(&beatmap)), "D");
    }

    #[test]
    fn test_rank_falls_back_to_stored_grade() {
        let mut beatmap = beatmap_with_objects(100);
        beatmap.grades = Grades {
            osu: Some(Grade::A),
            ..Grades::default()
        };
        let mut replay = ReplayRecord::default();
        // Hit total does not match the object count (failed play)
        replay.hits = hits(10, 0, 0, 2);
        assert_eq!(replay_rank(&replay, Some(&beatmap)), "A");
        assert_eq!(replay_rank(&replay, None), "N/A");
    }

    #[test]
    fn test_weighted_performance() {
        let total = weighted_performance(&[100.0, 200.0, 0.0]);
        assert!((total - (200.0 + 100.0 * 0.95)).abs() < 1e-9);
        assert_eq!(weighted_performance(&[]), 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(2.005_1), 2.01);
    }
}

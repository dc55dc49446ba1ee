//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Achieved grade for one game mode, as stored by the game client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    /// Silver SS
    XH,
    /// Silver S
    SH,
    X,
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Decode the client's grade byte; 9 means "not played"
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Grade::XH),
            1 => Some(Grade::SH),
            2 => Some(Grade::X),
            3 => Some(Grade::S),
            4 => Some(Grade::A),
            5 => Some(Grade::B),
            6 => Some(Grade::C),
            7 => Some(Grade::D),
            8 => Some(Grade::F),
            _ => None,
        }
    }

    /// Display rank; failed plays have none
    pub fn rank_label(self) -> Option<&'static str> {
        match self {
            Grade::XH | Grade::X => Some("SS"),
            Grade::SH | Grade::S => Some("S"),
            Grade::A => Some("A"),
            Grade::B => Some("B"),
            Grade::C => Some("C"),
            Grade::D => Some("D"),
            Grade::F => None,
        }
    }
}

/// Per-mode achieved grades, persisted as a JSON object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grades {
    #[serde(default)]
    pub osu: Option<Grade>,
    #[serde(default)]
    pub taiko: Option<Grade>,
    #[serde(default)]
    pub ctb: Option<Grade>,
    #[serde(default)]
    pub mania: Option<Grade>,
}

impl Grades {
    /// Build from the four grade bytes in mode order
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            osu: Grade::from_byte(bytes[0]),
            taiko: Grade::from_byte(bytes[1]),
            ctb: Grade::from_byte(bytes[2]),
            mania: Grade::from_byte(bytes[3]),
        }
    }

    pub fn for_mode(&self, game_mode: u8) -> Option<Grade> {
        match game_mode {
            0 => self.osu,
            1 => self.taiko,
            2 => self.ctb,
            3 => self.mania,
            _ => None,
        }
    }
}

/// One beatmap (content record) keyed by its content hash
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatmapRecord {
    pub md5_hash: String,
    pub artist: String,
    pub title: String,
    pub creator: String,
    /// Variant name shown in the difficulty selector
    pub difficulty: String,
    pub folder_name: String,
    pub osu_file_name: String,
    pub game_mode: u8,
    pub num_hitcircles: u16,
    pub num_sliders: u16,
    pub num_spinners: u16,
    pub ar: f64,
    pub cs: f64,
    pub hp: f64,
    pub od: f64,
    pub grades: Grades,
    pub last_played_at: Option<DateTime<Utc>>,
    /// Base tempo from the library snapshot (0.0 when unknown)
    pub bpm: f64,

    // Optional fields discovered by enrichment; upserts keep existing values
    // when these are absent.
    pub bpm_min: Option<f64>,
    pub bpm_max: Option<f64>,
    pub audio_file: Option<String>,
    pub background_file: Option<String>,
    /// Nomod difficulty score
    pub stars: Option<f64>,
    pub max_combo: Option<u32>,
    pub aim: Option<f64>,
    pub speed: Option<f64>,
    pub slider_factor: Option<f64>,
}

impl BeatmapRecord {
    /// Relative path of the detail file under the content root
    pub fn detail_file_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.folder_name).join(&self.osu_file_name)
    }

    pub fn is_analyzed(&self) -> bool {
        self.stars.is_some()
    }
}

/// Auxiliary attributes parsed from a beatmap's detail (`.osu`) file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatmapDetails {
    pub audio_file: Option<String>,
    pub background_file: Option<String>,
    pub game_mode: Option<u8>,
    /// Tempo of the first uninherited timing point
    pub bpm: Option<f64>,
    pub bpm_min: Option<f64>,
    pub bpm_max: Option<f64>,
}

/// Difficulty of one beatmap under one cached modifier combination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModDifficultySnapshot {
    pub md5_hash: String,
    pub mods: u32,
    pub stars: f64,
    pub ar: f64,
    pub od: f64,
    pub cs: f64,
    pub hp: f64,
    /// Base tempo scaled by the combination's clock rate
    pub bpm: f64,
    pub max_combo: u32,
    pub aim: f64,
    pub speed: f64,
    pub slider_factor: f64,
}

/// Raw hit-outcome counts of one play
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitCounts {
    pub n300: u16,
    pub n100: u16,
    pub n50: u16,
    pub n_geki: u16,
    pub n_katu: u16,
    pub n_miss: u16,
}

/// One play (session record) keyed by its replay hash
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub replay_md5: String,
    /// Weak reference; the beatmap may be unknown
    pub beatmap_md5: String,
    /// Stem of the file the record was decoded from
    pub source_file: Option<String>,
    pub game_mode: u8,
    pub game_version: u32,
    pub player_name: String,
    #[serde(flatten)]
    pub hits: HitCounts,
    pub total_score: u32,
    pub max_combo: u16,
    pub perfect: bool,
    pub mods_used: u32,
    pub played_at: Option<DateTime<Utc>>,

    // Derived; written only while `pp` is still absent
    pub pp: Option<f64>,
    pub stars: Option<f64>,
    pub map_max_combo: Option<u32>,
    pub bpm: Option<f64>,
    pub bpm_min: Option<f64>,
    pub bpm_max: Option<f64>,
}

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Paging and free-text filter shared by listings
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub search: Option<String>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
        }
    }
}

impl PageQuery {
    /// Limit clamped to 1..=500
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, 500)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.effective_limit())
    }

    /// `%term%` LIKE pattern, or None when no search term was given
    pub fn like_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"))
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_bytes() {
        assert_eq!(Grade::from_byte(0), Some(Grade::XH));
        assert_eq!(Grade::from_byte(8), Some(Grade::F));
        assert_eq!(Grade::from_byte(9), None);
        assert_eq!(Grade::from_byte(200), None);
    }

    #[test]
    fn test_grades_json_is_structured() {
        let grades = Grades::from_bytes([4, 9, 9, 0]);
        let json = serde_json::to_string(&grades).unwrap();
        assert_eq!(json, r#"{"osu":"A","taiko":null,"ctb":null,"mania":"XH"}"#);
        let back: Grades = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grades);

        // Unknown shapes are rejected rather than evaluated
        assert!(serde_json::from_str::<Grades>(r#"{"osu":"__import__"}"#).is_err());
    }

    #[test]
    fn test_page_query_offset() {
        let query = PageQuery {
            page: 3,
            limit: 20,
            search: Some("  ".to_string()),
        };
        assert_eq!(query.offset(), 40);
        assert_eq!(query.like_pattern(), None);

        let query = PageQuery {
            page: 0,
            limit: 10_000,
            search: Some("camellia".to_string()),
        };
        assert_eq!(query.offset(), 0);
        assert_eq!(query.effective_limit(), 500);
        assert_eq!(query.like_pattern().as_deref(), Some("%camellia%"));
    }
}

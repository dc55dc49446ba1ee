//! # osutrack recommendation library
//!
//! Picks practice beatmaps around a target difficulty and summarizes a
//! player's history:
//! - Recommendation engine (nomod, cached-modifier and live paths)
//! - Skill-focus classification strategy
//! - Player statistics and difficulty suggestions

pub mod engine;
pub mod focus;
pub mod stats;

pub use engine::{Recommendation, RecommendationSource, RecommendQuery, Recommender, RecommenderOptions};
pub use focus::{Focus, FocusThresholds};
pub use stats::{focus_report, player_stats, suggest_stars, FocusReport, PlayerStats, StarSuggestion};

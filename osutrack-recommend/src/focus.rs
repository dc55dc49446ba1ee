//! Skill-focus classification
//!
//! A focus tag narrows recommendations by comparing a beatmap's difficulty
//! sub-components. The thresholds are empirical constants and are kept
//! together in [`FocusThresholds`] so they can be replaced as a unit.

use osutrack_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};
use std::fmt;
use std::str::FromStr;

/// Skill a recommendation should emphasize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Focus {
    Aim,
    Speed,
    Technical,
}

impl Focus {
    /// Classification order
    pub const ALL: [Focus; 3] = [Focus::Aim, Focus::Speed, Focus::Technical];

    pub fn as_str(self) -> &'static str {
        match self {
            Focus::Aim => "aim",
            Focus::Speed => "speed",
            Focus::Technical => "technical",
        }
    }

    /// Parse an optional request value; empty and "balanced" mean no focus
    pub fn parse_optional(value: Option<&str>) -> Result<Option<Focus>> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) if v.eq_ignore_ascii_case("balanced") => Ok(None),
            Some(v) => v.parse().map(Some),
        }
    }
}

impl FromStr for Focus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aim" | "jump" | "jumps" => Ok(Focus::Aim),
            "speed" | "stream" | "streams" | "stamina" => Ok(Focus::Speed),
            "technical" | "tech" | "flow" => Ok(Focus::Technical),
            other => Err(Error::InvalidInput(format!("Unknown skill focus: {other}"))),
        }
    }
}

impl fmt::Display for Focus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named thresholds deciding which focus a beatmap belongs to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusThresholds {
    /// Aim focus: aim exceeds speed by this factor
    pub aim_ratio: f64,
    /// Speed focus: speed exceeds aim by this factor
    pub speed_ratio: f64,
    /// Technical focus: slider factor above this value
    pub technical_slider_factor: f64,
}

impl Default for FocusThresholds {
    fn default() -> Self {
        Self {
            aim_ratio: 1.1,
            speed_ratio: 1.1,
            technical_slider_factor: 0.95,
        }
    }
}

impl FocusThresholds {
    pub fn matches(&self, focus: Focus, aim: f64, speed: f64, slider_factor: f64) -> bool {
        match focus {
            Focus::Aim => aim > speed * self.aim_ratio,
            Focus::Speed => speed > aim * self.speed_ratio,
            Focus::Technical => slider_factor > self.technical_slider_factor,
        }
    }

    /// First matching focus in [`Focus::ALL`] order; `None` means balanced
    pub fn classify(&self, aim: f64, speed: f64, slider_factor: f64) -> Option<Focus> {
        Focus::ALL
            .into_iter()
            .find(|focus| self.matches(*focus, aim, speed, slider_factor))
    }

    /// Append the SQL form of [`matches`](Self::matches) for columns of `alias`
    pub(crate) fn push_condition(&self, qb: &mut QueryBuilder<'_, Sqlite>, focus: Focus, alias: &str) {
        match focus {
            Focus::Aim => {
                qb.push(format!(" AND {alias}.aim > {alias}.speed * "))
                    .push_bind(self.aim_ratio);
            }
            Focus::Speed => {
                qb.push(format!(" AND {alias}.speed > {alias}.aim * "))
                    .push_bind(self.speed_ratio);
            }
            Focus::Technical => {
                qb.push(format!(" AND {alias}.slider_factor > "))
                    .push_bind(self.technical_slider_factor);
            }
        }
    }
}

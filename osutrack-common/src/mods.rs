//! Gameplay modifier bitmask model
//!
//! Each set bit enables one modifier. Only a handful change the difficulty
//! score or the clock rate; those drive caching and recommendation.

use crate::{Error, Result};

pub const NO_FAIL: u32 = 1;
pub const EASY: u32 = 1 << 1;
pub const TOUCH_DEVICE: u32 = 1 << 2;
pub const HIDDEN: u32 = 1 << 3;
pub const HARD_ROCK: u32 = 1 << 4;
pub const SUDDEN_DEATH: u32 = 1 << 5;
pub const DOUBLE_TIME: u32 = 1 << 6;
pub const RELAX: u32 = 1 << 7;
pub const HALF_TIME: u32 = 1 << 8;
/// Always set together with DOUBLE_TIME by the game client
pub const NIGHTCORE: u32 = 1 << 9;
pub const FLASHLIGHT: u32 = 1 << 10;
pub const AUTOPLAY: u32 = 1 << 11;
pub const SPUN_OUT: u32 = 1 << 12;
pub const AUTOPILOT: u32 = 1 << 13;
pub const PERFECT: u32 = 1 << 14;
pub const SCORE_V2: u32 = 1 << 29;
pub const MIRROR: u32 = 1 << 30;

/// Game mode id of osu!standard, the only mode difficulty is cached for
pub const STANDARD_MODE: u8 = 0;

/// Modifier combinations whose difficulty is precomputed during sync
pub const CACHED_MOD_COMBINATIONS: [u32; 4] = [EASY, HARD_ROCK, DOUBLE_TIME, HALF_TIME];

/// Modifiers that change the difficulty score or clock rate
pub const DIFFICULTY_MASK: u32 = EASY | HARD_ROCK | DOUBLE_TIME | NIGHTCORE | HALF_TIME | FLASHLIGHT;

/// Modifiers compared when matching a player's plays against a request
pub const CORE_MOD_MASK: u32 = EASY | HIDDEN | HARD_ROCK | DOUBLE_TIME | HALF_TIME | FLASHLIGHT;

const CLOCK_MASK: u32 = DOUBLE_TIME | NIGHTCORE | HALF_TIME;
const RESHAPE_MASK: u32 = EASY | HARD_ROCK;

/// Acronym table in display order; NC/DT and PF/SD are handled specially
const ACRONYMS: &[(u32, &str)] = &[
    (HIDDEN, "HD"),
    (HARD_ROCK, "HR"),
    (FLASHLIGHT, "FL"),
    (EASY, "EZ"),
    (NO_FAIL, "NF"),
    (HALF_TIME, "HT"),
    (RELAX, "RX"),
    (AUTOPILOT, "AP"),
    (SPUN_OUT, "SO"),
    (TOUCH_DEVICE, "TD"),
    (AUTOPLAY, "AU"),
    (MIRROR, "MR"),
    (SCORE_V2, "V2"),
];

/// Where the difficulty for a modifier mask can be found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyKey {
    /// No difficulty-relevant modifier: the nomod columns of the content record
    Nomod,
    /// Exactly one cached combination
    Cached(u32),
    /// Anything else: must be computed live with the full mask
    Uncached(u32),
}

/// Resolve the difficulty lookup key for a requested mask
///
/// A clock-rate modifier dominates, then a difficulty-reshaping one. The
/// mask is cached only when that dominant modifier is the whole
/// difficulty-relevant part of the request.
pub fn difficulty_key(mods: u32) -> DifficultyKey {
    let mut relevant = mods & DIFFICULTY_MASK;
    if relevant & NIGHTCORE != 0 {
        relevant = (relevant & !NIGHTCORE) | DOUBLE_TIME;
    }
    if relevant == 0 {
        return DifficultyKey::Nomod;
    }

    let dominant = if relevant & CLOCK_MASK != 0 {
        relevant & CLOCK_MASK
    } else if relevant & RESHAPE_MASK != 0 {
        relevant & RESHAPE_MASK
    } else {
        0
    };

    if dominant == relevant && CACHED_MOD_COMBINATIONS.contains(&dominant) {
        DifficultyKey::Cached(dominant)
    } else {
        DifficultyKey::Uncached(mods)
    }
}

/// Playback speed multiplier induced by the mask
pub fn clock_rate(mods: u32) -> f64 {
    if mods & (DOUBLE_TIME | NIGHTCORE) != 0 {
        1.5
    } else if mods & HALF_TIME != 0 {
        0.75
    } else {
        1.0
    }
}

/// Convert a mask to display acronyms ("NC" replaces "DT", "PF" replaces "SD")
pub fn acronyms(mods: u32) -> Vec<&'static str> {
    let mut active = Vec::new();
    if mods & NIGHTCORE != 0 {
        active.push("NC");
    } else if mods & DOUBLE_TIME != 0 {
        active.push("DT");
    }
    if mods & PERFECT != 0 {
        active.push("PF");
    } else if mods & SUDDEN_DEATH != 0 {
        active.push("SD");
    }
    active.extend(
        ACRONYMS
            .iter()
            .filter(|(bit, _)| mods & bit != 0)
            .map(|(_, name)| *name),
    );
    active
}

/// Parse a mask from either an integer ("72") or concatenated acronyms ("HDDT")
pub fn parse_mods(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nm") || trimmed.eq_ignore_ascii_case("nomod") {
        return Ok(0);
    }
    if let Ok(value) = trimmed.parse::<u32>() {
        return Ok(value);
    }

    let upper = trimmed.to_ascii_uppercase();
    let cleaned: String = upper.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if cleaned.len() % 2 != 0 {
        return Err(Error::InvalidInput(format!("Invalid modifier string: {input}")));
    }

    let mut mask = 0;
    for chunk in cleaned.as_bytes().chunks(2) {
        let acronym = std::str::from_utf8(chunk)
            .map_err(|_| Error::InvalidInput(format!("Invalid modifier string: {input}")))?;
        mask |= match acronym {
            "NC" => NIGHTCORE | DOUBLE_TIME,
            "DT" => DOUBLE_TIME,
            "PF" => PERFECT | SUDDEN_DEATH,
            "SD" => SUDDEN_DEATH,
            other => ACRONYMS
                .iter()
                .find(|(_, name)| *name == other)
                .map(|(bit, _)| *bit)
                .ok_or_else(|| Error::InvalidInput(format!("Unknown modifier: {other}")))?,
        };
    }
    Ok(mask)
}

//! Replay (`.osr`) header decoder
//!
//! Only the fixed header is decoded; the compressed cursor data that follows
//! the timestamp is never read. A truncated or malformed header fails the
//! whole file.

use super::reader::ByteReader;
use osutrack_common::db::{HitCounts, ReplayRecord};
use osutrack_common::{Error, Result};
use std::path::Path;

/// Read and decode the replay file at `path`
///
/// The file stem is recorded as the record's source file, and stands in for
/// the replay hash when the header carries none.
pub fn read_replay(path: &Path) -> Result<ReplayRecord> {
    if !path.is_file() {
        return Err(Error::MissingResource(format!(
            "Replay file not found: {}",
            path.display()
        )));
    }
    let data = std::fs::read(path)?;
    let mut replay =
        decode_replay(&data).map_err(|e| e.with_context(path.display().to_string()))?;
    replay.source_file = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned());

    if replay.replay_md5.is_empty() {
        match &replay.source_file {
            Some(stem) if !stem.is_empty() => replay.replay_md5 = stem.clone(),
            _ => {
                return Err(Error::format(0, "replay has no replay hash")
                    .with_context(path.display().to_string()))
            }
        }
    }
    Ok(replay)
}

/// Decode the replay header from memory
pub fn decode_replay(data: &[u8]) -> Result<ReplayRecord> {
    let mut reader = ByteReader::new(data);

    let game_mode = reader.read_u8()?;
    let game_version = reader.read_u32()?;
    let beatmap_md5 = reader.read_string()?;
    let player_name = reader.read_string()?;
    let replay_md5 = reader.read_string()?;

    let hits = HitCounts {
        n300: reader.read_u16()?,
        n100: reader.read_u16()?,
        n50: reader.read_u16()?,
        n_geki: reader.read_u16()?,
        n_katu: reader.read_u16()?,
        n_miss: reader.read_u16()?,
    };

    let total_score = reader.read_u32()?;
    let max_combo = reader.read_u16()?;
    let perfect = reader.read_bool()?;
    let mods_used = reader.read_u32()?;
    reader.skip_string()?; // life bar graph
    let played_at = reader.read_ticks()?;

    Ok(ReplayRecord {
        replay_md5,
        beatmap_md5,
        source_file: None,
        game_mode,
        game_version,
        player_name,
        hits,
        total_score,
        max_combo,
        perfect,
        mods_used,
        played_at,
        ..ReplayRecord::default()
    })
}

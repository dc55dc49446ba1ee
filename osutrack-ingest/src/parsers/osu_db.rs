//! Library snapshot (`osu!.db`) decoder
//!
//! The header declares the client version and a record count. The version
//! selects one [`RecordLayout`] for the whole file. One malformed record
//! fails the whole decode because the declared count can no longer be
//! trusted.

use super::layout::{DifficultyEncoding, RecordLayout};
use super::reader::ByteReader;
use chrono::{DateTime, Utc};
use osutrack_common::db::{BeatmapRecord, Grades};
use osutrack_common::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Timing point: beat length (8) + offset (8) + uninherited flag (1)
const TIMING_POINT_SIZE: usize = 17;

/// Decoded library snapshot
#[derive(Debug, Clone, Default)]
pub struct LibrarySnapshot {
    pub version: u32,
    pub folder_count: u32,
    pub account_unlocked: bool,
    pub unlock_date: Option<DateTime<Utc>>,
    pub player_name: String,
    /// Records declared by the header
    pub declared_count: u32,
    /// Records with a content hash, keyed by it
    pub beatmaps: HashMap<String, BeatmapRecord>,
    /// Records dropped for having no content hash
    pub dropped: usize,
}

/// Read and decode the snapshot file at `path`
pub fn read_library(path: &Path) -> Result<LibrarySnapshot> {
    if !path.is_file() {
        return Err(Error::MissingResource(format!(
            "Library snapshot not found: {}",
            path.display()
        )));
    }
    let data = std::fs::read(path)?;
    let snapshot = decode_library(&data)?;
    info!(
        version = snapshot.version,
        declared = snapshot.declared_count,
        beatmaps = snapshot.beatmaps.len(),
        dropped = snapshot.dropped,
        "Decoded library snapshot {}",
        path.display()
    );
    Ok(snapshot)
}

/// Decode a complete snapshot from memory
pub fn decode_library(data: &[u8]) -> Result<LibrarySnapshot> {
    let mut reader = ByteReader::new(data);

    let version = reader.read_u32()?;
    let folder_count = reader.read_u32()?;
    let account_unlocked = reader.read_bool()?;
    let unlock_date = reader.read_ticks()?;
    let player_name = reader.read_string()?;
    let declared_count = reader.read_u32()?;

    let layout = RecordLayout::for_version(version);
    debug!(version, min_version = layout.min_version, "Selected record layout");

    let mut beatmaps = HashMap::with_capacity((declared_count as usize).min(1 << 16));
    let mut dropped = 0;

    for index in 0..declared_count {
        let beatmap = decode_beatmap(&mut reader, layout)
            .map_err(|e| e.with_context(format!("beatmap record {index}")))?;
        if beatmap.md5_hash.is_empty() {
            dropped += 1;
            continue;
        }
        beatmaps.insert(beatmap.md5_hash.clone(), beatmap);
    }

    Ok(LibrarySnapshot {
        version,
        folder_count,
        account_unlocked,
        unlock_date,
        player_name,
        declared_count,
        beatmaps,
        dropped,
    })
}

fn read_difficulty(reader: &mut ByteReader<'_>, encoding: DifficultyEncoding) -> Result<f64> {
    let value = match encoding {
        DifficultyEncoding::Byte => f64::from(reader.read_u8()?),
        DifficultyEncoding::Single => f64::from(reader.read_f32()?),
    };
    Ok(if value.is_nan() { 0.0 } else { value.clamp(0.0, 10.0) })
}

/// Decode one record, consuming every byte of it
fn decode_beatmap(reader: &mut ByteReader<'_>, layout: &RecordLayout) -> Result<BeatmapRecord> {
    if layout.has_entry_size {
        reader.skip(4)?;
    }

    let artist = reader.read_string()?;
    reader.skip_string()?; // artist (unicode)
    let title = reader.read_string()?;
    reader.skip_string()?; // title (unicode)
    let creator = reader.read_string()?;
    let difficulty = reader.read_string()?;
    reader.skip_string()?; // audio file name
    let md5_hash = reader.read_string()?;
    let osu_file_name = reader.read_string()?;

    reader.skip(1)?; // ranked status
    let num_hitcircles = reader.read_u16()?;
    let num_sliders = reader.read_u16()?;
    let num_spinners = reader.read_u16()?;
    reader.skip(8)?; // modification time

    let ar = read_difficulty(reader, layout.difficulty)?;
    let cs = read_difficulty(reader, layout.difficulty)?;
    let hp = read_difficulty(reader, layout.difficulty)?;
    let od = read_difficulty(reader, layout.difficulty)?;
    reader.skip(8)?; // slider velocity

    if let Some(pair_size) = layout.star_pair_size {
        for _ in 0..4 {
            let pairs = reader.read_u32()? as usize;
            let len = pairs.checked_mul(pair_size).ok_or_else(|| {
                Error::format(reader.position(), format!("star rating pair count {pairs} overflows"))
            })?;
            reader.skip(len)?;
        }
    }

    reader.skip(12)?; // drain, total and preview time

    let bpm = read_base_bpm(reader)?;

    reader.skip(12)?; // difficulty, beatmap and thread ids
    let grade_bytes = reader.take(4)?;
    let grades = Grades::from_bytes([grade_bytes[0], grade_bytes[1], grade_bytes[2], grade_bytes[3]]);
    reader.skip(2)?; // local offset
    reader.skip(4)?; // stack leniency
    let game_mode = reader.read_u8()?;

    reader.skip_string()?; // source
    reader.skip_string()?; // tags
    reader.skip(2)?; // online offset
    reader.skip_string()?; // title font
    reader.skip(1)?; // unplayed
    let last_played_at = reader.read_ticks()?;
    reader.skip(1)?; // osz2
    let folder_name = reader.read_string()?;
    reader.skip(8)?; // last checked against the online repository
    reader.skip(5)?; // ignore sound, skin, storyboard, video, visual override
    if layout.has_legacy_short {
        reader.skip(2)?;
    }
    reader.skip(4)?; // last modification
    reader.skip(1)?; // mania scroll speed

    Ok(BeatmapRecord {
        md5_hash,
        artist,
        title,
        creator,
        difficulty,
        folder_name,
        osu_file_name,
        game_mode,
        num_hitcircles,
        num_sliders,
        num_spinners,
        ar,
        cs,
        hp,
        od,
        grades,
        last_played_at,
        bpm,
        ..BeatmapRecord::default()
    })
}

/// Consume every timing point and derive the base tempo
///
/// The first uninherited point with a positive beat length wins; 0.0 when
/// none qualifies.
fn read_base_bpm(reader: &mut ByteReader<'_>) -> Result<f64> {
    let count = reader.read_u32()? as usize;
    if count.saturating_mul(TIMING_POINT_SIZE) > reader.remaining() {
        return Err(Error::format(
            reader.position(),
            format!("timing point count {count} exceeds remaining input"),
        ));
    }

    let mut bpm = None;
    for _ in 0..count {
        let beat_length = reader.read_f64()?;
        reader.skip(8)?; // offset
        let uninherited = reader.read_bool()?;
        if bpm.is_none() && uninherited && beat_length > 0.0 {
            bpm = Some(60_000.0 / beat_length);
        }
    }
    Ok(bpm.unwrap_or(0.0))
}

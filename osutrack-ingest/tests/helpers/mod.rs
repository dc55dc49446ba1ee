//! Test Helper Utilities
//!
//! Binary fixture builders for the client's file formats, plus small
//! filesystem and database setup helpers.

#![allow(dead_code)]

use osutrack_common::db::{init_database, HitCounts, ReplayRecord};
use osutrack_common::difficulty::DifficultyAttributes;
use osutrack_common::time::datetime_to_ticks;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Little-endian writer mirroring `ByteReader`
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(u8::from(v))
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f64(&mut self, v: f64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn uleb128(&mut self, mut v: u64) -> &mut Self {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                return self;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Present string (0x0b marker), or the absent marker for ""
    pub fn string(&mut self, s: &str) -> &mut Self {
        if s.is_empty() {
            return self.u8(0x00);
        }
        self.u8(0x0b).uleb128(s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }
}

/// One library snapshot record
#[derive(Debug, Clone)]
pub struct BeatmapFixture {
    pub md5: String,
    pub artist: String,
    pub title: String,
    pub creator: String,
    pub difficulty: String,
    pub folder_name: String,
    pub osu_file_name: String,
    pub game_mode: u8,
    pub circles: u16,
    pub sliders: u16,
    pub spinners: u16,
    pub ar: f32,
    pub cs: f32,
    pub hp: f32,
    pub od: f32,
    /// (beat length in ms, uninherited)
    pub timing_points: Vec<(f64, bool)>,
    /// Star rating pairs written per mode (only where the layout has them)
    pub star_pairs: u32,
    pub grades: [u8; 4],
    pub last_played_ticks: u64,
}

impl BeatmapFixture {
    pub fn new(md5: &str) -> Self {
        Self {
            md5: md5.to_string(),
            artist: "Artist".to_string(),
            title: format!("Song {md5}"),
            creator: "Mapper".to_string(),
            difficulty: "Hard".to_string(),
            folder_name: "100 Artist - Song".to_string(),
            osu_file_name: format!("{md5}.osu"),
            game_mode: 0,
            circles: 300,
            sliders: 150,
            spinners: 2,
            ar: 9.0,
            cs: 4.0,
            hp: 6.0,
            od: 8.0,
            timing_points: vec![(500.0, true)],
            star_pairs: 2,
            grades: [9, 9, 9, 9],
            last_played_ticks: 0,
        }
    }
}

const ENTRY_SIZE_REMOVED: u32 = 20191106;
const FLOAT_DIFFICULTY: u32 = 20140609;
const COMPACT_STAR_PAIRS: u32 = 20250107;

fn encode_beatmap(w: &mut ByteWriter, version: u32, b: &BeatmapFixture) {
    if version < ENTRY_SIZE_REMOVED {
        w.u32(0); // entry size, ignored by the decoder
    }
    w.string(&b.artist)
        .string(&format!("{} (unicode)", b.artist))
        .string(&b.title)
        .string("")
        .string(&b.creator)
        .string(&b.difficulty)
        .string("audio.mp3")
        .string(&b.md5)
        .string(&b.osu_file_name);
    w.u8(4) // ranked
        .u16(b.circles)
        .u16(b.sliders)
        .u16(b.spinners)
        .u64(637_000_000_000_000_000);

    if version < FLOAT_DIFFICULTY {
        w.u8(b.ar as u8).u8(b.cs as u8).u8(b.hp as u8).u8(b.od as u8);
    } else {
        w.f32(b.ar).f32(b.cs).f32(b.hp).f32(b.od);
    }
    w.f64(1.4); // slider velocity

    if version >= FLOAT_DIFFICULTY {
        for _ in 0..4 {
            w.u32(b.star_pairs);
            for i in 0..b.star_pairs {
                w.u8(0x08).u32(i * 16);
                if version < COMPACT_STAR_PAIRS {
                    w.u8(0x0d).f64(4.5);
                } else {
                    w.u8(0x0c).f32(4.5);
                }
            }
        }
    }

    w.u32(120_000).u32(125_000).u32(30_000);

    w.u32(b.timing_points.len() as u32);
    for (i, (beat_length, uninherited)) in b.timing_points.iter().enumerate() {
        w.f64(*beat_length).f64(i as f64 * 1000.0).bool(*uninherited);
    }

    w.u32(1).u32(2).u32(3);
    w.bytes(&b.grades);
    w.u16(0).f32(0.7).u8(b.game_mode);
    w.string("source").string("tag1 tag2").u16(0).string("");
    w.bool(b.last_played_ticks == 0)
        .u64(b.last_played_ticks)
        .bool(false)
        .string(&b.folder_name)
        .u64(0)
        .bytes(&[0, 0, 0, 0, 0]);
    if version < FLOAT_DIFFICULTY {
        w.u16(0);
    }
    w.u32(0).u8(0);
}

/// Encode a complete library snapshot
pub fn encode_library(version: u32, player: &str, beatmaps: &[BeatmapFixture]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(version).u32(42).bool(true).u64(0).string(player);
    w.u32(beatmaps.len() as u32);
    for beatmap in beatmaps {
        encode_beatmap(&mut w, version, beatmap);
    }
    w.u32(0); // user permissions trailer
    w.into_bytes()
}

/// Encode a replay header followed by a dummy compressed payload
pub fn encode_replay(replay: &ReplayRecord) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u8(replay.game_mode)
        .u32(replay.game_version)
        .string(&replay.beatmap_md5)
        .string(&replay.player_name)
        .string(&replay.replay_md5)
        .u16(replay.hits.n300)
        .u16(replay.hits.n100)
        .u16(replay.hits.n50)
        .u16(replay.hits.n_geki)
        .u16(replay.hits.n_katu)
        .u16(replay.hits.n_miss)
        .u32(replay.total_score)
        .u16(replay.max_combo)
        .bool(replay.perfect)
        .u32(replay.mods_used)
        .string("1|1,500|0.8,")
        .u64(replay.played_at.as_ref().map_or(0, datetime_to_ticks));
    w.u32(3).bytes(&[0x5d, 0x00, 0x00]).u64(0);
    w.into_bytes()
}

pub fn sample_replay(replay_md5: &str, beatmap_md5: &str) -> ReplayRecord {
    ReplayRecord {
        replay_md5: replay_md5.to_string(),
        beatmap_md5: beatmap_md5.to_string(),
        game_mode: 0,
        game_version: 20240101,
        player_name: "peppy".to_string(),
        hits: HitCounts {
            n300: 400,
            n100: 40,
            n50: 8,
            n_geki: 90,
            n_katu: 20,
            n_miss: 4,
        },
        total_score: 4_321_000,
        max_combo: 600,
        perfect: false,
        mods_used: 0,
        played_at: chrono::DateTime::from_timestamp(1_700_000_000, 0),
        ..ReplayRecord::default()
    }
}

/// Minimal detail file whose first uninherited timing point gives `bpm`
pub fn osu_file_contents(bpm: f64) -> String {
    let beat_length = 60_000.0 / bpm;
    format!(
        "osu file format v14\n\n[General]\nAudioFilename: audio.mp3\nMode: 0\n\n\
         [Events]\n0,0,\"bg.jpg\",0,0\n\n[TimingPoints]\n0,{beat_length},4,2,1,60,1,0\n\
         1000,-100,4,2,1,60,0,0\n2000,{half},4,2,1,60,1,0\n",
        half = beat_length * 2.0
    )
}

/// Write a detail file under `songs_dir/folder/file`
pub fn write_osu_file(songs_dir: &Path, folder: &str, file: &str, bpm: f64) -> PathBuf {
    let dir = songs_dir.join(folder);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(file);
    std::fs::write(&path, osu_file_contents(bpm)).unwrap();
    path
}

pub fn attrs(stars: f64) -> DifficultyAttributes {
    DifficultyAttributes {
        stars,
        max_combo: 700,
        aim: stars * 0.5,
        speed: stars * 0.45,
        slider_factor: 0.98,
        ar: 9.0,
        od: 8.0,
        cs: 4.0,
        hp: 6.0,
        clock_rate: 1.0,
        ..DifficultyAttributes::default()
    }
}

/// Temporary database; keep the `TempDir` alive for the test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("osutrack-test.db"))
        .await
        .unwrap();
    (dir, pool)
}

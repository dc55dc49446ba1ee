//! Beatmap detail file (`.osu`) parser
//!
//! Only the handful of attributes the library snapshot lacks are extracted:
//! asset file names, game mode and the tempo range of the uninherited timing
//! points.

use osutrack_common::db::BeatmapDetails;
use osutrack_common::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    General,
    Events,
    TimingPoints,
    Other,
}

/// Read and parse the detail file at `path`
pub fn read_osu_file(path: &Path) -> Result<BeatmapDetails> {
    if !path.is_file() {
        return Err(Error::MissingResource(format!(
            "Detail file not found: {}",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|e| {
        Error::format(
            e.utf8_error().valid_up_to(),
            format!("{} is not valid UTF-8", path.display()),
        )
    })?;
    Ok(parse_osu_text(&text))
}

/// Parse detail file contents
pub fn parse_osu_text(text: &str) -> BeatmapDetails {
    let mut details = BeatmapDetails::default();
    let mut section = Section::Other;

    for raw in text.lines() {
        let line = raw.trim_start_matches('\u{feff}').trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = match &line[1..line.len() - 1] {
                "General" => Section::General,
                "Events" => Section::Events,
                "TimingPoints" => Section::TimingPoints,
                _ => Section::Other,
            };
            continue;
        }

        match section {
            Section::General => parse_general(line, &mut details),
            Section::Events => {
                if details.background_file.is_none() {
                    details.background_file = parse_background(line);
                }
            }
            Section::TimingPoints => {
                if let Some(bpm) = parse_timing_point(line) {
                    if details.bpm.is_none() {
                        details.bpm = Some(bpm);
                    }
                    details.bpm_min = Some(details.bpm_min.map_or(bpm, |min| min.min(bpm)));
                    details.bpm_max = Some(details.bpm_max.map_or(bpm, |max| max.max(bpm)));
                }
            }
            Section::Other => {}
        }
    }

    details
}

fn parse_general(line: &str, details: &mut BeatmapDetails) {
    let Some((key, value)) = line.split_once(':') else {
        return;
    };
    let value = value.trim();
    match key.trim() {
        "AudioFilename" if !value.is_empty() => details.audio_file = Some(value.to_string()),
        "Mode" => details.game_mode = value.parse().ok(),
        _ => {}
    }
}

/// `0,0,"bg.jpg",0,0` names the background image
fn parse_background(line: &str) -> Option<String> {
    let mut fields = line.splitn(3, ',');
    if fields.next()?.trim() != "0" || fields.next()?.trim() != "0" {
        return None;
    }
    let rest = fields.next()?;
    let name = rest.split(',').next()?.trim().trim_matches('"');
    (!name.is_empty()).then(|| name.to_string())
}

/// Tempo of an uninherited timing point
///
/// Lines without the uninherited column are treated as uninherited.
fn parse_timing_point(line: &str) -> Option<f64> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let beat_length: f64 = fields.get(1)?.parse().ok()?;
    let uninherited = fields.get(6).map_or(true, |flag| *flag == "1");
    (uninherited && beat_length > 0.0).then(|| 60_000.0 / beat_length)
}

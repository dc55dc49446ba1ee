//! Replay header decoding

mod helpers;

use helpers::{encode_replay, sample_replay};
use osutrack_common::mods::{DOUBLE_TIME, HIDDEN};
use osutrack_common::Error;
use osutrack_ingest::parsers::{decode_replay, read_replay};

#[test]
fn test_decode_header_fields() {
    let mut expected = sample_replay("replayhash", "maphash");
    expected.mods_used = HIDDEN | DOUBLE_TIME;
    expected.perfect = true;

    let decoded = decode_replay(&encode_replay(&expected)).unwrap();

    assert_eq!(decoded.replay_md5, "replayhash");
    assert_eq!(decoded.beatmap_md5, "maphash");
    assert_eq!(decoded.player_name, "peppy");
    assert_eq!(decoded.game_mode, 0);
    assert_eq!(decoded.game_version, 20240101);
    assert_eq!(decoded.hits, expected.hits);
    assert_eq!(decoded.total_score, 4_321_000);
    assert_eq!(decoded.max_combo, 600);
    assert!(decoded.perfect);
    assert_eq!(decoded.mods_used, HIDDEN | DOUBLE_TIME);
    assert_eq!(decoded.played_at, expected.played_at);
    assert_eq!(decoded.source_file, None);
    assert_eq!(decoded.pp, None);
}

#[test]
fn test_decoded_header_reencodes_identically() {
    let original = encode_replay(&sample_replay("abc", "def"));
    let decoded = decode_replay(&original).unwrap();
    assert_eq!(encode_replay(&decoded), original);
}

#[test]
fn test_truncated_header_is_format_error() {
    let data = encode_replay(&sample_replay("abc", "def"));
    // Cut inside the hit counts
    let truncated = &data[..30];

    let err = decode_replay(truncated).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err:?}");
}

#[test]
fn test_compressed_payload_not_required() {
    let data = encode_replay(&sample_replay("abc", "def"));
    // Header ends 4 + 3 + 8 bytes before the end
    let header_only = &data[..data.len() - 15];
    assert!(decode_replay(header_only).is_ok());
}

#[test]
fn test_read_replay_records_source_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("peppy - song [hard] (2024-01-01).osr");
    std::fs::write(&path, encode_replay(&sample_replay("abc", "def"))).unwrap();

    let replay = read_replay(&path).unwrap();
    assert_eq!(replay.replay_md5, "abc");
    assert_eq!(
        replay.source_file.as_deref(),
        Some("peppy - song [hard] (2024-01-01)")
    );
}

#[test]
fn test_missing_replay_hash_falls_back_to_stem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("0123456789abcdef.osr");
    std::fs::write(&path, encode_replay(&sample_replay("", "def"))).unwrap();

    let replay = read_replay(&path).unwrap();
    assert_eq!(replay.replay_md5, "0123456789abcdef");
}

#[test]
fn test_read_replay_error_names_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.osr");
    std::fs::write(&path, [0u8, 1, 2]).unwrap();

    match read_replay(&path).unwrap_err() {
        Error::Format { message, .. } => assert!(message.contains("broken.osr"), "{message}"),
        other => panic!("expected format error, got {other:?}"),
    }
}

#[test]
fn test_read_replay_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        read_replay(&dir.path().join("gone.osr")),
        Err(Error::MissingResource(_))
    ));
}

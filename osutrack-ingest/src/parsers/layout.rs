//! Version-dependent layout of library snapshot records
//!
//! The client changed the record layout three times. Instead of comparing the
//! version at every field, the decoder picks one [`RecordLayout`] from
//! [`LAYOUTS`] after reading the header and applies it to every record.

/// Below this version every record is prefixed by its byte size
pub const ENTRY_SIZE_REMOVED: u32 = 20191106;
/// From this version difficulty parameters are floats and star pairs exist
pub const FLOAT_DIFFICULTY: u32 = 20140609;
/// From this version star pairs store a float instead of a double
pub const COMPACT_STAR_PAIRS: u32 = 20250107;

/// Width of the four continuous difficulty parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyEncoding {
    /// One byte each, integer values 0-10
    Byte,
    /// 4-byte float each
    Single,
}

/// Field-presence rules for one version range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Smallest version this layout applies to
    pub min_version: u32,
    pub has_entry_size: bool,
    pub difficulty: DifficultyEncoding,
    /// Byte size of one (mods, star rating) pair; `None` when the per-mode
    /// star rating groups are absent
    pub star_pair_size: Option<usize>,
    /// Unknown trailing short after the ignore flags
    pub has_legacy_short: bool,
}

/// Layouts ordered by descending minimum version
pub const LAYOUTS: [RecordLayout; 4] = [
    RecordLayout {
        min_version: COMPACT_STAR_PAIRS,
        has_entry_size: false,
        difficulty: DifficultyEncoding::Single,
        star_pair_size: Some(10),
        has_legacy_short: false,
    },
    RecordLayout {
        min_version: ENTRY_SIZE_REMOVED,
        has_entry_size: false,
        difficulty: DifficultyEncoding::Single,
        star_pair_size: Some(14),
        has_legacy_short: false,
    },
    RecordLayout {
        min_version: FLOAT_DIFFICULTY,
        has_entry_size: true,
        difficulty: DifficultyEncoding::Single,
        star_pair_size: Some(14),
        has_legacy_short: false,
    },
    RecordLayout {
        min_version: 0,
        has_entry_size: true,
        difficulty: DifficultyEncoding::Byte,
        star_pair_size: None,
        has_legacy_short: true,
    },
];

impl RecordLayout {
    /// Layout for a snapshot written by client `version`
    pub fn for_version(version: u32) -> &'static RecordLayout {
        LAYOUTS
            .iter()
            .find(|layout| version >= layout.min_version)
            .unwrap_or(&LAYOUTS[LAYOUTS.len() - 1])
    }
}

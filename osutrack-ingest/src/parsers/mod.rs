//! Decoders for the game client's files

pub mod layout;
pub mod osu_db;
pub mod osu_file;
pub mod reader;
pub mod replay;

pub use layout::{RecordLayout, LAYOUTS};
pub use osu_db::{decode_library, read_library, LibrarySnapshot};
pub use osu_file::{parse_osu_text, read_osu_file};
pub use osutrack_common::config::safe_join;
pub use reader::ByteReader;
pub use replay::{decode_replay, read_replay};

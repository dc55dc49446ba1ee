//! Database models and queries

pub mod batch;
pub mod beatmaps;
pub mod init;
pub mod mod_cache;
pub mod models;
pub mod replays;

pub use batch::*;
pub use init::*;
pub use models::*;

//! # osutrack common library
//!
//! Shared code for the osutrack crates:
//! - Error taxonomy and result alias
//! - Bootstrap configuration and osu! folder resolution
//! - Database schema, record models and upsert contracts
//! - Modifier bitmask model and tick timestamps
//! - Task progress state for the batch pipelines
//! - The difficulty calculator interface

pub mod config;
pub mod db;
pub mod difficulty;
pub mod error;
pub mod mods;
pub mod progress;
pub mod scoring;
pub mod time;

pub use error::{Error, Result};
pub use progress::{ProgressHandle, TaskProgress, TaskRegistry, TaskStatus};

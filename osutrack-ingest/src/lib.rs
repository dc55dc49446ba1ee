//! # osutrack ingestion
//!
//! Decoders for the game client's binary and text files, and the two batch
//! pipelines built on them:
//! - [`SyncCoordinator`]: library snapshot → difficulty-enriched beatmaps
//! - [`ScanCoordinator`]: replay files → performance-enriched replays

pub mod parsers;
pub mod services;

pub use services::{ScanCoordinator, ScanSummary, SyncCoordinator, SyncOptions, SyncSummary};

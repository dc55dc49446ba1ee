//! Bootstrap configuration and osu! folder resolution
//!
//! The TOML file is optional. Missing or partial files fall back to built-in
//! defaults so a fresh install starts without any setup.
//!
//! osu! folder priority order:
//! 1. Command-line argument
//! 2. `OSU_FOLDER` environment variable
//! 3. TOML `osu_folder`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the osu! installation folder
pub const OSU_FOLDER_ENV: &str = "OSU_FOLDER";

/// Environment variable naming the default player
pub const DEFAULT_PLAYER_ENV: &str = "DEFAULT_PLAYER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// osu! installation folder (contains osu!.db, Songs/, Data/r/)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osu_folder: Option<PathBuf>,

    /// Player shown by default in score views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_player: Option<String>,

    /// SQLite database file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub difficulty: DifficultyConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Batch pipeline and recommendation tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_sync_batch_size")]
    pub sync_batch_size: usize,

    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,

    /// Analysis worker count; hardware concurrency when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Width of the difficulty band a recommendation must fall into
    #[serde(default = "default_star_band")]
    pub star_band: f64,

    /// Candidates evaluated live for uncached modifier combinations
    #[serde(default = "default_live_candidate_pool")]
    pub live_candidate_pool: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sync_batch_size: default_sync_batch_size(),
            scan_batch_size: default_scan_batch_size(),
            workers: None,
            star_band: default_star_band(),
            live_candidate_pool: default_live_candidate_pool(),
        }
    }
}

impl PipelineConfig {
    /// Worker count, bounded by available hardware concurrency
    pub fn worker_count(&self) -> usize {
        let cpus = num_cpus::get().max(1);
        self.workers.map_or(cpus, |w| w.clamp(1, cpus))
    }
}

/// External difficulty calculator
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DifficultyConfig {
    /// Executable implementing the `difficulty` / `performance` commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,

    /// Extra leading arguments (e.g. a script path for an interpreter)
    #[serde(default)]
    pub args: Vec<String>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sync_batch_size() -> usize {
    500
}

fn default_scan_batch_size() -> usize {
    200
}

fn default_star_band() -> f64 {
    0.15
}

fn default_live_candidate_pool() -> usize {
    50
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

/// Default TOML location: `<config_dir>/osutrack/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("osutrack").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("osutrack.toml"))
}

/// Default database location: `<data_local_dir>/osutrack/osu_tracker.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("osutrack").join("osu_tracker.db"))
        .unwrap_or_else(|| PathBuf::from("osu_tracker.db"))
}

/// Load TOML config; a missing file yields defaults
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Resolve the osu! folder: CLI → ENV → TOML
pub fn resolve_osu_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(OSU_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    config.osu_folder.clone()
}

/// Resolve the default player: ENV → TOML
pub fn resolve_default_player(config: &TomlConfig) -> Option<String> {
    std::env::var(DEFAULT_PLAYER_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .or_else(|| config.default_player.clone())
}

/// Resolve the database path: CLI → TOML → platform default
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    cli_arg
        .map(Path::to_path_buf)
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(default_database_path)
}

/// Well-known locations inside an osu! installation folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsuPaths {
    root: PathBuf,
}

impl OsuPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Library snapshot file
    pub fn library_db(&self) -> PathBuf {
        self.root.join("osu!.db")
    }

    /// Content root holding one folder per beatmap set
    pub fn songs_dir(&self) -> PathBuf {
        self.root.join("Songs")
    }

    /// Session (replay) files
    pub fn replays_dir(&self) -> PathBuf {
        self.root.join("Data").join("r")
    }
}

/// Join untrusted relative components onto `base`
///
/// Returns `None` when a component is empty, absolute or climbs out of
/// `base`. Folder and file names come from the library snapshot, so every
/// path under the content root goes through here.
pub fn safe_join(base: &Path, parts: &[&str]) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    for part in parts {
        if part.is_empty() {
            return None;
        }
        for component in Path::new(part).components() {
            match component {
                Component::Normal(name) => joined.push(name),
                Component::CurDir => {}
                _ => return None,
            }
        }
    }
    Some(joined)
}

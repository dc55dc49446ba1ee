//! Difficulty and performance capability
//!
//! The star rating and performance maths live outside this workspace. They
//! are reached through [`DifficultyCalculator`], a narrow blocking interface
//! that pipelines call from `spawn_blocking` workers. Every failure is an
//! [`Error::Enrichment`], which callers absorb per item.

use crate::config::DifficultyConfig;
use crate::db::HitCounts;
use crate::mods;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Result of one difficulty computation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyAttributes {
    pub stars: f64,
    pub max_combo: u32,
    pub aim: f64,
    pub speed: f64,
    pub slider_factor: f64,
    /// Modifier-adjusted approach rate
    pub ar: f64,
    pub od: f64,
    pub cs: f64,
    pub hp: f64,
    #[serde(default = "default_clock_rate")]
    pub clock_rate: f64,
    /// Mask the attributes were computed for
    #[serde(default)]
    pub mods: u32,
}

fn default_clock_rate() -> f64 {
    1.0
}

/// Result of one performance computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAttributes {
    pub pp: f64,
}

/// Opaque difficulty/performance capability
pub trait DifficultyCalculator: Send + Sync {
    /// Difficulty of the detail file at `path` under modifier mask `mods`
    fn difficulty(&self, path: &Path, mods: u32) -> Result<DifficultyAttributes>;

    /// Performance of one play given its map's difficulty
    fn performance(
        &self,
        attributes: &DifficultyAttributes,
        hits: &HitCounts,
        combo: u32,
    ) -> Result<PerformanceAttributes>;
}

/// Build the calculator described by configuration
pub fn calculator_from_config(config: &DifficultyConfig) -> Arc<dyn DifficultyCalculator> {
    match &config.command {
        Some(command) => Arc::new(ExternalCalculator::new(command.clone(), config.args.clone())),
        None => Arc::new(UnconfiguredCalculator),
    }
}

/// Calculator backed by an external executable
///
/// Protocol:
/// - `<command> [args..] difficulty <file> <mods>` prints `DifficultyAttributes` JSON
/// - `<command> [args..] performance` reads `{attributes, hits, combo}` JSON on
///   stdin and prints `{"pp": ...}`
#[derive(Debug, Clone)]
pub struct ExternalCalculator {
    command: PathBuf,
    args: Vec<String>,
}

#[derive(Serialize)]
struct PerformanceRequest<'a> {
    attributes: &'a DifficultyAttributes,
    hits: &'a HitCounts,
    combo: u32,
}

impl ExternalCalculator {
    pub fn new(command: PathBuf, args: Vec<String>) -> Self {
        Self { command, args }
    }

    fn base_command(&self) -> Command {
        let mut command = Command::new(&self.command);
        command.args(&self.args);
        command
    }

    fn check_output(&self, output: std::process::Output) -> Result<Vec<u8>> {
        if output.status.success() {
            return Ok(output.stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::Enrichment(format!(
            "{} exited with {}: {}",
            self.command.display(),
            output.status,
            stderr.trim()
        )))
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Enrichment(format!(
                "Difficulty calculator not found: {}",
                self.command.display()
            ))
        } else {
            Error::Enrichment(format!("Failed to execute difficulty calculator: {}", e))
        }
    }
}

impl DifficultyCalculator for ExternalCalculator {
    fn difficulty(&self, path: &Path, mods: u32) -> Result<DifficultyAttributes> {
        debug!(file = %path.display(), mods, "Computing difficulty");

        let output = self
            .base_command()
            .arg("difficulty")
            .arg(path)
            .arg(mods.to_string())
            .output()
            .map_err(|e| self.spawn_error(e))?;
        let stdout = self.check_output(output)?;

        let mut attributes: DifficultyAttributes = serde_json::from_slice(&stdout)
            .map_err(|e| Error::Enrichment(format!("Invalid difficulty output: {}", e)))?;
        attributes.mods = mods;
        Ok(attributes)
    }

    fn performance(
        &self,
        attributes: &DifficultyAttributes,
        hits: &HitCounts,
        combo: u32,
    ) -> Result<PerformanceAttributes> {
        let request = serde_json::to_vec(&PerformanceRequest {
            attributes,
            hits,
            combo,
        })?;

        let mut child = self
            .base_command()
            .arg("performance")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&request) {
                // Reap the child before reporting
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Enrichment(format!("Failed to write request: {}", e)));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Enrichment(format!("Difficulty calculator failed: {}", e)))?;
        let stdout = self.check_output(output)?;

        serde_json::from_slice(&stdout)
            .map_err(|e| Error::Enrichment(format!("Invalid performance output: {}", e)))
    }
}

/// Stand-in used when no calculator is configured; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCalculator;

impl DifficultyCalculator for UnconfiguredCalculator {
    fn difficulty(&self, _path: &Path, _mods: u32) -> Result<DifficultyAttributes> {
        Err(Error::Enrichment(
            "No difficulty calculator configured".to_string(),
        ))
    }

    fn performance(
        &self,
        _attributes: &DifficultyAttributes,
        _hits: &HitCounts,
        _combo: u32,
    ) -> Result<PerformanceAttributes> {
        Err(Error::Enrichment(
            "No difficulty calculator configured".to_string(),
        ))
    }
}

/// Deterministic table-driven calculator for tests and dry runs
///
/// Attributes are looked up by detail file name and scaled by fixed factors
/// per modifier. Every call is counted.
#[derive(Debug, Default)]
pub struct ScriptedCalculator {
    entries: HashMap<String, DifficultyAttributes>,
    fallback: Option<DifficultyAttributes>,
    failing: HashSet<String>,
    difficulty_calls: AtomicUsize,
    performance_calls: AtomicUsize,
}

impl ScriptedCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes returned for files without an explicit entry
    pub fn with_fallback(mut self, attributes: DifficultyAttributes) -> Self {
        self.fallback = Some(attributes);
        self
    }

    /// Nomod attributes for the detail file named `file_name`
    pub fn with_file(mut self, file_name: impl Into<String>, attributes: DifficultyAttributes) -> Self {
        self.entries.insert(file_name.into(), attributes);
        self
    }

    /// Make every call for `file_name` fail
    pub fn failing_on(mut self, file_name: impl Into<String>) -> Self {
        self.failing.insert(file_name.into());
        self
    }

    pub fn difficulty_calls(&self) -> usize {
        self.difficulty_calls.load(Ordering::SeqCst)
    }

    pub fn performance_calls(&self) -> usize {
        self.performance_calls.load(Ordering::SeqCst)
    }

    /// Total calls of either kind
    pub fn calls(&self) -> usize {
        self.difficulty_calls() + self.performance_calls()
    }
}

/// Scale nomod attributes by the fake's fixed modifier factors
fn scripted_adjust(base: &DifficultyAttributes, mask: u32) -> DifficultyAttributes {
    let mut adjusted = base.clone();
    let rate = mods::clock_rate(mask);
    adjusted.clock_rate = rate;
    adjusted.mods = mask;

    if mask & mods::HARD_ROCK != 0 {
        adjusted.stars *= 1.1;
        adjusted.ar = (base.ar * 1.4).min(10.0);
        adjusted.od = (base.od * 1.4).min(10.0);
        adjusted.cs = (base.cs * 1.3).min(10.0);
        adjusted.hp = (base.hp * 1.4).min(10.0);
    } else if mask & mods::EASY != 0 {
        adjusted.stars *= 0.5;
        adjusted.ar = base.ar * 0.5;
        adjusted.od = base.od * 0.5;
        adjusted.cs = base.cs * 0.5;
        adjusted.hp = base.hp * 0.5;
    }
    if rate > 1.0 {
        adjusted.stars *= 1.4;
        adjusted.aim *= 1.4;
        adjusted.speed *= 1.4;
    } else if rate < 1.0 {
        adjusted.stars *= 0.75;
        adjusted.aim *= 0.75;
        adjusted.speed *= 0.75;
    }
    adjusted
}

impl DifficultyCalculator for ScriptedCalculator {
    fn difficulty(&self, path: &Path, mods: u32) -> Result<DifficultyAttributes> {
        self.difficulty_calls.fetch_add(1, Ordering::SeqCst);

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&file_name) {
            return Err(Error::Enrichment(format!("Scripted failure for {file_name}")));
        }

        let base = self
            .entries
            .get(&file_name)
            .or(self.fallback.as_ref())
            .ok_or_else(|| Error::Enrichment(format!("No scripted attributes for {file_name}")))?;
        Ok(scripted_adjust(base, mods))
    }

    fn performance(
        &self,
        attributes: &DifficultyAttributes,
        hits: &HitCounts,
        combo: u32,
    ) -> Result<PerformanceAttributes> {
        self.performance_calls.fetch_add(1, Ordering::SeqCst);

        let judged = u32::from(hits.n300) + u32::from(hits.n100) + u32::from(hits.n50) + u32::from(hits.n_miss);
        let accuracy = if judged == 0 {
            0.0
        } else {
            f64::from(u32::from(hits.n300) * 300 + u32::from(hits.n100) * 100 + u32::from(hits.n50) * 50)
                / f64::from(judged * 300)
        };
        let combo_ratio = if attributes.max_combo == 0 {
            0.0
        } else {
            f64::from(combo.min(attributes.max_combo)) / f64::from(attributes.max_combo)
        };
        Ok(PerformanceAttributes {
            pp: attributes.stars * 40.0 * accuracy * combo_ratio,
        })
    }
}

//! Pollable progress state for the batch pipelines
//!
//! One [`ProgressHandle`] exists per pipeline kind. The coordinator that owns
//! a run mutates it; everything else reads snapshots.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Lifecycle state of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Idle,
    Running,
    Complete,
    Error,
}

/// Progress of one pipeline kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TaskProgress {
    pub status: TaskStatus,
    /// Items finished in the current phase
    pub current: usize,
    /// Items in the current phase
    pub total: usize,
    /// Human-readable phase/item description
    pub message: String,
    /// Persistence flushes completed in this run
    pub batches_done: usize,
}

/// Shared, cloneable handle to one pipeline's progress
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    inner: Arc<RwLock<TaskProgress>>,
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> TaskProgress {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.snapshot().status == TaskStatus::Running
    }

    /// Mark running unless a run is already active; returns false if it was
    pub fn try_begin(&self, message: impl Into<String>) -> bool {
        let mut progress = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if progress.status == TaskStatus::Running {
            return false;
        }
        *progress = TaskProgress {
            status: TaskStatus::Running,
            message: message.into(),
            ..TaskProgress::default()
        };
        true
    }

    /// Reset to a fresh running state, overwriting any previous terminal state
    pub fn start(&self, message: impl Into<String>) {
        self.update(|p| {
            *p = TaskProgress {
                status: TaskStatus::Running,
                message: message.into(),
                ..TaskProgress::default()
            }
        });
    }

    /// Begin a new phase with its own counter
    pub fn begin_phase(&self, total: usize, message: impl Into<String>) {
        self.update(|p| {
            p.current = 0;
            p.total = total;
            p.message = message.into();
        });
    }

    /// Count one finished item; returns the new count
    pub fn advance(&self, message: impl FnOnce(usize, usize) -> String) -> usize {
        let mut progress = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        progress.current += 1;
        progress.message = message(progress.current, progress.total);
        progress.current
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.update(|p| p.message = message.into());
    }

    pub fn record_batch(&self) {
        self.update(|p| p.batches_done += 1);
    }

    pub fn complete(&self, message: impl Into<String>) {
        self.update(|p| {
            p.status = TaskStatus::Complete;
            p.message = message.into();
        });
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.update(|p| {
            p.status = TaskStatus::Error;
            p.message = message.into();
        });
    }

    fn update(&self, apply: impl FnOnce(&mut TaskProgress)) {
        let mut progress = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut progress);
    }
}

/// Progress handles for every pipeline kind
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    pub sync: ProgressHandle,
    pub scan: ProgressHandle,
}

/// Serializable view of all pipelines, as polled by callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRegistrySnapshot {
    pub sync: TaskProgress,
    pub scan: TaskProgress,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TaskRegistrySnapshot {
        TaskRegistrySnapshot {
            sync: self.sync.snapshot(),
            scan: self.scan.snapshot(),
        }
    }
}

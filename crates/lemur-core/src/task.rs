use crate::error::{LemurError, Result};
use crate::types::{TaskStatus, Trigger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// One triggered run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub trigger: Trigger,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: u64, trigger: Trigger) -> Self {
        Self {
            id,
            trigger,
            status: TaskStatus::Created,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskStore
// ---------------------------------------------------------------------------

/// In-memory registry of every task created since the process started.
///
/// Ids are allocated atomically starting at 1. Once a task is `COMPLETE` or
/// `FAILED` any further transition returns [`LemurError::TaskFinished`] and
/// the stored task is left untouched.
#[derive(Debug)]
pub struct TaskStore {
    next_id: AtomicU64,
    tasks: RwLock<BTreeMap<u64, Task>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tasks: RwLock::new(BTreeMap::new()),
        }
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, trigger: Trigger) -> Task {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = Task::new(id, trigger);
        self.write().insert(id, task.clone());
        task
    }

    pub fn get(&self, id: u64) -> Result<Task> {
        self.read()
            .get(&id)
            .cloned()
            .ok_or(LemurError::TaskNotFound(id))
    }

    /// All tasks in id order.
    pub fn list(&self) -> Vec<Task> {
        self.read().values().cloned().collect()
    }

    pub fn start(&self, id: u64) -> Result<Task> {
        self.transition(id, |task| {
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
        })
    }

    pub fn complete(&self, id: u64) -> Result<Task> {
        self.transition(id, |task| {
            task.status = TaskStatus::Complete;
            task.completed_at = Some(Utc::now());
        })
    }

    pub fn fail(&self, id: u64, reason: impl Into<String>) -> Result<Task> {
        let reason = reason.into();
        self.transition(id, move |task| {
            task.status = TaskStatus::Failed;
            task.completed_at = Some(Utc::now());
            task.error = Some(reason);
        })
    }

    fn transition(&self, id: u64, apply: impl FnOnce(&mut Task)) -> Result<Task> {
        let mut tasks = self.write();
        let task = tasks.get_mut(&id).ok_or(LemurError::TaskNotFound(id))?;
        if task.status.is_terminal() {
            return Err(LemurError::TaskFinished {
                id,
                status: task.status.to_string(),
            });
        }
        apply(task);
        Ok(task.clone())
    }

    // A poisoned lock only means another thread panicked mid-update; the map is still usable.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<u64, Task>> {
        self.tasks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<u64, Task>> {
        self.tasks.write().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Observable progress view over the tasks of the current batch.
//!
//! Every task owns its own `watch` channel and is updated only through its
//! [`TaskHandle`]. The tracker keeps the receiving ends keyed by task id, so a
//! progress update never touches the collection itself; the collection lock is
//! taken only when a batch starts, when it is cleared and when a snapshot is
//! read. Each accepted update is also published on a broadcast channel for
//! subscribers that want a push feed.

use crate::models::upload::{TaskId, TaskState, TaskStatus};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum TaskEvent {
    Started { id: TaskId },
    Progress { id: TaskId, percent: u8 },
    Completed { id: TaskId },
    Failed { id: TaskId, error: String },
    Cleared,
}

#[derive(Default)]
struct TrackedBatch {
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, watch::Receiver<TaskState>>,
}

struct TrackerInner {
    batch: RwLock<TrackedBatch>,
    generation: AtomicU64,
    events: broadcast::Sender<TaskEvent>,
}

/// Cheap to clone; all clones share the same view.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<TrackerInner>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(TrackerInner {
                batch: RwLock::new(TrackedBatch::default()),
                generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Replace the tracked set with a new batch of pending tasks.
    ///
    /// Returns the batch generation (used by [`clear_if_current`]) and one
    /// writer handle per task, in the order given.
    ///
    /// [`clear_if_current`]: ProgressTracker::clear_if_current
    pub fn begin(&self, tasks: Vec<TaskState>) -> (u64, Vec<TaskHandle>) {
        let mut batch = TrackedBatch::default();
        let mut handles = Vec::with_capacity(tasks.len());
        for state in tasks {
            let id = state.id;
            let (tx, rx) = watch::channel(state);
            batch.order.push(id);
            batch.tasks.insert(id, rx);
            handles.push(TaskHandle {
                id,
                tx: Arc::new(tx),
                events: self.inner.events.clone(),
            });
        }

        let mut guard = self.inner.batch.write().unwrap_or_else(|e| e.into_inner());
        *guard = batch;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (generation, handles)
    }

    /// Current state of every tracked task, in submission order.
    pub fn snapshot(&self) -> Vec<TaskState> {
        let guard = self.inner.batch.read().unwrap_or_else(|e| e.into_inner());
        guard
            .order
            .iter()
            .filter_map(|id| guard.tasks.get(id))
            .map(|rx| rx.borrow().clone())
            .collect()
    }

    #[cfg(test)]
    pub fn get(&self, id: TaskId) -> Option<TaskState> {
        let guard = self.inner.batch.read().unwrap_or_else(|e| e.into_inner());
        guard.tasks.get(&id).map(|rx| rx.borrow().clone())
    }

    /// Watch a single task. The receiver outlives a later `clear`.
    #[cfg(test)]
    pub fn watch(&self, id: TaskId) -> Option<watch::Receiver<TaskState>> {
        let guard = self.inner.batch.read().unwrap_or_else(|e| e.into_inner());
        guard.tasks.get(&id).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.inner.batch.read().unwrap_or_else(|e| e.into_inner());
        guard.order.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Drop every tracked task.
    pub fn clear(&self) {
        let guard = self.inner.batch.write().unwrap_or_else(|e| e.into_inner());
        self.clear_locked(guard);
    }

    /// Clear only if no newer batch has started since `generation`.
    pub fn clear_if_current(&self, generation: u64) -> bool {
        // `begin` bumps the generation under the same lock.
        let guard = self.inner.batch.write().unwrap_or_else(|e| e.into_inner());
        if self.generation() != generation {
            return false;
        }
        self.clear_locked(guard);
        true
    }

    fn clear_locked(&self, mut guard: RwLockWriteGuard<'_, TrackedBatch>) {
        if guard.order.is_empty() {
            return;
        }
        *guard = TrackedBatch::default();
        drop(guard);
        let _ = self.inner.events.send(TaskEvent::Cleared);
    }
}

/// Writer side of one task. Updates that would move progress backwards or
/// arrive after a terminal state are ignored, so a task settles exactly once.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    tx: Arc<watch::Sender<TaskState>>,
    events: broadcast::Sender<TaskEvent>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[cfg(test)]
    pub fn state(&self) -> TaskState {
        self.tx.borrow().clone()
    }

    /// `pending` → `uploading`.
    pub fn start(&self) {
        let changed = self.tx.send_if_modified(|state| {
            if state.status != TaskStatus::Pending {
                return false;
            }
            state.status = TaskStatus::Uploading;
            true
        });
        if changed {
            self.publish(TaskEvent::Started { id: self.id });
        }
    }

    pub fn progress(&self, percent: u8) {
        let percent = percent.min(100);
        let changed = self.tx.send_if_modified(|state| {
            if state.status != TaskStatus::Uploading || percent <= state.progress {
                return false;
            }
            state.progress = percent;
            true
        });
        if changed {
            self.publish(TaskEvent::Progress {
                id: self.id,
                percent,
            });
        }
    }

    /// Terminal success; progress is forced to 100.
    pub fn complete(&self) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if state.status.is_terminal() {
                return false;
            }
            state.status = TaskStatus::Completed;
            state.progress = 100;
            state.error = None;
            true
        });
        if changed {
            self.publish(TaskEvent::Completed { id: self.id });
        }
        changed
    }

    /// Terminal failure with a human-readable reason.
    pub fn fail(&self, error: impl Into<String>) -> bool {
        let error = error.into();
        let changed = self.tx.send_if_modified(|state| {
            if state.status.is_terminal() {
                return false;
            }
            state.status = TaskStatus::Failed;
            state.error = Some(error.clone());
            true
        });
        if changed {
            self.publish(TaskEvent::Failed { id: self.id, error });
        }
        changed
    }

    fn publish(&self, event: TaskEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

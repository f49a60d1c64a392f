//! Cooperative single-threaded task queue.
//!
//! Three lanes:
//!
//! - **ready**: FIFO, runs on the next turn.
//! - **timers**: deadline ordered, FIFO among equal deadlines.
//! - **idle**: runs when nothing else is runnable, or earlier once its
//!   bounded timeout has elapsed.
//!
//! Tasks receive `&mut C`, the context that owns the scheduler. The owner
//! pops one task at a time and invokes it after releasing the borrow.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// A deferred unit of work.
pub type Task<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Handle for cancelling a posted task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

struct IdleTask<C> {
    id: TaskId,
    deadline: Option<Instant>,
    task: Task<C>,
}

/// Task queue with ready, timer, and idle lanes.
pub struct Scheduler<C> {
    ready: VecDeque<(TaskId, Task<C>)>,
    timers: BTreeMap<(Instant, TaskId), Task<C>>,
    idle: VecDeque<IdleTask<C>>,
    next_id: u64,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self {
            ready: VecDeque::new(),
            timers: BTreeMap::new(),
            idle: VecDeque::new(),
            next_id: 0,
        }
    }
}

impl<C> Scheduler<C> {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> TaskId {
        self.next_id += 1;
        TaskId(self.next_id)
    }

    /// Run `task` on the next turn.
    pub fn post(&mut self, task: Task<C>) -> TaskId {
        let id = self.next_id();
        self.ready.push_back((id, task));
        id
    }

    /// Run `task` once `delay` has elapsed.
    pub fn post_timer(&mut self, delay: Duration, task: Task<C>) -> TaskId {
        let id = self.next_id();
        let _ = self.timers.insert((Instant::now() + delay, id), task);
        id
    }

    /// Run `task` when idle, or once `timeout` elapses if given.
    pub fn post_idle(&mut self, timeout: Option<Duration>, task: Task<C>) -> TaskId {
        let id = self.next_id();
        self.idle.push_back(IdleTask {
            id,
            deadline: timeout.map(|t| Instant::now() + t),
            task,
        });
        id
    }

    /// Cancel a posted task. Returns `true` if it had not run yet.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        if let Some(pos) = self.ready.iter().position(|(tid, _)| *tid == id) {
            let _ = self.ready.remove(pos);
            return true;
        }
        if let Some(key) = self.timers.keys().find(|(_, tid)| *tid == id).copied() {
            let _ = self.timers.remove(&key);
            return true;
        }
        if let Some(pos) = self.idle.iter().position(|t| t.id == id) {
            let _ = self.idle.remove(pos);
            return true;
        }
        false
    }

    /// Next task runnable at `now`, if any.
    pub fn pop_runnable(&mut self, now: Instant) -> Option<Task<C>> {
        if let Some(pos) = self
            .idle
            .iter()
            .position(|t| t.deadline.is_some_and(|d| d <= now))
        {
            return self.idle.remove(pos).map(|t| t.task);
        }
        if let Some((_, task)) = self.ready.pop_front() {
            return Some(task);
        }
        if let Some(entry) = self.timers.first_entry() {
            if entry.key().0 <= now {
                return Some(entry.remove());
            }
        }
        self.idle.pop_front().map(|t| t.task)
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Number of pending tasks across all lanes.
    pub fn len(&self) -> usize {
        self.ready.len() + self.timers.len() + self.idle.len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.ready.clear();
        self.timers.clear();
        self.idle.clear();
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("ready", &self.ready.len())
            .field("timers", &self.timers.len())
            .field("idle", &self.idle.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

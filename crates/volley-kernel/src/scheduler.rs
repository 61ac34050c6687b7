//! Cooperative task scheduler.
//!
//! Fades, waits and timers are small state machines advanced once per tick.
//! Each scheduled task carries a [`CancelToken`]; the scheduler checks it
//! before every step, and tasks may check it themselves mid-step.
//!
//! ```text
//! tick(dt) ──► snapshot queue ──► for each task:
//!                                   cancelled? ──► drop
//!                                   step(cx, dt) ──► Pending ──► requeue
//!                                                └─► Done    ──► drop
//!              tasks spawned during the tick run from the next tick on
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    /// Creates a live token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every task holding this token.
    pub fn cancel(&self) {
        self.0.set(true);
    }

    /// Whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend until the next tick.
    Pending,
    /// Finished; drop the task.
    Done,
}

/// A unit of work advanced once per tick against context `C`.
pub trait CooperativeTask<C> {
    /// Performs one unit of work.
    fn step(&mut self, cx: &mut C, dt: f32) -> Step;
}

/// Context that owns a scheduler.
pub trait TaskHost: Sized {
    /// Task type the scheduler holds.
    type Task: CooperativeTask<Self>;

    /// The scheduler living inside this context.
    fn scheduler(&mut self) -> &mut Scheduler<Self::Task>;
}

/// Identifier of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

struct Scheduled<T> {
    id: TaskId,
    token: CancelToken,
    task: T,
}

/// Queue of cooperative tasks.
pub struct Scheduler<T> {
    tasks: Vec<Scheduled<T>>,
    next_id: u64,
}

impl<T> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.tasks.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    /// Creates an empty scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
        }
    }

    /// Schedules a task with a fresh token.
    pub fn spawn(&mut self, task: T) -> (TaskId, CancelToken) {
        let token = CancelToken::new();
        let id = self.spawn_with_token(task, token.clone());
        (id, token)
    }

    /// Schedules a task tied to an existing token.
    pub fn spawn_with_token(&mut self, task: T, token: CancelToken) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(Scheduled { id, token, task });
        id
    }

    /// Number of queued tasks, cancelled ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancels and drops every task.
    pub fn cancel_all(&mut self) {
        for scheduled in self.tasks.drain(..) {
            scheduled.token.cancel();
        }
    }

    /// Iterates queued tasks that are not cancelled.
    pub fn live_tasks(&self) -> impl Iterator<Item = &T> {
        self.tasks
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .map(|s| &s.task)
    }
}

/// Advances every task queued at the start of the tick by one step.
///
/// Returns the number of tasks that finished.
pub fn drive<C: TaskHost>(cx: &mut C, dt: f32) -> usize {
    let batch = std::mem::take(&mut cx.scheduler().tasks);
    let mut survivors = Vec::with_capacity(batch.len());
    let mut finished = 0;

    for mut scheduled in batch {
        if scheduled.token.is_cancelled() {
            trace!("Dropping cancelled task {}", scheduled.id.raw());
            continue;
        }
        match scheduled.task.step(cx, dt) {
            Step::Pending if !scheduled.token.is_cancelled() => survivors.push(scheduled),
            Step::Pending => trace!("Task {} cancelled mid-step", scheduled.id.raw()),
            Step::Done => finished += 1,
        }
    }

    let scheduler = cx.scheduler();
    survivors.append(&mut scheduler.tasks);
    scheduler.tasks = survivors;
    finished
}

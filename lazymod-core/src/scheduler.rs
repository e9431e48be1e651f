// lazymod-core/src/scheduler.rs
//! Deferred execution. The engine needs exactly one primitive from its host:
//! run a task once, after the current synchronous turn, in FIFO order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

pub type Task = Box<dyn FnOnce() + 'static>;

pub trait Scheduler {
    /// Queues `task` to run after the current synchronous turn. Tasks queued
    /// while a batch is running belong to the next batch.
    fn schedule(&self, task: Task);
}

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
    fn schedule(&self, task: Task) {
        (**self).schedule(task)
    }
}

/// Manually driven queue. Nothing runs until the owner calls
/// [`TickQueue::run_tick`] or [`TickQueue::run_until_idle`].
#[derive(Clone, Default)]
pub struct TickQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Runs the tasks queued so far, single pass. Returns how many ran.
    pub fn run_tick(&self) -> usize {
        let batch = std::mem::take(&mut *self.tasks.borrow_mut());
        let count = batch.len();
        if count > 0 {
            trace!("Running tick of {} task(s)", count);
        }
        for task in batch {
            task();
        }
        count
    }

    /// Runs ticks until no task is left. Returns the total number run.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_tick();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }
}

impl Scheduler for TickQueue {
    fn schedule(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickQueue")
            .field("queued", &self.len())
            .finish()
    }
}

/// Schedules onto the current tokio `LocalSet`.
///
/// Must be used from within a `LocalSet` (`LocalSet::run_until`,
/// `LocalSet::block_on` or a task spawned on one); `spawn_local` panics
/// anywhere else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalScheduler;

impl Scheduler for LocalScheduler {
    fn schedule(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }
}

//! Single-threaded cooperative task queue.
//!
//! Every network operation is enqueued here instead of running inline, so
//! callers always get their placeholder back before any callback fires.

use crate::error::Result;
use std::cell::RefCell;
use std::collections::VecDeque;

/// A unit of deferred work. An `Err` is a fatal, unhandled error.
pub type Task = Box<dyn FnOnce() -> Result<()>>;

/// FIFO queue of deferred tasks.
#[derive(Default)]
pub struct EventLoop {
    queue: RefCell<VecDeque<Task>>,
}

impl EventLoop {
    /// Creates an empty loop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task to the end of the queue.
    pub fn defer(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Runs the next task. Returns `false` when the queue was empty.
    pub fn run_once(&self) -> Result<bool> {
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => task().map(|_| true),
            None => Ok(false),
        }
    }

    /// Runs tasks, including ones enqueued while running, until the queue is empty.
    ///
    /// Stops at the first fatal error and returns it; tasks behind it stay queued.
    pub fn run_until_idle(&self) -> Result<usize> {
        let mut ran = 0;
        while self.run_once()? {
            ran += 1;
        }
        Ok(ran)
    }
}

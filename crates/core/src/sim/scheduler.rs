//! Cooperative work queue.
//!
//! Every asynchronous step of the harness (instruction fetch, model
//! completion, command response, init reply) is posted here as a task and
//! run later, one at a time, against the controller. Nothing ever calls
//! back into the controller while it is already borrowed.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use super::controller::Controller;

/// A unit of deferred work.
pub(crate) type Task = Box<dyn FnOnce(&mut Controller)>;

/// FIFO queue of deferred tasks.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct Scheduler {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl Scheduler {
    /// Posts a task to the back of the queue.
    pub(crate) fn defer(&self, task: impl FnOnce(&mut Controller) + 'static) {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Removes the next task, if any.
    pub(crate) fn pop(&self) -> Option<Task> {
        self.queue.borrow_mut().pop_front()
    }

    /// Discards every queued task.
    pub(crate) fn clear(&self) {
        // Dropping a task can drop a completion handle, which posts again.
        loop {
            let dropped: Vec<Task> = self.queue.borrow_mut().drain(..).collect();
            if dropped.is_empty() {
                break;
            }
            drop(dropped);
        }
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Returns true if no work is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("queued", &self.len())
            .finish()
    }
}

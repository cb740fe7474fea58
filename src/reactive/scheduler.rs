//! Deferred tasks: the "next tick" queue.
//!
//! Work scheduled with [`defer`] runs on the next [`flush`], never
//! synchronously. Tasks may defer further tasks; `flush` drains until the
//! queue is empty.

use std::cell::RefCell;
use std::collections::VecDeque;

thread_local! {
    static TASKS: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
}

/// Schedule `task` for the next flush.
pub fn defer(task: impl FnOnce() + 'static) {
    TASKS.with(|tasks| tasks.borrow_mut().push_back(Box::new(task)));
}

/// Run every pending task, including tasks deferred while flushing.
/// Returns how many ran.
pub fn flush() -> usize {
    let mut ran = 0;
    loop {
        // Pop before running so the task may defer more work.
        let next = TASKS.with(|tasks| tasks.borrow_mut().pop_front());
        match next {
            Some(task) => {
                task();
                ran += 1;
            }
            None => return ran,
        }
    }
}

/// Number of tasks waiting for the next flush.
pub fn pending() -> usize {
    TASKS.with(|tasks| tasks.borrow().len())
}

/// Drop every pending task without running it.
pub fn clear() {
    TASKS.with(|tasks| tasks.borrow_mut().clear());
}

// ===========================================================================
// Tests
// ===========================================================================

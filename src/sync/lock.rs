//! Recursive mutual-exclusion lock built over `Semaphore`.
//!
//! A task that already holds the lock can `acquire` it again without
//! deadlocking itself; `release` only actually wakes the next waiter once
//! the recursion count drops back to zero.

use super::semaphore::Semaphore;
use crate::process::current;
use crate::process::task::Tcb;
use core::ptr::NonNull;
use spin::Mutex;

struct LockState {
    holder: Option<NonNull<Tcb>>,
    recursive_depth: u32,
}

unsafe impl Send for LockState {}

pub struct Lock {
    semaphore: Semaphore,
    state: Mutex<LockState>,
}

impl Lock {
    pub const fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
            state: Mutex::new(LockState { holder: None, recursive_depth: 0 }),
        }
    }

    pub fn acquire(&self) {
        let me = current::current().expect("lock acquire() with no current task");
        {
            let mut state = self.state.lock();
            if state.holder == Some(me) {
                state.recursive_depth += 1;
                return;
            }
        }
        self.semaphore.down();
        let mut state = self.state.lock();
        state.holder = Some(me);
        state.recursive_depth = 1;
    }

    pub fn release(&self) {
        let mut state = self.state.lock();
        if state.recursive_depth > 1 {
            state.recursive_depth -= 1;
            return;
        }
        state.holder = None;
        state.recursive_depth = 0;
        drop(state);
        self.semaphore.up();
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

//! Counting semaphore with a FIFO waiter list.
//!
//! `down`/`up` mutate `value` with interrupts disabled, matching the rule
//! that guards every scheduler-adjacent list in this kernel. The waiter
//! list only ever holds tasks blocked in `down`; `up` always increments
//! `value` and, if anyone is waiting, wakes the one that's been waiting
//! longest so it can recheck.

use crate::arch::x86::intr;
use crate::process::task::{TaskStatus, Tcb};
use crate::process::{current, scheduler};
use crate::util::list::IntrusiveList;
use spin::Mutex;

struct SemState {
    value: u32,
    waiters: IntrusiveList<Tcb>,
}

pub struct Semaphore {
    state: Mutex<SemState>,
}

impl Semaphore {
    pub const fn new(initial: u32) -> Self {
        Self {
            state: Mutex::new(SemState {
                value: initial,
                waiters: IntrusiveList::new(Tcb::wait_link, Tcb::wait_link_mut),
            }),
        }
    }

    /// Blocks until `value` is positive, then consumes one unit of it.
    pub fn down(&self) {
        let saved = intr::disable();
        loop {
            let mut state = self.state.lock();
            if state.value > 0 {
                state.value -= 1;
                break;
            }
            let cur = current::current().expect("semaphore down() with no current task");
            unsafe { state.waiters.push_back(cur) };
            drop(state);
            scheduler::block(TaskStatus::Waiting);
        }
        intr::set(saved);
    }

    /// Non-blocking probe: consumes one unit of `value` if available,
    /// otherwise leaves it untouched. Never adds to the waiter list.
    pub fn try_down(&self) -> bool {
        let saved = intr::disable();
        let mut state = self.state.lock();
        let ok = state.value > 0;
        if ok {
            state.value -= 1;
        }
        intr::set(saved);
        ok
    }

    /// Releases one unit of `value` and wakes the longest-waiting blocked
    /// task, if any, so it can recheck.
    pub fn up(&self) {
        let saved = intr::disable();
        let mut state = self.state.lock();
        let waiter = state.waiters.pop_front();
        state.value += 1;
        drop(state);
        if let Some(waiter) = waiter {
            unsafe { scheduler::unblock(waiter) };
        }
        intr::set(saved);
    }
}

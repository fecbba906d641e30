//! Pointer to the TCB the CPU is currently running. Single-CPU only: one
//! global slot, updated by the scheduler on every switch.

use super::task::Tcb;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

static CURRENT: AtomicUsize = AtomicUsize::new(0);

/// # Safety
/// Must only be called by the scheduler, immediately after `switch_to`
/// returns into the new task.
pub unsafe fn set_current(task: NonNull<Tcb>) {
    CURRENT.store(task.as_ptr() as usize, Ordering::Release);
}

/// Returns `None` only before the first task has been scheduled.
pub fn current() -> Option<NonNull<Tcb>> {
    NonNull::new(CURRENT.load(Ordering::Acquire) as *mut Tcb)
}

pub fn current_pid() -> super::pid::Pid {
    current().map(|t| unsafe { t.as_ref().pid }).unwrap_or(0)
}

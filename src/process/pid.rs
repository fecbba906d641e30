//! PID allocation: a monotonic counter protected by a lock. There is no
//! reuse and no process table indexed by PID here — a task is reachable
//! only through the scheduler's all-tasks list, per the back-reference
//! rule that the pool (here, the counter) stays a leaf.

pub type Pid = u32;

use spin::Mutex;

static NEXT_PID: Mutex<Pid> = Mutex::new(1);

pub fn alloc_pid() -> Pid {
    let mut next = NEXT_PID.lock();
    let pid = *next;
    *next += 1;
    pid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pids_are_monotonic_and_unique() {
        let a = alloc_pid();
        let b = alloc_pid();
        assert!(b > a);
    }
}

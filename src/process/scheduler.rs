//! Preemptive, priority-weighted round-robin scheduler.
//!
//! One ready queue, FIFO within it: priority only controls how long a slice
//! is (`ticks_left` is reloaded from `priority` every time a task is
//! (re)scheduled), not queue position. `ready` and `all` are disjoint in
//! membership purpose but a task sits on both simultaneously via its two
//! `ListLink`s; the invariant that matters is that the running task is never
//! also on `ready`.

use super::current;
use super::pid::{self, Pid};
use super::task::{SavedContext, TaskStatus, Tcb};
use crate::arch::x86::context::{switch_to, Context};
use crate::arch::x86::{gdt, intr};
use crate::mm;
use crate::util::list::IntrusiveList;
use core::arch::asm;
use core::mem::size_of;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

static READY: Mutex<IntrusiveList<Tcb>> = Mutex::new(IntrusiveList::new(Tcb::ready_link, Tcb::ready_link_mut));
static ALL: Mutex<IntrusiveList<Tcb>> = Mutex::new(IntrusiveList::new(Tcb::all_link, Tcb::all_link_mut));
static IDLE: AtomicUsize = AtomicUsize::new(0);

/// Saved stack slot for the boot thread. Nothing ever resumes through it —
/// the first `schedule()` call switches away from the boot stack for good —
/// but `switch_to` needs somewhere to park the outgoing registers.
static mut BOOT_SP: u32 = 0;

fn idle_task() -> Option<NonNull<Tcb>> {
    NonNull::new(IDLE.load(Ordering::Acquire) as *mut Tcb)
}

/// Allocate a TCB page, build its initial stack frame, and append it to the
/// ready and all-tasks lists. The task does not run until the scheduler
/// picks it.
pub fn spawn(name: &str, priority: u32, entry: extern "C" fn(usize) -> !, arg: usize) -> Pid {
    let page = mm::alloc_kernel_pages(1).expect("out of kernel memory for a new task");
    let tcb_ptr = page as *mut Tcb;
    let stack_top = Tcb::kernel_stack_top(tcb_ptr);
    let pid = pid::alloc_pid();
    let parent_pid = current::current_pid();

    Tcb::init_in_place(tcb_ptr, pid, parent_pid, name, priority, 0);

    // Lay down a frame that looks exactly like what `switch_to` leaves
    // behind mid-call, so the very first switch into this task can `ret`
    // straight into the trampoline as if resuming a real suspension.
    let (ctx, arg_frame_sp) = Context::new_kernel_thread(stack_top, entry, arg);
    let initial_sp = arg_frame_sp - size_of::<SavedContext>() as u32;
    unsafe {
        (initial_sp as *mut SavedContext).write(ctx);
        (*tcb_ptr).esp = initial_sp;
    }

    let node = unsafe { NonNull::new_unchecked(tcb_ptr) };
    let saved = intr::disable();
    unsafe {
        READY.lock().push_back(node);
        ALL.lock().push_back(node);
    }
    intr::set(saved);
    pid
}

/// Spawns the idle task and records it for `schedule()` to fall back on.
/// Call once during boot, before the timer starts ticking.
pub fn spawn_idle(priority: u32) -> Pid {
    let pid = spawn("idle", priority, idle_main, 0);
    let node = unsafe {
        let saved = intr::disable();
        let found = ALL.lock().iter().find(|t| unsafe { t.as_ref().pid } == pid);
        intr::set(saved);
        found.expect("idle task just spawned")
    };
    IDLE.store(node.as_ptr() as usize, Ordering::Release);
    pid
}

/// Hands control to the scheduler for the first time. Never returns: the
/// boot stack is discarded the moment the first real task runs.
pub fn start() -> ! {
    schedule();
    unreachable!("schedule() switched away from the boot stack");
}

extern "C" fn idle_main(_arg: usize) -> ! {
    loop {
        block(TaskStatus::Blocked);
        unsafe { asm!("sti", "hlt") };
    }
}

/// Sets `new_status` on the running task and invokes the scheduler.
///
/// Precondition: interrupts disabled by the caller.
pub fn block(new_status: TaskStatus) {
    debug_assert!(matches!(
        new_status,
        TaskStatus::Blocked | TaskStatus::Waiting | TaskStatus::Hanging
    ));
    let cur = current::current().expect("block() called with no current task");
    unsafe { (*cur.as_ptr()).status = new_status };
    schedule();
}

/// Moves a blocked/waiting/hanging task back onto the ready list, at the
/// head so it runs before tasks that have been waiting their turn.
///
/// # Safety
/// `task` must point at a live TCB not currently linked into the ready list.
pub unsafe fn unblock(task: NonNull<Tcb>) {
    let saved = intr::disable();
    let status = (*task.as_ptr()).status;
    debug_assert!(
        matches!(status, TaskStatus::Blocked | TaskStatus::Waiting | TaskStatus::Hanging),
        "unblock() on a task that wasn't blocked"
    );
    (*task.as_ptr()).status = TaskStatus::Ready;
    READY.lock().push_front(task);
    intr::set(saved);
}

/// Gives up the rest of the current slice voluntarily: the task goes to the
/// ready tail and a new task is picked.
pub fn yield_now() {
    let cur = current::current().expect("yield_now() called with no current task");
    let saved = intr::disable();
    unsafe {
        (*cur.as_ptr()).status = TaskStatus::Ready;
        READY.lock().push_back(cur);
    }
    schedule();
    intr::set(saved);
}

/// Called from the timer ISR. Decrements the running task's slice and, once
/// it's exhausted, preempts it exactly like a voluntary `yield_now()`.
pub fn timer_tick() {
    let Some(cur) = current::current() else { return };
    unsafe {
        let ticks_left = &mut (*cur.as_ptr()).ticks_left;
        *ticks_left = ticks_left.saturating_sub(1);
        (*cur.as_ptr()).elapsed_ticks += 1;
        if *ticks_left == 0 {
            (*cur.as_ptr()).status = TaskStatus::Ready;
            READY.lock().push_back(cur);
            schedule();
        }
    }
}

/// Pops the next task off the ready list (waking idle first if it's empty),
/// activates its address space and kernel stack, and switches onto it.
///
/// Does not touch the outgoing task's status or list membership — callers
/// (`block`/`unblock`/`yield_now`/`timer_tick`) are responsible for that
/// before calling in.
pub fn schedule() {
    let saved = intr::disable();

    let next = {
        let mut ready = READY.lock();
        if ready.is_empty() {
            drop(ready);
            unsafe {
                unblock(idle_task().expect("schedule() called before spawn_idle()"));
            }
            ready = READY.lock();
        }
        ready
            .pop_front()
            .expect("scheduler invariant: ready list non-empty right after waking idle")
    };

    let prev = current::current();
    if let Some(prev) = prev {
        debug_assert_ne!(prev.as_ptr(), next.as_ptr(), "ready list held the running task");
    }

    unsafe {
        (*next.as_ptr()).status = TaskStatus::Running;
        (*next.as_ptr()).ticks_left = (*next.as_ptr()).priority;
        gdt::set_kernel_stack(Tcb::kernel_stack_top(next.as_ptr()));
        if let Some(space) = &(*next.as_ptr()).address_space {
            let phys = space.directory_phys();
            asm!("mov cr3, {0}", in(reg) phys, options(nostack, preserves_flags));
        }

        current::set_current(next);

        let prev_sp: *mut u32 = match prev {
            Some(p) => &mut (*p.as_ptr()).esp,
            None => core::ptr::addr_of_mut!(BOOT_SP),
        };
        let next_sp = (*next.as_ptr()).esp;
        switch_to(prev_sp, next_sp);
    }

    intr::set(saved);
}

/// Runs `f` over every live task (the `ps` syscall's only caller). Interrupts
/// stay disabled for the whole walk, same as every other `ALL` access.
pub fn for_each_task<F: FnMut(&Tcb)>(mut f: F) {
    let saved = intr::disable();
    for task in ALL.lock().iter() {
        unsafe { f(task.as_ref()) };
    }
    intr::set(saved);
}

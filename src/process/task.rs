//! Task control block.
//!
//! One 4 KiB page per task: the low end holds this struct, the rest of the
//! page is the kernel stack the task runs on while in ring0. Recovering the
//! owning TCB from any kernel stack pointer is just a mask:
//! `task_from_esp(esp) = esp & !0xFFF`.

use super::pid::Pid;
use crate::arch::x86::context::Context;
use crate::mm::heap::Arena;
use crate::mm::AddressSpace;
use crate::util::list::ListLink;

pub const TCB_PAGE_SIZE: usize = 4096;
pub const MAX_FILES_OPEN_PER_PROC: usize = 16;
pub const TASK_NAME_LEN: usize = 32;
const GUARD_MAGIC: u32 = 0x1936_0817;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Ready,
    Blocked,
    Waiting,
    Hanging,
    Died,
}

#[repr(C)]
pub struct Tcb {
    magic: u32,
    pub pid: Pid,
    pub parent_pid: Pid,
    name: [u8; TASK_NAME_LEN],
    pub status: TaskStatus,
    pub priority: u32,
    pub ticks_left: u32,
    pub elapsed_ticks: u32,
    /// Saved stack pointer; valid only while this task is not RUNNING.
    pub(super) esp: u32,
    /// Non-null iff this is a user process.
    pub address_space: Option<AddressSpace>,
    pub user_heap: Arena,
    fd_table: [i32; MAX_FILES_OPEN_PER_PROC],
    pub cwd_inode: u32,
    pub(super) ready_link: ListLink<Tcb>,
    pub(super) all_link: ListLink<Tcb>,
    /// Linkage for whichever semaphore waiter list this task is currently
    /// blocked on. A task is only ever on one wait list at a time.
    wait_link: ListLink<Tcb>,
}

impl Tcb {
    pub fn ready_link(t: &Tcb) -> &ListLink<Tcb> {
        &t.ready_link
    }
    pub fn ready_link_mut(t: &mut Tcb) -> &mut ListLink<Tcb> {
        &mut t.ready_link
    }
    pub fn all_link(t: &Tcb) -> &ListLink<Tcb> {
        &t.all_link
    }
    pub fn all_link_mut(t: &mut Tcb) -> &mut ListLink<Tcb> {
        &mut t.all_link
    }
    pub fn wait_link(t: &Tcb) -> &ListLink<Tcb> {
        &t.wait_link
    }
    pub fn wait_link_mut(t: &mut Tcb) -> &mut ListLink<Tcb> {
        &mut t.wait_link
    }

    /// Format a TCB in place at the low end of a freshly allocated page.
    /// `fd_table[0..3]` start reserved for stdin/stdout/stderr; the rest
    /// start free (-1).
    pub fn init_in_place(
        page: *mut Tcb,
        pid: Pid,
        parent_pid: Pid,
        name: &str,
        priority: u32,
        esp: u32,
    ) {
        let mut name_buf = [0u8; TASK_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(TASK_NAME_LEN - 1);
        name_buf[..len].copy_from_slice(&bytes[..len]);

        let mut fd_table = [-1i32; MAX_FILES_OPEN_PER_PROC];
        fd_table[0] = 0;
        fd_table[1] = 1;
        fd_table[2] = 2;

        unsafe {
            page.write(Tcb {
                magic: GUARD_MAGIC,
                pid,
                parent_pid,
                name: name_buf,
                status: TaskStatus::Ready,
                priority,
                ticks_left: priority,
                elapsed_ticks: 0,
                esp,
                address_space: None,
                user_heap: Arena::new(),
                fd_table,
                cwd_inode: 0,
                ready_link: ListLink::new(),
                all_link: ListLink::new(),
                wait_link: ListLink::new(),
            });
        }
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(TASK_NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }

    pub fn check_guard(&self) {
        if self.magic != GUARD_MAGIC {
            crate::PANIC!(&alloc::format!("task guard corrupted: pid {}", self.pid));
        }
    }

    pub fn fd_alloc(&mut self) -> Option<usize> {
        self.fd_table.iter().position(|&slot| slot == -1).map(|i| {
            self.fd_table[i] = 0;
            i
        })
    }

    pub fn fd_slot(&self, fd: usize) -> Option<i32> {
        self.fd_table.get(fd).copied()
    }

    pub fn fd_set(&mut self, fd: usize, file_table_index: i32) {
        self.fd_table[fd] = file_table_index;
    }

    pub fn fd_free(&mut self, fd: usize) {
        self.fd_table[fd] = -1;
    }

    /// The top of this task's kernel stack: the highest address inside its
    /// page, used as the initial `esp` before the first context switch.
    pub fn kernel_stack_top(page: *mut Tcb) -> u32 {
        page as u32 + TCB_PAGE_SIZE as u32
    }
}

/// Recover the owning TCB from a kernel stack pointer belonging to it.
pub fn task_from_esp(esp: u32) -> *mut Tcb {
    (esp & !(TCB_PAGE_SIZE as u32 - 1)) as *mut Tcb
}

/// `switch_to`'s saved-register layout, confined to `context.rs`; exposed
/// here only so the scheduler can name the type when reading/writing a
/// TCB's `esp` field.
pub type SavedContext = Context;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esp_masks_to_page_base() {
        let page_base = 0x0020_3000u32;
        let esp_mid_stack = page_base + 0xABC;
        assert_eq!(task_from_esp(esp_mid_stack) as u32, page_base);
    }

    #[test]
    fn name_truncates_and_nul_terminates() {
        let long = "a".repeat(64);
        let mut buf = [0u8; TASK_NAME_LEN];
        let bytes = long.as_bytes();
        let len = bytes.len().min(TASK_NAME_LEN - 1);
        buf[..len].copy_from_slice(&bytes[..len]);
        assert_eq!(buf[TASK_NAME_LEN - 1], 0);
    }
}

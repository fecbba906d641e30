//! Kernel-to-kernel context switch.
//!
//! Only callee-saved registers and the stack pointer need to survive a
//! switch; everything else is scratch from the compiler's point of view
//! once we're between function calls. `switch_to` follows the same
//! save-current/restore-next shape as a cooperative coroutine swap.

use core::arch::{asm, naked_asm};

/// Per-task saved register set. Lives at a fixed offset inside the TCB;
/// `switch_to` is handed `&mut Context` for the outgoing task and `&Context`
/// for the incoming one.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub edi: u32,
    pub esi: u32,
    pub ebx: u32,
    pub ebp: u32,
    /// Return address `switch_to` will `ret` into on resume.
    pub eip: u32,
}

impl Context {
    /// Build the initial context for a brand-new kernel thread: its saved
    /// `eip` points at `trampoline`, which lands in `kernel_thread_entry`
    /// with `entry`/`arg` pulled off the stack it's about to "resume" into.
    pub fn new_kernel_thread(stack_top: u32, entry: extern "C" fn(usize) -> !, arg: usize) -> (Self, u32) {
        // Build a fake call frame below stack_top: trampoline pops entry/arg.
        let mut sp = stack_top;
        sp -= 4;
        unsafe { (sp as *mut usize).write(arg) };
        sp -= 4;
        unsafe { (sp as *mut usize).write(entry as usize) };
        let ctx = Context {
            edi: 0,
            esi: 0,
            ebx: 0,
            ebp: 0,
            eip: trampoline as u32,
        };
        (ctx, sp)
    }
}

/// Switches the live stack from `prev`'s to `next`'s. `prev_sp`/`next_sp`
/// point at the `esp` field stored in each task's TCB (the top of its saved
/// `Context`), not the `Context` struct directly, since the callee-saved
/// registers are pushed/popped around the stack-pointer swap itself.
///
/// # Safety
/// `next_sp` must point into a stack previously set up by
/// `Context::new_kernel_thread` or a prior `switch_to` from the same task.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_to(prev_sp: *mut u32, next_sp: u32) {
    naked_asm!(
        "push ebp",
        "push ebx",
        "push esi",
        "push edi",
        "mov eax, [esp + 20]", // prev_sp: 4 pushes (16) + return address (4)
        "mov [eax], esp",
        "mov eax, [esp + 24]", // next_sp
        "mov esp, eax",
        "pop edi",
        "pop esi",
        "pop ebx",
        "pop ebp",
        "ret",
    );
}

/// Pops `entry`/`arg` off the stack `switch_to` just resumed onto, re-enables
/// interrupts (they're off for the whole switch), and calls into the real
/// thread body. Threads never return from `entry`; the scheduler's exit path
/// handles cleanup.
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    naked_asm!(
        "pop eax", // entry
        "pop ecx", // arg
        "sti",
        "push ecx",
        "call eax",
        "2:",
        "hlt",
        "jmp 2b",
    );
}

/// Builds the `jmp` used to drop into a freshly-mapped user task for the
/// first time (as opposed to `switch_to`, which resumes a kernel context).
///
/// # Safety
/// `entry`/`user_stack` must be valid mapped user-space addresses in the
/// address space that's current at the time this is called.
pub unsafe fn enter_user_mode(entry: u32, user_stack: u32) -> ! {
    use super::gdt::{USER_CODE_SELECTOR, USER_DATA_SELECTOR};
    asm!(
        "mov ax, {data_sel:x}",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "push {data_sel:e}",
        "push {user_stack:e}",
        "pushfd",
        "pop eax",
        "or eax, 0x200", // ensure IF is set on return to user mode
        "push eax",
        "push {code_sel:e}",
        "push {entry:e}",
        "iretd",
        data_sel = in(reg) USER_DATA_SELECTOR as u32,
        user_stack = in(reg) user_stack,
        code_sel = in(reg) USER_CODE_SELECTOR as u32,
        entry = in(reg) entry,
        options(noreturn),
    );
}

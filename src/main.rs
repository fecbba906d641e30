//! Kernel entry point.
//!
//! Boot flow (spec's scenario A): a multiboot-compliant loader drops us into
//! flat 32-bit protected mode with paging disabled; [`kernel_entry`] reads
//! the memory size the loader reported, brings up the architecture layer,
//! memory manager, drivers, filesystem and syscall gate in dependency
//! order, spawns the idle task and the kernel main task (priority 31),
//! enables interrupts, and hands off to the scheduler for good.

#![no_std]
#![no_main]

extern crate alloc;

#[allow(special_module_name)]
pub mod lib;

pub mod arch;
pub mod block;
pub mod drivers;
pub mod fs;
pub mod mm;
pub mod process;
pub mod sync;
pub mod syscall;
pub mod time;
pub mod util;

use core::panic::PanicInfo;
use mm::heap::KernelHeap;

#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    lib::panic::rust_panic_handler(info)
}

/// # Safety
/// Called exactly once, from `_start`, with the CPU already in flat 32-bit
/// protected mode and a valid stack.
fn boot_main(total_mem_bytes: u32) -> ! {
    unsafe {
        arch::x86::init();
    }
    mm::init(total_mem_bytes);

    drivers::timer::init();
    drivers::keyboard::init();
    drivers::ide::init();
    fs::init();
    syscall::init();

    crate::kinfo!("xun-os: boot complete, starting scheduler");

    process::scheduler::spawn_idle(1);
    process::scheduler::spawn("kmain", 31, kernel_main_task, 0);

    arch::x86::intr::enable();
    process::scheduler::start();
}

/// The kernel's own top-level task. There is no built-in shell or user
/// process loader in this kernel; it just keeps the system alive and
/// reports a heartbeat, which is all scenario A asks of it.
extern "C" fn kernel_main_task(_arg: usize) -> ! {
    let mut last_report = 0u64;
    loop {
        let ticks = time::ticks();
        if ticks - last_report >= time::TICKS_PER_SECOND * 10 {
            crate::kinfo!("xun-os: uptime {} ms", time::ticks_to_ms(ticks));
            last_report = ticks;
        }
        process::scheduler::yield_now();
    }
}

crate::boot_entry!(boot_main);

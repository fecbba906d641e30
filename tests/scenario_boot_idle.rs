//! Boot-to-idle scenario: boot, bring the timer and scheduler up, spawn the
//! idle task plus a checker, enable interrupts, and confirm the tick
//! counter advances at roughly the programmed 100 Hz instead of the boot
//! just hanging or panicking.

#![no_std]
#![no_main]

extern crate alloc;

mod common;

use core::panic::PanicInfo;
use xun_os::lib::qemutest::{exit_qemu, test_panic_handler, QemuExitCode};
use xun_os::mm::heap::KernelHeap;

#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

extern "C" fn checker_task(_arg: usize) -> ! {
    let start = xun_os::time::ticks();
    loop {
        let elapsed = xun_os::time::ticks() - start;
        if elapsed >= xun_os::time::TICKS_PER_SECOND {
            exit_qemu(QemuExitCode::Success);
        }
        xun_os::process::scheduler::yield_now();
    }
}

fn scenario(total_mem_bytes: u32) -> ! {
    unsafe {
        xun_os::arch::x86::init();
    }
    xun_os::mm::init(total_mem_bytes);
    xun_os::drivers::timer::init();

    xun_os::process::scheduler::spawn_idle(1);
    xun_os::process::scheduler::spawn("checker", 31, checker_task, 0);

    xun_os::arch::x86::intr::enable();
    xun_os::process::scheduler::start();
}

xun_os::boot_entry!(scenario);

//! Heap-stress scenario: a single task repeats `heap_alloc(128)`,
//! `heap_alloc(256)`, `heap_alloc(512)`, free-all 1,000 times. Expected:
//! exactly zero net pages leaked from the kernel physical pool once the
//! loop finishes.

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

const ITERATIONS: u32 = 1_000;

extern "C" fn worker_task(_arg: usize) -> ! {
    let before = xun_os::mm::kernel_frames_in_use();

    for _ in 0..ITERATIONS {
        let a = xun_os::mm::heap_alloc(128).expect("alloc(128) failed");
        let b = xun_os::mm::heap_alloc(256).expect("alloc(256) failed");
        let c = xun_os::mm::heap_alloc(512).expect("alloc(512) failed");
        xun_os::mm::heap_free(a);
        xun_os::mm::heap_free(b);
        xun_os::mm::heap_free(c);
    }

    let after = xun_os::mm::kernel_frames_in_use();
    if after != before {
        panic!("leaked {} frames over {} iterations", after as i64 - before as i64, ITERATIONS);
    }
    exit_qemu(QemuExitCode::Success);
}

fn scenario(total_mem_bytes: u32) -> ! {
    unsafe {
        xun_os::arch::x86::init();
    }
    xun_os::mm::init(total_mem_bytes);
    xun_os::drivers::timer::init();

    xun_os::process::scheduler::spawn_idle(1);
    xun_os::process::scheduler::spawn("worker", 31, worker_task, 0);

    xun_os::arch::x86::intr::enable();
    xun_os::process::scheduler::start();
}

xun_os::boot_entry!(scenario);

//! Two-threads scenario: two worker tasks each increment a shared counter
//! 10,000 times under a recursive `Lock`, and a checker waits for both to
//! finish before asserting the final count — the thing that would come out
//! wrong first if `Lock`/`Semaphore` let a racing increment through.

#![no_std]
#![no_main]

extern crate alloc;

mod common;

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicU32, Ordering};
use xun_os::lib::qemutest::{exit_qemu, test_panic_handler, QemuExitCode};
use xun_os::mm::heap::KernelHeap;
use xun_os::sync::Lock;

#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

const INCREMENTS_PER_WORKER: u32 = 10_000;

static COUNTER_LOCK: Lock = Lock::new();
static mut COUNTER: u32 = 0;
static WORKERS_DONE: AtomicU32 = AtomicU32::new(0);

extern "C" fn worker_task(_arg: usize) -> ! {
    for _ in 0..INCREMENTS_PER_WORKER {
        COUNTER_LOCK.acquire();
        unsafe {
            COUNTER += 1;
        }
        COUNTER_LOCK.release();
        xun_os::process::scheduler::yield_now();
    }
    WORKERS_DONE.fetch_add(1, Ordering::SeqCst);
    loop {
        xun_os::process::scheduler::yield_now();
    }
}

extern "C" fn checker_task(_arg: usize) -> ! {
    while WORKERS_DONE.load(Ordering::SeqCst) < 2 {
        xun_os::process::scheduler::yield_now();
    }
    let total = unsafe { COUNTER };
    if total != INCREMENTS_PER_WORKER * 2 {
        panic!("expected {} increments, observed {}", INCREMENTS_PER_WORKER * 2, total);
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
    xun_os::process::scheduler::spawn("worker-a", 16, worker_task, 0);
    xun_os::process::scheduler::spawn("worker-b", 16, worker_task, 0);
    xun_os::process::scheduler::spawn("checker", 31, checker_task, 0);

    xun_os::arch::x86::intr::enable();
    xun_os::process::scheduler::start();
}

xun_os::boot_entry!(scenario);

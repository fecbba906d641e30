//! Keyboard-read scenario: a producer task feeds bytes into the IO queue
//! the way the PS/2 ISR would (`ioqueue::try_put`), and a consumer blocks
//! on `fs::file::read(STDIN_FD, ..)` until a full line arrives — exercising
//! the blocking wakeup path without needing a real keyboard attached.

#![no_std]
#![no_main]

extern crate alloc;

mod common;

use core::panic::PanicInfo;
use xun_os::drivers::ioqueue;
use xun_os::fs::file::{self, STDIN_FD};
use xun_os::lib::qemutest::{exit_qemu, test_panic_handler, QemuExitCode};
use xun_os::mm::heap::KernelHeap;

#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

const LINE: &[u8] = b"abcd\n";

extern "C" fn producer_task(_arg: usize) -> ! {
    for &byte in LINE {
        ioqueue::try_put(byte);
    }
    loop {
        xun_os::process::scheduler::yield_now();
    }
}

extern "C" fn consumer_task(_arg: usize) -> ! {
    let mut buf = [0u8; 8];
    let n = file::read(STDIN_FD, &mut buf).expect("stdin read failed");
    if &buf[..n] != LINE {
        panic!("read {} bytes, did not match the line the producer queued", n);
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
    xun_os::process::scheduler::spawn("consumer", 31, consumer_task, 0);
    xun_os::process::scheduler::spawn("producer", 16, producer_task, 0);

    xun_os::arch::x86::intr::enable();
    xun_os::process::scheduler::start();
}

xun_os::boot_entry!(scenario);

//! File-lifecycle scenario: create a file with `O_CREAT`, write to it,
//! rewind, read the bytes back, close, then unlink — the full path through
//! `fs::file`'s open/write/read/lseek/close/unlink, against a mock disk
//! mounted directly (no MBR, no real IDE drive).

#![no_std]
#![no_main]

extern crate alloc;

mod common;

use core::panic::PanicInfo;
use xun_os::fs::file::{self, OpenFlags, Whence};
use xun_os::lib::qemutest::{exit_qemu, test_panic_handler, QemuExitCode};
use xun_os::mm::heap::KernelHeap;

#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

const CONTENTS: &[u8] = b"hello xun-os";

extern "C" fn worker_task(_arg: usize) -> ! {
    common::mount_mock_disk();

    let fd = file::open("/greeting.txt", OpenFlags::O_CREAT | OpenFlags::O_RDWR).expect("open(O_CREAT) failed");

    let written = file::write(fd, CONTENTS).expect("write failed");
    if written != CONTENTS.len() {
        panic!("short write: wrote {} of {} bytes", written, CONTENTS.len());
    }

    file::lseek(fd, 0, Whence::Set).expect("lseek failed");

    let mut buf = [0u8; 32];
    let read = file::read(fd, &mut buf).expect("read failed");
    if &buf[..read] != CONTENTS {
        panic!("read back {} bytes, did not match what was written", read);
    }

    file::close(fd).expect("close failed");
    file::unlink("/greeting.txt").expect("unlink failed");

    if file::open("/greeting.txt", OpenFlags::O_RDONLY).is_ok() {
        panic!("unlinked file is still openable");
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

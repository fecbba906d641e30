//! Disk-roundtrip scenario: write a file that fills every direct block
//! plus the entire single-indirect block (`MAX_BLOCKS` sectors, the
//! largest a file can grow to), then read it back sector by sector and
//! check the indirect-block address translation didn't corrupt anything.

#![no_std]
#![no_main]

extern crate alloc;

mod common;

use core::panic::PanicInfo;
use xun_os::fs::file::{self, OpenFlags, Whence};
use xun_os::fs::inode::MAX_BLOCKS;
use xun_os::lib::qemutest::{exit_qemu, test_panic_handler, QemuExitCode};
use xun_os::mm::heap::KernelHeap;

#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

const SECTOR: usize = 512;

/// Deterministic, position-dependent fill so a misdirected indirect-block
/// pointer would read back the wrong sector's content instead of just
/// zeros.
fn pattern_for(sector: u32) -> u8 {
    (sector % 256) as u8
}

extern "C" fn worker_task(_arg: usize) -> ! {
    common::mount_mock_disk();

    let fd = file::open("/big.bin", OpenFlags::O_CREAT | OpenFlags::O_RDWR).expect("open(O_CREAT) failed");

    let mut chunk = [0u8; SECTOR];
    for sector in 0..MAX_BLOCKS {
        chunk.fill(pattern_for(sector));
        let written = file::write(fd, &chunk).expect("write failed");
        if written != SECTOR {
            panic!("short write at sector {}: {} bytes", sector, written);
        }
    }

    file::lseek(fd, 0, Whence::Set).expect("lseek failed");

    let mut buf = [0u8; SECTOR];
    for sector in 0..MAX_BLOCKS {
        let read = file::read(fd, &mut buf).expect("read failed");
        if read != SECTOR {
            panic!("short read at sector {}: {} bytes", sector, read);
        }
        let expected = pattern_for(sector);
        if buf.iter().any(|&b| b != expected) {
            panic!("sector {} read back with the wrong content", sector);
        }
    }

    file::close(fd).expect("close failed");
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

//! Support shared by the bare-metal scenario tests: a block device backed
//! by host memory instead of a real IDE drive, standing in for the disk a
//! scenario needs without requiring MBR/partition scanning.
//!
//! Pulled in with `mod common;` from each scenario's own crate root, so it
//! inherits that crate's `extern crate alloc;`.

use spin::Mutex;
use xun_os::block::{Disk, DiskOps};
use xun_os::lib::error::Result;

/// 4096 sectors (2 MiB) — room for the fixed filesystem metadata (483
/// sectors for `MAX_INODES = 4096`) plus a 140-block test file.
pub const MOCK_DISK_SECTORS: usize = 4096;
const SECTOR_SIZE: usize = 512;

pub struct MockDisk {
    data: Mutex<[u8; MOCK_DISK_SECTORS * SECTOR_SIZE]>,
}

impl MockDisk {
    pub const fn new() -> Self {
        Self { data: Mutex::new([0u8; MOCK_DISK_SECTORS * SECTOR_SIZE]) }
    }
}

impl DiskOps for MockDisk {
    fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> Result<()> {
        let offset = sector as usize * SECTOR_SIZE;
        let data = self.data.lock();
        buf.copy_from_slice(&data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_sectors(&self, sector: u64, buf: &[u8]) -> Result<()> {
        let offset = sector as usize * SECTOR_SIZE;
        let mut data = self.data.lock();
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

static MOCK_DISK: MockDisk = MockDisk::new();

/// Registers the mock disk as `"sdb"` and mounts it directly as the
/// current partition, formatting it on first use exactly as a fresh real
/// disk would.
pub fn mount_mock_disk() {
    let disk = xun_os::block::register_disk(Disk::new(
        alloc::string::String::from("sdb"),
        MOCK_DISK_SECTORS as u64,
        &MOCK_DISK,
    ));
    xun_os::fs::mount(disk).expect("mock disk mount failed");
}

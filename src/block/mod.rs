//! Disk abstraction: a named block device addressed by LBA, dispatched to
//! whichever driver actually owns the hardware.
//!
//! A [`Disk`] here is deliberately thin — just a name, a sector count, and a
//! [`DiskOps`] implementor to call through to. The protocol-level state (an
//! IDE channel's port base, lock, and completion semaphore; a partition's
//! LBA offset into its parent) lives on that implementor, the way
//! `arch::x86::ide::IdeDisk` and `partition::PartitionOps` each hold only
//! what they need and forward everything else.

pub mod partition;

use crate::lib::error::{Errno, Result};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

pub const SECTOR_SIZE: usize = 512;

/// A probed disk or partition, named the way boot-time probing assigns it:
/// whole disks as `sda`, `sdb`, ... in channel/slave probe order; partitions
/// as `sda1`, `sda2`, ... in MBR table order.
pub struct Disk {
    pub name: String,
    pub sector_count: u64,
    ops: &'static dyn DiskOps,
}

impl Disk {
    pub fn new(name: String, sector_count: u64, ops: &'static dyn DiskOps) -> Self {
        Self { name, sector_count, ops }
    }

    pub fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> Result<()> {
        self.check_bounds(sector, buf.len())?;
        self.ops.read_sectors(sector, buf)
    }

    pub fn write_sectors(&self, sector: u64, buf: &[u8]) -> Result<()> {
        self.check_bounds(sector, buf.len())?;
        self.ops.write_sectors(sector, buf)
    }

    pub fn flush(&self) -> Result<()> {
        self.ops.flush()
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.sector_count * SECTOR_SIZE as u64
    }

    fn check_bounds(&self, sector: u64, len: usize) -> Result<()> {
        let sectors = (len / SECTOR_SIZE) as u64;
        if sector + sectors > self.sector_count {
            return Err(Errno::EINVAL);
        }
        Ok(())
    }
}

/// What moves bytes for a [`Disk`]: the IDE PIO channel driver, a
/// partition's LBA-offset forwarder onto its parent disk, or a host-memory
/// stand-in used by the scenario tests.
pub trait DiskOps: Send + Sync {
    fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> Result<()>;
    fn write_sectors(&self, sector: u64, buf: &[u8]) -> Result<()>;
    fn flush(&self) -> Result<()>;
}

static DISKS: Mutex<Vec<Arc<Disk>>> = Mutex::new(Vec::new());

/// Registers a probed disk or partition under its name.
pub fn register_disk(disk: Disk) -> Arc<Disk> {
    let disk = Arc::new(disk);
    DISKS.lock().push(disk.clone());
    crate::kinfo!("block: {} ready ({} MB)", disk.name, disk.capacity_bytes() / 1024 / 1024);
    disk
}

pub fn get_disk(name: &str) -> Option<Arc<Disk>> {
    DISKS.lock().iter().find(|d| d.name == name).cloned()
}

pub fn list_disks() -> Vec<Arc<Disk>> {
    DISKS.lock().clone()
}

impl core::fmt::Debug for Disk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Disk")
            .field("name", &self.name)
            .field("sector_count", &self.sector_count)
            .field("capacity_mb", &(self.capacity_bytes() / 1024 / 1024))
            .finish()
    }
}

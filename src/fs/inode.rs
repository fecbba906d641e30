//! Inodes: on-disk layout, the per-partition open-inode cache, and direct +
//! single-indirect block address resolution.

use crate::block::Disk;
use crate::lib::error::{Errno, Result};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem::size_of;
use spin::Mutex;

pub const DIRECT_BLOCKS: usize = 12;
pub const INDIRECT_INDEX: usize = 12;
pub const PTRS_PER_INDIRECT: usize = 128;
pub const MAX_BLOCKS: u32 = (DIRECT_BLOCKS + PTRS_PER_INDIRECT) as u32;
pub const MAX_FILE_SIZE: u64 = MAX_BLOCKS as u64 * 512;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DiskInode {
    pub i_no: u32,
    pub size_bytes: u32,
    pub blocks: [u32; DIRECT_BLOCKS + 1],
}

/// In-memory inode. `open_cnt`/`write_deny` never reach disk; only
/// `disk` does, via [`inode_sync`].
pub struct Inode {
    pub disk: DiskInode,
    pub open_cnt: u32,
    pub write_deny: bool,
}

fn inode_location(inode_table_lba: u64, no: u32) -> (u64, usize) {
    let byte_offset = no as u64 * size_of::<DiskInode>() as u64;
    let sector = inode_table_lba + byte_offset / 512;
    let offset_in_sector = (byte_offset % 512) as usize;
    (sector, offset_in_sector)
}

fn read_disk_inode(device: &Arc<Disk>, inode_table_lba: u64, no: u32) -> Result<DiskInode> {
    let (sector, offset) = inode_location(inode_table_lba, no);
    // An inode may straddle two sectors; always read two and index in.
    let mut buf = [0u8; 1024];
    device.read_sectors(sector, &mut buf[..512])?;
    device.read_sectors(sector + 1, &mut buf[512..])?;
    Ok(unsafe { core::ptr::read_unaligned(buf.as_ptr().add(offset) as *const DiskInode) })
}

pub fn write_disk_inode(device: &Arc<Disk>, inode_table_lba: u64, disk: &DiskInode) -> Result<()> {
    let (sector, offset) = inode_location(inode_table_lba, disk.i_no);
    let mut buf = [0u8; 1024];
    device.read_sectors(sector, &mut buf[..512])?;
    device.read_sectors(sector + 1, &mut buf[512..])?;
    unsafe {
        core::ptr::write_unaligned(buf.as_mut_ptr().add(offset) as *mut DiskInode, *disk);
    }
    device.write_sectors(sector, &buf[..512])?;
    device.write_sectors(sector + 1, &buf[512..])
}

/// Per-partition cache of currently-open inodes. Linear search, matching
/// how few inodes are ever open at once on a single-CPU kernel with one
/// filesystem syscall in flight at a time.
pub struct InodeCache {
    open_inodes: Mutex<Vec<Arc<Mutex<Inode>>>>,
}

impl InodeCache {
    pub fn new() -> Self {
        Self { open_inodes: Mutex::new(Vec::new()) }
    }

    pub fn open(&self, device: &Arc<Disk>, inode_table_lba: u64, no: u32) -> Result<Arc<Mutex<Inode>>> {
        let saved = crate::arch::x86::intr::disable();
        let found = {
            let list = self.open_inodes.lock();
            list.iter().find(|entry| entry.lock().disk.i_no == no).cloned()
        };
        if let Some(entry) = &found {
            entry.lock().open_cnt += 1;
        }
        crate::arch::x86::intr::set(saved);

        if let Some(entry) = found {
            return Ok(entry);
        }

        let disk = read_disk_inode(device, inode_table_lba, no)?;
        let entry = Arc::new(Mutex::new(Inode { disk, open_cnt: 1, write_deny: false }));

        let saved = crate::arch::x86::intr::disable();
        self.open_inodes.lock().push(entry.clone());
        crate::arch::x86::intr::set(saved);
        Ok(entry)
    }

    pub fn close(&self, inode: &Arc<Mutex<Inode>>) {
        let saved = crate::arch::x86::intr::disable();
        let should_evict = {
            let mut guard = inode.lock();
            guard.open_cnt -= 1;
            guard.open_cnt == 0
        };
        if should_evict {
            let mut list = self.open_inodes.lock();
            list.retain(|entry| !Arc::ptr_eq(entry, inode));
        }
        crate::arch::x86::intr::set(saved);
    }
}

pub fn sync(device: &Arc<Disk>, inode_table_lba: u64, inode: &Inode) -> Result<()> {
    write_disk_inode(device, inode_table_lba, &inode.disk)
}

/// Resolves logical block `index` (0-based) to an absolute LBA, following
/// the single-indirect table if needed. Returns `None` for an unallocated
/// hole.
pub fn block_lba(device: &Arc<Disk>, disk: &DiskInode, index: u32) -> Result<Option<u64>> {
    if (index as usize) < DIRECT_BLOCKS {
        let entry = disk.blocks[index as usize];
        return Ok(if entry == 0 { None } else { Some(entry as u64) });
    }
    let indirect_lba = disk.blocks[INDIRECT_INDEX];
    if indirect_lba == 0 {
        return Ok(None);
    }
    let slot = index as usize - DIRECT_BLOCKS;
    if slot >= PTRS_PER_INDIRECT {
        return Err(Errno::EINVAL);
    }
    let mut table = [0u8; 512];
    device.read_sectors(indirect_lba as u64, &mut table)?;
    let entry = u32::from_le_bytes(table[slot * 4..slot * 4 + 4].try_into().unwrap());
    Ok(if entry == 0 { None } else { Some(entry as u64) })
}

/// Allocates and wires up the block for logical index `index`, growing the
/// indirect table first if this is the first indirect entry being used.
/// Returns the new block's LBA.
pub fn alloc_block_for(
    device: &Arc<Disk>,
    block_bitmap: &mut super::bitmap::Bitmap,
    data_start_lba: u64,
    disk: &mut DiskInode,
    index: u32,
) -> Result<u64> {
    if index >= MAX_BLOCKS {
        return Err(Errno::ENOSPC);
    }

    let bit = block_bitmap.alloc().ok_or(Errno::ENOSPC)?;
    let lba = data_start_lba + bit as u64;

    if (index as usize) < DIRECT_BLOCKS {
        disk.blocks[index as usize] = lba as u32;
        return Ok(lba);
    }

    if disk.blocks[INDIRECT_INDEX] == 0 {
        let table_bit = match block_bitmap.alloc() {
            Some(b) => b,
            None => {
                block_bitmap.free(bit);
                return Err(Errno::ENOSPC);
            }
        };
        disk.blocks[INDIRECT_INDEX] = (data_start_lba + table_bit as u64) as u32;
        let zeroed = [0u8; 512];
        device.write_sectors(disk.blocks[INDIRECT_INDEX] as u64, &zeroed)?;
    }

    let slot = index as usize - DIRECT_BLOCKS;
    let indirect_lba = disk.blocks[INDIRECT_INDEX] as u64;
    let mut table = [0u8; 512];
    device.read_sectors(indirect_lba, &mut table)?;
    table[slot * 4..slot * 4 + 4].copy_from_slice(&(lba as u32).to_le_bytes());
    device.write_sectors(indirect_lba, &table)?;

    Ok(lba)
}

//! Directory entries: 24 B fixed records scanned linearly across an
//! inode's direct and single-indirect data blocks.

use super::inode::{self, DiskInode, MAX_BLOCKS};
use crate::block::Disk;
use crate::lib::error::{Errno, Result};
use alloc::sync::Arc;
use core::mem::size_of;

pub const NAME_LEN: usize = 16;
const ENTRIES_PER_BLOCK: usize = 512 / size_of::<DirEntry>();

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    pub filename: [u8; NAME_LEN],
    pub inode_no: u32,
    pub file_type: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    Unknown = 0,
    Regular = 1,
    Directory = 2,
}

impl DirEntry {
    pub fn new(name: &str, inode_no: u32, file_type: FileType) -> Self {
        let mut filename = [0u8; NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_LEN - 1);
        filename[..len].copy_from_slice(&bytes[..len]);
        Self { filename, inode_no, file_type: file_type as u32 }
    }

    pub fn name(&self) -> &str {
        let len = self.filename.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        core::str::from_utf8(&self.filename[..len]).unwrap_or("")
    }

    pub fn is_free(&self) -> bool {
        self.file_type == FileType::Unknown as u32
    }

    pub fn free() -> Self {
        Self { filename: [0; NAME_LEN], inode_no: 0, file_type: FileType::Unknown as u32 }
    }
}

/// Applies `f` to every occupied data block of `dir`, in logical order,
/// stopping at the first block index with no allocated block.
fn for_each_block<F: FnMut(u64, [u8; 512]) -> Result<bool>>(
    device: &Arc<Disk>,
    dir: &DiskInode,
    mut f: F,
) -> Result<()> {
    for index in 0..MAX_BLOCKS {
        let Some(lba) = inode::block_lba(device, dir, index)? else { break };
        let mut block = [0u8; 512];
        device.read_sectors(lba, &mut block)?;
        if f(lba, block)? {
            break;
        }
    }
    Ok(())
}

pub fn search_dir_entry(device: &Arc<Disk>, dir: &DiskInode, filename: &str) -> Result<Option<u32>> {
    Ok(search_dir_entry_full(device, dir, filename)?.map(|e| e.inode_no))
}

/// Like [`search_dir_entry`] but returns the whole entry, including its
/// `file_type` — the only place on-disk that a child's directory-ness is
/// recorded (inodes themselves don't carry a type).
pub fn search_dir_entry_full(device: &Arc<Disk>, dir: &DiskInode, filename: &str) -> Result<Option<DirEntry>> {
    let mut result = None;
    for_each_block(device, dir, |_lba, block| {
        for slot in 0..ENTRIES_PER_BLOCK {
            let offset = slot * size_of::<DirEntry>();
            let entry = unsafe { core::ptr::read_unaligned(block.as_ptr().add(offset) as *const DirEntry) };
            if !entry.is_free() && entry.name() == filename {
                result = Some(entry);
                return Ok(true);
            }
        }
        Ok(false)
    })?;
    Ok(result)
}

pub fn read_all_entries(device: &Arc<Disk>, dir: &DiskInode) -> Result<alloc::vec::Vec<DirEntry>> {
    let mut out = alloc::vec::Vec::new();
    for_each_block(device, dir, |_lba, block| {
        for slot in 0..ENTRIES_PER_BLOCK {
            let offset = slot * size_of::<DirEntry>();
            let entry = unsafe { core::ptr::read_unaligned(block.as_ptr().add(offset) as *const DirEntry) };
            if !entry.is_free() {
                out.push(entry);
            }
        }
        Ok(false)
    })?;
    Ok(out)
}

/// Finds a free slot across `dir`'s existing blocks, allocating a new
/// block (and, if needed, the indirect table) when none has room. Fails
/// once all 140 block slots are in use and full.
pub fn sync_dir_entry(
    device: &Arc<Disk>,
    block_bitmap: &mut super::bitmap::Bitmap,
    data_start_lba: u64,
    dir: &mut DiskInode,
    entry: DirEntry,
) -> Result<()> {
    let mut block_count = 0u32;

    for index in 0..MAX_BLOCKS {
        let Some(lba) = inode::block_lba(device, dir, index)? else { break };
        block_count = index + 1;
        let mut block = [0u8; 512];
        device.read_sectors(lba, &mut block)?;

        for slot in 0..ENTRIES_PER_BLOCK {
            let offset = slot * size_of::<DirEntry>();
            let existing = unsafe { core::ptr::read_unaligned(block.as_ptr().add(offset) as *const DirEntry) };
            if existing.is_free() {
                unsafe { core::ptr::write_unaligned(block.as_mut_ptr().add(offset) as *mut DirEntry, entry) };
                device.write_sectors(lba, &block)?;
                return Ok(());
            }
        }
    }

    if block_count >= MAX_BLOCKS {
        return Err(Errno::ENOSPC);
    }

    let had_indirect = dir.blocks[inode::INDIRECT_INDEX] != 0;
    let lba = inode::alloc_block_for(device, block_bitmap, data_start_lba, dir, block_count)?;
    block_bitmap.sync_bit(device, (lba - data_start_lba) as u32)?;
    if !had_indirect && dir.blocks[inode::INDIRECT_INDEX] != 0 {
        // alloc_block_for also consumed a bit for the indirect table.
        block_bitmap.sync_bit(device, (dir.blocks[inode::INDIRECT_INDEX] as u64 - data_start_lba) as u32)?;
    }

    let mut block = [0u8; 512];
    unsafe { core::ptr::write_unaligned(block.as_mut_ptr() as *mut DirEntry, entry) };
    device.write_sectors(lba, &block)
}

pub fn delete_dir_entry(device: &Arc<Disk>, dir: &DiskInode, filename: &str) -> Result<()> {
    let mut deleted = false;
    for index in 0..MAX_BLOCKS {
        let Some(lba) = inode::block_lba(device, dir, index)? else { break };
        let mut block = [0u8; 512];
        device.read_sectors(lba, &mut block)?;

        for slot in 0..ENTRIES_PER_BLOCK {
            let offset = slot * size_of::<DirEntry>();
            let existing = unsafe { core::ptr::read_unaligned(block.as_ptr().add(offset) as *const DirEntry) };
            if !existing.is_free() && existing.name() == filename {
                unsafe { core::ptr::write_unaligned(block.as_mut_ptr().add(offset) as *mut DirEntry, DirEntry::free()) };
                device.write_sectors(lba, &block)?;
                deleted = true;
                break;
            }
        }
        if deleted {
            break;
        }
    }
    if deleted { Ok(()) } else { Err(Errno::ENOENT) }
}

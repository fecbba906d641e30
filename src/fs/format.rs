//! mkfs: computes the on-disk layout for a fresh partition and writes the
//! superblock, bitmaps, and root inode.

use super::bitmap::Bitmap;
use super::dir::{DirEntry, FileType};
use super::inode::{self, DiskInode};
use super::superblock::{Superblock, DIR_ENTRY_SIZE, FS_MAGIC, MAX_INODES, ROOT_INODE};
use crate::block::Disk;
use crate::lib::error::Result;
use alloc::sync::Arc;
use core::mem::size_of;

const BOOT_SECTORS: u64 = 1;
const SUPERBLOCK_SECTORS: u64 = 1;
const BITS_PER_SECTOR: u64 = 512 * 8;

fn inode_table_sectors() -> u32 {
    let bytes = MAX_INODES as u64 * size_of::<DiskInode>() as u64;
    ((bytes + 511) / 512) as u32
}

/// The block bitmap's size depends on how many data sectors are left once
/// everything before it is laid out, but laying it out consumes sectors
/// that shrink the data region — so converge by re-estimating until the
/// bitmap size stops changing.
fn block_bitmap_sectors(total_sectors: u64, fixed_sectors: u64) -> u64 {
    let mut bitmap_sectors = 1u64;
    loop {
        let data_sectors = total_sectors.saturating_sub(fixed_sectors + bitmap_sectors);
        let needed = (data_sectors + BITS_PER_SECTOR - 1) / BITS_PER_SECTOR;
        let needed = needed.max(1);
        if needed == bitmap_sectors {
            return bitmap_sectors;
        }
        bitmap_sectors = needed;
    }
}

fn build_superblock(total_sectors: u64) -> Superblock {
    let inode_table_lba = BOOT_SECTORS + SUPERBLOCK_SECTORS + 1;
    let inode_table_sectors = inode_table_sectors();
    let fixed_sectors = BOOT_SECTORS + SUPERBLOCK_SECTORS + 1 + inode_table_sectors as u64;
    let block_bitmap_sectors = block_bitmap_sectors(total_sectors, fixed_sectors);
    let block_bitmap_lba = inode_table_lba + inode_table_sectors as u64;
    let data_start_lba = block_bitmap_lba + block_bitmap_sectors;

    Superblock {
        magic: FS_MAGIC,
        total_sectors,
        inode_count: MAX_INODES,
        partition_lba: 0,
        block_bitmap_lba,
        block_bitmap_sectors: block_bitmap_sectors as u32,
        inode_bitmap_lba: BOOT_SECTORS + SUPERBLOCK_SECTORS,
        inode_bitmap_sectors: 1,
        inode_table_lba,
        inode_table_sectors,
        data_start_lba,
        root_inode: ROOT_INODE,
        dir_entry_size: DIR_ENTRY_SIZE,
    }
}

/// Formats `device` (a partition-relative block device) from scratch:
/// zeroed bitmaps with the root reservation bit set, a root inode pointing
/// at one data block, and `.`/`..` entries in that block both pointing back
/// at the root.
pub fn format(device: &Arc<Disk>) -> Result<Superblock> {
    let total_sectors = device.sector_count;
    let sb = build_superblock(total_sectors);
    sb.write(device, 1)?;

    let inode_bitmap = Bitmap::zeroed_reserving_root(sb.inode_bitmap_lba, sb.inode_bitmap_sectors);
    inode_bitmap.sync_all(device)?;
    let block_bitmap = Bitmap::zeroed_reserving_root(sb.block_bitmap_lba, sb.block_bitmap_sectors);
    block_bitmap.sync_all(device)?;

    let mut root = DiskInode {
        i_no: ROOT_INODE,
        size_bytes: 0,
        blocks: [0; inode::DIRECT_BLOCKS + 1],
    };
    root.blocks[0] = sb.data_start_lba as u32;

    let mut block = [0u8; 512];
    let dot = DirEntry::new(".", ROOT_INODE, FileType::Directory);
    let dotdot = DirEntry::new("..", ROOT_INODE, FileType::Directory);
    unsafe {
        core::ptr::write_unaligned(block.as_mut_ptr() as *mut DirEntry, dot);
        core::ptr::write_unaligned(block.as_mut_ptr().add(size_of::<DirEntry>()) as *mut DirEntry, dotdot);
    }
    device.write_sectors(sb.data_start_lba, &block)?;
    root.size_bytes = 2 * DIR_ENTRY_SIZE;

    inode::write_disk_inode(device, sb.inode_table_lba, &root)?;

    Ok(sb)
}

//! On-disk filesystem: a single mounted partition, MBR-discovered, with a
//! flat superblock/bitmap/inode-table/data layout (no journaling, no
//! multiple simultaneous mounts).

pub mod bitmap;
pub mod dir;
pub mod file;
pub mod format;
pub mod inode;
pub mod path;
pub mod superblock;

use crate::block::{self, Disk};
use crate::lib::error::{Errno, Result};
use alloc::sync::Arc;
use bitmap::Bitmap;
use inode::InodeCache;
use spin::Mutex;
use superblock::Superblock;

/// Default mount if no other partition claims the magic first; matches the
/// disk image layout every boot script writes (the boot disk is `sda`, the
/// data disk is `sdb`).
const DEFAULT_MOUNT: &str = "sdb1";

pub struct Partition {
    pub disk: Arc<Disk>,
    pub superblock: Superblock,
    pub block_bitmap: Mutex<Bitmap>,
    pub inode_bitmap: Mutex<Bitmap>,
    pub inode_cache: InodeCache,
}

static CUR_PART: Mutex<Option<Arc<Partition>>> = Mutex::new(None);

pub fn current_partition() -> Option<Arc<Partition>> {
    CUR_PART.lock().clone()
}

fn mount_disk(disk: Arc<Disk>) -> Result<Arc<Partition>> {
    let sb = match Superblock::read(&disk, 1) {
        Ok(sb) => sb,
        Err(Errno::EINVAL) => {
            crate::kinfo!("fs: formatting {} (no valid superblock)", disk.name);
            format::format(&disk)?
        }
        Err(e) => return Err(e),
    };

    let block_bitmap = Bitmap::load(&disk, sb.block_bitmap_lba, sb.block_bitmap_sectors)?;
    let inode_bitmap = Bitmap::load(&disk, sb.inode_bitmap_lba, sb.inode_bitmap_sectors)?;

    Ok(Arc::new(Partition {
        disk,
        superblock: sb,
        block_bitmap: Mutex::new(block_bitmap),
        inode_bitmap: Mutex::new(inode_bitmap),
        inode_cache: InodeCache::new(),
    }))
}

/// Mounts (formatting if unformatted) a single disk directly as the
/// current partition, bypassing MBR/partition scanning. Meant for callers
/// that already know which disk holds the filesystem — a scenario test's
/// mock disk, where there is no MBR to read.
pub fn mount(disk: Arc<Disk>) -> Result<Arc<Partition>> {
    let partition = mount_disk(disk)?;
    *CUR_PART.lock() = Some(partition.clone());
    Ok(partition)
}

/// Probes every registered disk (skipping the boot disk, `sda`) for
/// partitions, mounts or formats each one, and makes [`DEFAULT_MOUNT`] the
/// current partition.
pub fn init() {
    let mut mounted = alloc::vec::Vec::new();

    for disk in block::list_disks() {
        if disk.name == "sda" {
            continue;
        }
        match block::partition::register_partitions(&disk) {
            Ok(partitions) => {
                for part_disk in partitions {
                    match mount_disk(part_disk.clone()) {
                        Ok(partition) => mounted.push(partition),
                        Err(e) => crate::kwarn!("fs: failed to mount {}: {:?}", part_disk.name, e),
                    }
                }
            }
            Err(e) => crate::kwarn!("fs: failed to probe partitions on {}: {:?}", disk.name, e),
        }
    }

    let default = mounted.iter().find(|p| p.disk.name == DEFAULT_MOUNT).cloned();
    let chosen = default.or_else(|| mounted.into_iter().next());

    match chosen {
        Some(partition) => {
            crate::kinfo!("fs: mounted {} as current partition", partition.disk.name);
            *CUR_PART.lock() = Some(partition);
        }
        None => crate::kwarn!("fs: no partition available to mount"),
    }
}

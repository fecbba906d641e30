/// MBR partition table parsing, including extended-partition chains.
///
/// Disk images for this kernel never carry a GPT; only the classic 4-entry
/// MBR plus the old-DOS extended-partition trick for more than four
/// partitions are supported.

use crate::lib::error::{Result, Errno};
use crate::block::{Disk, register_disk};
use alloc::sync::Arc;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

const MBR_SIGNATURE: u16 = 0xAA55;
const PARTITION_TYPE_EXTENDED: u8 = 0x05;
const PARTITION_TYPE_EXTENDED_LBA: u8 = 0x0F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    Linux,
    LinuxSwap,
    LinuxLVM,
    EFISystem,
    Unknown(u8),
}

impl From<u8> for PartitionType {
    fn from(val: u8) -> Self {
        match val {
            0x83 => PartitionType::Linux,
            0x82 => PartitionType::LinuxSwap,
            0x8e => PartitionType::LinuxLVM,
            0xef => PartitionType::EFISystem,
            _ => PartitionType::Unknown(val),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Partition {
    /// Device name (e.g., "hda1", "hda2")
    pub name: String,
    /// Parent device name (e.g., "hda")
    pub parent: String,
    /// Partition number (1-based, counting across the extended chain)
    pub number: u32,
    /// Starting sector (LBA), already relative to the whole disk
    pub start_lba: u64,
    pub sector_count: u64,
    pub partition_type: PartitionType,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
struct MbrPartitionEntry {
    status: u8,
    first_chs: [u8; 3],
    partition_type: u8,
    last_chs: [u8; 3],
    first_lba: u32,
    sector_count: u32,
}

fn read_entries(sector: &[u8]) -> [MbrPartitionEntry; 4] {
    let mut entries = [MbrPartitionEntry {
        status: 0,
        first_chs: [0; 3],
        partition_type: 0,
        last_chs: [0; 3],
        first_lba: 0,
        sector_count: 0,
    }; 4];
    for (i, entry) in entries.iter_mut().enumerate() {
        let offset = 446 + (i * 16);
        *entry = unsafe { core::ptr::read_unaligned(sector.as_ptr().add(offset) as *const MbrPartitionEntry) };
    }
    entries
}

fn is_extended(partition_type: u8) -> bool {
    partition_type == PARTITION_TYPE_EXTENDED || partition_type == PARTITION_TYPE_EXTENDED_LBA
}

/// Walks the extended-partition chain starting at `table_lba` (relative to
/// `extended_base`, the first extended partition's own LBA — every link in
/// the chain stores its next-table pointer relative to that same base, not
/// to itself). `number` is the next partition number to assign.
fn walk_extended_chain(
    device: &Arc<Disk>,
    extended_base: u64,
    table_lba: u64,
    number: &mut u32,
    out: &mut Vec<Partition>,
) -> Result<()> {
    let mut sector = vec![0u8; 512];
    device.read_sectors(table_lba, &mut sector)?;

    let signature = u16::from_le_bytes([sector[510], sector[511]]);
    if signature != MBR_SIGNATURE {
        crate::kwarn!("MBR: invalid extended table signature 0x{:04x} at LBA {}", signature, table_lba);
        return Ok(());
    }

    let entries = read_entries(&sector);

    // An extended boot record holds at most one real partition (entry 0)
    // and at most one link to the next table (entry 1).
    if entries[0].partition_type != 0 && entries[0].sector_count != 0 {
        let start_lba = table_lba + entries[0].first_lba as u64;
        let name = alloc::format!("{}{}", device.name, *number);
        let entry0_sector_count = entries[0].sector_count;
        crate::kinfo!(
            "MBR: extended partition {} type=0x{:02x} start={} count={}",
            *number, entries[0].partition_type, start_lba, entry0_sector_count
        );
        out.push(Partition {
            name,
            parent: device.name.clone(),
            number: *number,
            start_lba,
            sector_count: entries[0].sector_count as u64,
            partition_type: PartitionType::from(entries[0].partition_type),
        });
        *number += 1;
    }

    if is_extended(entries[1].partition_type) && entries[1].sector_count != 0 {
        let next_table = extended_base + entries[1].first_lba as u64;
        walk_extended_chain(device, extended_base, next_table, number, out)?;
    }

    Ok(())
}

/// Parses the MBR at sector 0, recursing into an extended-partition chain
/// if one of the four primary entries is type `0x05`/`0x0F`.
fn parse_mbr(device: &Arc<Disk>, sector: &[u8]) -> Result<Vec<Partition>> {
    let signature = u16::from_le_bytes([sector[510], sector[511]]);
    if signature != MBR_SIGNATURE {
        crate::kwarn!("MBR: invalid signature 0x{:04x}", signature);
        return Err(Errno::EINVAL);
    }

    let entries = read_entries(sector);
    let mut partitions = Vec::new();
    let mut number = 1u32;

    for entry in entries.iter() {
        if entry.partition_type == 0 || entry.sector_count == 0 {
            continue;
        }

        if is_extended(entry.partition_type) {
            let extended_base = entry.first_lba as u64;
            walk_extended_chain(device, extended_base, extended_base, &mut number, &mut partitions)?;
            continue;
        }

        let name = alloc::format!("{}{}", device.name, number);
        let entry_first_lba = entry.first_lba;
        let entry_sector_count = entry.sector_count;
        crate::kinfo!(
            "MBR: partition {} type=0x{:02x} start={} count={}",
            number, entry.partition_type, entry_first_lba, entry_sector_count
        );
        partitions.push(Partition {
            name,
            parent: device.name.clone(),
            number,
            start_lba: entry.first_lba as u64,
            sector_count: entry.sector_count as u64,
            partition_type: PartitionType::from(entry.partition_type),
        });
        number += 1;
    }

    if partitions.is_empty() {
        crate::kinfo!("MBR: no valid partitions found");
    }

    Ok(partitions)
}

pub fn probe_partitions(device: &Arc<Disk>) -> Result<Vec<Partition>> {
    let mut sector0 = vec![0u8; 512];
    device.read_sectors(0, &mut sector0)?;
    parse_mbr(device, &sector0)
}

/// Registers every probed partition as its own [`Disk`], forwarding through
/// a fixed LBA offset into the parent whole-disk `device`.
pub fn register_partitions(device: &Arc<Disk>) -> Result<Vec<Arc<Disk>>> {
    let partitions = probe_partitions(device)?;

    if partitions.is_empty() {
        crate::kinfo!("partition: no partitions found on {}", device.name);
        return Ok(Vec::new());
    }

    let mut partition_disks = Vec::new();

    for partition in partitions {
        let part_ops: &'static PartitionOps = Box::leak(Box::new(PartitionOps {
            parent: device.clone(),
            start_lba: partition.start_lba,
            sector_count: partition.sector_count,
        }));

        let disk = Disk::new(partition.name.clone(), partition.sector_count, part_ops);

        let dev = register_disk(disk);
        partition_disks.push(dev);

        crate::kinfo!(
            "partition: registered {} ({} MB)",
            partition.name,
            partition.sector_count * 512 / 1024 / 1024
        );
    }

    Ok(partition_disks)
}

/// Forwards reads/writes to the parent disk with a fixed LBA offset.
struct PartitionOps {
    parent: Arc<Disk>,
    start_lba: u64,
    sector_count: u64,
}

impl crate::block::DiskOps for PartitionOps {
    fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> Result<()> {
        let sector_count = buf.len() / 512;
        if sector + sector_count as u64 > self.sector_count {
            return Err(Errno::EINVAL);
        }
        self.parent.read_sectors(self.start_lba + sector, buf)
    }

    fn write_sectors(&self, sector: u64, buf: &[u8]) -> Result<()> {
        let sector_count = buf.len() / 512;
        if sector + sector_count as u64 > self.sector_count {
            return Err(Errno::EINVAL);
        }
        self.parent.write_sectors(self.start_lba + sector, buf)
    }

    fn flush(&self) -> Result<()> {
        self.parent.flush()
    }
}

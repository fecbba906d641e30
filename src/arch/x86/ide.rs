//! PIO driver for the legacy ATA/IDE controller (primary 0x1F0, secondary
//! 0x170). No DMA, no LBA48, no ATAPI: 28-bit LBA PIO reads and writes only,
//! which is all a PC-compatible disk image needs for this kernel.
//!
//! Each channel serializes callers behind a [`Lock`] and hands the actual
//! wait-for-device step to a [`Semaphore`] the channel's ISR signals. A
//! caller never busy-waits on the IRQ itself; it only busy-polls the status
//! register afterward, for the brief window between DRQ and the transfer
//! actually being ready, and yields between polls so other tasks still run.

use crate::arch::x86::pit;
use crate::arch::x86::port::{inb, insw, outb, outsw};
use crate::block::DiskOps;
use crate::lib::error::{Errno, Result};
use crate::process::scheduler;
use crate::sync::{Lock, Semaphore};
use core::sync::atomic::{AtomicBool, Ordering};

const DATA: u16 = 0;
const SECTOR_COUNT: u16 = 2;
const LBA_LOW: u16 = 3;
const LBA_MID: u16 = 4;
const LBA_HIGH: u16 = 5;
const DEVICE: u16 = 6;
const STATUS: u16 = 7;
const COMMAND: u16 = 7;

const STATUS_ERR: u8 = 1 << 0;
const STATUS_DRQ: u8 = 1 << 3;
const STATUS_BUSY: u8 = 1 << 7;

const CMD_READ_SECTORS: u8 = 0x20;
const CMD_WRITE_SECTORS: u8 = 0x30;
const CMD_IDENTIFY: u8 = 0xEC;

const DEVICE_LBA_MODE: u8 = 0xE0;
const DEVICE_SLAVE: u8 = 1 << 4;

const BUSY_WAIT_TIMEOUT_MS: u64 = 30_000;
const BUSY_WAIT_POLL_MS: u64 = 10;

struct Channel {
    base: u16,
    lock: Lock,
    disk_done: Semaphore,
    expecting_intr: AtomicBool,
}

impl Channel {
    const fn new(base: u16) -> Self {
        Self {
            base,
            lock: Lock::new(),
            disk_done: Semaphore::new(0),
            expecting_intr: AtomicBool::new(false),
        }
    }

    fn port(&self, offset: u16) -> u16 {
        self.base + offset
    }

    /// Steps 2-4 of the protocol: select the drive, program sector count and
    /// LBA, arm `expecting_intr`, and issue the command.
    fn issue(&self, slave: bool, lba: u32, sector_count: u8, command: u8) {
        let device = DEVICE_LBA_MODE | if slave { DEVICE_SLAVE } else { 0 } | ((lba >> 24) & 0x0F) as u8;
        outb(self.port(DEVICE), device);
        outb(self.port(SECTOR_COUNT), sector_count);
        outb(self.port(LBA_LOW), lba as u8);
        outb(self.port(LBA_MID), (lba >> 8) as u8);
        outb(self.port(LBA_HIGH), (lba >> 16) as u8);
        self.expecting_intr.store(true, Ordering::Release);
        outb(self.port(COMMAND), command);
    }

    /// Step 6: poll status for BUSY clear and DRQ set, sleeping and
    /// rescheduling between polls. `PANIC!`s if the device never comes ready.
    fn busy_wait(&self) -> Result<()> {
        let deadline = pit::ticks() + (BUSY_WAIT_TIMEOUT_MS / 10);
        loop {
            let status = inb(self.port(STATUS));
            if status & STATUS_BUSY == 0 && status & STATUS_DRQ != 0 {
                return Ok(());
            }
            if status & STATUS_ERR != 0 {
                return Err(Errno::EIO);
            }
            if pit::ticks() >= deadline {
                crate::PANIC!("IDE disk not ready within 30s");
            }
            sleep_ms(BUSY_WAIT_POLL_MS);
        }
    }

    fn on_irq(&self) {
        // Ack the status register regardless of whether we were expecting
        // this IRQ; a stray one must not leave ERR/DRQ latched for the next
        // command.
        let _status = inb(self.port(STATUS));
        if self.expecting_intr.swap(false, Ordering::AcqRel) {
            self.disk_done.up();
        }
    }

    fn read(&self, slave: bool, lba: u32, buf: &mut [u8]) -> Result<()> {
        let sector_count_byte = self.sector_count_byte(buf.len());
        self.lock.acquire();
        self.issue(slave, lba, sector_count_byte, CMD_READ_SECTORS);
        self.disk_done.down();
        let result = self.busy_wait().map(|()| {
            for chunk in buf.chunks_mut(512) {
                let mut words = [0u16; 256];
                insw(self.port(DATA), &mut words);
                for (dst, word) in chunk.chunks_mut(2).zip(words) {
                    dst.copy_from_slice(&word.to_le_bytes());
                }
            }
        });
        self.lock.release();
        result
    }

    fn write(&self, slave: bool, lba: u32, buf: &[u8]) -> Result<()> {
        let sector_count_byte = self.sector_count_byte(buf.len());
        self.lock.acquire();
        self.issue(slave, lba, sector_count_byte, CMD_WRITE_SECTORS);
        // Writes push data first, then wait for the completion IRQ.
        let wait = self.busy_wait();
        if wait.is_ok() {
            for chunk in buf.chunks(512) {
                let mut words = [0u16; 256];
                for (src, word) in chunk.chunks(2).zip(words.iter_mut()) {
                    *word = u16::from_le_bytes([src[0], src[1]]);
                }
                outsw(self.port(DATA), &words);
            }
        }
        self.disk_done.down();
        self.lock.release();
        wait
    }

    fn sector_count_byte(&self, len: usize) -> u8 {
        debug_assert_eq!(len % 512, 0);
        let sectors = len / 512;
        debug_assert!(sectors >= 1 && sectors <= 256);
        if sectors == 256 { 0 } else { sectors as u8 }
    }
}

/// Blocks the calling task for at least `ms`, yielding to the scheduler
/// between checks rather than spinning.
fn sleep_ms(ms: u64) {
    let wake_at = pit::ticks() + (ms / 10).max(1);
    while pit::ticks() < wake_at {
        scheduler::yield_now();
    }
}

static PRIMARY: Channel = Channel::new(0x1F0);
static SECONDARY: Channel = Channel::new(0x170);

/// Called from the primary channel's IRQ14 handler.
pub fn on_irq_primary() {
    PRIMARY.on_irq();
}

/// Called from the secondary channel's IRQ15 handler.
pub fn on_irq_secondary() {
    SECONDARY.on_irq();
}

pub struct IdeDisk {
    channel: &'static Channel,
    slave: bool,
}

impl IdeDisk {
    pub const fn primary_master() -> Self {
        Self { channel: &PRIMARY, slave: false }
    }

    pub const fn primary_slave() -> Self {
        Self { channel: &PRIMARY, slave: true }
    }

    pub const fn secondary_master() -> Self {
        Self { channel: &SECONDARY, slave: false }
    }

    pub const fn secondary_slave() -> Self {
        Self { channel: &SECONDARY, slave: true }
    }

    /// Probes the drive with `IDENTIFY`, returning its LBA28 sector count
    /// (words 60-61 of the response, low word first) if it responded. Used
    /// at boot to decide which of the four possible drives actually exist
    /// before registering them as block devices.
    pub fn identify(&self) -> Result<u64> {
        let channel = self.channel;
        channel.lock.acquire();
        channel.issue(self.slave, 0, 0, CMD_IDENTIFY);
        channel.disk_done.down();
        let result = channel.busy_wait();
        let sectors = result.map(|()| {
            let mut words = [0u16; 256];
            insw(channel.port(DATA), &mut words);
            (words[61] as u32) << 16 | words[60] as u32
        });
        channel.lock.release();
        sectors.map(|s| s as u64)
    }
}

impl DiskOps for IdeDisk {
    fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> Result<()> {
        self.channel.read(self.slave, sector as u32, buf)
    }

    fn write_sectors(&self, sector: u64, buf: &[u8]) -> Result<()> {
        self.channel.write(self.slave, sector as u32, buf)
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

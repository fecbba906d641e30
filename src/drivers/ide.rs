//! Wires the two IDE channels' IRQs (14 primary, 15 secondary) to their
//! `disk_done` semaphores, then probes all four possible drives and
//! registers whichever respond as `sda`..`sdd` in probe order (primary
//! master, primary slave, secondary master, secondary slave).

use crate::arch::x86::idt::{self, VECTOR_IDE_PRIMARY, VECTOR_IDE_SECONDARY};
use crate::arch::x86::ide::{self, IdeDisk};
use crate::arch::x86::pic;
use crate::arch::x86::trapframe::TrapFrame;
use crate::block::{self, Disk};
use alloc::string::String;

fn on_irq_primary(_frame: &mut TrapFrame) {
    ide::on_irq_primary();
    pic::end_of_interrupt(VECTOR_IDE_PRIMARY);
}

fn on_irq_secondary(_frame: &mut TrapFrame) {
    ide::on_irq_secondary();
    pic::end_of_interrupt(VECTOR_IDE_SECONDARY);
}

/// Registers both channels' ISRs, enables their IRQ lines, then probes and
/// registers whichever drives answer `IDENTIFY`. IRQs must already be
/// globally enabled by the time this runs: probing blocks on the same
/// completion semaphore normal reads/writes use.
pub fn init() {
    idt::register_handler(VECTOR_IDE_PRIMARY, on_irq_primary);
    idt::register_handler(VECTOR_IDE_SECONDARY, on_irq_secondary);
    pic::enable_irq(14);
    pic::enable_irq(15);

    let candidates: [(&str, fn() -> IdeDisk); 4] = [
        ("sda", IdeDisk::primary_master),
        ("sdb", IdeDisk::primary_slave),
        ("sdc", IdeDisk::secondary_master),
        ("sdd", IdeDisk::secondary_slave),
    ];
    for (name, make) in candidates {
        let disk = make();
        match disk.identify() {
            Ok(sectors) => {
                register(name, disk, sectors);
            }
            Err(_) => crate::kinfo!("ide: no drive at {}", name),
        }
    }
}

fn register(name: &str, disk: IdeDisk, sectors: u64) {
    static mut SLOTS: [Option<IdeDisk>; 4] = [None, None, None, None];
    static mut NEXT: usize = 0;
    // SAFETY: called only from `init()`, single-threaded at this point in boot.
    let ops: &'static IdeDisk = unsafe {
        let idx = NEXT;
        NEXT += 1;
        SLOTS[idx] = Some(disk);
        SLOTS[idx].as_ref().unwrap()
    };
    block::register_disk(Disk::new(String::from(name), sectors, ops));
}

//! 8259A PIC remap.
//!
//! ```text
//! Master PIC (0x20 cmd / 0x21 data)      Slave PIC (0xA0 cmd / 0xA1 data)
//!  IRQ 0  Timer        -> vector 0x20     IRQ 8  RTC          -> vector 0x28
//!  IRQ 1  Keyboard     -> vector 0x21     ...
//!  IRQ 2  Cascade (never raised)          IRQ 14 IDE primary  -> vector 0x2E
//!                                          IRQ 15 IDE secondary -> vector 0x2F
//! ```
//!
//! IRQs 0-7 remap to vectors 0x20-0x27, IRQs 8-15 to 0x28-0x2F, keeping every
//! hardware vector clear of the CPU exception range (0x00-0x1F).

use super::port::{inb, io_wait, outb};
use spin::Mutex;

const PIC1_COMMAND: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_COMMAND: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const CMD_EOI: u8 = 0x20;
const ICW1_INIT: u8 = 0x10;
const ICW1_ICW4: u8 = 0x01;
const ICW4_8086: u8 = 0x01;

pub const MASTER_OFFSET: u8 = 0x20;
pub const SLAVE_OFFSET: u8 = 0x28;

struct Pics {
    master_mask: u8,
    slave_mask: u8,
}

impl Pics {
    const fn new() -> Self {
        Self { master_mask: 0xFF, slave_mask: 0xFF }
    }

    fn remap(&mut self) {
        outb(PIC1_COMMAND, ICW1_INIT | ICW1_ICW4);
        io_wait();
        outb(PIC2_COMMAND, ICW1_INIT | ICW1_ICW4);
        io_wait();

        outb(PIC1_DATA, MASTER_OFFSET);
        io_wait();
        outb(PIC2_DATA, SLAVE_OFFSET);
        io_wait();

        outb(PIC1_DATA, 0x04); // tell master: slave sits on IRQ2
        io_wait();
        outb(PIC2_DATA, 0x02); // tell slave its cascade identity
        io_wait();

        outb(PIC1_DATA, ICW4_8086);
        io_wait();
        outb(PIC2_DATA, ICW4_8086);
        io_wait();

        self.master_mask = 0xFF;
        self.slave_mask = 0xFF;
        outb(PIC1_DATA, self.master_mask);
        outb(PIC2_DATA, self.slave_mask);
    }

    fn enable_irq(&mut self, irq: u8) {
        if irq < 8 {
            self.master_mask &= !(1 << irq);
            outb(PIC1_DATA, self.master_mask);
        } else {
            self.slave_mask &= !(1 << (irq - 8));
            outb(PIC2_DATA, self.slave_mask);
            self.master_mask &= !(1 << 2); // unmask cascade line too
            outb(PIC1_DATA, self.master_mask);
        }
    }

    fn disable_irq(&mut self, irq: u8) {
        if irq < 8 {
            self.master_mask |= 1 << irq;
            outb(PIC1_DATA, self.master_mask);
        } else {
            self.slave_mask |= 1 << (irq - 8);
            outb(PIC2_DATA, self.slave_mask);
        }
    }

    fn end_of_interrupt(&mut self, vector: u8) {
        if vector >= SLAVE_OFFSET {
            outb(PIC2_COMMAND, CMD_EOI);
        }
        outb(PIC1_COMMAND, CMD_EOI);
    }
}

static PICS: Mutex<Pics> = Mutex::new(Pics::new());

/// Remap both PICs and mask every line. Callers enable specific IRQs with
/// `enable_irq` once their handler is registered in the IDT.
pub fn init() {
    PICS.lock().remap();
}

pub fn enable_irq(irq: u8) {
    PICS.lock().enable_irq(irq);
}

pub fn disable_irq(irq: u8) {
    PICS.lock().disable_irq(irq);
}

/// Must be called exactly once at the end of every hardware IRQ handler.
pub fn end_of_interrupt(vector: u8) {
    PICS.lock().end_of_interrupt(vector);
}

/// Read the in-service register to detect a spurious IRQ7/IRQ15.
pub fn in_service_register(master: bool) -> u8 {
    let cmd = if master { PIC1_COMMAND } else { PIC2_COMMAND };
    outb(cmd, 0x0B);
    inb(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_to_vector_offsets() {
        assert_eq!(MASTER_OFFSET, 0x20);
        assert_eq!(SLAVE_OFFSET, 0x28);
    }
}

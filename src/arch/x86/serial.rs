//! 16550 UART serial driver for COM1, hand-rolled over raw port I/O.
//!
//! ## Register Map (offset from base port 0x3F8)
//!
//! ```text
//! Offset  DLAB=0  DLAB=1   R/W  Description
//! ------  ------  -------  ---  -----------
//! 0       RBR     DLL      RW   Receiver Buffer / Divisor Latch Low
//! 1       IER     DLH      RW   Interrupt Enable / Divisor Latch High
//! 2       IIR/FCR -        RW   Interrupt Identification / FIFO Control
//! 3       LCR     LCR      RW   Line Control (bit 7 = DLAB)
//! 4       MCR     MCR      RW   Modem Control
//! 5       LSR     LSR      R    Line Status (bit 0 = data ready, bit 5 = THR empty)
//! ```
//!
//! Configured for 38400 baud, 8 data bits, no parity, one stop bit.

use super::port::{inb, outb};
use spin::Mutex;

pub const COM1: u16 = 0x3F8;

const LSR_THR_EMPTY: u8 = 1 << 5;
const LSR_DATA_READY: u8 = 1 << 0;

struct Uart {
    base: u16,
}

impl Uart {
    const fn new(base: u16) -> Self {
        Self { base }
    }

    fn init(&self) {
        outb(self.base + 1, 0x00); // disable interrupts
        outb(self.base + 3, 0x80); // DLAB on
        outb(self.base, 0x03); // divisor low: 38400 baud
        outb(self.base + 1, 0x00); // divisor high
        outb(self.base + 3, 0x03); // 8N1, DLAB off
        outb(self.base + 2, 0xC7); // enable + clear FIFOs, 14-byte threshold
        outb(self.base + 4, 0x0B); // IRQs enabled, RTS/DSR set
    }

    fn write_byte(&self, byte: u8) {
        while inb(self.base + 5) & LSR_THR_EMPTY == 0 {}
        outb(self.base, byte);
    }

    fn try_read_byte(&self) -> Option<u8> {
        if inb(self.base + 5) & LSR_DATA_READY != 0 {
            Some(inb(self.base))
        } else {
            None
        }
    }
}

static COM1_PORT: Mutex<Uart> = Mutex::new(Uart::new(COM1));

/// Initialize COM1. Must run once during early boot before any log output.
pub fn init() {
    COM1_PORT.lock().init();
}

/// Write a UTF-8 string to the serial console, translating `\n` to `\r\n`.
pub fn write_str(s: &str) {
    let port = COM1_PORT.lock();
    for byte in s.bytes() {
        if byte == b'\n' {
            port.write_byte(b'\r');
        }
        port.write_byte(byte);
    }
}

/// Write a single raw byte, translating `\n` to `\r\n`. Unlike `write_str`,
/// imposes no UTF-8 requirement — used for console writes of arbitrary user
/// buffers.
pub fn write_byte(byte: u8) {
    let port = COM1_PORT.lock();
    if byte == b'\n' {
        port.write_byte(b'\r');
    }
    port.write_byte(byte);
}

/// Non-blocking read of one byte, used by the keyboard fallback path in tests.
pub fn try_read_byte() -> Option<u8> {
    COM1_PORT.lock().try_read_byte()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uart_struct_has_expected_base() {
        let uart = Uart::new(COM1);
        assert_eq!(uart.base, 0x3F8);
    }
}

//! PIT (8253/8254) channel 0, programmed as a 100 Hz rate generator.
//!
//! Base oscillator is 1.193182 MHz; `divisor = PIT_FREQUENCY / 100 = 11932`
//! (rounds down from 11931.82, giving ~100.0015 Hz — close enough that the
//! scheduler's tick-based time-slicing never notices the drift).

use super::port::outb;
use core::sync::atomic::{AtomicU64, Ordering};

pub const PIT_FREQUENCY: u32 = 1_193_182;
pub const TICK_HZ: u32 = 100;
pub const DIVISOR: u16 = 11932;

const CHANNEL0: u16 = 0x40;
const COMMAND: u16 = 0x43;

/// Channel 0, lobyte/hibyte access, mode 2 (rate generator), binary.
const COMMAND_BYTE: u8 = 0b0011_0100;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Program channel 0 for periodic 100 Hz interrupts. Does not unmask IRQ0;
/// the caller does that once the timer IRQ handler is registered.
pub fn init() {
    outb(COMMAND, COMMAND_BYTE);
    outb(CHANNEL0, (DIVISOR & 0xFF) as u8);
    outb(CHANNEL0, (DIVISOR >> 8) as u8);
}

/// Called from the IRQ0 handler.
pub fn on_tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Milliseconds since boot, accurate given the fixed 100 Hz tick rate.
pub fn uptime_ms() -> u64 {
    ticks() * (1000 / TICK_HZ as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_matches_100hz() {
        assert_eq!(DIVISOR, 11932);
        assert_eq!(PIT_FREQUENCY / DIVISOR as u32, 99); // truncated; actual rate is ~100.0015 Hz
    }

    #[test]
    fn uptime_scales_with_ticks() {
        assert_eq!(TICK_HZ, 100);
        // 100 ticks at 100 Hz is exactly one second.
        assert_eq!(100 * (1000 / TICK_HZ as u64), 1000);
    }
}

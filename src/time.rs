//! Kernel-wide time: a thin wrapper over the PIT's tick counter. At 100 Hz,
//! one tick is 10 ms.

use crate::arch::x86::pit;

pub const TICKS_PER_SECOND: u64 = 100;

/// Ticks since boot.
pub fn ticks() -> u64 {
    pit::ticks()
}

pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks * 1000 / TICKS_PER_SECOND
}

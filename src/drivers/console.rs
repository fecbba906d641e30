//! Console output: the single serialized sink `write(fd 1, ...)` routes to.
//!
//! The actual byte sink (the serial port) is a thin collaborator; what this
//! module owns is making sure concurrent writers from different tasks never
//! interleave their output mid-line.

use crate::arch::x86::serial;
use crate::sync::Lock;

static CONSOLE_LOCK: Lock = Lock::new();

/// Writes `buf` to the console atomically with respect to other writers.
/// Always consumes the whole buffer; there is no partial-write case on this
/// sink.
pub fn write(buf: &[u8]) -> usize {
    CONSOLE_LOCK.acquire();
    for &byte in buf {
        serial::write_byte(byte);
    }
    CONSOLE_LOCK.release();
    buf.len()
}

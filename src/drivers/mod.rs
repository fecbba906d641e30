//! Device drivers: console output, the IDE disk, the PIT tick, and the
//! PS/2 keyboard. Each glue module wires an `arch::x86` device to the IDT
//! and whatever subsystem consumes its interrupts (the scheduler's tick,
//! the keyboard's line queue, the disk's completion semaphore).

pub mod console;
pub mod ide;
pub mod ioqueue;
pub mod keyboard;
pub mod timer;

//! Ambient kernel-wide facilities: error taxonomy, logging, fatal-error path.

pub mod boot;
pub mod debug;
pub mod error;
pub mod panic;
pub mod printk;
#[cfg(feature = "qemu-test-exit")]
pub mod qemutest;
pub mod ringbuf;

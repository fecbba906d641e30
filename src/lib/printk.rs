//! printk: serial-backed kernel logging with a retained ring of recent lines.

use super::ringbuf::RingBuffer;
use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU8, Ordering};
use spin::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogFormat {
    Human = 0,
    Json = 1,
}

static LOG_FORMAT: AtomicU8 = AtomicU8::new(LogFormat::Human as u8);

pub fn set_log_format(format: LogFormat) {
    LOG_FORMAT.store(format as u8, Ordering::Relaxed);
}

pub fn get_log_format() -> LogFormat {
    match LOG_FORMAT.load(Ordering::Relaxed) {
        1 => LogFormat::Json,
        _ => LogFormat::Human,
    }
}

const LOG_MSG_CAP: usize = 120;

#[derive(Copy, Clone)]
pub struct LogEntry {
    pub ticks: u64,
    pub level: LogLevel,
    pub message: [u8; LOG_MSG_CAP],
    pub len: usize,
}

struct LogRing {
    buf: Mutex<RingBuffer<LogEntry, 128>>,
}

impl LogRing {
    const fn new() -> Self {
        Self {
            buf: Mutex::new(RingBuffer::new()),
        }
    }

    fn push(&self, entry: LogEntry) {
        self.buf.lock().push(entry);
    }

    fn drain_all(&self) -> alloc::vec::Vec<LogEntry> {
        self.buf.lock().drain_all()
    }
}

static KERNEL_LOG: LogRing = LogRing::new();

struct SerialWriter;

impl Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        crate::arch::x86::serial::write_str(s);
        Ok(())
    }
}

/// Format `args`, emit it to the serial console and retain it in the ring.
pub fn log(level: LogLevel, args: fmt::Arguments) {
    let mut message = [0u8; LOG_MSG_CAP];
    let mut writer = SerialWriter;
    let text = alloc::format!("{}", args);
    let len = core::cmp::min(text.len(), LOG_MSG_CAP);
    message[..len].copy_from_slice(&text.as_bytes()[..len]);

    let ticks = crate::time::ticks();

    match get_log_format() {
        LogFormat::Json => {
            let _ = write!(
                writer,
                "{{\"ticks\":{},\"level\":\"{}\",\"msg\":\"{}\"}}\n",
                ticks,
                level.as_str(),
                text.replace('"', "\\\"")
            );
        }
        LogFormat::Human => {
            let _ = write!(writer, "[{:>5}] {}\n", level.as_str(), text);
        }
    }

    KERNEL_LOG.push(LogEntry {
        ticks,
        level,
        message,
        len,
    });
}

/// Copy the retained log lines out, most recent last, for panic forensics.
pub fn recent_lines() -> alloc::vec::Vec<LogEntry> {
    KERNEL_LOG.drain_all()
}

#[macro_export]
macro_rules! printk {
    ($level:expr, $($arg:tt)*) => {
        $crate::lib::printk::log($level, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => { $crate::printk!($crate::lib::printk::LogLevel::Error, $($arg)*) };
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::printk!($crate::lib::printk::LogLevel::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::printk!($crate::lib::printk::LogLevel::Info, $($arg)*) };
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::printk!($crate::lib::printk::LogLevel::Debug, $($arg)*) };
}

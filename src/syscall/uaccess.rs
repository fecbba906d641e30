//! Boundary helpers for turning a syscall's raw pointer arguments into
//! slices/strings. There is no separate user/kernel address space copy
//! here (user pages are mapped into the same linear space the kernel runs
//! in) — the checks that matter at this boundary are null-ness and a
//! sane length cap, not page-table walks.

use crate::lib::error::{Errno, Result};

const MAX_PATH_LEN: usize = 256;
const MAX_BUF_LEN: usize = 64 * 1024;

/// # Safety
/// `ptr` must point at `len` readable bytes for the duration of the call.
pub unsafe fn read_bytes<'a>(ptr: *const u8, len: usize) -> Result<&'a [u8]> {
    if ptr.is_null() || len > MAX_BUF_LEN {
        return Err(Errno::EINVAL);
    }
    Ok(core::slice::from_raw_parts(ptr, len))
}

/// # Safety
/// `ptr` must point at `len` writable bytes for the duration of the call.
pub unsafe fn write_bytes<'a>(ptr: *mut u8, len: usize) -> Result<&'a mut [u8]> {
    if ptr.is_null() || len > MAX_BUF_LEN {
        return Err(Errno::EINVAL);
    }
    Ok(core::slice::from_raw_parts_mut(ptr, len))
}

/// # Safety
/// `ptr` must point at a nul-terminated, valid-UTF-8 string no longer than
/// [`MAX_PATH_LEN`].
pub unsafe fn read_path<'a>(ptr: *const u8) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(Errno::EINVAL);
    }
    let mut len = 0;
    while len < MAX_PATH_LEN && *ptr.add(len) != 0 {
        len += 1;
    }
    if len == MAX_PATH_LEN {
        return Err(Errno::EINVAL);
    }
    core::str::from_utf8(core::slice::from_raw_parts(ptr, len)).map_err(|_| Errno::EINVAL)
}

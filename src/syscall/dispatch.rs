//! One handler per syscall. Each takes the raw `ebx/ecx/edx/esi/edi`
//! arguments already pulled out of the trap frame and returns either the
//! syscall's non-negative result or an [`Errno`] for [`super::mod::dispatch`]
//! to negate into `eax`.

use super::uaccess;
use crate::fs::dir::DirEntry;
use crate::fs::file::{self, OpenFlags, Whence};
use crate::lib::error::{Errno, Result};
use crate::process::{current, scheduler};
use alloc::string::String;
use core::mem::size_of;

pub fn sys_getpid() -> Result<u32> {
    Ok(current::current_pid())
}

pub fn sys_write(fd: i32, buf: u32, len: u32) -> Result<u32> {
    let bytes = unsafe { uaccess::read_bytes(buf as *const u8, len as usize)? };
    file::write(fd, bytes).map(|n| n as u32)
}

pub fn sys_read(fd: i32, buf: u32, len: u32) -> Result<u32> {
    let bytes = unsafe { uaccess::write_bytes(buf as *mut u8, len as usize)? };
    file::read(fd, bytes).map(|n| n as u32)
}

pub fn sys_malloc(size: u32) -> Result<u32> {
    let task = current_task();
    let source = task.address_space.as_mut().ok_or(Errno::EINVAL)?;
    let ptr = task
        .user_heap
        .alloc(size as usize, source)
        .map_err(Errno::from)?;
    Ok(ptr as u32)
}

pub fn sys_free(ptr: u32) -> Result<u32> {
    let task = current_task();
    let source = task.address_space.as_mut().ok_or(Errno::EINVAL)?;
    task.user_heap.free(ptr as *mut u8, source);
    Ok(0)
}

/// Spawning a child address space from a running user task is out of
/// scope; callers see `ENOSYS`-equivalent failure via `EPERM`.
pub fn sys_fork() -> Result<u32> {
    Err(Errno::EPERM)
}

pub fn sys_open(path: u32, flags: u32) -> Result<u32> {
    let path = unsafe { uaccess::read_path(path as *const u8)? };
    let flags = OpenFlags::from_bits_truncate(flags);
    file::open(path, flags).map(|fd| fd as u32)
}

pub fn sys_close(fd: i32) -> Result<u32> {
    file::close(fd).map(|_| 0)
}

pub fn sys_lseek(fd: i32, offset: u32, whence: u32) -> Result<u32> {
    let whence = match whence {
        1 => Whence::Set,
        2 => Whence::Cur,
        3 => Whence::End,
        _ => return Err(Errno::EINVAL),
    };
    file::lseek(fd, offset as i32, whence)
}

pub fn sys_unlink(path: u32) -> Result<u32> {
    let path = unsafe { uaccess::read_path(path as *const u8)? };
    file::unlink(path).map(|_| 0)
}

pub fn sys_mkdir(path: u32) -> Result<u32> {
    let path = unsafe { uaccess::read_path(path as *const u8)? };
    file::mkdir(path).map(|_| 0)
}

pub fn sys_rmdir(path: u32) -> Result<u32> {
    let path = unsafe { uaccess::read_path(path as *const u8)? };
    file::rmdir(path).map(|_| 0)
}

pub fn sys_opendir(path: u32) -> Result<u32> {
    let path = unsafe { uaccess::read_path(path as *const u8)? };
    file::opendir(path).map(|fd| fd as u32)
}

pub fn sys_closedir(fd: i32) -> Result<u32> {
    file::closedir(fd).map(|_| 0)
}

/// Copies the next `DirEntry` into `out` verbatim (24 B) and returns 1, or
/// returns 0 once the directory is exhausted.
pub fn sys_readdir(fd: i32, out: u32) -> Result<u32> {
    let Some(entry) = file::readdir(fd)? else {
        return Ok(0);
    };
    let dst = unsafe { uaccess::write_bytes(out as *mut u8, size_of::<DirEntry>())? };
    let src = unsafe {
        core::slice::from_raw_parts(&entry as *const DirEntry as *const u8, size_of::<DirEntry>())
    };
    dst.copy_from_slice(src);
    Ok(1)
}

pub fn sys_rewinddir(fd: i32) -> Result<u32> {
    file::rewinddir(fd).map(|_| 0)
}

pub fn sys_getcwd(buf: u32, len: u32) -> Result<u32> {
    let cwd = file::getcwd()?;
    copy_str_out(&cwd, buf, len)
}

pub fn sys_chdir(path: u32) -> Result<u32> {
    let path = unsafe { uaccess::read_path(path as *const u8)? };
    file::chdir(path).map(|_| 0)
}

/// Matches the user-visible layout `{ inode_no: u32, size_bytes: u32,
/// is_dir: u32 }`; `is_dir` is widened from `bool` so the struct has a
/// fixed 12 B size regardless of how the compiler would lay out `bool`.
pub fn sys_stat(path: u32, out: u32) -> Result<u32> {
    let path = unsafe { uaccess::read_path(path as *const u8)? };
    let st = file::stat(path)?;
    let dst = unsafe { uaccess::write_bytes(out as *mut u8, 12)? };
    dst[0..4].copy_from_slice(&st.inode_no.to_ne_bytes());
    dst[4..8].copy_from_slice(&st.size_bytes.to_ne_bytes());
    dst[8..12].copy_from_slice(&(st.is_dir as u32).to_ne_bytes());
    Ok(0)
}

/// Writes one line per live task as `pid\tname\tstatus\n` into `buf`,
/// truncating silently at `len` the way a single-buffer `ps` always must.
pub fn sys_ps(buf: u32, len: u32) -> Result<u32> {
    let dst = unsafe { uaccess::write_bytes(buf as *mut u8, len as usize)? };
    let mut out = String::new();
    scheduler::for_each_task(|task| {
        let _ = core::fmt::write(
            &mut out,
            format_args!("{}\t{}\t{:?}\n", task.pid, task.name(), task.status),
        );
    });
    let n = out.len().min(dst.len());
    dst[..n].copy_from_slice(&out.as_bytes()[..n]);
    Ok(n as u32)
}

pub fn sys_clear() -> Result<u32> {
    crate::arch::x86::vga::clear_screen();
    Ok(0)
}

/// Loading a new image into the caller's address space is out of scope.
pub fn sys_execv() -> Result<u32> {
    Err(Errno::EPERM)
}

fn current_task() -> &'static mut crate::process::task::Tcb {
    unsafe {
        current::current()
            .expect("syscall running with no current task")
            .as_mut()
    }
}

fn copy_str_out(s: &str, buf: u32, len: u32) -> Result<u32> {
    let dst = unsafe { uaccess::write_bytes(buf as *mut u8, len as usize)? };
    if s.len() + 1 > dst.len() {
        return Err(Errno::EINVAL);
    }
    dst[..s.len()].copy_from_slice(s.as_bytes());
    dst[s.len()] = 0;
    Ok(s.len() as u32)
}

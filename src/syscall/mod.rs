//! The `int 0x80` entry point: reads `eax` as a syscall number and
//! `ebx/ecx/edx` as up to three arguments, dispatches to [`dispatch`], and
//! writes the result (or a negated [`lib::error::Errno`]) back into `eax`
//! — the same convention `write`/`read`'s return value follows in
//! userspace.

pub mod dispatch;
pub mod numbers;
pub mod uaccess;

use crate::arch::x86::idt::{self, VECTOR_SYSCALL};
use crate::arch::x86::trapframe::TrapFrame;
use crate::lib::error::Errno;
use numbers::Syscall;

pub fn init() {
    idt::register_handler(VECTOR_SYSCALL, on_syscall);
}

fn on_syscall(frame: &mut TrapFrame) {
    let result = match Syscall::from_u32(frame.eax) {
        Some(call) => run(call, frame),
        None => Err(Errno::EINVAL),
    };
    frame.eax = match result {
        Ok(value) => value,
        Err(errno) => errno.as_isize() as u32,
    };
}

fn run(call: Syscall, frame: &TrapFrame) -> crate::lib::error::Result<u32> {
    let (ebx, ecx, edx) = (frame.ebx, frame.ecx, frame.edx);
    match call {
        Syscall::Getpid => dispatch::sys_getpid(),
        Syscall::Write => dispatch::sys_write(ebx as i32, ecx, edx),
        Syscall::Read => dispatch::sys_read(ebx as i32, ecx, edx),
        Syscall::Malloc => dispatch::sys_malloc(ebx),
        Syscall::Free => dispatch::sys_free(ebx),
        Syscall::Fork => dispatch::sys_fork(),
        Syscall::Open => dispatch::sys_open(ebx, ecx),
        Syscall::Close => dispatch::sys_close(ebx as i32),
        Syscall::Lseek => dispatch::sys_lseek(ebx as i32, ecx, edx),
        Syscall::Unlink => dispatch::sys_unlink(ebx),
        Syscall::Mkdir => dispatch::sys_mkdir(ebx),
        Syscall::Rmdir => dispatch::sys_rmdir(ebx),
        Syscall::Opendir => dispatch::sys_opendir(ebx),
        Syscall::Closedir => dispatch::sys_closedir(ebx as i32),
        Syscall::Readdir => dispatch::sys_readdir(ebx as i32, ecx),
        Syscall::Rewinddir => dispatch::sys_rewinddir(ebx as i32),
        Syscall::Getcwd => dispatch::sys_getcwd(ebx, ecx),
        Syscall::Chdir => dispatch::sys_chdir(ebx),
        Syscall::Stat => dispatch::sys_stat(ebx, ecx),
        Syscall::Ps => dispatch::sys_ps(ebx, ecx),
        Syscall::Clear => dispatch::sys_clear(),
        Syscall::Execv => dispatch::sys_execv(),
    }
}

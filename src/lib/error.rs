//! Kernel error taxonomy and POSIX errno surface.

/// Internal error taxonomy a kernel subsystem can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A fixed-size pool (page frame pool, file table, fd table, directory
    /// block) has no free slot left.
    Capacity,
    /// A lookup (path, inode, partition, task) found nothing.
    NotFound,
    /// A creating operation targeted a name that is already taken.
    AlreadyExists,
    /// The caller is not permitted to perform this operation.
    Permission,
    /// An I/O device reported an error or failed to respond in time.
    Device,
    /// The caller handed in a malformed argument.
    InvalidArgument,
    /// A programmer invariant was violated; callers should treat this as
    /// fatal rather than attempt recovery.
    Invariant,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    EPERM = 1,
    ENOENT = 2,
    EIO = 5,
    EBADF = 9,
    ENOMEM = 12,
    EACCES = 13,
    EEXIST = 17,
    ENODEV = 19,
    ENOTDIR = 20,
    EISDIR = 21,
    EINVAL = 22,
    EMFILE = 24,
    ENOSPC = 28,
    ESPIPE = 29,
    ENOTEMPTY = 39,
}

impl From<KernelError> for Errno {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::Capacity => Errno::ENOSPC,
            KernelError::NotFound => Errno::ENOENT,
            KernelError::AlreadyExists => Errno::EEXIST,
            KernelError::Permission => Errno::EACCES,
            KernelError::Device => Errno::EIO,
            KernelError::InvalidArgument => Errno::EINVAL,
            KernelError::Invariant => Errno::EINVAL,
        }
    }
}

impl Errno {
    /// Negated value as returned from a syscall (e.g. `-ENOENT`).
    pub fn as_isize(self) -> isize {
        -(self as i32 as isize)
    }

    pub fn description(self) -> &'static str {
        match self {
            Errno::EPERM => "operation not permitted",
            Errno::ENOENT => "no such file or directory",
            Errno::EIO => "I/O error",
            Errno::EBADF => "bad file descriptor",
            Errno::ENOMEM => "out of memory",
            Errno::EACCES => "permission denied",
            Errno::EEXIST => "file exists",
            Errno::ENODEV => "no such device",
            Errno::ENOTDIR => "not a directory",
            Errno::EISDIR => "is a directory",
            Errno::EINVAL => "invalid argument",
            Errno::EMFILE => "too many open files",
            Errno::ENOSPC => "no space left on device",
            Errno::ESPIPE => "illegal seek",
            Errno::ENOTEMPTY => "directory not empty",
        }
    }
}

pub type Result<T> = core::result::Result<T, Errno>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation() {
        assert_eq!(Errno::ENOENT.as_isize(), -2);
        assert_eq!(Errno::EACCES.as_isize(), -13);
    }

    #[test]
    fn conversion() {
        assert_eq!(Errno::from(KernelError::NotFound), Errno::ENOENT);
        assert_eq!(Errno::from(KernelError::Capacity), Errno::ENOSPC);
    }
}

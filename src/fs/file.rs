//! Syscall-level file operations: the global file table, and open/close/
//! read/write/lseek/unlink/mkdir/rmdir/opendir/readdir/chdir/stat.
//!
//! Multi-step mutators (`create_entry`, `mkdir`) record what they've done
//! as they go and unwind it in reverse on any later failure, so a
//! half-finished operation never leaves an allocated inode or block bitmap
//! bit dangling.

use super::dir::{self, DirEntry, FileType};
use super::inode::{self, DiskInode, Inode};
use super::Partition;
use crate::lib::error::{Errno, Result};
use alloc::sync::Arc;
use lazy_static::lazy_static;
use spin::Mutex;

pub const MAX_OPEN_FILES: usize = 32;
pub const STDIN_FD: i32 = 0;
pub const STDOUT_FD: i32 = 1;
pub const STDERR_FD: i32 = 2;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const O_RDONLY = 0;
        const O_WRONLY = 1 << 0;
        const O_RDWR = 1 << 1;
        const O_CREAT = 1 << 2;
    }
}

impl OpenFlags {
    pub fn writable(self) -> bool {
        self.contains(OpenFlags::O_WRONLY) || self.contains(OpenFlags::O_RDWR)
    }
    pub fn readable(self) -> bool {
        !self.contains(OpenFlags::O_WRONLY) || self.contains(OpenFlags::O_RDWR)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

struct OpenFile {
    inode: Option<Arc<Mutex<Inode>>>,
    pos: u32,
    flags: OpenFlags,
}

impl OpenFile {
    fn closed() -> Self {
        Self { inode: None, pos: 0, flags: OpenFlags::O_RDONLY }
    }

    fn in_use(&self) -> bool {
        self.inode.is_some()
    }
}

lazy_static! {
    /// Slots 0..3 are permanently reserved for stdin/stdout/stderr and
    /// never hold an inode; every task's fd_table starts pointing at them.
    static ref FILE_TABLE: Mutex<alloc::vec::Vec<OpenFile>> =
        Mutex::new((0..MAX_OPEN_FILES).map(|_| OpenFile::closed()).collect());
}

fn alloc_file_slot() -> Result<usize> {
    let mut table = FILE_TABLE.lock();
    table.iter().skip(3).position(|f| !f.in_use()).map(|i| i + 3).ok_or(Errno::EMFILE)
}

fn current_task() -> &'static mut crate::process::task::Tcb {
    unsafe { crate::process::current::current().expect("no current task").as_mut() }
}

fn partition() -> Arc<Partition> {
    super::current_partition().expect("no partition mounted")
}

/// Splits `path` into its parent directory and final component, without
/// resolving either.
fn split_parent(path_str: &str) -> (&str, &str) {
    let trimmed = path_str.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
        None => ("", trimmed),
    }
}

fn final_component(path_str: &str) -> &str {
    split_parent(path_str).1
}

/// Resolves the directory `path_str` would be created in, failing with
/// `ENOTDIR`/`ENOENT` exactly as a real lookup of the parent would.
fn resolve_parent_dir(part: &Partition, path_str: &str) -> Result<u32> {
    let (dir_path, _name) = split_parent(path_str);
    if dir_path.is_empty() {
        return Ok(part.superblock.root_inode);
    }
    let (parent_no, record) = super::path::search_file(part, dir_path)?;
    if record.file_type != Some(FileType::Directory) {
        return Err(Errno::ENOTDIR);
    }
    Ok(parent_no)
}

/// `open(2)`. Fails if the target is a directory, if it doesn't exist and
/// `O_CREAT` wasn't given, or if it exists and `O_CREAT` was given.
pub fn open(path_str: &str, flags: OpenFlags) -> Result<i32> {
    let part = partition();
    let creat = flags.contains(OpenFlags::O_CREAT);

    let inode_no = match super::path::search_file(&part, path_str) {
        Ok((_, _)) if creat => return Err(Errno::EEXIST),
        Ok((no, record)) => {
            if record.file_type == Some(FileType::Directory) {
                return Err(Errno::EISDIR);
            }
            no
        }
        Err(Errno::ENOENT) if creat => {
            let parent_no = resolve_parent_dir(&part, path_str)?;
            create_entry(&part, parent_no, final_component(path_str), FileType::Regular)?
        }
        Err(e) => return Err(e),
    };

    install_fd(&part, inode_no, flags)
}

fn install_fd(part: &Partition, inode_no: u32, flags: OpenFlags) -> Result<i32> {
    let inode = part.inode_cache.open(&part.disk, part.superblock.inode_table_lba, inode_no)?;

    let slot = match alloc_file_slot() {
        Ok(s) => s,
        Err(e) => {
            part.inode_cache.close(&inode);
            return Err(e);
        }
    };
    FILE_TABLE.lock()[slot] = OpenFile { inode: Some(inode), pos: 0, flags };

    let task = current_task();
    match task.fd_alloc() {
        Some(fd) => {
            task.fd_set(fd, slot as i32);
            Ok(fd as i32)
        }
        None => {
            let file = core::mem::replace(&mut FILE_TABLE.lock()[slot], OpenFile::closed());
            if let Some(inode) = file.inode {
                part.inode_cache.close(&inode);
            }
            Err(Errno::EMFILE)
        }
    }
}

/// Allocates an inode, wires a directory entry for it into `parent_no`, and
/// rolls both back if either step fails.
fn create_entry(part: &Partition, parent_no: u32, name: &str, file_type: FileType) -> Result<u32> {
    let inode_no = {
        let mut inode_bitmap = part.inode_bitmap.lock();
        let no = inode_bitmap.alloc().ok_or(Errno::ENOSPC)?;
        if let Err(e) = inode_bitmap.sync_bit(&part.disk, no) {
            inode_bitmap.free(no);
            return Err(e);
        }
        no
    };

    let disk = DiskInode { i_no: inode_no, size_bytes: 0, blocks: [0; inode::DIRECT_BLOCKS + 1] };
    if let Err(e) = inode::sync(&part.disk, part.superblock.inode_table_lba, &Inode { disk, open_cnt: 0, write_deny: false }) {
        rollback_inode(part, inode_no);
        return Err(e);
    }

    let result = link_into_parent(part, parent_no, name, inode_no, file_type);
    if let Err(e) = result {
        rollback_inode(part, inode_no);
        return Err(e);
    }
    Ok(inode_no)
}

fn link_into_parent(part: &Partition, parent_no: u32, name: &str, inode_no: u32, file_type: FileType) -> Result<()> {
    let parent_inode = part.inode_cache.open(&part.disk, part.superblock.inode_table_lba, parent_no)?;
    let result = (|| {
        let mut guard = parent_inode.lock();
        let mut block_bitmap = part.block_bitmap.lock();
        let entry = DirEntry::new(name, inode_no, file_type);
        dir::sync_dir_entry(&part.disk, &mut block_bitmap, part.superblock.data_start_lba, &mut guard.disk, entry)?;
        inode::sync(&part.disk, part.superblock.inode_table_lba, &guard)
    })();
    part.inode_cache.close(&parent_inode);
    result
}

fn rollback_inode(part: &Partition, inode_no: u32) {
    let mut bitmap = part.inode_bitmap.lock();
    bitmap.free(inode_no);
    let _ = bitmap.sync_bit(&part.disk, inode_no);
}

/// `close(2)`. A no-op on the reserved stdio descriptors.
pub fn close(fd: i32) -> Result<()> {
    if fd < 3 {
        return Ok(());
    }
    let task = current_task();
    let slot = task.fd_slot(fd as usize).filter(|&s| s >= 0).ok_or(Errno::EBADF)? as usize;

    let file = core::mem::replace(&mut FILE_TABLE.lock()[slot], OpenFile::closed());
    let inode = file.inode.ok_or(Errno::EBADF)?;
    partition().inode_cache.close(&inode);
    task.fd_free(fd as usize);
    Ok(())
}

fn with_open_file<F, R>(fd: i32, f: F) -> Result<R>
where
    F: FnOnce(&mut OpenFile) -> Result<R>,
{
    let task = current_task();
    let slot = task.fd_slot(fd as usize).filter(|&s| s >= 0).ok_or(Errno::EBADF)? as usize;
    let mut table = FILE_TABLE.lock();
    f(&mut table[slot])
}

/// `write(2)`. fd 1/2 go straight to the console; anything else must have
/// been opened writable and grows the backing file as needed.
pub fn write(fd: i32, buf: &[u8]) -> Result<usize> {
    if fd == STDOUT_FD || fd == STDERR_FD {
        return Ok(crate::drivers::console::write(buf));
    }

    let part = partition();
    with_open_file(fd, |file| {
        if !file.flags.writable() {
            return Err(Errno::EACCES);
        }
        let inode = file.inode.as_ref().ok_or(Errno::EBADF)?.clone();
        let mut guard = inode.lock();
        let written = write_inode(&part, &mut guard, file.pos, buf)?;
        file.pos += written as u32;
        Ok(written)
    })
}

fn write_inode(part: &Partition, inode: &mut Inode, pos: u32, buf: &[u8]) -> Result<usize> {
    let mut written = 0usize;
    while written < buf.len() {
        let offset = pos as u64 + written as u64;
        let block_index = (offset / 512) as u32;
        let in_block = (offset % 512) as usize;
        let chunk = (512 - in_block).min(buf.len() - written);

        let lba = match inode::block_lba(&part.disk, &inode.disk, block_index)? {
            Some(lba) => lba,
            None => alloc_block(part, inode, block_index)?,
        };

        let mut block = [0u8; 512];
        if chunk != 512 {
            part.disk.read_sectors(lba, &mut block)?;
        }
        block[in_block..in_block + chunk].copy_from_slice(&buf[written..written + chunk]);
        part.disk.write_sectors(lba, &block)?;

        written += chunk;
    }

    let new_size = pos as u64 + written as u64;
    if new_size > inode.disk.size_bytes as u64 {
        inode.disk.size_bytes = new_size as u32;
    }
    inode::sync(&part.disk, part.superblock.inode_table_lba, inode)?;
    Ok(written)
}

fn alloc_block(part: &Partition, inode: &mut Inode, block_index: u32) -> Result<u64> {
    let mut block_bitmap = part.block_bitmap.lock();
    let had_indirect = inode.disk.blocks[inode::INDIRECT_INDEX] != 0;
    let lba = inode::alloc_block_for(&part.disk, &mut block_bitmap, part.superblock.data_start_lba, &mut inode.disk, block_index)?;
    block_bitmap.sync_bit(&part.disk, (lba - part.superblock.data_start_lba) as u32)?;
    if !had_indirect && inode.disk.blocks[inode::INDIRECT_INDEX] != 0 {
        // alloc_block_for also consumed a bit for the indirect table.
        block_bitmap.sync_bit(&part.disk, (inode.disk.blocks[inode::INDIRECT_INDEX] as u64 - part.superblock.data_start_lba) as u32)?;
    }
    Ok(lba)
}

/// `read(2)`. fd 0 drains the keyboard ring buffer one byte at a time,
/// blocking until `buf` is full or a newline is seen.
pub fn read(fd: i32, buf: &mut [u8]) -> Result<usize> {
    if fd == STDIN_FD {
        let mut n = 0;
        while n < buf.len() {
            let byte = crate::drivers::ioqueue::get();
            buf[n] = byte;
            n += 1;
            if byte == b'\n' {
                break;
            }
        }
        return Ok(n);
    }

    let part = partition();
    with_open_file(fd, |file| {
        if !file.flags.readable() {
            return Err(Errno::EACCES);
        }
        let inode = file.inode.as_ref().ok_or(Errno::EBADF)?.clone();
        let guard = inode.lock();
        let available = guard.disk.size_bytes.saturating_sub(file.pos);
        let to_read = (available as usize).min(buf.len());
        let mut read_total = 0usize;

        while read_total < to_read {
            let offset = file.pos as u64 + read_total as u64;
            let block_index = (offset / 512) as u32;
            let in_block = (offset % 512) as usize;
            let chunk = (512 - in_block).min(to_read - read_total);

            let Some(lba) = inode::block_lba(&part.disk, &guard.disk, block_index)? else { break };
            let mut block = [0u8; 512];
            part.disk.read_sectors(lba, &mut block)?;
            buf[read_total..read_total + chunk].copy_from_slice(&block[in_block..in_block + chunk]);
            read_total += chunk;
        }

        file.pos += read_total as u32;
        Ok(read_total)
    })
}

/// `lseek(2)`. Rejects any resulting offset outside `[0, size-1]`.
pub fn lseek(fd: i32, offset: i32, whence: Whence) -> Result<u32> {
    with_open_file(fd, |file| {
        let inode = file.inode.as_ref().ok_or(Errno::EBADF)?.clone();
        let size = inode.lock().disk.size_bytes;
        let base = match whence {
            Whence::Set => 0i64,
            Whence::Cur => file.pos as i64,
            Whence::End => size as i64,
        };
        let new_pos = base + offset as i64;
        if new_pos < 0 || new_pos as u64 >= size as u64 {
            return Err(Errno::EINVAL);
        }
        file.pos = new_pos as u32;
        Ok(file.pos)
    })
}

/// `unlink(2)`. Refuses a directory target, and refuses while any open fd
/// still references the inode.
pub fn unlink(path_str: &str) -> Result<()> {
    let part = partition();
    let (inode_no, record) = super::path::search_file(&part, path_str)?;
    if record.file_type == Some(FileType::Directory) {
        return Err(Errno::EISDIR);
    }

    let still_open = FILE_TABLE
        .lock()
        .iter()
        .any(|f| f.inode.as_ref().map(|i| i.lock().disk.i_no == inode_no).unwrap_or(false));
    if still_open {
        return Err(Errno::EACCES);
    }

    unlink_entry(&part, record.parent_dir, final_component(path_str))?;
    free_inode_blocks(&part, inode_no)
}

fn unlink_entry(part: &Partition, parent_no: u32, name: &str) -> Result<()> {
    let parent = part.inode_cache.open(&part.disk, part.superblock.inode_table_lba, parent_no)?;
    let result = dir::delete_dir_entry(&part.disk, &parent.lock().disk, name);
    part.inode_cache.close(&parent);
    result
}

fn free_inode_blocks(part: &Partition, inode_no: u32) -> Result<()> {
    let disk = {
        let inode = part.inode_cache.open(&part.disk, part.superblock.inode_table_lba, inode_no)?;
        let disk = inode.lock().disk;
        part.inode_cache.close(&inode);
        disk
    };

    let mut block_bitmap = part.block_bitmap.lock();
    for index in 0..inode::MAX_BLOCKS {
        let Some(lba) = inode::block_lba(&part.disk, &disk, index)? else { break };
        let bit = (lba - part.superblock.data_start_lba) as u32;
        block_bitmap.free(bit);
        block_bitmap.sync_bit(&part.disk, bit)?;
    }
    if disk.blocks[inode::INDIRECT_INDEX] != 0 {
        let bit = (disk.blocks[inode::INDIRECT_INDEX] as u64 - part.superblock.data_start_lba) as u32;
        block_bitmap.free(bit);
        block_bitmap.sync_bit(&part.disk, bit)?;
    }
    drop(block_bitmap);

    let mut inode_bitmap = part.inode_bitmap.lock();
    inode_bitmap.free(inode_no);
    inode_bitmap.sync_bit(&part.disk, inode_no)
}

/// `mkdir(2)`. Allocates the new directory's own data block up front and
/// seeds it with `.`/`..` before linking it into the parent.
pub fn mkdir(path_str: &str) -> Result<()> {
    let part = partition();
    if super::path::search_file(&part, path_str).is_ok() {
        return Err(Errno::EEXIST);
    }
    let parent_no = resolve_parent_dir(&part, path_str)?;
    let name = final_component(path_str);
    let inode_no = create_entry(&part, parent_no, name, FileType::Directory)?;

    if let Err(e) = seed_dot_entries(&part, inode_no, parent_no) {
        let _ = unlink_entry(&part, parent_no, name);
        rollback_inode(&part, inode_no);
        return Err(e);
    }
    Ok(())
}

fn seed_dot_entries(part: &Partition, inode_no: u32, parent_no: u32) -> Result<()> {
    let inode = part.inode_cache.open(&part.disk, part.superblock.inode_table_lba, inode_no)?;
    let result = (|| {
        let mut guard = inode.lock();
        let mut block_bitmap = part.block_bitmap.lock();
        let dot = DirEntry::new(".", inode_no, FileType::Directory);
        let dotdot = DirEntry::new("..", parent_no, FileType::Directory);
        dir::sync_dir_entry(&part.disk, &mut block_bitmap, part.superblock.data_start_lba, &mut guard.disk, dot)?;
        dir::sync_dir_entry(&part.disk, &mut block_bitmap, part.superblock.data_start_lba, &mut guard.disk, dotdot)?;
        inode::sync(&part.disk, part.superblock.inode_table_lba, &guard)
    })();
    part.inode_cache.close(&inode);
    result
}

/// `rmdir(2)`. Refuses a non-empty directory (anything beyond `.`/`..`).
pub fn rmdir(path_str: &str) -> Result<()> {
    let part = partition();
    let (inode_no, record) = super::path::search_file(&part, path_str)?;
    if record.file_type != Some(FileType::Directory) {
        return Err(Errno::ENOTDIR);
    }

    let inode = part.inode_cache.open(&part.disk, part.superblock.inode_table_lba, inode_no)?;
    let entries = dir::read_all_entries(&part.disk, &inode.lock().disk)?;
    part.inode_cache.close(&inode);
    if entries.iter().any(|e| e.name() != "." && e.name() != "..") {
        return Err(Errno::ENOTEMPTY);
    }

    unlink_entry(&part, record.parent_dir, final_component(path_str))?;
    free_inode_blocks(&part, inode_no)
}

/// `opendir`/`readdir`/`rewinddir`/`closedir` share the same fd table and
/// `OpenFile` shape as regular files; a directory fd just interprets its
/// data differently.
pub fn opendir(path_str: &str) -> Result<i32> {
    let part = partition();
    let (inode_no, record) = super::path::search_file(&part, path_str)?;
    if record.file_type != Some(FileType::Directory) {
        return Err(Errno::ENOTDIR);
    }
    install_fd(&part, inode_no, OpenFlags::O_RDONLY)
}

pub fn closedir(fd: i32) -> Result<()> {
    close(fd)
}

/// `readdir(3)`. `pos` advances by one entry's worth (24 B) each call, not
/// by however many bytes a variable-length name would need, since every
/// record is fixed-size.
pub fn readdir(fd: i32) -> Result<Option<DirEntry>> {
    let part = partition();
    with_open_file(fd, |file| {
        let inode = file.inode.as_ref().ok_or(Errno::EBADF)?.clone();
        let guard = inode.lock();
        let entries = dir::read_all_entries(&part.disk, &guard.disk)?;
        let index = (file.pos / super::superblock::DIR_ENTRY_SIZE) as usize;
        if index >= entries.len() {
            return Ok(None);
        }
        file.pos += super::superblock::DIR_ENTRY_SIZE;
        Ok(Some(entries[index]))
    })
}

pub fn rewinddir(fd: i32) -> Result<()> {
    with_open_file(fd, |file| {
        file.pos = 0;
        Ok(())
    })
}

/// `chdir(2)`.
pub fn chdir(path_str: &str) -> Result<()> {
    let part = partition();
    let (inode_no, record) = super::path::search_file(&part, path_str)?;
    if record.file_type != Some(FileType::Directory) {
        return Err(Errno::ENOTDIR);
    }
    current_task().cwd_inode = inode_no;
    Ok(())
}

pub fn getcwd() -> Result<alloc::string::String> {
    let part = partition();
    super::path::getcwd(&part, current_task().cwd_inode)
}

pub struct Stat {
    pub inode_no: u32,
    pub size_bytes: u32,
    pub is_dir: bool,
}

pub fn stat(path_str: &str) -> Result<Stat> {
    let part = partition();
    let (inode_no, record) = super::path::search_file(&part, path_str)?;
    let inode = part.inode_cache.open(&part.disk, part.superblock.inode_table_lba, inode_no)?;
    let size_bytes = inode.lock().disk.size_bytes;
    part.inode_cache.close(&inode);
    Ok(Stat { inode_no, size_bytes, is_dir: record.file_type == Some(FileType::Directory) })
}

//! Path resolution: walks component by component from the root inode.
//!
//! A child's directory-ness is recorded in its parent's [`dir::DirEntry`],
//! not on the inode itself, so resolution never needs to open the child to
//! classify it until the caller actually wants its contents.

use super::dir::{self, FileType};
use super::superblock::ROOT_INODE;
use super::Partition;
use crate::lib::error::{Errno, Result};
use alloc::string::String;
use alloc::vec::Vec;

pub struct SearchRecord {
    /// The canonical prefix actually resolved, even on failure.
    pub searched_path: String,
    pub parent_dir: u32,
    pub file_type: Option<FileType>,
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Number of non-empty components. `depth("/") == 0`.
pub fn depth(path: &str) -> usize {
    split(path).len()
}

/// Lexically collapses `.` and `..` components without touching disk —
/// `..` past the root is absorbed rather than erroring, matching how a
/// shell's `cd ../../..` from `/` just leaves you at `/`.
pub fn canonicalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for component in split(path) {
        match component {
            "." => {}
            ".." => {
                stack.pop();
            }
            name => stack.push(name),
        }
    }

    let mut out = String::from("/");
    for (i, name) in stack.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(name);
    }
    out
}

/// Resolves `path` starting at the root. Returns the target inode number
/// on success; `record.searched_path`/`parent_dir` are filled in either way
/// so callers (notably `open` with `O_CREAT`) know where to insert a new
/// entry after a failed lookup.
pub fn search_file(partition: &Partition, path: &str) -> Result<(u32, SearchRecord)> {
    let components = split(path);
    let mut current = ROOT_INODE;
    let mut record = SearchRecord {
        searched_path: String::from("/"),
        parent_dir: ROOT_INODE,
        file_type: Some(FileType::Directory),
    };

    if components.is_empty() {
        return Ok((ROOT_INODE, record));
    }

    for (i, name) in components.iter().enumerate() {
        let dir_inode =
            partition.inode_cache.open(&partition.disk, partition.superblock.inode_table_lba, current)?;
        let dir_disk = dir_inode.lock().disk;
        let found = dir::search_dir_entry_full(&partition.disk, &dir_disk, name)?;
        partition.inode_cache.close(&dir_inode);

        record.parent_dir = current;

        let Some(entry) = found else {
            return Err(Errno::ENOENT);
        };

        if !record.searched_path.ends_with('/') {
            record.searched_path.push('/');
        }
        record.searched_path.push_str(name);

        let is_last = i == components.len() - 1;
        let child_type = match entry.file_type {
            t if t == FileType::Directory as u32 => FileType::Directory,
            t if t == FileType::Regular as u32 => FileType::Regular,
            _ => FileType::Unknown,
        };

        if !is_last {
            if child_type != FileType::Directory {
                return Err(Errno::ENOTDIR);
            }
            current = entry.inode_no;
        } else {
            record.file_type = Some(child_type);
            return Ok((entry.inode_no, record));
        }
    }

    unreachable!("loop always returns on the last component")
}

/// Walks `..` entries from `inode_no` back up to the root, collecting
/// component names along the way.
pub fn getcwd(partition: &Partition, inode_no: u32) -> Result<String> {
    let mut components = Vec::new();
    let mut current = inode_no;

    while current != ROOT_INODE {
        let dir_inode =
            partition.inode_cache.open(&partition.disk, partition.superblock.inode_table_lba, current)?;
        let disk = dir_inode.lock().disk;
        partition.inode_cache.close(&dir_inode);

        let parent_no = dir::search_dir_entry(&partition.disk, &disk, "..")?.ok_or(Errno::ENOENT)?;
        let parent_inode =
            partition.inode_cache.open(&partition.disk, partition.superblock.inode_table_lba, parent_no)?;
        let parent_disk = parent_inode.lock().disk;
        partition.inode_cache.close(&parent_inode);

        let entries = dir::read_all_entries(&partition.disk, &parent_disk)?;
        let name = entries
            .iter()
            .find(|e| e.inode_no == current && e.name() != "." && e.name() != "..")
            .map(|e| String::from(e.name()))
            .ok_or(Errno::ENOENT)?;

        components.push(name);
        current = parent_no;
    }

    if components.is_empty() {
        return Ok(String::from("/"));
    }
    let mut out = String::from("/");
    for name in components.iter().rev() {
        out.push_str(name);
        out.push('/');
    }
    out.pop();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_counts_components() {
        assert_eq!(depth("/a/b/c"), 3);
        assert_eq!(depth("/"), 0);
    }

    #[test]
    fn canonicalize_collapses_dotdot() {
        assert_eq!(canonicalize("/a/b/../c"), "/a/c");
        assert_eq!(canonicalize("/"), "/");
    }

    #[test]
    fn canonicalize_drops_dot_components() {
        assert_eq!(canonicalize("/a/./b"), "/a/b");
    }

    #[test]
    fn canonicalize_dotdot_past_root_stays_at_root() {
        assert_eq!(canonicalize("/../a"), "/a");
    }
}

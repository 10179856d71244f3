//! The OS-side half of path resolution: reading a traced thread's current
//! working directory and its open file descriptor table.
//!
//! Both are exposed as magic symlinks under `/proc/<tid>/...` on Linux; this
//! trait exists so [`crate::resolver`] doesn't hardcode that and so tests
//! can supply a fake thread/fd table without a real tracee.

use std::{io, path::PathBuf};

/// Per-thread filesystem identity, as seen through `/proc`.
pub trait ProcessLinks {
    /// The absolute path of thread `tid`'s current working directory.
    fn cwd(&self, tid: u32) -> io::Result<PathBuf>;

    /// The absolute path that file descriptor `fd` refers to in thread
    /// `tid`'s descriptor table.
    fn fd_path(&self, tid: u32, fd: i32) -> io::Result<PathBuf>;
}

/// Reads `/proc/<tid>/cwd` and `/proc/<tid>/fd/<n>`, the standard Linux
/// interface for this information.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcProcessLinks;

impl ProcessLinks for ProcProcessLinks {
    fn cwd(&self, tid: u32) -> io::Result<PathBuf> {
        std::fs::read_link(format!("/proc/{tid}/cwd"))
    }

    fn fd_path(&self, tid: u32, fd: i32) -> io::Result<PathBuf> {
        std::fs::read_link(format!("/proc/{tid}/fd/{fd}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_own_cwd() {
        let tid = std::process::id();
        let cwd = ProcProcessLinks.cwd(tid).unwrap();
        assert_eq!(cwd, std::env::current_dir().unwrap());
    }
}

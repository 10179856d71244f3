//! Test doubles for the two traits that insulate this crate from a real
//! tracer and a real `/proc`: [`Debugger`] and [`ProcessLinks`].
//!
//! Neither fake does anything clever; they just let a test set up the
//! handful of registers/strings/bytes/links a handler will read, then
//! assert on what it decided.

use crate::{
    debugger::{Debugger, OnReturnHook, ReadError},
    links::ProcessLinks,
};

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

/// A [`Debugger`] backed by plain maps instead of a real tracee.
#[derive(Default)]
pub struct FakeDebugger {
    tid: u32,
    pid: u32,
    address_bits: u8,
    args: Vec<i64>,
    cstrs: HashMap<u64, String>,
    bytes: HashMap<u64, Vec<u8>>,
    suppressed: bool,
    result: Option<i64>,
    on_return_called: bool,
}

impl FakeDebugger {
    pub fn new(tid: u32, pid: u32) -> Self {
        Self {
            tid,
            pid,
            address_bits: 64,
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: Vec<i64>) -> Self {
        self.args = args;
        self
    }

    pub fn with_cstr(mut self, ptr: u64, s: &str) -> Self {
        self.cstrs.insert(ptr, s.to_string());
        self
    }

    pub fn with_bytes(mut self, ptr: u64, bytes: Vec<u8>) -> Self {
        self.bytes.insert(ptr, bytes);
        self
    }

    pub fn with_address_bits(mut self, bits: u8) -> Self {
        self.address_bits = bits;
        self
    }

    pub fn syscall_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn result(&self) -> Option<i64> {
        self.result
    }

    pub fn on_return_was_called(&self) -> bool {
        self.on_return_called
    }
}

impl Debugger for FakeDebugger {
    fn tid(&self) -> u32 {
        self.tid
    }

    fn pid(&self) -> u32 {
        self.pid
    }

    fn address_bits(&self) -> u8 {
        self.address_bits
    }

    fn arg(&self, idx: u32) -> i64 {
        self.args.get(idx as usize).copied().unwrap_or(0)
    }

    fn uarg(&self, idx: u32) -> u64 {
        self.arg(idx) as u64
    }

    fn readstr(&self, ptr: u64) -> Result<Option<String>, ReadError> {
        if ptr == 0 {
            return Ok(None);
        }
        self.cstrs
            .get(&ptr)
            .cloned()
            .map(Some)
            .ok_or_else(|| ReadError::Io(io::Error::from(io::ErrorKind::NotFound)))
    }

    fn readbytes(&self, ptr: u64, len: usize) -> io::Result<Vec<u8>> {
        let bytes = self
            .bytes
            .get(&ptr)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        if bytes.len() < len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        Ok(bytes[..len].to_vec())
    }

    fn suppress_syscall(&mut self) {
        self.suppressed = true;
    }

    fn set_result(&mut self, value: i64) {
        self.result = Some(value);
    }

    fn on_return(&mut self, hook: OnReturnHook) {
        self.on_return_called = true;
        hook(self);
    }
}

/// A [`ProcessLinks`] backed by plain maps instead of a real `/proc`.
#[derive(Default)]
pub struct FakeLinks {
    cwd: HashMap<u32, PathBuf>,
    fds: HashMap<(u32, i32), PathBuf>,
}

impl FakeLinks {
    pub fn with_cwd(mut self, tid: u32, path: impl AsRef<Path>) -> Self {
        self.cwd.insert(tid, path.as_ref().to_path_buf());
        self
    }

    pub fn with_fd(mut self, tid: u32, fd: i32, path: impl AsRef<Path>) -> Self {
        self.fds.insert((tid, fd), path.as_ref().to_path_buf());
        self
    }
}

impl ProcessLinks for FakeLinks {
    fn cwd(&self, tid: u32) -> io::Result<PathBuf> {
        self.cwd
            .get(&tid)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn fd_path(&self, tid: u32, fd: i32) -> io::Result<PathBuf> {
        self.fds
            .get(&(tid, fd))
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

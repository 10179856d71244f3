//! A jail: a pair of read/write policy trees plus the writable-FD allowlist.

use crate::{
    error::Error,
    policy::{FsRule, PolicyTree},
};

/// The compiled filesystem policy a sandboxed process runs under.
///
/// Built once, before the tracee is spawned, and shared read-only across
/// every syscall stop for that tracee (and, since it holds no interior
/// mutability, across multiple tracees too).
#[derive(Debug)]
pub struct Jail {
    pub read_policy: PolicyTree,
    pub write_policy: PolicyTree,
    /// FDs (typically stdout/stderr) pre-authorized for writes by the
    /// surrounding executor. Inert here: the access checker never consults
    /// it, since an already-open FD's I/O (`write(2)`) is an unconditional
    /// admit in the dispatch table (§4.4) and this list exists purely so
    /// callers configuring the jail have somewhere to record the decision.
    pub writable_fds: Vec<i32>,
}

impl Jail {
    pub fn builder() -> JailBuilder {
        JailBuilder::default()
    }
}

/// Constructs a [`Jail`] from plain rule lists, validating them eagerly so a
/// malformed rule is rejected at configuration time rather than silently
/// never matching once the tracee is already running.
#[derive(Debug, Default)]
pub struct JailBuilder {
    read_rules: Vec<FsRule>,
    write_rules: Vec<FsRule>,
    writable_fds: Vec<i32>,
}

impl JailBuilder {
    pub fn read_rules(mut self, rules: Vec<FsRule>) -> Self {
        self.read_rules = rules;
        self
    }

    pub fn write_rules(mut self, rules: Vec<FsRule>) -> Self {
        self.write_rules = rules;
        self
    }

    pub fn writable_fds(mut self, fds: Vec<i32>) -> Self {
        self.writable_fds = fds;
        self
    }

    pub fn build(self) -> Result<Jail, Error> {
        Ok(Jail {
            read_policy: PolicyTree::compile(&self.read_rules)?,
            write_policy: PolicyTree::compile(&self.write_rules)?,
            writable_fds: self.writable_fds,
        })
    }
}

//! The tracer-side interface that syscall handlers operate against.
//!
//! `Debugger` is the boundary to the ptrace/process-tracing primitive, which
//! is explicitly out of scope for this crate (see the crate-level docs): we
//! only name the interface the surrounding tracer integration must provide.
//! The core never constructs a real implementation; only test fakes live in
//! this crate (see [`crate::tests::fakes`]).

/// A one-shot callback registered to run when the current syscall returns.
///
/// Used by handlers that need to act on the syscall's real result (as
/// opposed to overriding it outright), e.g. to log what a passed-through
/// `openat` actually resolved to.
pub type OnReturnHook = Box<dyn FnOnce(&mut dyn Debugger) + Send>;

/// Per-stop view of a traced thread, as exposed by the tracer.
///
/// Argument registers are indexed (`arg`/`uarg`) rather than named, matching
/// the raw calling convention a syscall stop observes; handlers know which
/// index holds which argument for the syscall they were registered against.
pub trait Debugger {
    /// The traced thread id (what Linux calls the thread's `tid`, distinct
    /// from its thread-group id).
    fn tid(&self) -> u32;

    /// The traced thread-group id (the conventional Unix "pid").
    fn pid(&self) -> u32;

    /// Address width of the tracee: 32 or 64.
    fn address_bits(&self) -> u8;

    /// Read signed argument register `idx` (0-based).
    fn arg(&self, idx: u32) -> i64;

    /// Read unsigned argument register `idx` (0-based).
    fn uarg(&self, idx: u32) -> u64;

    /// Read a NUL-terminated string from tracee memory at `ptr`.
    ///
    /// `Ok(None)` indicates `ptr` was a NULL pointer (not an error); `Err`
    /// indicates the read failed for some other reason.
    fn readstr(&self, ptr: u64) -> Result<Option<String>, ReadError>;

    /// Read `len` raw bytes from tracee memory at `ptr`.
    fn readbytes(&self, ptr: u64, len: usize) -> std::io::Result<Vec<u8>>;

    /// Suppress the pending syscall (equivalent to setting its number to -1).
    fn suppress_syscall(&mut self);

    /// Override the syscall's return value.
    fn set_result(&mut self, value: i64);

    /// Register a hook to run once, at syscall exit.
    fn on_return(&mut self, hook: OnReturnHook);
}

/// Failure modes for [`Debugger::readstr`].
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("path exceeds maximum length")]
    TooLong,
    #[error("path is not valid UTF-8")]
    InvalidUtf8,
    #[error("failed to read tracee memory: {0}")]
    Io(#[from] std::io::Error),
}

//! Named deny actions, each wired to a single POSIX errno.
//!
//! An [`ErrnoAction`] is a value, not a closure: the six actions below are
//! `static` and can be dropped directly into a [`crate::dispatch::Handler`]
//! or returned from a [`crate::dispatch::Handler::Callback`].

use crate::debugger::Debugger;

/// A deny action that suppresses the current syscall and overrides its
/// return value to `-errno`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrnoAction {
    errno: i32,
    /// Stable name used in log messages, independent of libc's `strerror`.
    pub error_name: &'static str,
}

impl ErrnoAction {
    const fn new(errno: i32, error_name: &'static str) -> Self {
        Self { errno, error_name }
    }

    pub fn errno(&self) -> i32 {
        self.errno
    }

    /// Suppress the syscall and force the tracee to observe `-errno`.
    pub fn deny(&self, debugger: &mut dyn Debugger) {
        debugger.suppress_syscall();
        debugger.set_result(-(self.errno as i64));
    }
}

pub static EACCES: ErrnoAction = ErrnoAction::new(libc::EACCES, "EACCES");
pub static EPERM: ErrnoAction = ErrnoAction::new(libc::EPERM, "EPERM");
pub static ENOENT: ErrnoAction = ErrnoAction::new(libc::ENOENT, "ENOENT");
pub static EFAULT: ErrnoAction = ErrnoAction::new(libc::EFAULT, "EFAULT");
pub static EINVAL: ErrnoAction = ErrnoAction::new(libc::EINVAL, "EINVAL");
pub static ENAMETOOLONG: ErrnoAction = ErrnoAction::new(libc::ENAMETOOLONG, "ENAMETOOLONG");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::FakeDebugger;
    use pretty_assertions::assert_eq;

    #[test]
    fn deny_suppresses_and_sets_errno() {
        let mut dbg = FakeDebugger::new(1, 1);
        EACCES.deny(&mut dbg);
        assert_eq!(dbg.syscall_suppressed(), true);
        assert_eq!(dbg.result(), Some(-(libc::EACCES as i64)));
    }
}

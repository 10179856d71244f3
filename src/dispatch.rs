//! Per-syscall mapping from syscall number to a [`Handler`], and the two
//! preset tables (runtime, compile) built from it.
//!
//! Syscall numbers on Linux are sparse over the range this sandbox cares
//! about (a few hundred entries out of a theoretical ~450), so the table is
//! a `HashMap` rather than a dense array -- the same "list-of-rules is fine
//! if documented" escape hatch [`crate::policy`] uses for its trie.

use crate::{
    debugger::{Debugger, OnReturnHook},
    emulate,
    errno::{self, ErrnoAction},
    jail::Jail,
    links::ProcessLinks,
};

use std::collections::HashMap;

/// The outcome of a [`Handler`] evaluating a syscall stop.
pub enum Decision {
    /// Let the syscall proceed unmodified.
    Admit,
    /// Suppress the syscall and make it return `-errno`.
    DenyWithErrno(ErrnoAction),
    /// Let the syscall proceed, and run `hook` once it returns.
    AdmitAndOnReturn(OnReturnHook),
    /// Suppress the syscall and force it to return `value` directly --
    /// used for syscalls this sandbox emulates entirely in userspace
    /// (`utimensat` with `UTIME_OMIT`, see [`crate::emulate`]).
    Emulate(i64),
}

impl std::fmt::Debug for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Admit => f.write_str("Admit"),
            Decision::DenyWithErrno(action) => f.debug_tuple("DenyWithErrno").field(action).finish(),
            Decision::AdmitAndOnReturn(_) => f.debug_tuple("AdmitAndOnReturn").field(&"..").finish(),
            Decision::Emulate(value) => f.debug_tuple("Emulate").field(value).finish(),
        }
    }
}

impl Decision {
    /// Apply this decision to `debugger`, returning whether the syscall was
    /// ultimately admitted (matches the boolean contract handed to the
    /// tracer: `true` for admit, `false` for deny).
    fn apply(self, debugger: &mut dyn Debugger) -> bool {
        match self {
            Decision::Admit => true,
            Decision::DenyWithErrno(action) => {
                action.deny(debugger);
                false
            }
            Decision::AdmitAndOnReturn(hook) => {
                debugger.on_return(hook);
                true
            }
            Decision::Emulate(value) => {
                debugger.suppress_syscall();
                debugger.set_result(value);
                true
            }
        }
    }
}

/// Read-only context a [`Handler::Callback`] needs to make a decision:
/// the jail to check paths against, and the OS-side CWD/FD lookup.
pub struct HandlerContext<'a> {
    pub jail: &'a Jail,
    pub links: &'a dyn ProcessLinks,
}

impl std::fmt::Debug for HandlerContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("jail", &self.jail)
            .field("links", &"..")
            .finish()
    }
}

/// A handler that needs more than a fixed verdict: reads registers, resolves
/// paths, consults the jail.
pub trait SyscallHandler: Send + Sync {
    fn dispatch(&self, debugger: &mut dyn Debugger, ctx: &HandlerContext) -> Decision;
}

/// Per-syscall policy: admit unconditionally, deny unconditionally with a
/// fixed errno, or defer to a [`SyscallHandler`].
pub enum Handler {
    Allow,
    DenyWithErrno(ErrnoAction),
    Callback(Box<dyn SyscallHandler>),
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Allow => f.write_str("Allow"),
            Handler::DenyWithErrno(action) => f.debug_tuple("DenyWithErrno").field(action).finish(),
            Handler::Callback(_) => f.debug_tuple("Callback").field(&"..").finish(),
        }
    }
}

impl Handler {
    fn dispatch(&self, debugger: &mut dyn Debugger, ctx: &HandlerContext) -> Decision {
        match self {
            Handler::Allow => Decision::Admit,
            Handler::DenyWithErrno(action) => Decision::DenyWithErrno(*action),
            Handler::Callback(handler) => handler.dispatch(debugger, ctx),
        }
    }

    fn callback(handler: impl SyscallHandler + 'static) -> Self {
        Handler::Callback(Box::new(handler))
    }
}

/// Which argument index (if any) the handler should use for `dirfd`, and
/// which jail (read or write) to check against.
#[derive(Clone, Copy)]
pub(crate) enum Writeness {
    Read,
    Write,
    /// Derive writeness from the `open`/`openat` flags argument at this
    /// index, using strict-equality flag detection (§4.3).
    FromOpenFlags(u32),
}

/// The common "read a path argument, resolve it, check it against a jail"
/// handler shape described in the design notes: it captures the syscall
/// name (for logging), which argument holds the path, which argument (if
/// any) holds `dirfd`, and the writeness policy.
pub(crate) struct PathCheckHandler {
    pub syscall_name: &'static str,
    pub path_arg: u32,
    pub dirfd_arg: Option<u32>,
    pub writeness: Writeness,
}

impl SyscallHandler for PathCheckHandler {
    fn dispatch(&self, debugger: &mut dyn Debugger, ctx: &HandlerContext) -> Decision {
        let ptr = debugger.uarg(self.path_arg);
        let dirfd = match self.dirfd_arg {
            Some(idx) => crate::resolver::sign_extend_dirfd(debugger.uarg(idx)),
            None => crate::resolver::AT_FDCWD,
        };
        let write = match self.writeness {
            Writeness::Read => false,
            Writeness::Write => true,
            Writeness::FromOpenFlags(idx) => crate::flags::is_write(debugger.arg(idx) as i32),
        };

        match crate::access::check_file_access(debugger, ctx.links, ctx.jail, ptr, dirfd, write) {
            Ok(path) => {
                tracing::trace!(syscall = self.syscall_name, path = %path.display(), "admitted");
                Decision::Admit
            }
            Err(action) => {
                tracing::debug!(
                    syscall = self.syscall_name,
                    error = action.error_name,
                    "denied",
                );
                Decision::DenyWithErrno(action)
            }
        }
    }
}

fn path_check(
    syscall_name: &'static str,
    path_arg: u32,
    dirfd_arg: Option<u32>,
    writeness: Writeness,
) -> Handler {
    Handler::callback(PathCheckHandler {
        syscall_name,
        path_arg,
        dirfd_arg,
        writeness,
    })
}

/// A `HashMap`-backed mapping from syscall number to [`Handler`].
pub struct DispatchTable {
    handlers: HashMap<i64, Handler>,
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl DispatchTable {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    fn insert(&mut self, syscall_no: i64, handler: Handler) {
        self.handlers.insert(syscall_no, handler);
    }

    pub fn get(&self, syscall_no: i64) -> Option<&Handler> {
        self.handlers.get(&syscall_no)
    }

    /// Look up and run the handler for `syscall_no`, returning `None` if
    /// this table has no entry for it (the surrounding tracer is expected
    /// to apply its own default, typically deny-and-report).
    pub fn dispatch(
        &self,
        syscall_no: i64,
        debugger: &mut dyn Debugger,
        ctx: &HandlerContext,
    ) -> Option<bool> {
        let decision = self.handlers.get(&syscall_no)?.dispatch(debugger, ctx);
        Some(decision.apply(debugger))
    }

    /// The restrictive table used while the submission itself is running.
    pub fn runtime() -> Self {
        let mut t = Self::new();
        install_common(&mut t);
        t
    }

    /// The permissive table used while compiling/building a submission.
    pub fn compile() -> Self {
        let mut t = Self::new();
        install_common(&mut t);
        install_compile_only(&mut t);
        t
    }
}

/// Lazily-built, process-wide tables, since the handlers a table contains
/// don't depend on any particular tracee -- rebuilding the same `HashMap`
/// on every spawn would just be wasted allocation.
pub static RUNTIME_TABLE: once_cell::sync::Lazy<DispatchTable> =
    once_cell::sync::Lazy::new(DispatchTable::runtime);
pub static COMPILE_TABLE: once_cell::sync::Lazy<DispatchTable> =
    once_cell::sync::Lazy::new(DispatchTable::compile);

fn install_common(t: &mut DispatchTable) {
    use libc::*;

    // Path-argument read checks.
    t.insert(SYS_open, path_check("open", 0, None, Writeness::FromOpenFlags(1)));
    t.insert(
        SYS_openat,
        path_check("openat", 1, Some(0), Writeness::FromOpenFlags(2)),
    );
    t.insert(SYS_access, path_check("access", 0, None, Writeness::Read));
    t.insert(
        SYS_faccessat,
        path_check("faccessat", 1, Some(0), Writeness::Read),
    );
    t.insert(SYS_readlink, path_check("readlink", 0, None, Writeness::Read));
    t.insert(
        SYS_readlinkat,
        path_check("readlinkat", 1, Some(0), Writeness::Read),
    );
    t.insert(SYS_stat, path_check("stat", 0, None, Writeness::Read));
    t.insert(SYS_lstat, path_check("lstat", 0, None, Writeness::Read));
    t.insert(
        SYS_newfstatat,
        path_check("fstatat", 1, Some(0), Writeness::Read),
    );
    t.insert(SYS_statx, path_check("statx", 1, Some(0), Writeness::Read));

    // Emulated syscalls that need self/target comparisons.
    t.insert(SYS_kill, Handler::callback(emulate::KillSelfHandler));
    t.insert(SYS_tgkill, Handler::callback(emulate::KillSelfHandler));
    t.insert(SYS_prctl, Handler::callback(emulate::PrctlAllowlistHandler));
    t.insert(SYS_prlimit64, Handler::callback(emulate::PrlimitSelfHandler));

    // Unconditional denies.
    t.insert(SYS_socket, Handler::DenyWithErrno(errno::EACCES));

    // Unconditional admits: memory management, already-open-FD I/O, process
    // identity/time/scheduling queries, signal plumbing.
    for sys in [
        SYS_mmap,
        SYS_mprotect,
        SYS_munmap,
        SYS_mremap,
        SYS_madvise,
        SYS_brk,
        SYS_futex,
        SYS_rt_sigaction,
        SYS_rt_sigprocmask,
        SYS_rt_sigreturn,
        SYS_sigaltstack,
        SYS_getpid,
        SYS_getppid,
        SYS_gettid,
        SYS_getuid,
        SYS_geteuid,
        SYS_getgid,
        SYS_getegid,
        SYS_getpgrp,
        SYS_getcwd,
        SYS_sched_yield,
        SYS_sched_getaffinity,
        SYS_sched_getparam,
        SYS_sched_getscheduler,
        SYS_sched_get_priority_min,
        SYS_sched_get_priority_max,
        SYS_timer_create,
        SYS_timer_settime,
        SYS_timer_delete,
        SYS_clock_gettime,
        SYS_clock_getres,
        SYS_clock_nanosleep,
        SYS_gettimeofday,
        SYS_getrandom,
        SYS_nanosleep,
        SYS_sysinfo,
        SYS_read,
        SYS_pread64,
        SYS_readv,
        SYS_write,
        SYS_pwrite64,
        SYS_writev,
        SYS_close,
        SYS_dup,
        SYS_dup2,
        SYS_dup3,
        SYS_fcntl,
        SYS_lseek,
        SYS_fstat,
        SYS_getdents,
        SYS_getdents64,
        SYS_ioctl,
        SYS_poll,
        SYS_ppoll,
        SYS_select,
        SYS_pselect6,
        SYS_arch_prctl,
        SYS_set_tid_address,
        SYS_set_robust_list,
        SYS_exit,
        SYS_exit_group,
        SYS_restart_syscall,
        SYS_getrusage,
        SYS_getrlimit,
        SYS_uname,
        SYS_statfs,
        SYS_fstatfs,
        SYS_clone,
        SYS_rseq,
    ] {
        t.insert(sys, Handler::Allow);
    }
}

fn install_compile_only(t: &mut DispatchTable) {
    use libc::*;

    for sys in [SYS_fork, SYS_vfork, SYS_execve, SYS_wait4, SYS_waitid] {
        t.insert(sys, Handler::Allow);
    }

    t.insert(SYS_chdir, path_check("chdir", 0, None, Writeness::Read));
    t.insert(SYS_chmod, path_check("chmod", 0, None, Writeness::Write));
    t.insert(
        SYS_fchmodat,
        path_check("fchmodat", 1, Some(0), Writeness::Write),
    );
    t.insert(SYS_mkdir, path_check("mkdir", 0, None, Writeness::Write));
    t.insert(
        SYS_mkdirat,
        path_check("mkdirat", 1, Some(0), Writeness::Write),
    );
    t.insert(SYS_rmdir, path_check("rmdir", 0, None, Writeness::Write));
    t.insert(SYS_unlink, path_check("unlink", 0, None, Writeness::Write));
    t.insert(
        SYS_unlinkat,
        path_check("unlinkat", 1, Some(0), Writeness::Write),
    );
    t.insert(SYS_link, path_check("link", 1, None, Writeness::Write));
    t.insert(
        SYS_linkat,
        path_check("linkat", 3, Some(2), Writeness::Write),
    );
    t.insert(SYS_symlink, path_check("symlink", 1, None, Writeness::Write));
    t.insert(
        SYS_symlinkat,
        path_check("symlinkat", 2, Some(1), Writeness::Write),
    );

    t.insert(
        SYS_rename,
        Handler::callback(emulate::RenameHandler {
            old_path_arg: 0,
            old_dirfd_arg: None,
            new_path_arg: 1,
            new_dirfd_arg: None,
        }),
    );
    t.insert(
        SYS_renameat,
        Handler::callback(emulate::RenameHandler {
            old_path_arg: 1,
            old_dirfd_arg: Some(0),
            new_path_arg: 3,
            new_dirfd_arg: Some(2),
        }),
    );
    t.insert(
        SYS_renameat2,
        Handler::callback(emulate::RenameHandler {
            old_path_arg: 1,
            old_dirfd_arg: Some(0),
            new_path_arg: 3,
            new_dirfd_arg: Some(2),
        }),
    );

    t.insert(SYS_fchmod, Handler::callback(emulate::FchmodHandler));
    t.insert(SYS_utimensat, Handler::callback(emulate::UtimensatHandler));

    // Networking admitted unconditionally in the compile jail.
    for sys in [
        SYS_socket,
        SYS_socketpair,
        SYS_connect,
        SYS_setsockopt,
        SYS_getsockopt,
        SYS_getsockname,
        SYS_getpeername,
        SYS_bind,
        SYS_listen,
        SYS_accept,
        SYS_accept4,
        SYS_sendto,
        SYS_recvfrom,
        SYS_sendmsg,
        SYS_recvmsg,
        SYS_sendmmsg,
        SYS_recvmmsg,
        SYS_shutdown,
    ] {
        // Overwrite the runtime table's unconditional EACCES for `socket`.
        t.insert(sys, Handler::Allow);
    }

    // Pty/event-loop syscalls admitted unconditionally.
    for sys in [
        SYS_epoll_create1,
        SYS_epoll_ctl,
        SYS_epoll_wait,
        SYS_epoll_pwait,
        SYS_eventfd2,
        SYS_pipe2,
        SYS_timerfd_create,
        SYS_timerfd_settime,
        SYS_signalfd4,
    ] {
        t.insert(sys, Handler::Allow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{jail::Jail, links::ProcProcessLinks, policy::FsRule, tests::fakes::FakeDebugger};
    use pretty_assertions::assert_eq;

    fn ctx(jail: &Jail) -> HandlerContext<'_> {
        HandlerContext {
            jail,
            links: &ProcProcessLinks,
        }
    }

    #[test]
    fn lazy_tables_are_built_once_and_reused() {
        let jail = Jail::builder().build().unwrap();
        let mut dbg = FakeDebugger::new(1, 1);
        assert_eq!(
            RUNTIME_TABLE.dispatch(libc::SYS_socket, &mut dbg, &ctx(&jail)),
            Some(false),
        );
        let mut dbg = FakeDebugger::new(1, 1);
        assert_eq!(
            COMPILE_TABLE.dispatch(libc::SYS_socket, &mut dbg, &ctx(&jail)),
            Some(true),
        );
    }

    #[test]
    fn unknown_syscall_returns_none() {
        let jail = Jail::builder().build().unwrap();
        let table = DispatchTable::runtime();
        let mut dbg = FakeDebugger::new(1, 1);
        assert_eq!(table.dispatch(999_999, &mut dbg, &ctx(&jail)), None);
    }

    #[test]
    fn socket_denied_at_runtime_but_allowed_at_compile_time() {
        let jail = Jail::builder().build().unwrap();
        let mut dbg = FakeDebugger::new(1, 1);

        let runtime = DispatchTable::runtime();
        assert_eq!(
            runtime.dispatch(libc::SYS_socket, &mut dbg, &ctx(&jail)),
            Some(false),
        );

        let mut dbg = FakeDebugger::new(1, 1);
        let compile = DispatchTable::compile();
        assert_eq!(
            compile.dispatch(libc::SYS_socket, &mut dbg, &ctx(&jail)),
            Some(true),
        );
    }

    #[test]
    fn mkdir_structurally_disallowed_at_runtime() {
        let jail = Jail::builder().build().unwrap();
        let table = DispatchTable::runtime();
        let mut dbg = FakeDebugger::new(1, 1);
        assert_eq!(table.dispatch(libc::SYS_mkdir, &mut dbg, &ctx(&jail)), None);
    }

    #[test]
    fn openat_write_derivation_consults_write_jail() {
        let tmp = tempfile::tempdir().unwrap();
        let jail = Jail::builder()
            .write_rules(vec![FsRule::RecursiveDir(
                tmp.path().to_str().unwrap().to_string(),
            )])
            .build()
            .unwrap();
        let table = DispatchTable::runtime();

        let path = tmp.path().join("out.txt");
        let mut dbg = FakeDebugger::new(1, 1)
            .with_cstr(100, path.to_str().unwrap())
            .with_args(vec![
                crate::resolver::AT_FDCWD,
                100,
                (libc::O_WRONLY | libc::O_CREAT) as i64,
            ]);

        assert_eq!(
            table.dispatch(libc::SYS_openat, &mut dbg, &ctx(&jail)),
            Some(true),
        );
    }
}

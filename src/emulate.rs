//! Handlers for syscalls this sandbox emulates instead of admitting
//! outright: self-targeting checks (`kill`, `tgkill`, `prlimit64`), a fixed
//! `prctl` allowlist, and path-pair/FD-relative checks (`rename*`,
//! `fchmod`, `utimensat`) that need more than one [`crate::access`] call.

use crate::{
    access,
    debugger::Debugger,
    dispatch::{Decision, HandlerContext, SyscallHandler},
    errno,
    resolver::{self, AT_FDCWD},
};

/// `kill`/`tgkill`: admitted only when the target is the tracee's own
/// thread-group. Both syscalls carry the target in argument 0 (`pid` for
/// `kill`, `tgid` for `tgkill`).
pub(crate) struct KillSelfHandler;

impl SyscallHandler for KillSelfHandler {
    fn dispatch(&self, debugger: &mut dyn Debugger, _ctx: &HandlerContext) -> Decision {
        if debugger.uarg(0) == debugger.pid() as u64 {
            Decision::Admit
        } else {
            Decision::DenyWithErrno(errno::EPERM)
        }
    }
}

/// `prlimit64`: admitted when the target pid argument is `0` (self, by
/// convention) or equal to the tracee's own pid.
pub(crate) struct PrlimitSelfHandler;

impl SyscallHandler for PrlimitSelfHandler {
    fn dispatch(&self, debugger: &mut dyn Debugger, _ctx: &HandlerContext) -> Decision {
        let target = debugger.uarg(0);
        if target == 0 || target == debugger.pid() as u64 {
            Decision::Admit
        } else {
            Decision::DenyWithErrno(errno::EPERM)
        }
    }
}

/// `prctl`: admitted only for a fixed allowlist of harmless operations a
/// normal runtime needs (querying its own name/dumpable flag, the
/// transparent-hugepage and `PR_SET_VMA` name annotations some allocators
/// make); anything else is structurally disallowed.
pub(crate) struct PrctlAllowlistHandler;

const PR_GET_DUMPABLE: i64 = 3;
const PR_SET_NAME: i64 = 15;
const PR_GET_NAME: i64 = 16;
const PR_SET_THP_DISABLE: i64 = 41;
const PR_SET_VMA: i64 = 0x5356_4d41;

const PRCTL_ALLOWLIST: &[i64] = &[
    PR_GET_DUMPABLE,
    PR_SET_NAME,
    PR_GET_NAME,
    PR_SET_THP_DISABLE,
    PR_SET_VMA,
];

impl SyscallHandler for PrctlAllowlistHandler {
    fn dispatch(&self, debugger: &mut dyn Debugger, _ctx: &HandlerContext) -> Decision {
        if PRCTL_ALLOWLIST.contains(&debugger.arg(0)) {
            Decision::Admit
        } else {
            Decision::DenyWithErrno(errno::EPERM)
        }
    }
}

/// `rename`/`renameat`/`renameat2`: both the source and destination path
/// must pass the write jail -- a rename is a mutation of both directory
/// entries, not just the destination.
pub(crate) struct RenameHandler {
    pub old_path_arg: u32,
    pub old_dirfd_arg: Option<u32>,
    pub new_path_arg: u32,
    pub new_dirfd_arg: Option<u32>,
}

impl SyscallHandler for RenameHandler {
    fn dispatch(&self, debugger: &mut dyn Debugger, ctx: &HandlerContext) -> Decision {
        let old_dirfd = dirfd_of(debugger, self.old_dirfd_arg);
        let new_dirfd = dirfd_of(debugger, self.new_dirfd_arg);

        let old_ptr = debugger.uarg(self.old_path_arg);
        if let Err(action) =
            access::check_file_access(debugger, ctx.links, ctx.jail, old_ptr, old_dirfd, true)
        {
            return Decision::DenyWithErrno(action);
        }

        let new_ptr = debugger.uarg(self.new_path_arg);
        match access::check_file_access(debugger, ctx.links, ctx.jail, new_ptr, new_dirfd, true) {
            Ok(_) => Decision::Admit,
            Err(action) => Decision::DenyWithErrno(action),
        }
    }
}

fn dirfd_of(debugger: &dyn Debugger, arg: Option<u32>) -> i64 {
    match arg {
        Some(idx) => resolver::sign_extend_dirfd(debugger.uarg(idx)),
        None => AT_FDCWD,
    }
}

/// `fchmod`: the target is an already-open file descriptor rather than a
/// path, so it's resolved through the tracee's FD table before the usual
/// write check applies.
pub(crate) struct FchmodHandler;

impl SyscallHandler for FchmodHandler {
    fn dispatch(&self, debugger: &mut dyn Debugger, ctx: &HandlerContext) -> Decision {
        let fd = debugger.arg(0) as i32;
        let path = match ctx.links.fd_path(debugger.tid(), fd) {
            Ok(path) => path,
            Err(_) => return Decision::DenyWithErrno(errno::ENOENT),
        };
        let raw = match path.to_str() {
            Some(s) => s,
            None => return Decision::DenyWithErrno(errno::ENOENT),
        };
        match access::check_resolved_access(debugger.tid(), raw, AT_FDCWD, ctx.links, ctx.jail, true)
        {
            Ok(_) => Decision::Admit,
            Err(action) => Decision::DenyWithErrno(action),
        }
    }
}

/// Sentinel meaning "leave this timestamp alone", from `<linux/stat.h>`.
const UTIME_OMIT: i64 = (1 << 30) - 2;

/// `utimensat(dirfd, pathname, times, flags)`: when both `times[].tv_nsec`
/// fields are `UTIME_OMIT` the call is a pure no-op (the kernel wouldn't
/// touch the inode at all), so it's emulated as a suppressed syscall
/// forced to return `0` rather than paying for a real (and possibly
/// jail-rejected) path check. Otherwise it falls back to an ordinary write
/// check, with the `pathname == NULL` form (which operates on `dirfd`
/// itself) resolved through the FD table like [`FchmodHandler`].
pub(crate) struct UtimensatHandler;

impl SyscallHandler for UtimensatHandler {
    fn dispatch(&self, debugger: &mut dyn Debugger, ctx: &HandlerContext) -> Decision {
        let dirfd = resolver::sign_extend_dirfd(debugger.uarg(0));
        let path_ptr = debugger.uarg(1);
        let times_ptr = debugger.uarg(2);

        if times_ptr != 0 {
            match read_both_omit(debugger, times_ptr) {
                Ok(true) => return Decision::Emulate(0),
                Ok(false) => {}
                Err(action) => return Decision::DenyWithErrno(action),
            }
        }

        if dirfd != AT_FDCWD && path_ptr == 0 {
            let path = match ctx.links.fd_path(debugger.tid(), dirfd as i32) {
                Ok(path) => path,
                Err(_) => return Decision::DenyWithErrno(errno::ENOENT),
            };
            let raw = match path.to_str() {
                Some(s) => s,
                None => return Decision::DenyWithErrno(errno::ENOENT),
            };
            return match access::check_resolved_access(
                debugger.tid(),
                raw,
                AT_FDCWD,
                ctx.links,
                ctx.jail,
                true,
            ) {
                Ok(_) => Decision::Admit,
                Err(action) => Decision::DenyWithErrno(action),
            };
        }

        match access::check_file_access(debugger, ctx.links, ctx.jail, path_ptr, dirfd, true) {
            Ok(_) => Decision::Admit,
            Err(action) => Decision::DenyWithErrno(action),
        }
    }
}

/// Read the `struct timespec times[2]` argument and report whether both
/// `tv_nsec` fields are `UTIME_OMIT`. Field width tracks the tracee's
/// address size: `time_t`/`long` are 8 bytes wide in a 64-bit ABI, 4 bytes
/// in a 32-bit one.
fn read_both_omit(debugger: &dyn Debugger, ptr: u64) -> Result<bool, errno::ErrnoAction> {
    let field_width = if debugger.address_bits() == 64 { 8 } else { 4 };
    let entry_width = field_width * 2;
    let bytes = debugger
        .readbytes(ptr, entry_width * 2)
        .map_err(|_| errno::EFAULT)?;

    let nsec_at = |offset: usize| -> i64 {
        let field = &bytes[offset..offset + field_width];
        if field_width == 8 {
            i64::from_le_bytes(field.try_into().unwrap())
        } else {
            i32::from_le_bytes(field.try_into().unwrap()) as i64
        }
    };

    let first_nsec = nsec_at(field_width);
    let second_nsec = nsec_at(entry_width + field_width);
    Ok(first_nsec == UTIME_OMIT && second_nsec == UTIME_OMIT)
}

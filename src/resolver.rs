//! Reconstruct the absolute path a syscall argument refers to.
//!
//! This is purely lexical: it never follows a symlink. Symlink divergence is
//! [`crate::access`]'s problem, once it has an absolute, normalized path to
//! compare a `realpath`-resolved form against.

use crate::links::ProcessLinks;

use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
};

/// The sentinel `dirfd` value meaning "the thread's current working
/// directory", per `openat(2)`.
pub const AT_FDCWD: i64 = libc::AT_FDCWD as i64;

/// Sign-extend a `dirfd` read out of a (zero-extended) argument register.
///
/// `dirfd` is logically a 32-bit signed `int`; argument registers are
/// reported as unsigned 64-bit words, so a negative `dirfd` like
/// `AT_FDCWD` (-100) shows up as a large positive `u64` unless we first
/// truncate to 32 bits and re-extend the sign.
pub fn sign_extend_dirfd(raw: u64) -> i64 {
    raw as u32 as i32 as i64
}

/// Failure reading the OS-side CWD/FD table needed to resolve a relative
/// path. Every caller maps this to `ENOENT` (a thread that raced an exit
/// looks the same as one that was never there).
#[derive(Debug, thiserror::Error)]
#[error("failed to look up thread {tid}'s {what}: {source}")]
pub struct ResolveError {
    tid: u32,
    what: &'static str,
    #[source]
    source: io::Error,
}

/// Reconstruct the absolute path referred to by `raw_path` relative to
/// `dirfd` in thread `tid`, and lexically normalize it.
///
/// `dirfd` must already be sign-extended (see [`sign_extend_dirfd`]).
pub fn resolve(
    tid: u32,
    raw_path: &str,
    dirfd: i64,
    links: &dyn ProcessLinks,
) -> Result<PathBuf, ResolveError> {
    let path = Path::new(raw_path);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let base = if dirfd == AT_FDCWD {
            links.cwd(tid).map_err(|source| ResolveError {
                tid,
                what: "cwd",
                source,
            })?
        } else {
            links.fd_path(tid, dirfd as i32).map_err(|source| ResolveError {
                tid,
                what: "fd table",
                source,
            })?
        };
        base.join(path)
    };
    Ok(normalize(&absolute))
}

/// Collapse `.`, `..`, and repeated separators, purely lexically.
///
/// Always returns a path starting with a single `/`. Idempotent:
/// `normalize(normalize(p)) == normalize(p)`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut stack: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::Normal(part) => stack.push(part),
            std::path::Component::ParentDir => {
                stack.pop();
            }
            std::path::Component::CurDir
            | std::path::Component::RootDir
            | std::path::Component::Prefix(_) => {}
        }
    }
    let mut out = PathBuf::from("/");
    out.extend(stack);
    out
}

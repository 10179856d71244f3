//! Apply a read or write jail to a resolved path, including the
//! `/proc/self` projection and the symlink-divergence re-check.
//!
//! This is the component where most of an escape attempt actually gets
//! caught: the policy tree (§[`crate::policy`]) only ever sees strings, so
//! everything that turns "what string does the jail see" and "what inode
//! does the kernel actually serve" into the same question lives here.

use crate::{
    debugger::{Debugger, ReadError},
    errno::{self, ErrnoAction},
    jail::Jail,
    links::ProcessLinks,
    resolver::{self, ResolveError},
};

use std::path::{Path, PathBuf};

const PROC_SELF: &str = "/proc/self";

/// Read the path argument at `ptr`, resolve it, and check it against `jail`.
///
/// Returns the normalized path on admission, or the [`ErrnoAction`] to
/// apply on denial. Every failure mode in this function ends in a deny --
/// there is no way for this to propagate an internal error to the tracee,
/// matching the "an internal error degrades to a conservative deny"
/// invariant.
pub fn check_file_access(
    debugger: &dyn Debugger,
    links: &dyn ProcessLinks,
    jail: &Jail,
    ptr: u64,
    dirfd: i64,
    write: bool,
) -> Result<PathBuf, ErrnoAction> {
    let raw = read_path(debugger, ptr)?;
    check_resolved_access(debugger.tid(), &raw, dirfd, links, jail, write)
}

/// Same as [`check_file_access`], but for callers that already have the raw
/// path string in hand (e.g. the second path of a `rename`).
pub fn check_resolved_access(
    tid: u32,
    raw_path: &str,
    dirfd: i64,
    links: &dyn ProcessLinks,
    jail: &Jail,
    write: bool,
) -> Result<PathBuf, ErrnoAction> {
    let normalized = resolver::resolve(tid, raw_path, dirfd, links).map_err(|err| {
        tracing::debug!(%err, "denying access after OS-side path lookup failed");
        errno::ENOENT
    })?;

    let projected = project_proc_self(&normalized, tid);
    let real = tolerant_realpath(&projected).map_err(|_| errno::ENOENT)?;

    if normalized != real {
        let identical = same_inode(&projected, &real).map_err(|_| errno::ENOENT)?;
        if !identical {
            tracing::warn!(
                normalized = %normalized.display(),
                real = %real.display(),
                "denying access due to suspected symlink trickery",
            );
            return Err(errno::EACCES);
        }
    }

    let policy = if write {
        &jail.write_policy
    } else {
        &jail.read_policy
    };

    if !policy.check(&normalized) {
        return Err(errno::EACCES);
    }

    if normalized != real {
        let deprojected_real = deproject_proc_self(&real, tid);
        if !policy.check(&deprojected_real) {
            return Err(errno::EACCES);
        }
    }

    Ok(normalized)
}

/// Read a NUL-terminated path argument from tracee memory, mapping every
/// failure mode to the errno §4.2/§4.3 specify.
pub fn read_path(debugger: &dyn Debugger, ptr: u64) -> Result<String, ErrnoAction> {
    match debugger.readstr(ptr) {
        Ok(Some(s)) => Ok(s),
        Ok(None) => Err(errno::EFAULT),
        Err(ReadError::TooLong) => {
            tracing::warn!(tid = debugger.tid(), "denied access to overly long path");
            Err(errno::ENAMETOOLONG)
        }
        Err(ReadError::InvalidUtf8) => {
            tracing::warn!(tid = debugger.tid(), "denied access to path with invalid UTF-8");
            Err(errno::ENOENT)
        }
        Err(ReadError::Io(err)) => {
            tracing::debug!(%err, tid = debugger.tid(), "failed to read path argument");
            Err(errno::ENOENT)
        }
    }
}

/// Rewrite a leading `/proc/self` component to `/proc/<tid>`, so that
/// filesystem operations performed *by the tracer* (stat, realpath) see the
/// tracee's `/proc/self`, not the tracer's own.
fn project_proc_self(path: &Path, tid: u32) -> PathBuf {
    match path.strip_prefix(PROC_SELF) {
        Ok(rest) => Path::new(&format!("/proc/{tid}")).join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// The inverse of [`project_proc_self`], used to translate a real path back
/// into the logical namespace before re-checking it against the jail.
fn deproject_proc_self(path: &Path, tid: u32) -> PathBuf {
    let proc_tid = format!("/proc/{tid}");
    match path.strip_prefix(&proc_tid) {
        Ok(rest) => Path::new(PROC_SELF).join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Like `std::fs::canonicalize`, but tolerant of a non-existent tail: the
/// kernel's `realpath(3)` (and `canonicalize`, built on it) requires every
/// component including the last to exist, but an `O_CREAT` open against a
/// file that doesn't exist yet is the single most common write pattern this
/// sandbox needs to admit (compiler output, stdout redirection, temp
/// files). Resolves the longest existing prefix of `path` and re-appends
/// whatever's left lexically, matching what `os.path.realpath` returns for
/// a not-fully-existing path.
fn tolerant_realpath(path: &Path) -> std::io::Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(real) => return Ok(real),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    let components: Vec<_> = path.components().collect();
    for split in (0..components.len()).rev() {
        let prefix: PathBuf = components[..split].iter().collect();
        match std::fs::canonicalize(&prefix) {
            Ok(mut real) => {
                for component in &components[split..] {
                    real.push(component.as_os_str());
                }
                return Ok(real);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no existing prefix in path",
    ))
}

fn same_inode(a: &Path, b: &Path) -> std::io::Result<bool> {
    let stat_a = rustix::fs::stat(a)?;
    let stat_b = rustix::fs::stat(b)?;
    Ok(stat_a.st_dev == stat_b.st_dev && stat_a.st_ino == stat_b.st_ino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FsRule;
    use crate::tests::fakes::FakeLinks;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    fn jail_allowing_recursive(path: &str) -> Jail {
        Jail::builder()
            .read_rules(vec![FsRule::RecursiveDir(path.to_string())])
            .write_rules(vec![FsRule::RecursiveDir(path.to_string())])
            .build()
            .unwrap()
    }

    /// Write a fixture file under a fresh temp dir, returning both so the
    /// directory isn't dropped (and cleaned up) before the test reads it.
    fn fixture_file(name: &str, contents: &[u8]) -> anyhow::Result<(TempDir, PathBuf)> {
        let dir = tempdir()?;
        let path = dir.path().join(name);
        std::fs::write(&path, contents)?;
        Ok((dir, path))
    }

    #[test]
    fn plain_file_in_jail_admits() {
        let (dir, file) = fixture_file("ok.txt", b"hi").unwrap();

        let jail = jail_allowing_recursive(dir.path().to_str().unwrap());
        let links = FakeLinks::default();
        let got = check_resolved_access(
            1,
            file.to_str().unwrap(),
            resolver::AT_FDCWD,
            &links,
            &jail,
            false,
        )
        .unwrap();
        assert_eq!(got, file);
    }

    #[test]
    fn nonexistent_file_in_write_jail_admits() {
        // O_CREAT against a file that doesn't exist yet is the common case
        // (compiler output, stdout redirection); the checker must not
        // require the leaf component to already exist.
        let dir = tempdir().unwrap();
        let file = dir.path().join("out.txt");

        let jail = jail_allowing_recursive(dir.path().to_str().unwrap());
        let links = FakeLinks::default();
        let got = check_resolved_access(
            1,
            file.to_str().unwrap(),
            resolver::AT_FDCWD,
            &links,
            &jail,
            true,
        )
        .unwrap();
        assert_eq!(got, file);
    }

    #[test]
    fn symlink_escaping_jail_is_denied() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let secret = outside.path().join("secret");
        std::fs::write(&secret, b"nope").unwrap();

        let evil = dir.path().join("evil");
        std::os::unix::fs::symlink(&secret, &evil).unwrap();

        let jail = jail_allowing_recursive(dir.path().to_str().unwrap());
        let links = FakeLinks::default();
        let err = check_resolved_access(
            1,
            evil.to_str().unwrap(),
            resolver::AT_FDCWD,
            &links,
            &jail,
            false,
        )
        .unwrap_err();
        assert_eq!(err, errno::EACCES);
    }

    #[test]
    fn path_outside_jail_is_denied() {
        let dir = tempdir().unwrap();
        let jail = jail_allowing_recursive(dir.path().to_str().unwrap());
        let links = FakeLinks::default();
        let err =
            check_resolved_access(1, "/etc/passwd", resolver::AT_FDCWD, &links, &jail, false)
                .unwrap_err();
        assert_eq!(err, errno::EACCES);
    }

    #[test]
    fn proc_self_is_projected_for_identity_but_checked_as_self() {
        // "/proc/self/status" is a regular (non-symlink) procfs file, so its
        // realpath is just its own projected form -- this exercises the
        // /proc/self <-> /proc/<tid> rewrite on both sides of the identity
        // check without also requiring the jail to name whatever `exe`
        // happens to point at.
        let links = FakeLinks::default();
        let jail = Jail::builder()
            .read_rules(vec![FsRule::ExactFile("/proc/self/status".to_string())])
            .write_rules(vec![])
            .build()
            .unwrap();

        let tid = std::process::id();
        let got = check_resolved_access(
            tid,
            "/proc/self/status",
            resolver::AT_FDCWD,
            &links,
            &jail,
            false,
        )
        .unwrap();
        assert_eq!(got, Path::new("/proc/self/status"));
    }
}

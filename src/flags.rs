//! The subset of `open(2)` flag bits the access checker needs to classify a
//! call as a write.

bitflags::bitflags! {
    /// Bits of the `flags` argument to `open`/`openat` that matter for
    /// write-detection. Not a complete mirror of every `O_*` flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: i32 {
        const O_WRONLY = libc::O_WRONLY;
        const O_RDWR = libc::O_RDWR;
        const O_TRUNC = libc::O_TRUNC;
        const O_CREAT = libc::O_CREAT;
        const O_EXCL = libc::O_EXCL;
        const O_TMPFILE = libc::O_TMPFILE;
    }
}

/// The bit patterns that mark a call to `open`/`openat` as a write, checked
/// with *strict* bitwise equality (`flags & bit == bit`) rather than a
/// simple `flags & bit != 0` test.
///
/// Strict equality matters because `O_TMPFILE` is `O_DIRECTORY | 0x400000`
/// on Linux: a naive non-zero test on just the `0x400000` half would also
/// fire for unrelated flag combinations that happen to set that bit.
const WRITE_BITS: &[OpenFlags] = &[
    OpenFlags::O_WRONLY,
    OpenFlags::O_RDWR,
    OpenFlags::O_TRUNC,
    OpenFlags::O_CREAT,
    OpenFlags::O_EXCL,
    OpenFlags::O_TMPFILE,
];

/// Decide whether `open`/`openat` flags should be checked against the write
/// jail rather than the read jail.
pub fn is_write(raw_flags: i32) -> bool {
    WRITE_BITS
        .iter()
        .any(|&bit| OpenFlags::from_bits_retain(raw_flags) & bit == bit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn read_only_is_not_a_write() {
        assert_eq!(is_write(libc::O_RDONLY), false);
    }

    #[test]
    fn wronly_creat_is_a_write() {
        assert_eq!(is_write(libc::O_WRONLY | libc::O_CREAT), true);
    }

    #[test]
    fn tmpfile_does_not_misfire_on_directory() {
        // O_TMPFILE = O_DIRECTORY | 0x400000 on Linux; a plain O_DIRECTORY
        // read should not be classified as a write.
        assert_eq!(is_write(libc::O_DIRECTORY | libc::O_RDONLY), false);
    }

    #[test]
    fn tmpfile_is_a_write() {
        assert_eq!(is_write(libc::O_TMPFILE | libc::O_WRONLY), true);
    }
}

//! Error types for the sandbox core.
//!
//! These are **not** the errno values returned to a sandboxed tracee (see
//! [`crate::errno`] for those) -- they cover library misuse (malformed jail
//! configuration) and unexpected OS failures encountered while building or
//! operating the jail that a syscall handler was not already prepared to
//! fold into a deny decision.

use std::{borrow::Cow, io};

/// Opaque error type for `cptbox`.
///
/// Use [`Error::kind`] if you need to branch on the failure programmatically.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(#[from] Box<ErrorImpl>);

impl<E: Into<ErrorImpl>> From<E> for Error {
    fn from(err: E) -> Self {
        Self(Box::new(err.into()))
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.0.kind()
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ErrorImpl {
    #[error("invalid {name} rule: {description}")]
    InvalidRule {
        name: Cow<'static, str>,
        description: Cow<'static, str>,
    },

    #[error("{operation} failed")]
    OsError {
        operation: Cow<'static, str>,
        #[source]
        source: io::Error,
    },
}

/// Underlying error class for [`Error`], similar in spirit to
/// [`std::io::ErrorKind`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A filesystem access rule was not absolute/normalized.
    InvalidRule,
    /// An OS call unrelated to a specific tracee decision failed.
    OsError(Option<i32>),
}

impl ErrorImpl {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRule { .. } => ErrorKind::InvalidRule,
            Self::OsError { source, .. } => ErrorKind::OsError(source.raw_os_error()),
        }
    }
}

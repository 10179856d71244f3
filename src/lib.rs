//! A syscall-level sandbox core for a competitive-programming judge.
//!
//! This crate decides, one syscall stop at a time, whether a traced
//! submission's process is allowed to do what it's asking: admit the
//! syscall unmodified, deny it with a chosen errno, or emulate it entirely
//! in userspace. It does not itself attach to or single-step a tracee --
//! that's the surrounding executor's job, built on whatever ptrace wrapper
//! it already has. This crate only needs two things from that executor,
//! expressed as traits so they can be faked in tests without a real
//! process: a [`Debugger`] view of the current syscall stop, and a
//! [`ProcessLinks`] view of the tracee's CWD/FD table.
//!
//! # Example
//!
//! ```no_run
//! use cptbox::{DispatchTable, HandlerContext, Jail, policy::FsRule};
//!
//! # fn handle_stop(syscall_no: i64, debugger: &mut dyn cptbox::Debugger) {
//! let jail = Jail::builder()
//!     .read_rules(vec![FsRule::RecursiveDir("/usr".into())])
//!     .write_rules(vec![FsRule::RecursiveDir("/tmp/box".into())])
//!     .build()
//!     .expect("jail rules are well-formed");
//!
//! let table = DispatchTable::runtime();
//! let links = cptbox::links::ProcProcessLinks;
//! let ctx = HandlerContext { jail: &jail, links: &links };
//!
//! match table.dispatch(syscall_no, debugger, &ctx) {
//!     Some(true) => { /* admitted */ }
//!     Some(false) => { /* denied, errno already set on `debugger` */ }
//!     None => { /* no policy for this syscall number; apply a default deny */ }
//! }
//! # }
//! ```

#![cfg(target_os = "linux")]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::all)]
#![deny(missing_debug_implementations)]

mod access;
pub mod debugger;
pub mod dispatch;
mod emulate;
pub mod errno;
pub mod error;
mod flags;
pub mod jail;
pub mod links;
pub mod policy;
pub mod resolver;

#[doc(inline)]
pub use debugger::Debugger;
#[doc(inline)]
pub use dispatch::{DispatchTable, Handler, HandlerContext};
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use jail::{Jail, JailBuilder};
#[doc(inline)]
pub use links::ProcessLinks;

#[cfg(test)]
mod tests;

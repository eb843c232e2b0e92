use core::result;
use std::{io, path::PathBuf};

use nix::{errno::Errno, sys::socket::AddressFamily};
use thiserror::Error;

/// A helper type for wrapping a [result::Result] such that we can reduce noise in our signatures.
pub type Result<T> = result::Result<T, Error>;

/// An error representing a failure creating or operating on a socket or endpoint.
///
/// [Error::Create] covers failure to allocate the kernel object itself; every other variant
/// covers a failed operation on a live socket or an address translation problem.
///
/// Transient conditions get their own variants so callers can tell "try again" apart from hard
/// failure without a sentinel value; see [Error::is_transient].
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to create socket: {0}")]
    Create(#[source] io::Error),
    #[error("endpoint family {found:?} does not match socket family {expected:?}")]
    FamilyMismatch {
        expected: AddressFamily,
        found: AddressFamily,
    },
    #[error("unknown address family tag: {0}")]
    UnknownFamily(u16),
    #[error("path does not fit in a unix socket address: {}", .0.display())]
    PathTooLong(PathBuf),
    #[error("invalid bluetooth address: {0}")]
    InvalidAddress(String),
    #[error("interface name too long: {0}")]
    DeviceNameTooLong(String),
    #[error("socket option not supported for address family {0:?}")]
    UnsupportedFamily(AddressFamily),
    #[error("operation would block")]
    WouldBlock,
    #[error("operation interrupted by a signal")]
    Interrupted,
    #[error("encountered unexpected IO error: {0}")]
    IO(
        #[from]
        #[source]
        io::Error,
    ),
}

impl Error {
    /// Whether the failure is a transient would-block or signal-interruption condition rather
    /// than a hard failure. Transient operations are safe to retry as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::WouldBlock | Error::Interrupted)
    }

    pub(crate) fn from_os(errno: Errno) -> Error {
        match errno {
            Errno::EAGAIN => Error::WouldBlock,
            Errno::EINTR => Error::Interrupted,
            errno => Error::IO(errno.into()),
        }
    }
}

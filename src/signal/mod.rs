//! The [self] package handles turning a set of POSIX signals into a watchable descriptor via
//! `signalfd(2)`, so signal delivery can be consumed as an ordinary readiness source inside the
//! [crate::poll::Epoll] multiplexer.

use core::result;
use std::{
    io,
    mem::{size_of, MaybeUninit},
    os::fd::{AsRawFd, FromRawFd, RawFd},
};

use nix::{
    errno::Errno,
    libc,
    sys::signal::{sigprocmask, SigSet, SigmaskHow, Signal},
};
use thiserror::Error;

use crate::fd::FileDesc;

/// A helper type for wrapping a [result::Result] such that we can reduce noise in our signatures.
pub type Result<T> = result::Result<T, Error>;

/// An error representing a failure creating or reading the signal descriptor.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to create signalfd: {0}")]
    Create(#[source] io::Error),
    #[error("failed to adjust the signal mask: {0}")]
    Mask(#[source] io::Error),
    #[error("failed to read pending signal info: {0}")]
    Read(#[source] io::Error),
}

/// A [SignalFd] represents a managed descriptor that becomes readable exactly when a member of
/// its configured signal set is pending for the calling thread or process.
///
/// Creation blocks the configured signals for the calling thread (they must not be delivered
/// the default way while the descriptor exists) and opens the descriptor non-blocking, so
/// [SignalFd::read_info] can be used to drain after a readiness event without risk of
/// stalling.
pub struct SignalFd {
    fd: FileDesc,
    mask: SigSet,
}

impl SignalFd {
    /// Build a descriptor watching the given signals.
    pub fn new(signals: &[Signal]) -> Result<SignalFd> {
        let mut mask = SigSet::empty();
        for signal in signals {
            mask.add(*signal);
        }

        sigprocmask(SigmaskHow::SIG_BLOCK, Some(&mask), None)
            .map_err(|e| Error::Mask(e.into()))?;

        let raw = Errno::result(unsafe {
            libc::signalfd(
                -1,
                mask.as_ref(),
                libc::SFD_NONBLOCK | libc::SFD_CLOEXEC,
            )
        })
        .map_err(|e| Error::Create(e.into()))?;

        tracing::debug!(fd = raw, "created signalfd");
        Ok(SignalFd {
            fd: unsafe { FileDesc::from_raw_fd(raw) },
            mask,
        })
    }

    /// Drain one pending signal, or [None] when nothing is pending.
    pub fn read_info(&self) -> Result<Option<libc::signalfd_siginfo>> {
        let mut info = MaybeUninit::<libc::signalfd_siginfo>::uninit();

        let res = Errno::result(unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                info.as_mut_ptr() as *mut libc::c_void,
                size_of::<libc::signalfd_siginfo>(),
            )
        });

        match res {
            Ok(n) if n as usize == size_of::<libc::signalfd_siginfo>() => {
                Ok(Some(unsafe { info.assume_init() }))
            }
            Ok(_) => Err(Error::Read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short signalfd read",
            ))),
            Err(Errno::EAGAIN) => Ok(None),
            Err(e) => Err(Error::Read(e.into())),
        }
    }

    /// The signal set this descriptor watches.
    pub fn mask(&self) -> &SigSet {
        &self.mask
    }

    pub fn handle(&self) -> &FileDesc {
        &self.fd
    }

    pub fn handle_mut(&mut self) -> &mut FileDesc {
        &mut self.fd
    }
}

impl AsRawFd for SignalFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

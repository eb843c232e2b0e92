//! The [self] package handles readiness multiplexing: waiting on many file descriptors from a
//! single thread through one managed epoll instance.
//!
//! An [Epoll] is itself a managed handle wrapping the kernel epoll object. Watched descriptors
//! are registered with an [Interest] mask and identified from then on by the [Token] minted at
//! registration time; [Epoll::wait] reports [Event]s carrying that token plus the [Ready] set
//! of conditions that fired. The registry holds raw descriptor numbers keyed by token, never a
//! reference to the watched handle, so dropping a watched handle without deregistering it can
//! never leave an event pointing at freed memory; the stale registration simply stops firing.

mod error;
mod event;

pub use error::{Error, Result};
pub use event::{Event, Interest, Ready, Token};

use std::{
    os::fd::{AsRawFd, FromRawFd, RawFd},
    ptr,
};

use nix::{errno::Errno, libc};
use slab::Slab;

use crate::fd::FileDesc;

#[derive(Debug, Clone, Copy)]
struct Registration {
    fd: RawFd,
    interest: Interest,
}

/// An [Epoll] represents a managed kernel readiness-tracking object.
///
/// It does not create concurrency; it only collapses multiple blocking waits into one. The
/// instance is not internally synchronized and is meant to be driven from a single thread.
///
/// # Examples
///
/// ```no_run
/// use libfdio::net::{Ipv4Endpoint, Socket};
/// use libfdio::poll::{Epoll, Interest};
///
/// use nix::sys::socket::{AddressFamily, SockType};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Socket::new(AddressFamily::Inet, SockType::Stream, None)?;
/// server.bind(&Ipv4Endpoint::new([127, 0, 0, 1], 9000).into())?;
/// server.listen(5)?;
///
/// let mut epoll = Epoll::new()?;
/// let token = epoll.add(&server, Interest::READABLE)?;
///
/// loop {
///     for event in epoll.wait(24, -1)? {
///         if event.token() == token && event.is_readable() {
///             let _conn = server.accept()?;
///             // Hand the connection off, register it, etc.
///         }
///     }
/// }
/// # }
/// ```
pub struct Epoll {
    fd: FileDesc,
    registrations: Slab<Registration>,
}

impl Epoll {
    /// Create a new managed epoll instance.
    pub fn new() -> Result<Epoll> {
        let raw = Errno::result(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })
            .map_err(|e| Error::Create(e.into()))?;

        tracing::debug!(epoll = raw, "created epoll instance");
        Ok(Epoll {
            fd: unsafe { FileDesc::from_raw_fd(raw) },
            registrations: Slab::new(),
        })
    }

    /// Register `source` for the given interest set and mint a stable [Token] for the
    /// registration.
    ///
    /// Registering the same descriptor number twice fails with [Error::Register] backed by
    /// `EEXIST`; deregister the previous token first.
    pub fn add(&mut self, source: &impl AsRawFd, interest: Interest) -> Result<Token> {
        let fd = source.as_raw_fd();

        let entry = self.registrations.vacant_entry();
        let token = Token(entry.key());

        let mut ev = libc::epoll_event {
            events: interest.bits(),
            u64: token.0 as u64,
        };

        Errno::result(unsafe {
            libc::epoll_ctl(self.fd.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut ev)
        })
        .map_err(|e| Error::Register(e.into()))?;

        entry.insert(Registration { fd, interest });
        tracing::debug!(epoll = self.fd.as_raw_fd(), fd, token = token.0, "registered descriptor");
        Ok(token)
    }

    /// Deregister the registration identified by `token`, invalidating the token.
    ///
    /// Fails with [Error::NotRegistered] if the token is not live. A watched descriptor that
    /// was closed before removal is tolerated; the kernel has already dropped its side of the
    /// registration in that case.
    pub fn remove(&mut self, token: Token) -> Result<()> {
        let reg = self
            .registrations
            .try_remove(token.0)
            .ok_or(Error::NotRegistered)?;

        tracing::debug!(epoll = self.fd.as_raw_fd(), fd = reg.fd, token = token.0, "deregistered descriptor");

        match Errno::result(unsafe {
            libc::epoll_ctl(
                self.fd.as_raw_fd(),
                libc::EPOLL_CTL_DEL,
                reg.fd,
                ptr::null_mut(),
            )
        }) {
            Ok(_) => Ok(()),
            // The descriptor was closed while still registered; the kernel auto-deregistered.
            Err(Errno::ENOENT) | Err(Errno::EBADF) => Ok(()),
            Err(e) => Err(Error::Deregister(e.into())),
        }
    }

    /// Look up the descriptor and interest a live token refers to.
    pub fn registration(&self, token: Token) -> Option<(RawFd, Interest)> {
        self.registrations
            .get(token.0)
            .map(|reg| (reg.fd, reg.interest))
    }

    /// Block until at least one registered descriptor becomes ready, `max_events` events have
    /// been collected, or `timeout_ms` milliseconds elapse (`-1` waits forever).
    ///
    /// Interruption by a signal is benign: the call succeeds with zero events and the caller is
    /// expected to re-wait. Genuine failure is reported as [Error::Wait]. Events whose
    /// registration was removed between the kernel report and this call returning are dropped.
    pub fn wait(&mut self, max_events: usize, timeout_ms: i32) -> Result<Vec<Event>> {
        if max_events == 0 {
            return Ok(Vec::new());
        }

        let mut raw: Vec<libc::epoll_event> = Vec::with_capacity(max_events);

        let count = unsafe {
            libc::epoll_wait(
                self.fd.as_raw_fd(),
                raw.as_mut_ptr(),
                max_events as libc::c_int,
                timeout_ms,
            )
        };

        if count < 0 {
            return match Errno::last() {
                Errno::EINTR => Ok(Vec::new()),
                e => Err(Error::Wait(e.into())),
            };
        }

        unsafe { raw.set_len(count as usize) };
        tracing::trace!(epoll = self.fd.as_raw_fd(), count, "readiness events collected");

        let events = raw
            .iter()
            .filter(|ev| self.registrations.contains(ev.u64 as usize))
            .map(|ev| Event {
                token: Token(ev.u64 as usize),
                ready: Ready::from_raw(ev.events),
            })
            .collect();
        Ok(events)
    }

    /// Access the underlying managed handle, e.g. to watch the multiplexer itself.
    pub fn handle(&self) -> &FileDesc {
        &self.fd
    }
}

impl AsRawFd for Epoll {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

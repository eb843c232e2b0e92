use std::ops::{BitOr, BitOrAssign};

use nix::sys::epoll::EpollFlags;

/// An [Interest] describes which readiness conditions a registration should report, together
/// with the delivery modifiers controlling how the registration re-fires.
///
/// Interests combine with `|`:
///
/// ```
/// use libfdio::poll::Interest;
///
/// let interest = Interest::READABLE | Interest::EDGE_TRIGGERED;
/// assert!(interest.contains(Interest::READABLE));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(EpollFlags);

impl Interest {
    /// The registered handle has data available to read.
    pub const READABLE: Interest = Interest(EpollFlags::EPOLLIN);
    /// The registered handle can accept writes without blocking.
    pub const WRITABLE: Interest = Interest(EpollFlags::EPOLLOUT);
    /// Urgent out-of-band data is available.
    pub const PRIORITY: Interest = Interest(EpollFlags::EPOLLPRI);
    /// An error condition occurred on the handle. Always reported, listed for completeness.
    pub const ERROR: Interest = Interest(EpollFlags::EPOLLERR);
    /// The peer hung up. Always reported, listed for completeness.
    pub const HANGUP: Interest = Interest(EpollFlags::EPOLLHUP);
    /// The peer shut down the writing half of a stream connection.
    pub const READ_HANGUP: Interest = Interest(EpollFlags::EPOLLRDHUP);
    /// Report state transitions rather than levels.
    pub const EDGE_TRIGGERED: Interest = Interest(EpollFlags::EPOLLET);
    /// Disarm the registration after its first event; re-arming requires re-adding.
    pub const ONESHOT: Interest = Interest(EpollFlags::EPOLLONESHOT);
    /// Prevent system suspend while an event from this registration is pending.
    pub const WAKEUP: Interest = Interest(EpollFlags::EPOLLWAKEUP);

    /// Whether every bit of `other` is present in this interest set.
    pub fn contains(&self, other: Interest) -> bool {
        self.0.contains(other.0)
    }

    pub(crate) fn bits(&self) -> u32 {
        self.0.bits() as u32
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        self.0 |= rhs.0;
    }
}

/// A [Ready] is the set of conditions that actually fired for a registration, as reported by a
/// single [super::Epoll::wait] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready(EpollFlags);

impl Ready {
    pub(crate) fn from_raw(bits: u32) -> Ready {
        Ready(EpollFlags::from_bits_truncate(bits as i32))
    }

    pub fn is_readable(&self) -> bool {
        self.0
            .intersects(EpollFlags::EPOLLIN | EpollFlags::EPOLLPRI)
    }

    pub fn is_writable(&self) -> bool {
        self.0.contains(EpollFlags::EPOLLOUT)
    }

    pub fn is_error(&self) -> bool {
        self.0.contains(EpollFlags::EPOLLERR)
    }

    pub fn is_hangup(&self) -> bool {
        self.0.contains(EpollFlags::EPOLLHUP)
    }

    pub fn is_read_hangup(&self) -> bool {
        self.0.contains(EpollFlags::EPOLLRDHUP)
    }
}

/// A [Token] is the stable key minted by [super::Epoll::add] for one registration. Events refer
/// back to their registration through the token rather than through a reference to the watched
/// handle, so a token can never dangle; at worst it goes stale and stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub(crate) usize);

/// An [Event] pairs the conditions that fired with the [Token] of the registration that
/// triggered them. It owns nothing and borrows nothing; resolve the token against the
/// originating [super::Epoll] to recover the watched descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub(crate) token: Token,
    pub(crate) ready: Ready,
}

impl Event {
    /// The registration this event fired for.
    pub fn token(&self) -> Token {
        self.token
    }

    /// The full set of fired conditions.
    pub fn ready(&self) -> Ready {
        self.ready
    }

    pub fn is_readable(&self) -> bool {
        self.ready.is_readable()
    }

    pub fn is_writable(&self) -> bool {
        self.ready.is_writable()
    }

    pub fn is_error(&self) -> bool {
        self.ready.is_error()
    }

    pub fn is_hangup(&self) -> bool {
        self.ready.is_hangup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_combination() {
        let interest = Interest::READABLE | Interest::WRITABLE | Interest::ONESHOT;
        assert!(interest.contains(Interest::READABLE));
        assert!(interest.contains(Interest::WRITABLE));
        assert!(interest.contains(Interest::ONESHOT));
        assert!(!interest.contains(Interest::EDGE_TRIGGERED));
    }

    #[test]
    fn test_ready_accessors() {
        let ready = Ready::from_raw(Interest::READABLE.bits() | Interest::HANGUP.bits());
        assert!(ready.is_readable());
        assert!(ready.is_hangup());
        assert!(!ready.is_writable());
        assert!(!ready.is_error());
    }
}

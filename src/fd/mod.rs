//! The [self] package handles exclusive ownership of native file descriptors. Every other
//! managed resource in this crate, sockets, the epoll multiplexer, signal descriptors, and
//! regular files alike, is built on top of a [FileDesc].

use std::{
    io,
    os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd},
};

use nix::{errno::Errno, libc};

/// A [FileDesc] represents exclusive ownership of a single native file descriptor. The wrapped
/// descriptor is released exactly once, either on drop or via an explicit [FileDesc::close],
/// whichever comes first. A closed or moved-from descriptor reports `-1` from
/// [AsRawFd::as_raw_fd] and `false` from [FileDesc::valid].
///
/// [FileDesc] deliberately does not implement [Clone]; duplicating the underlying OS resource
/// is an explicit, fallible operation via [FileDesc::duplicate].
#[derive(Debug)]
pub struct FileDesc {
    inner: Option<OwnedFd>,
}

impl FileDesc {
    /// Wrap an already-owned descriptor.
    pub fn from_owned(fd: OwnedFd) -> FileDesc {
        FileDesc { inner: Some(fd) }
    }

    /// Create an OS-level duplicate of this descriptor.
    ///
    /// The returned [FileDesc] refers to the same open file description but owns an
    /// independent descriptor number; closing either side leaves the other fully usable.
    pub fn duplicate(&self) -> io::Result<FileDesc> {
        let fd = self.owned()?.try_clone()?;
        Ok(FileDesc::from_owned(fd))
    }

    /// Perform a single, possibly blocking, `read(2)` into `buf`.
    ///
    /// Partial reads are not retried; callers that need an exact byte count must loop.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = Errno::result(unsafe {
            libc::read(
                self.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        })?;
        Ok(n as usize)
    }

    /// Perform a single, possibly blocking, `write(2)` from `buf`.
    ///
    /// Partial writes are not retried; callers that need an exact byte count must loop.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let n = Errno::result(unsafe {
            libc::write(
                self.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
            )
        })?;
        Ok(n as usize)
    }

    /// Release the underlying descriptor. A no-op if this handle is already invalid, so an
    /// explicit close followed by drop never releases twice.
    pub fn close(&mut self) {
        if let Some(fd) = self.inner.take() {
            tracing::trace!(fd = fd.as_raw_fd(), "closing file descriptor");
            drop(fd);
        }
    }

    /// Whether this handle still owns a live descriptor.
    pub fn valid(&self) -> bool {
        self.inner.is_some()
    }

    pub(crate) fn owned(&self) -> io::Result<&OwnedFd> {
        self.inner
            .as_ref()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }
}

impl AsRawFd for FileDesc {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_ref().map(AsRawFd::as_raw_fd).unwrap_or(-1)
    }
}

impl From<OwnedFd> for FileDesc {
    fn from(fd: OwnedFd) -> FileDesc {
        FileDesc::from_owned(fd)
    }
}

impl FromRawFd for FileDesc {
    /// Assume exclusive ownership of `fd`.
    ///
    /// # Safety
    ///
    /// The descriptor must be open and owned by nothing else; it will be closed when the
    /// returned [FileDesc] is dropped or closed.
    unsafe fn from_raw_fd(fd: RawFd) -> FileDesc {
        FileDesc::from_owned(OwnedFd::from_raw_fd(fd))
    }
}

impl IntoRawFd for FileDesc {
    /// Relinquish ownership of the descriptor without closing it.
    fn into_raw_fd(mut self) -> RawFd {
        match self.inner.take() {
            Some(fd) => fd.into_raw_fd(),
            None => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe_pair() -> (FileDesc, FileDesc) {
        let mut fds = [0 as RawFd; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        unsafe { (FileDesc::from_raw_fd(fds[0]), FileDesc::from_raw_fd(fds[1])) }
    }

    #[test]
    fn test_read_write_roundtrip() {
        let (rd, wr) = pipe_pair();

        let written = wr.write(b"hello").unwrap();
        assert_eq!(written, 5);

        let mut buf = [0u8; 16];
        let read = rd.read(&mut buf).unwrap();
        assert_eq!(&buf[..read], b"hello");
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut rd, _wr) = pipe_pair();
        assert!(rd.valid());

        rd.close();
        assert!(!rd.valid());
        assert_eq!(rd.as_raw_fd(), -1);

        // Close again; must not release a second time or panic.
        rd.close();
        assert!(!rd.valid());
    }

    #[test]
    fn test_read_after_close_fails() {
        let (mut rd, _wr) = pipe_pair();
        rd.close();

        let mut buf = [0u8; 4];
        let err = rd.read(&mut buf).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_duplicate_is_independent() {
        let (rd, wr) = pipe_pair();

        let mut dup = wr.duplicate().unwrap();
        assert_ne!(dup.as_raw_fd(), wr.as_raw_fd());
        assert!(dup.valid());

        // Closing the duplicate must not affect the original.
        dup.close();
        wr.write(b"ping").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(rd.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn test_move_preserves_descriptor() {
        let (rd, _wr) = pipe_pair();
        let raw = rd.as_raw_fd();

        let moved = rd;
        assert_eq!(moved.as_raw_fd(), raw);
        assert!(moved.valid());
    }
}

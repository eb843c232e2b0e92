//! The [self] package handles opening regular files as managed, watchable handles, translating
//! a portable open-mode bit set into the native `O_*` flags.

use core::result;
use std::{
    ffi::CString,
    io,
    ops::{BitOr, BitOrAssign},
    os::fd::{AsRawFd, FromRawFd, RawFd},
    os::unix::ffi::OsStrExt,
    path::Path,
};

use nix::{errno::Errno, libc};
use thiserror::Error;

use crate::fd::FileDesc;

/// A helper type for wrapping a [result::Result] such that we can reduce noise in our signatures.
pub type Result<T> = result::Result<T, Error>;

/// An error representing a failure opening or operating on a regular file.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open file: {0}")]
    Open(#[source] io::Error),
    #[error("open mode must include read or write access")]
    InvalidMode,
    #[error("path contains an interior nul byte")]
    InvalidPath,
    #[error("encountered unexpected IO error: {0}")]
    IO(
        #[from]
        #[source]
        io::Error,
    ),
}

/// An [OpenMode] is the set of access and creation behaviors to open a file with. Modes
/// combine with `|`; at least one of [OpenMode::READ] and [OpenMode::WRITE] is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode(u32);

impl OpenMode {
    pub const READ: OpenMode = OpenMode(1 << 0);
    pub const WRITE: OpenMode = OpenMode(1 << 1);
    pub const CREATE: OpenMode = OpenMode(1 << 2);
    pub const TRUNCATE: OpenMode = OpenMode(1 << 3);
    pub const SYNC: OpenMode = OpenMode(1 << 4);
    pub const NO_CTTY: OpenMode = OpenMode(1 << 5);

    pub fn contains(&self, other: OpenMode) -> bool {
        self.0 & other.0 == other.0
    }

    fn native_flags(&self) -> Result<libc::c_int> {
        let mut flags = if self.contains(OpenMode::READ) {
            if self.contains(OpenMode::WRITE) {
                libc::O_RDWR
            } else {
                libc::O_RDONLY
            }
        } else if self.contains(OpenMode::WRITE) {
            libc::O_WRONLY
        } else {
            return Err(Error::InvalidMode);
        };

        if self.contains(OpenMode::CREATE) {
            flags |= libc::O_CREAT;
        }
        if self.contains(OpenMode::TRUNCATE) {
            flags |= libc::O_TRUNC;
        }
        if self.contains(OpenMode::SYNC) {
            flags |= libc::O_SYNC;
        }
        if self.contains(OpenMode::NO_CTTY) {
            flags |= libc::O_NOCTTY;
        }
        Ok(flags)
    }
}

impl BitOr for OpenMode {
    type Output = OpenMode;

    fn bitor(self, rhs: OpenMode) -> OpenMode {
        OpenMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenMode {
    fn bitor_assign(&mut self, rhs: OpenMode) {
        self.0 |= rhs.0;
    }
}

/// A [RegularFile] represents a managed handle to an opened regular file or device node.
#[derive(Debug)]
pub struct RegularFile {
    fd: FileDesc,
}

impl RegularFile {
    /// Open `path` with the given mode. Files created via [OpenMode::CREATE] get mode `0666`
    /// as filtered by the process umask.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<RegularFile> {
        let flags = mode.native_flags()?;
        let c_path = CString::new(path.as_ref().as_os_str().as_bytes())
            .map_err(|_| Error::InvalidPath)?;

        let raw = Errno::result(unsafe {
            libc::open(c_path.as_ptr(), flags, 0o666 as libc::c_uint)
        })
        .map_err(|e| Error::Open(e.into()))?;

        tracing::debug!(fd = raw, path = %path.as_ref().display(), "opened file");
        Ok(RegularFile {
            fd: unsafe { FileDesc::from_raw_fd(raw) },
        })
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.fd.read(buf)?)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        Ok(self.fd.write(buf)?)
    }

    pub fn handle(&self) -> &FileDesc {
        &self.fd
    }

    pub fn handle_mut(&mut self) -> &mut FileDesc {
        &mut self.fd
    }
}

impl AsRawFd for RegularFile {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.txt");

        let file = RegularFile::open(&path, OpenMode::WRITE | OpenMode::CREATE).unwrap();
        assert_eq!(file.write(b"persisted").unwrap(), 9);
        drop(file);

        let file = RegularFile::open(&path, OpenMode::READ).unwrap();
        let mut buf = [0u8; 32];
        let read = file.read(&mut buf).unwrap();
        assert_eq!(&buf[..read], b"persisted");
    }

    #[test]
    fn test_truncate_discards_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.txt");

        let file = RegularFile::open(&path, OpenMode::WRITE | OpenMode::CREATE).unwrap();
        file.write(b"previous contents").unwrap();
        drop(file);

        let file =
            RegularFile::open(&path, OpenMode::WRITE | OpenMode::TRUNCATE).unwrap();
        file.write(b"x").unwrap();
        drop(file);

        let file = RegularFile::open(&path, OpenMode::READ).unwrap();
        let mut buf = [0u8; 32];
        assert_eq!(file.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'x');
    }

    #[test]
    fn test_mode_without_access_is_invalid() {
        let err = RegularFile::open("/tmp/never-created", OpenMode::CREATE).unwrap_err();
        assert!(matches!(err, Error::InvalidMode));
    }

    #[test]
    fn test_missing_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            RegularFile::open(dir.path().join("absent"), OpenMode::READ).unwrap_err();
        assert!(matches!(err, Error::Open(_)));
    }
}

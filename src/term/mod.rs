//! The [self] package handles raw-mode serial terminal configuration: opening a terminal
//! device as a managed handle and applying line speed and framing settings through termios.

use core::result;
use std::{io, os::fd::{AsRawFd, RawFd}, path::Path};

use nix::sys::termios::{
    self, ControlFlags, SetArg, SpecialCharacterIndices, Termios,
};
use thiserror::Error;

pub use nix::sys::termios::BaudRate;

use crate::{
    fd::FileDesc,
    fs::{OpenMode, RegularFile},
};

/// A helper type for wrapping a [result::Result] such that we can reduce noise in our signatures.
pub type Result<T> = result::Result<T, Error>;

/// An error representing a failure opening or configuring a terminal device.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open terminal device: {0}")]
    Open(#[from] crate::fs::Error),
    #[error("failed to configure terminal attributes: {0}")]
    Attributes(#[source] io::Error),
    #[error("encountered unexpected IO error: {0}")]
    IO(#[source] io::Error),
}

/// Number of data bits per character frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

/// Parity bit configuration for the character frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits terminating the character frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

fn char_size(bits: DataBits) -> ControlFlags {
    match bits {
        DataBits::Five => ControlFlags::CS5,
        DataBits::Six => ControlFlags::CS6,
        DataBits::Seven => ControlFlags::CS7,
        DataBits::Eight => ControlFlags::CS8,
    }
}

fn parity_flags(parity: Parity) -> ControlFlags {
    match parity {
        Parity::None => ControlFlags::empty(),
        Parity::Even => ControlFlags::PARENB,
        Parity::Odd => ControlFlags::PARENB | ControlFlags::PARODD,
    }
}

/// A [Tty] represents a terminal device opened in raw mode with a fixed line configuration.
/// The handle is watchable like any other; reads return whatever bytes have arrived within
/// the configured inter-byte timeout.
pub struct Tty {
    file: RegularFile,
    speed: BaudRate,
    data_bits: DataBits,
    parity: Parity,
    stop_bits: StopBits,
}

impl Tty {
    /// Open `device` read-write without becoming its controlling terminal, and apply the given
    /// raw-mode line configuration.
    pub fn open(
        device: impl AsRef<Path>,
        speed: BaudRate,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
    ) -> Result<Tty> {
        let file = RegularFile::open(
            device,
            OpenMode::READ | OpenMode::WRITE | OpenMode::NO_CTTY | OpenMode::SYNC,
        )?;

        let tty = Tty {
            file,
            speed,
            data_bits,
            parity,
            stop_bits,
        };
        tty.sync_settings()?;
        Ok(tty)
    }

    fn sync_settings(&self) -> Result<()> {
        let fd = self.file.handle().owned().map_err(Error::Attributes)?;

        let mut t: Termios = termios::tcgetattr(fd).map_err(|e| Error::Attributes(e.into()))?;

        termios::cfmakeraw(&mut t);
        termios::cfsetispeed(&mut t, self.speed).map_err(|e| Error::Attributes(e.into()))?;
        termios::cfsetospeed(&mut t, self.speed).map_err(|e| Error::Attributes(e.into()))?;

        t.control_flags &= !ControlFlags::CSIZE;
        t.control_flags |= char_size(self.data_bits);

        t.control_flags &= !(ControlFlags::PARENB | ControlFlags::PARODD);
        t.control_flags |= parity_flags(self.parity);

        t.control_flags &= !ControlFlags::CSTOPB;
        if self.stop_bits == StopBits::Two {
            t.control_flags |= ControlFlags::CSTOPB;
        }

        t.control_flags &= !ControlFlags::CRTSCTS;
        t.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;

        // Return reads after a half-second lull rather than byte-by-byte.
        t.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        t.control_chars[SpecialCharacterIndices::VTIME as usize] = 5;

        termios::tcsetattr(fd, SetArg::TCSANOW, &t).map_err(|e| Error::Attributes(e.into()))
    }

    /// Block until all written output has been transmitted.
    pub fn drain(&self) -> Result<()> {
        let fd = self.file.handle().owned().map_err(Error::Attributes)?;
        termios::tcdrain(fd).map_err(|e| Error::Attributes(e.into()))
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.file.handle().read(buf).map_err(Error::IO)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.file.handle().write(buf).map_err(Error::IO)
    }

    pub fn speed(&self) -> BaudRate {
        self.speed
    }

    pub fn handle(&self) -> &FileDesc {
        self.file.handle()
    }
}

impl AsRawFd for Tty {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_size_mapping() {
        assert_eq!(char_size(DataBits::Five), ControlFlags::CS5);
        assert_eq!(char_size(DataBits::Eight), ControlFlags::CS8);
    }

    #[test]
    fn test_parity_mapping() {
        assert_eq!(parity_flags(Parity::None), ControlFlags::empty());
        assert_eq!(parity_flags(Parity::Even), ControlFlags::PARENB);
        assert_eq!(
            parity_flags(Parity::Odd),
            ControlFlags::PARENB | ControlFlags::PARODD
        );
    }
}

use std::os::fd::{AsRawFd, FromRawFd, RawFd};

use nix::{errno::Errno, libc};

use crate::fd::FileDesc;

use super::{Error, Result};

const TUN_DEVICE: &[u8] = b"/dev/net/tun\0";

/// Whether the allocated device operates at the IP layer (tun) or the ethernet layer (tap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunTapMode {
    Tun,
    Tap,
}

/// Interface request block for `TUNSETIFF`; only the name and flags members are used, the
/// remainder pads the struct out to the kernel's `struct ifreq` size.
#[repr(C)]
struct IfReq {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_flags: libc::c_short,
    pad: [u8; 22],
}

fn mode_flags(mode: TunTapMode) -> libc::c_short {
    let base = match mode {
        TunTapMode::Tun => libc::IFF_TUN,
        TunTapMode::Tap => libc::IFF_TAP,
    };
    (base | libc::IFF_NO_PI) as libc::c_short
}

/// A [TunTap] represents an allocated tun/tap network device, exposed as a watchable handle.
/// Reads yield packets (tun) or frames (tap) routed to the device; writes inject them.
pub struct TunTap {
    fd: FileDesc,
    mode: TunTapMode,
    name: String,
}

impl TunTap {
    /// Allocate a new tun/tap device. `name` requests a specific interface name; pass [None]
    /// to let the kernel pick one. The realized name is available via [TunTap::name].
    pub fn new(mode: TunTapMode, name: Option<&str>) -> Result<TunTap> {
        let raw = Errno::result(unsafe {
            libc::open(TUN_DEVICE.as_ptr() as *const libc::c_char, libc::O_RDWR)
        })
        .map_err(|e| Error::Create(e.into()))?;
        let fd = unsafe { FileDesc::from_raw_fd(raw) };

        let mut ifr = IfReq {
            ifr_name: [0; libc::IFNAMSIZ],
            ifr_flags: mode_flags(mode),
            pad: [0; 22],
        };

        if let Some(name) = name {
            if name.len() >= libc::IFNAMSIZ {
                return Err(Error::DeviceNameTooLong(name.into()));
            }
            for (dst, src) in ifr.ifr_name.iter_mut().zip(name.as_bytes()) {
                *dst = *src as libc::c_char;
            }
        }

        Errno::result(unsafe {
            libc::ioctl(fd.as_raw_fd(), libc::TUNSETIFF, &mut ifr as *mut IfReq)
        })
        .map_err(|e| Error::Create(e.into()))?;

        let name = ifr
            .ifr_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8 as char)
            .collect::<String>();

        tracing::debug!(fd = fd.as_raw_fd(), %name, ?mode, "allocated tun/tap device");
        Ok(TunTap { fd, mode, name })
    }

    /// The realized interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> TunTapMode {
        self.mode
    }

    pub fn handle(&self) -> &FileDesc {
        &self.fd
    }

    pub fn handle_mut(&mut self) -> &mut FileDesc {
        &mut self.fd
    }
}

impl AsRawFd for TunTap {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

use std::mem::{size_of, zeroed};

use nix::libc;

/// The L2CAP socket address block. Not modeled by libc, so laid out here to match
/// `<bluetooth/l2cap.h>`: family, protocol/service multiplexer (little-endian per the
/// bluetooth byte order), device address, then channel id and address type (unused here).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct SockaddrL2 {
    pub(crate) l2_family: libc::sa_family_t,
    pub(crate) l2_psm: u16,
    pub(crate) l2_bdaddr: [u8; 6],
    pub(crate) l2_cid: u16,
    pub(crate) l2_bdaddr_type: u8,
}

#[repr(C)]
pub(crate) union RawSockaddr {
    pub(crate) v4: libc::sockaddr_in,
    pub(crate) unix: libc::sockaddr_un,
    pub(crate) l2: SockaddrL2,
    pub(crate) storage: libc::sockaddr_storage,
}

/// A [NativeAddr] is the owned OS wire-format representation of an
/// [Endpoint](super::Endpoint): one of the family-specific `sockaddr` blocks plus its length.
///
/// Values are produced by [Endpoint::to_native](super::Endpoint::to_native) for outbound
/// addressing, or filled in by the kernel (accept, recvfrom, getsockname) and then decoded via
/// [Endpoint::from_native](super::Endpoint::from_native). Being an owned value there is no
/// separate release step.
pub struct NativeAddr {
    addr: RawSockaddr,
    len: libc::socklen_t,
}

impl NativeAddr {
    /// A zeroed, maximum-capacity block for the kernel to fill in.
    pub(crate) fn zeroed() -> NativeAddr {
        NativeAddr {
            addr: unsafe { zeroed() },
            len: size_of::<libc::sockaddr_storage>() as libc::socklen_t,
        }
    }

    pub(crate) fn from_v4(sa: libc::sockaddr_in) -> NativeAddr {
        NativeAddr {
            addr: RawSockaddr { v4: sa },
            len: size_of::<libc::sockaddr_in>() as libc::socklen_t,
        }
    }

    pub(crate) fn from_unix(sa: libc::sockaddr_un, len: libc::socklen_t) -> NativeAddr {
        NativeAddr {
            addr: RawSockaddr { unix: sa },
            len,
        }
    }

    pub(crate) fn from_l2(sa: SockaddrL2) -> NativeAddr {
        NativeAddr {
            addr: RawSockaddr { l2: sa },
            len: size_of::<SockaddrL2>() as libc::socklen_t,
        }
    }

    /// The address family tag embedded in the first bytes of the block.
    pub fn family(&self) -> u16 {
        unsafe { self.addr.storage.ss_family }
    }

    /// The length of the populated portion of the block.
    pub fn len(&self) -> libc::socklen_t {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn raw(&self) -> &RawSockaddr {
        &self.addr
    }

    pub(crate) fn as_ptr(&self) -> *const libc::sockaddr {
        &self.addr as *const _ as *const libc::sockaddr
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut libc::sockaddr {
        &mut self.addr as *mut _ as *mut libc::sockaddr
    }

    pub(crate) fn len_mut(&mut self) -> &mut libc::socklen_t {
        &mut self.len
    }
}

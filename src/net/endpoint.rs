use std::{
    fmt,
    mem::{size_of, zeroed},
    net::Ipv4Addr,
    os::unix::ffi::{OsStrExt, OsStringExt},
    path::{Path, PathBuf},
    str::FromStr,
};

use nix::{libc, sys::socket::AddressFamily};

use super::{
    addr::{NativeAddr, SockaddrL2},
    Error, Result,
};

/// A 6-byte bluetooth device address, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    pub const fn new(octets: [u8; 6]) -> BdAddr {
        BdAddr(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// The wildcard address (`00:00:00:00:00:00`), matching any local adapter.
    pub const fn any() -> BdAddr {
        BdAddr([0x00; 6])
    }

    /// The broadcast address (`ff:ff:ff:ff:ff:ff`).
    pub const fn all() -> BdAddr {
        BdAddr([0xff; 6])
    }

    /// The local loopback adapter address (`00:00:00:ff:ff:ff`).
    pub const fn local() -> BdAddr {
        BdAddr([0x00, 0x00, 0x00, 0xff, 0xff, 0xff])
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for BdAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<BdAddr> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| Error::InvalidAddress(s.into()))?;
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| Error::InvalidAddress(s.into()))?;
        }

        if parts.next().is_some() {
            return Err(Error::InvalidAddress(s.into()));
        }
        Ok(BdAddr(octets))
    }
}

/// An IPv4 addressable peer: a 32-bit host address plus a 16-bit port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ipv4Endpoint {
    addr: Ipv4Addr,
    port: u16,
}

impl Ipv4Endpoint {
    pub fn new(addr: impl Into<Ipv4Addr>, port: u16) -> Ipv4Endpoint {
        Ipv4Endpoint {
            addr: addr.into(),
            port,
        }
    }

    pub fn address(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Ipv4Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// A unix-domain addressable peer: a filesystem path. An empty path denotes an unnamed
/// (unbound) peer, as reported by the kernel for anonymous clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnixEndpoint {
    path: PathBuf,
}

impl UnixEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> UnixEndpoint {
        UnixEndpoint { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for UnixEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// A bluetooth L2CAP addressable peer: a device address plus a protocol/service multiplexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct L2capEndpoint {
    addr: BdAddr,
    psm: u16,
}

impl L2capEndpoint {
    pub fn new(addr: BdAddr, psm: u16) -> L2capEndpoint {
        L2capEndpoint { addr, psm }
    }

    pub fn address(&self) -> BdAddr {
        self.addr
    }

    pub fn psm(&self) -> u16 {
        self.psm
    }
}

impl fmt::Display for L2capEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.psm)
    }
}

/// An [Endpoint] is one addressable peer out of the closed set of supported address families.
/// Both translation directions are exhaustive over the set: every variant can materialize its
/// native wire-format block via [Endpoint::to_native], and [Endpoint::from_native] decodes
/// every variant back, rejecting unrecognized family tags with a structured error.
///
/// Endpoints are immutable once constructed. They are either supplied by the caller (bind,
/// connect, send_to) or derived from a kernel-filled address block (accept, recv_from).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Ipv4(Ipv4Endpoint),
    Unix(UnixEndpoint),
    L2cap(L2capEndpoint),
}

impl Endpoint {
    /// The address family this endpoint belongs to.
    pub fn family(&self) -> AddressFamily {
        match self {
            Endpoint::Ipv4(_) => AddressFamily::Inet,
            Endpoint::Unix(_) => AddressFamily::Unix,
            Endpoint::L2cap(_) => AddressFamily::Bluetooth,
        }
    }

    /// Build the native wire-format address block for this endpoint.
    pub fn to_native(&self) -> Result<NativeAddr> {
        match self {
            Endpoint::Ipv4(ep) => {
                let sa = libc::sockaddr_in {
                    sin_family: libc::AF_INET as libc::sa_family_t,
                    sin_port: ep.port.to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: u32::from_ne_bytes(ep.addr.octets()),
                    },
                    sin_zero: [0u8; 8],
                };
                Ok(NativeAddr::from_v4(sa))
            }
            Endpoint::Unix(ep) => {
                let bytes = ep.path.as_os_str().as_bytes();

                let mut sa: libc::sockaddr_un = unsafe { zeroed() };
                if bytes.len() >= sa.sun_path.len() {
                    return Err(Error::PathTooLong(ep.path.clone()));
                }

                sa.sun_family = libc::AF_UNIX as libc::sa_family_t;
                for (dst, src) in sa.sun_path.iter_mut().zip(bytes) {
                    *dst = *src as libc::c_char;
                }

                // An empty path is an unnamed address and carries only the family tag.
                let len = match bytes.len() {
                    0 => size_of::<libc::sa_family_t>(),
                    n => size_of::<libc::sa_family_t>() + n + 1,
                };
                Ok(NativeAddr::from_unix(sa, len as libc::socklen_t))
            }
            Endpoint::L2cap(ep) => {
                let sa = SockaddrL2 {
                    l2_family: libc::AF_BLUETOOTH as libc::sa_family_t,
                    l2_psm: ep.psm.to_le(),
                    l2_bdaddr: ep.addr.octets(),
                    l2_cid: 0,
                    l2_bdaddr_type: 0,
                };
                Ok(NativeAddr::from_l2(sa))
            }
        }
    }

    /// Decode a native address block back into the matching endpoint variant.
    ///
    /// This is the single dispatch point for every kernel-produced address; a family tag
    /// outside the closed set fails with [Error::UnknownFamily].
    pub fn from_native(addr: &NativeAddr) -> Result<Endpoint> {
        match addr.family() as libc::c_int {
            libc::AF_INET => {
                let sa = unsafe { addr.raw().v4 };
                let ep = Ipv4Endpoint::new(
                    Ipv4Addr::from(sa.sin_addr.s_addr.to_ne_bytes()),
                    u16::from_be(sa.sin_port),
                );
                Ok(Endpoint::Ipv4(ep))
            }
            libc::AF_UNIX => {
                let sa = unsafe { &addr.raw().unix };

                let offset = size_of::<libc::sa_family_t>();
                let max = (addr.len() as usize)
                    .saturating_sub(offset)
                    .min(sa.sun_path.len());
                let bytes: Vec<u8> = sa.sun_path[..max]
                    .iter()
                    .take_while(|&&c| c != 0)
                    .map(|&c| c as u8)
                    .collect();

                let path = PathBuf::from(std::ffi::OsString::from_vec(bytes));
                Ok(Endpoint::Unix(UnixEndpoint::new(path)))
            }
            libc::AF_BLUETOOTH => {
                let sa = unsafe { addr.raw().l2 };
                let ep = L2capEndpoint::new(BdAddr::new(sa.l2_bdaddr), u16::from_le(sa.l2_psm));
                Ok(Endpoint::L2cap(ep))
            }
            other => Err(Error::UnknownFamily(other as u16)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ipv4(ep) => ep.fmt(f),
            Endpoint::Unix(ep) => ep.fmt(f),
            Endpoint::L2cap(ep) => ep.fmt(f),
        }
    }
}

impl From<Ipv4Endpoint> for Endpoint {
    fn from(ep: Ipv4Endpoint) -> Endpoint {
        Endpoint::Ipv4(ep)
    }
}

impl From<UnixEndpoint> for Endpoint {
    fn from(ep: UnixEndpoint) -> Endpoint {
        Endpoint::Unix(ep)
    }
}

impl From<L2capEndpoint> for Endpoint {
    fn from(ep: L2capEndpoint) -> Endpoint {
        Endpoint::L2cap(ep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_native_roundtrip() {
        let ep: Endpoint = Ipv4Endpoint::new([192, 168, 7, 41], 9000).into();

        let native = ep.to_native().unwrap();
        assert_eq!(native.family(), libc::AF_INET as u16);

        let decoded = Endpoint::from_native(&native).unwrap();
        assert_eq!(decoded, ep);
        assert_eq!(decoded.family(), AddressFamily::Inet);
    }

    #[test]
    fn test_unix_native_roundtrip() {
        let ep: Endpoint = UnixEndpoint::new("/tmp/fdio-test.sock").into();

        let native = ep.to_native().unwrap();
        assert_eq!(native.family(), libc::AF_UNIX as u16);

        let decoded = Endpoint::from_native(&native).unwrap();
        assert_eq!(decoded, ep);
        assert_eq!(decoded.family(), AddressFamily::Unix);
    }

    #[test]
    fn test_l2cap_native_roundtrip() {
        let addr: BdAddr = "01:23:45:67:89:ab".parse().unwrap();
        let ep: Endpoint = L2capEndpoint::new(addr, 0x1001).into();

        let native = ep.to_native().unwrap();
        assert_eq!(native.family(), libc::AF_BLUETOOTH as u16);

        let decoded = Endpoint::from_native(&native).unwrap();
        assert_eq!(decoded, ep);
        assert_eq!(decoded.family(), AddressFamily::Bluetooth);
    }

    #[test]
    fn test_unknown_family_is_rejected() {
        let native = NativeAddr::zeroed();
        assert!(matches!(
            Endpoint::from_native(&native),
            Err(Error::UnknownFamily(0))
        ));
    }

    #[test]
    fn test_unix_path_too_long() {
        let path = format!("/tmp/{}", "x".repeat(200));
        let ep: Endpoint = UnixEndpoint::new(path).into();
        assert!(matches!(ep.to_native(), Err(Error::PathTooLong(_))));
    }

    #[test]
    fn test_bdaddr_display_and_parse() {
        let addr = BdAddr::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x42]);
        assert_eq!(addr.to_string(), "de:ad:be:ef:00:42");
        assert_eq!("de:ad:be:ef:00:42".parse::<BdAddr>().unwrap(), addr);

        assert!("de:ad:be:ef:00".parse::<BdAddr>().is_err());
        assert!("de:ad:be:ef:00:42:17".parse::<BdAddr>().is_err());
        assert!("zz:ad:be:ef:00:42".parse::<BdAddr>().is_err());
    }

    #[test]
    fn test_bdaddr_well_known() {
        assert_eq!(BdAddr::any().to_string(), "00:00:00:00:00:00");
        assert_eq!(BdAddr::all().to_string(), "ff:ff:ff:ff:ff:ff");
        assert_eq!(BdAddr::local().to_string(), "00:00:00:ff:ff:ff");
    }

    #[test]
    fn test_endpoint_display() {
        let ep: Endpoint = Ipv4Endpoint::new(Ipv4Addr::LOCALHOST, 8080).into();
        assert_eq!(ep.to_string(), "127.0.0.1:8080");

        let ep: Endpoint = L2capEndpoint::new(BdAddr::any(), 25).into();
        assert_eq!(ep.to_string(), "00:00:00:00:00:00/25");
    }
}

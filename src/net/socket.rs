use std::{
    mem::{size_of, MaybeUninit},
    os::fd::{AsRawFd, FromRawFd, RawFd},
};

use nix::{
    errno::Errno,
    libc,
    sys::socket::{socket, AddressFamily, SockFlag, SockProtocol, SockType},
};

use crate::fd::FileDesc;

use super::{addr::NativeAddr, Endpoint, Error, Result};

/// Which direction(s) of a connection [Socket::shutdown] degrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Read,
    Write,
    Both,
}

/// A [Socket] is a managed network handle tagged with its address family, socket type, and
/// protocol, optionally composed with the owned remote [Endpoint] of its peer.
///
/// Every addressing operation (bind, connect, send_to) verifies the supplied endpoint's family
/// against the socket's family before any OS call is attempted; mixing families is a
/// structured [Error::FamilyMismatch], never a raw OS error.
///
/// The remote endpoint is populated only on sockets produced by [Socket::accept].
///
/// # Examples
///
/// ```no_run
/// use libfdio::net::{Ipv4Endpoint, Socket};
/// use nix::sys::socket::{AddressFamily, SockType};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Socket::new(AddressFamily::Inet, SockType::Stream, None)?;
/// server.bind(&Ipv4Endpoint::new([127, 0, 0, 1], 9000).into())?;
/// server.listen(5)?;
///
/// let conn = server.accept()?;
/// println!("connection from: {}", conn.remote_endpoint().unwrap());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Socket {
    fd: FileDesc,
    family: AddressFamily,
    ty: SockType,
    protocol: Option<SockProtocol>,
    remote: Option<Endpoint>,
}

impl Socket {
    /// Create a new managed socket for the given (family, type, protocol) triple.
    pub fn new(
        family: AddressFamily,
        ty: SockType,
        protocol: Option<SockProtocol>,
    ) -> Result<Socket> {
        let fd = socket(family, ty, SockFlag::empty(), protocol)
            .map_err(|e| Error::Create(e.into()))?;

        tracing::debug!(fd = fd.as_raw_fd(), ?family, ?ty, "created socket");
        Ok(Socket {
            fd: FileDesc::from_owned(fd),
            family,
            ty,
            protocol,
            remote: None,
        })
    }

    /// The address family this socket was created with.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// The socket type this socket was created with.
    pub fn socket_type(&self) -> SockType {
        self.ty
    }

    /// The protocol this socket was created with, if any was named.
    pub fn protocol(&self) -> Option<SockProtocol> {
        self.protocol
    }

    /// The remote peer endpoint, populated only on sockets produced by [Socket::accept].
    pub fn remote_endpoint(&self) -> Option<&Endpoint> {
        self.remote.as_ref()
    }

    /// The local endpoint this socket is bound to.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        let mut addr = NativeAddr::zeroed();
        Errno::result(unsafe {
            libc::getsockname(self.as_raw_fd(), addr.as_mut_ptr(), addr.len_mut())
        })
        .map_err(Error::from_os)?;

        Endpoint::from_native(&addr)
    }

    /// Access the underlying managed handle for raw read/write or duplication.
    pub fn handle(&self) -> &FileDesc {
        &self.fd
    }

    /// Mutable access to the underlying managed handle, e.g. for an early explicit close.
    pub fn handle_mut(&mut self) -> &mut FileDesc {
        &mut self.fd
    }

    fn check_family(&self, ep: &Endpoint) -> Result<()> {
        if ep.family() != self.family {
            return Err(Error::FamilyMismatch {
                expected: self.family,
                found: ep.family(),
            });
        }
        Ok(())
    }

    /// Bind the socket to a local endpoint. Family-checked.
    pub fn bind(&self, ep: &Endpoint) -> Result<()> {
        self.check_family(ep)?;
        let addr = ep.to_native()?;

        Errno::result(unsafe { libc::bind(self.as_raw_fd(), addr.as_ptr(), addr.len()) })
            .map_err(Error::from_os)?;
        Ok(())
    }

    /// Start listening for connections, queueing at most `backlog` pending connections.
    pub fn listen(&self, backlog: i32) -> Result<()> {
        Errno::result(unsafe { libc::listen(self.as_raw_fd(), backlog) })
            .map_err(Error::from_os)?;
        Ok(())
    }

    /// Block until a pending connection exists and accept it.
    ///
    /// The returned socket owns the newly accepted descriptor, inherits this socket's type and
    /// protocol, and owns the remote [Endpoint] decoded from the kernel-reported peer address.
    /// A transient condition (non-blocking socket with an empty queue, or signal interruption)
    /// is reported as [Error::WouldBlock] / [Error::Interrupted]; see [Error::is_transient].
    pub fn accept(&self) -> Result<Socket> {
        let mut addr = NativeAddr::zeroed();

        let raw = Errno::result(unsafe {
            libc::accept(self.as_raw_fd(), addr.as_mut_ptr(), addr.len_mut())
        })
        .map_err(Error::from_os)?;
        let fd = unsafe { FileDesc::from_raw_fd(raw) };

        let remote = Endpoint::from_native(&addr)?;
        tracing::debug!(fd = raw, peer = %remote, "accepted connection");

        Ok(Socket {
            fd,
            family: self.family,
            ty: self.ty,
            protocol: self.protocol,
            remote: Some(remote),
        })
    }

    /// Connect to a remote endpoint. Family-checked.
    pub fn connect(&self, ep: &Endpoint) -> Result<()> {
        self.check_family(ep)?;
        let addr = ep.to_native()?;

        Errno::result(unsafe { libc::connect(self.as_raw_fd(), addr.as_ptr(), addr.len()) })
            .map_err(Error::from_os)?;
        Ok(())
    }

    /// Degrade one or both directions of a connected or listening socket without releasing
    /// the handle.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        let how = match how {
            Shutdown::Read => libc::SHUT_RD,
            Shutdown::Write => libc::SHUT_WR,
            Shutdown::Both => libc::SHUT_RDWR,
        };

        Errno::result(unsafe { libc::shutdown(self.as_raw_fd(), how) })
            .map_err(Error::from_os)?;
        Ok(())
    }

    /// Send a single message on a connected socket. Single-attempt; partial sends are the
    /// caller's to resume.
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        let n = Errno::result(unsafe {
            libc::send(
                self.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                0,
            )
        })
        .map_err(Error::from_os)?;
        Ok(n as usize)
    }

    /// Receive a single message on a connected socket. Single-attempt.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let n = Errno::result(unsafe {
            libc::recv(
                self.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        })
        .map_err(Error::from_os)?;
        Ok(n as usize)
    }

    /// Send a datagram to the given endpoint. Family-checked.
    pub fn send_to(&self, buf: &[u8], ep: &Endpoint) -> Result<usize> {
        self.check_family(ep)?;
        let addr = ep.to_native()?;

        let n = Errno::result(unsafe {
            libc::sendto(
                self.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                0,
                addr.as_ptr(),
                addr.len(),
            )
        })
        .map_err(Error::from_os)?;
        Ok(n as usize)
    }

    /// Receive a datagram, returning the byte count and the sender's endpoint.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, Endpoint)> {
        let mut addr = NativeAddr::zeroed();

        let n = Errno::result(unsafe {
            libc::recvfrom(
                self.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                addr.as_mut_ptr(),
                addr.len_mut(),
            )
        })
        .map_err(Error::from_os)?;

        let ep = Endpoint::from_native(&addr)?;
        Ok((n as usize, ep))
    }

    /// Read a raw, typed socket option at the given level and name.
    pub fn get_option<T: Copy>(&self, level: libc::c_int, name: libc::c_int) -> Result<T> {
        let mut value = MaybeUninit::<T>::uninit();
        let mut len = size_of::<T>() as libc::socklen_t;

        Errno::result(unsafe {
            libc::getsockopt(
                self.as_raw_fd(),
                level,
                name,
                value.as_mut_ptr() as *mut libc::c_void,
                &mut len,
            )
        })
        .map_err(Error::from_os)?;

        Ok(unsafe { value.assume_init() })
    }

    /// Write a raw, typed socket option at the given level and name.
    pub fn set_option<T: Copy>(
        &self,
        level: libc::c_int,
        name: libc::c_int,
        value: &T,
    ) -> Result<()> {
        Errno::result(unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                level,
                name,
                value as *const T as *const libc::c_void,
                size_of::<T>() as libc::socklen_t,
            )
        })
        .map_err(Error::from_os)?;
        Ok(())
    }

    fn flag(&self, level: libc::c_int, name: libc::c_int) -> Result<bool> {
        Ok(self.get_option::<libc::c_int>(level, name)? != 0)
    }

    fn set_flag(&self, level: libc::c_int, name: libc::c_int, enable: bool) -> Result<()> {
        self.set_option(level, name, &(enable as libc::c_int))
    }

    pub fn debug(&self) -> Result<bool> {
        self.flag(libc::SOL_SOCKET, libc::SO_DEBUG)
    }

    pub fn set_debug(&self, enable: bool) -> Result<()> {
        self.set_flag(libc::SOL_SOCKET, libc::SO_DEBUG, enable)
    }

    pub fn reuse_address(&self) -> Result<bool> {
        self.flag(libc::SOL_SOCKET, libc::SO_REUSEADDR)
    }

    pub fn set_reuse_address(&self, enable: bool) -> Result<()> {
        self.set_flag(libc::SOL_SOCKET, libc::SO_REUSEADDR, enable)
    }

    pub fn broadcast(&self) -> Result<bool> {
        self.flag(libc::SOL_SOCKET, libc::SO_BROADCAST)
    }

    pub fn set_broadcast(&self, enable: bool) -> Result<()> {
        self.set_flag(libc::SOL_SOCKET, libc::SO_BROADCAST, enable)
    }

    /// Restrict the socket to a single network interface, by name.
    pub fn bind_device(&self, name: &str) -> Result<()> {
        if name.len() >= libc::IFNAMSIZ {
            return Err(Error::DeviceNameTooLong(name.into()));
        }

        let mut buf = [0u8; libc::IFNAMSIZ];
        buf[..name.len()].copy_from_slice(name.as_bytes());

        Errno::result(unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_BINDTODEVICE,
                buf.as_ptr() as *const libc::c_void,
                (name.len() + 1) as libc::socklen_t,
            )
        })
        .map_err(Error::from_os)?;
        Ok(())
    }

    /// The interface this socket is bound to, if [Socket::bind_device] was applied.
    pub fn device(&self) -> Result<Option<String>> {
        let mut buf = [0u8; libc::IFNAMSIZ];
        let mut len = buf.len() as libc::socklen_t;

        Errno::result(unsafe {
            libc::getsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_BINDTODEVICE,
                buf.as_mut_ptr() as *mut libc::c_void,
                &mut len,
            )
        })
        .map_err(Error::from_os)?;

        if len == 0 {
            return Ok(None);
        }
        let end = buf[..len as usize]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(len as usize);
        Ok(Some(String::from_utf8_lossy(&buf[..end]).into_owned()))
    }

    fn require_ip(&self) -> Result<()> {
        if self.family != AddressFamily::Inet {
            return Err(Error::UnsupportedFamily(self.family));
        }
        Ok(())
    }

    /// Whether multicast datagrams sent on this socket loop back locally. IP-family only.
    pub fn multicast_loop(&self) -> Result<bool> {
        self.require_ip()?;
        self.flag(libc::IPPROTO_IP, libc::IP_MULTICAST_LOOP)
    }

    /// Control local loopback of multicast datagrams. IP-family only.
    pub fn set_multicast_loop(&self, enable: bool) -> Result<()> {
        self.require_ip()?;
        self.set_flag(libc::IPPROTO_IP, libc::IP_MULTICAST_LOOP, enable)
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{BdAddr, Ipv4Endpoint, L2capEndpoint, UnixEndpoint};
    use std::net::Ipv4Addr;

    fn udp_loopback() -> (Socket, Endpoint) {
        let sock = Socket::new(AddressFamily::Inet, SockType::Datagram, None).unwrap();
        sock.bind(&Ipv4Endpoint::new(Ipv4Addr::LOCALHOST, 0).into())
            .unwrap();
        let local = sock.local_endpoint().unwrap();
        (sock, local)
    }

    #[test]
    fn test_create_valid_triples() {
        let stream = Socket::new(AddressFamily::Inet, SockType::Stream, None).unwrap();
        assert!(stream.handle().valid());

        let dgram =
            Socket::new(AddressFamily::Inet, SockType::Datagram, Some(SockProtocol::Udp))
                .unwrap();
        assert!(dgram.handle().valid());

        let unix = Socket::new(AddressFamily::Unix, SockType::Stream, None).unwrap();
        assert!(unix.handle().valid());
    }

    #[test]
    fn test_create_invalid_triple_fails() {
        // TCP protocol on a datagram socket is not a thing.
        let err = Socket::new(AddressFamily::Inet, SockType::Datagram, Some(SockProtocol::Tcp))
            .unwrap_err();
        assert!(matches!(err, Error::Create(_)));
    }

    #[test]
    fn test_family_mismatch_is_checked_before_any_os_call() {
        let inet = Socket::new(AddressFamily::Inet, SockType::Stream, None).unwrap();
        let unix = Socket::new(AddressFamily::Unix, SockType::Stream, None).unwrap();

        let ipv4: Endpoint = Ipv4Endpoint::new(Ipv4Addr::LOCALHOST, 4242).into();
        let path: Endpoint = UnixEndpoint::new("/tmp/fdio-mismatch.sock").into();
        let l2: Endpoint = L2capEndpoint::new(BdAddr::any(), 25).into();

        for ep in [&path, &l2] {
            assert!(matches!(inet.bind(ep), Err(Error::FamilyMismatch { .. })));
            assert!(matches!(inet.connect(ep), Err(Error::FamilyMismatch { .. })));
            assert!(matches!(
                inet.send_to(b"x", ep),
                Err(Error::FamilyMismatch { .. })
            ));
        }
        for ep in [&ipv4, &l2] {
            assert!(matches!(unix.bind(ep), Err(Error::FamilyMismatch { .. })));
            assert!(matches!(unix.connect(ep), Err(Error::FamilyMismatch { .. })));
            assert!(matches!(
                unix.send_to(b"x", ep),
                Err(Error::FamilyMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_datagram_end_to_end() {
        let (receiver, receiver_ep) = udp_loopback();
        let (sender, sender_ep) = udp_loopback();

        let sent = sender.send_to(b"datagram payload", &receiver_ep).unwrap();
        assert_eq!(sent, 16);

        let mut buf = [0u8; 64];
        let (read, from) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..read], b"datagram payload");
        assert_eq!(from, sender_ep);
    }

    #[test]
    fn test_stream_end_to_end_accept_reports_peer() {
        let server = Socket::new(AddressFamily::Inet, SockType::Stream, None).unwrap();
        server
            .bind(&Ipv4Endpoint::new(Ipv4Addr::LOCALHOST, 0).into())
            .unwrap();
        server.listen(5).unwrap();
        let server_ep = server.local_endpoint().unwrap();

        let client = Socket::new(AddressFamily::Inet, SockType::Stream, None).unwrap();
        client.connect(&server_ep).unwrap();
        let client_ep = client.local_endpoint().unwrap();

        let conn = server.accept().unwrap();
        assert_eq!(conn.socket_type(), SockType::Stream);
        assert_eq!(conn.family(), AddressFamily::Inet);

        let remote = conn.remote_endpoint().unwrap();
        assert_eq!(remote, &client_ep);
        match remote {
            Endpoint::Ipv4(ep) => assert_eq!(ep.address(), Ipv4Addr::LOCALHOST),
            other => panic!("unexpected remote endpoint: {}", other),
        }

        client.send(b"ping").unwrap();
        let mut buf = [0u8; 8];
        let read = conn.recv(&mut buf).unwrap();
        assert_eq!(&buf[..read], b"ping");
    }

    #[test]
    fn test_unix_stream_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.sock");

        let server = Socket::new(AddressFamily::Unix, SockType::Stream, None).unwrap();
        server.bind(&UnixEndpoint::new(&path).into()).unwrap();
        server.listen(5).unwrap();

        let client = Socket::new(AddressFamily::Unix, SockType::Stream, None).unwrap();
        client.connect(&UnixEndpoint::new(&path).into()).unwrap();

        let conn = server.accept().unwrap();
        let remote = conn.remote_endpoint().unwrap();
        assert_eq!(remote.family(), AddressFamily::Unix);

        client.send(b"over unix").unwrap();
        let mut buf = [0u8; 16];
        let read = conn.recv(&mut buf).unwrap();
        assert_eq!(&buf[..read], b"over unix");
    }

    #[test]
    fn test_shutdown_write_signals_eof() {
        let server = Socket::new(AddressFamily::Inet, SockType::Stream, None).unwrap();
        server
            .bind(&Ipv4Endpoint::new(Ipv4Addr::LOCALHOST, 0).into())
            .unwrap();
        server.listen(1).unwrap();
        let server_ep = server.local_endpoint().unwrap();

        let client = Socket::new(AddressFamily::Inet, SockType::Stream, None).unwrap();
        client.connect(&server_ep).unwrap();
        let conn = server.accept().unwrap();

        client.shutdown(Shutdown::Write).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(conn.recv(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_flag_options_roundtrip() {
        let sock = Socket::new(AddressFamily::Inet, SockType::Stream, None).unwrap();

        assert!(!sock.reuse_address().unwrap());
        sock.set_reuse_address(true).unwrap();
        assert!(sock.reuse_address().unwrap());

        // Reading SO_DEBUG is unprivileged; setting it is not, so only read here.
        assert!(!sock.debug().unwrap());

        let dgram = Socket::new(AddressFamily::Inet, SockType::Datagram, None).unwrap();
        assert!(!dgram.broadcast().unwrap());
        dgram.set_broadcast(true).unwrap();
        assert!(dgram.broadcast().unwrap());
    }

    #[test]
    fn test_multicast_loop_is_ip_only() {
        let dgram = Socket::new(AddressFamily::Inet, SockType::Datagram, None).unwrap();
        assert!(dgram.multicast_loop().unwrap());
        dgram.set_multicast_loop(false).unwrap();
        assert!(!dgram.multicast_loop().unwrap());

        let unix = Socket::new(AddressFamily::Unix, SockType::Datagram, None).unwrap();
        assert!(matches!(
            unix.multicast_loop(),
            Err(Error::UnsupportedFamily(_))
        ));
    }

    #[test]
    fn test_device_unset_by_default() {
        let sock = Socket::new(AddressFamily::Inet, SockType::Datagram, None).unwrap();
        assert_eq!(sock.device().unwrap(), None);
    }
}

//! # libfdio
//!
//! This is a managed, RAII-style abstraction over POSIX resource handles on linux: file
//! descriptors, sockets, an epoll based readiness multiplexer, and polymorphic network
//! endpoints spanning the IPv4, unix-domain, and bluetooth L2CAP address families. Every
//! wrapped OS object is built on the same exclusive-ownership [fd::FileDesc] model, releases
//! its native handle exactly once, and can be watched uniformly through [poll::Epoll].
//!
//! The package is split up into a handful of modules each handling a specific subset of the
//! functionality needed:
//! - [fd] owns the resource-handle model every other module builds on.
//! - [net] holds the [net::Endpoint] family, the managed [net::Socket], and the tun/tap
//!   device allocator.
//! - [poll] is the readiness multiplexer: one thread blocking on many handles at once.
//! - [fs], [signal], and [term] adapt regular files, signal sets, and serial terminal
//!   devices into watchable handles.
//!
//! The crate deliberately stops at readiness notification: there is no event loop, executor,
//! or buffering layer here, and every call is a direct, single-attempt, possibly blocking
//! syscall. Building a loop on top is the caller's job, and is straightforward:
//!
//! ```no_run
//! use libfdio::net::{Ipv4Endpoint, Socket};
//! use libfdio::poll::{Epoll, Interest};
//!
//! use nix::sys::socket::{AddressFamily, SockType};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Socket::new(AddressFamily::Inet, SockType::Stream, None)?;
//!     server.bind(&Ipv4Endpoint::new([127, 0, 0, 1], 9000).into())?;
//!     server.listen(5)?;
//!
//!     let mut epoll = Epoll::new()?;
//!     let listener = epoll.add(&server, Interest::READABLE)?;
//!
//!     let mut buf = vec![0u8; 1024];
//!     loop {
//!         for event in epoll.wait(24, -1)? {
//!             if event.token() == listener && event.is_readable() {
//!                 let conn = server.accept()?;
//!                 println!("connection from: {}", conn.remote_endpoint().unwrap());
//!
//!                 let read = conn.recv(&mut buf)?;
//!                 conn.send(&buf[..read])?;
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! Connectionless transfer works the same way, with [net::Socket::send_to] and
//! [net::Socket::recv_from] carrying the remote [net::Endpoint] explicitly on every message.

pub mod fd;
pub mod fs;
pub mod net;
pub mod poll;
pub mod signal;
pub mod term;

pub use fd::FileDesc;
pub use net::Socket;
pub use poll::Epoll;

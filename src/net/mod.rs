//! The [self] package handles all logic relating to creating and managing network IO objects:
//! the polymorphic [Endpoint] family, the managed [Socket], and the tun/tap device allocator.
//!
//! This module primarily exposes the following objects:
//! - [Socket] which represents a managed, family-tagged network socket supporting both
//!   connection-oriented and connectionless operation.
//! - [Endpoint] and its variants [Ipv4Endpoint], [UnixEndpoint], and [L2capEndpoint], the
//!   closed set of addressable-peer representations a socket can speak to.
//! - [TunTap] which represents an allocated tun/tap network device.
//!
//! Address translation between endpoints and the OS wire format happens through [NativeAddr];
//! socket logic never inspects a family-specific address layout itself.

mod addr;
mod endpoint;
mod error;
mod socket;
mod tuntap;

pub use addr::NativeAddr;
pub use endpoint::{BdAddr, Endpoint, Ipv4Endpoint, L2capEndpoint, UnixEndpoint};
pub use error::{Error, Result};
pub use socket::{Shutdown, Socket};
pub use tuntap::{TunTap, TunTapMode};

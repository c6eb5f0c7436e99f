//! On-demand neighbor resolution: ask an interface's link who owns an
//! IPv4 or IPv6 address and get the hardware address back.
//!
//! `resolve_ipv4` speaks ARP and `resolve_ipv6` speaks Neighbor
//! Discovery; both drive the same retry loop over an `AF_PACKET` socket
//! from the `pktsock` crate, with frames built by `neighsolv-packets`.
//! The caller supplies the source address; `source_for_ipv4` and
//! `source_for_ipv6` pick one from the interface's configured addresses.
//! Callers on a tagged VLAN pass the tag control value and the query
//! goes out tagged through a promiscuous socket.
#![cfg(target_os = "linux")]

mod addrs;
mod error;
mod resolver;

pub use self::addrs::{source_for_ipv4, source_for_ipv6};
pub use self::error::ResolveError;
pub use self::resolver::{resolve_ipv4, resolve_ipv6, resolve_with, FrameView, LinkChannel, ReplyMatcher};

//! Blocking `AF_PACKET` transports for sending and receiving Ethernet
//! frames on one interface, plus the interface ioctls that go with them.
//!
//! A transport is either filtered, where the kernel delivers a single
//! EtherType and strips the link header on receive, or promiscuous
//! (all protocols, full frames). An optional 802.1Q tag control value
//! makes every outgoing frame tagged on its way to the wire.
#![cfg(target_os = "linux")]

mod linux;
mod sockets;

pub mod ifinfo;

pub use self::sockets::{BoundSocket, Filter, Socket};

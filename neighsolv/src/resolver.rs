//! The query/reply loop shared by ARP and Neighbor Discovery.

use crate::error::ResolveError;
use neighsolv_packets::ethernet::{self, ETHER_HEADER_LEN};
use neighsolv_packets::ndp::{self, NdKind};
use neighsolv_packets::{arp, ArpFrame, MacAddr, ARP_ETHER_TYPE, IPV6_ETHER_TYPE};
use pktsock::{BoundSocket, Filter, Socket};
use std::ffi::CString;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::{Duration, Instant};

const RETRY_COUNT: u32 = 3;
const REPLY_DEADLINE: Duration = Duration::from_secs(1);
const RECV_BUF_SIZE: usize = 4096;

/// One send/wait/receive endpoint on a link. `BoundSocket` is the real
/// one; tests drive the loop with scripted stand-ins.
pub trait LinkChannel {
    /// Sends one query frame.
    fn send(&mut self, frame: &[u8]) -> io::Result<usize>;
    /// Waits up to `timeout` for a frame; Ok(false) means none arrived.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;
    /// Receives one frame, returning its length.
    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<usize>;
}

impl LinkChannel for BoundSocket {
    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        BoundSocket::send(self, frame)
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        BoundSocket::wait_readable(self, timeout)
    }

    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        BoundSocket::recv(self, buffer)
    }
}

/// How received buffers are shaped: a cooked socket delivers the network
/// payload with the link header already stripped, a raw one delivers full
/// Ethernet frames, tags included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameView {
    Cooked,
    Raw,
}

/// Decides whether a received buffer answers the outstanding query, and
/// if so whose hardware address it carries.
#[derive(Clone, Copy, Debug)]
pub enum ReplyMatcher {
    /// An ARP reply whose sender protocol address is the queried one.
    ArpReply { sender: Ipv4Addr },
    /// A neighbor advertisement for the queried target, carrying a
    /// target link-layer address option.
    NeighborAdvert { target: Ipv6Addr },
}

impl ReplyMatcher {
    fn expected_ether_type(&self) -> u16 {
        match self {
            ReplyMatcher::ArpReply { .. } => ARP_ETHER_TYPE,
            ReplyMatcher::NeighborAdvert { .. } => IPV6_ETHER_TYPE,
        }
    }

    /// The replying node's hardware address, when `buffer` matches.
    pub fn matches(&self, buffer: &[u8], view: FrameView) -> Option<MacAddr> {
        let payload = match view {
            FrameView::Cooked => buffer,
            FrameView::Raw => {
                let (ether_type, l3) = ethernet::network_payload(buffer)?;
                if ether_type != self.expected_ether_type() {
                    return None;
                }
                &buffer[l3..]
            }
        };
        match self {
            ReplyMatcher::ArpReply { sender } => arp::match_reply(payload, *sender),
            ReplyMatcher::NeighborAdvert { target } => {
                let message = ndp::parse_payload(payload)?;
                if message.kind != NdKind::Advert || message.target != *target {
                    return None;
                }
                ndp::advert_link_addr(payload)
            }
        }
    }
}

/// Sends `query` and collects the matching reply, retrying up to three
/// times with a one-second reply deadline per attempt. An unmatched frame
/// spends the attempt's remaining time, never resets it. A failed send
/// abandons the attempt; failed or empty reads keep the attempt alive.
pub fn resolve_with<C: LinkChannel>(
    channel: &mut C,
    query: &[u8],
    matcher: &ReplyMatcher,
    view: FrameView,
) -> Result<MacAddr, ResolveError> {
    // one receive buffer for the whole resolution
    let mut buffer = vec![0u8; RECV_BUF_SIZE];
    for attempt in 1..=RETRY_COUNT {
        if let Err(err) = channel.send(query) {
            log::warn!("send failed on attempt {}: {}", attempt, err);
            continue;
        }
        let deadline = Instant::now() + REPLY_DEADLINE;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match channel.wait_readable(deadline - now) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    log::warn!("wait failed on attempt {}: {}", attempt, err);
                    break;
                }
            }
            match channel.recv(&mut buffer) {
                Ok(0) => log::debug!("empty read on attempt {}", attempt),
                Ok(len) => {
                    if let Some(mac) = matcher.matches(&buffer[..len], view) {
                        return Ok(mac);
                    }
                }
                Err(err) => log::warn!("recv failed on attempt {}: {}", attempt, err),
            }
        }
    }
    Err(ResolveError::Timeout)
}

/// Resolves `target`'s hardware address over ARP on `iface`, querying
/// from `src` (see `source_for_ipv4` for picking one). With a VLAN tag
/// control value the query goes out tagged and replies are read from a
/// promiscuous socket; otherwise a kernel-filtered ARP socket is used.
pub fn resolve_ipv4(
    iface: &str,
    vlan: Option<u16>,
    src: Ipv4Addr,
    target: Ipv4Addr,
) -> Result<MacAddr, ResolveError> {
    let iface_name = interface_name(iface)?;
    let sender_mac = MacAddr::new(
        pktsock::ifinfo::hardware_addr(&iface_name).map_err(ResolveError::Interface)?,
    );
    let query = ArpFrame::query(sender_mac, src, target);
    log::debug!("querying {} for {} from {}", iface, target, src);

    let (view, mut channel) = open_channel(&iface_name, ARP_ETHER_TYPE, vlan)?;
    let frame = match view {
        FrameView::Cooked => &query.data[ETHER_HEADER_LEN..],
        FrameView::Raw => &query.data[..],
    };
    resolve_with(&mut channel, frame, &ReplyMatcher::ArpReply { sender: target }, view)
}

/// Resolves `target`'s hardware address over Neighbor Discovery on
/// `iface`, soliciting the target's solicited-node multicast group from
/// `src` (see `source_for_ipv6` for picking one).
pub fn resolve_ipv6(
    iface: &str,
    vlan: Option<u16>,
    src: Ipv6Addr,
    target: Ipv6Addr,
) -> Result<MacAddr, ResolveError> {
    let iface_name = interface_name(iface)?;
    let sender_mac = MacAddr::new(
        pktsock::ifinfo::hardware_addr(&iface_name).map_err(ResolveError::Interface)?,
    );
    let query = ndp::solicit(sender_mac, src, target);
    log::debug!("soliciting {} for {} from {}", iface, target, src);

    let (view, mut channel) = open_channel(&iface_name, IPV6_ETHER_TYPE, vlan)?;
    let frame = match view {
        FrameView::Cooked => &query.data[query.l3_offset..],
        FrameView::Raw => &query.data[..],
    };
    resolve_with(&mut channel, frame, &ReplyMatcher::NeighborAdvert { target }, view)
}

/// Filtered cooked socket for the untagged case; promiscuous raw socket
/// when a VLAN tag is in play, since tagged frames never clear the
/// kernel's EtherType filter.
fn open_channel(
    iface_name: &CString,
    ether_type: u16,
    vlan: Option<u16>,
) -> Result<(FrameView, BoundSocket), ResolveError> {
    let (view, filter) = match vlan {
        Some(_) => (FrameView::Raw, Filter::All),
        None => (FrameView::Cooked, Filter::EtherType(ether_type)),
    };
    let mut socket = Socket::new(filter).map_err(ResolveError::Open)?;
    socket.set_vlan(vlan);
    let channel = socket.bind(iface_name).map_err(ResolveError::Open)?;
    Ok((view, channel))
}

fn interface_name(iface: &str) -> Result<CString, ResolveError> {
    CString::new(iface).map_err(|_| {
        ResolveError::Interface(io::Error::new(
            io::ErrorKind::InvalidInput,
            "interface name contains a nul byte",
        ))
    })
}

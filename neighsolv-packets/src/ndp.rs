//! Neighbor Discovery solicitation and advertisement frames.

use crate::ethernet::{self, ETHER_HEADER_LEN};
use crate::ipv6::{Ipv6Frame, IPV6_HEADER_LEN};
use crate::{checksum, FormatError, MacAddr, IPV6_ETHER_TYPE, IP_PROTOCOL_ICMPV6};
use std::net::Ipv6Addr;

pub const ND_NEIGHBOR_SOLICIT: u8 = 135;
pub const ND_NEIGHBOR_ADVERT: u8 = 136;

const ND_SOURCE_LINK_ADDR_OPT: u8 = 1;
const ND_TARGET_LINK_ADDR_OPT: u8 = 2;

// message body (24) plus one link-layer address option (8)
const ND_BODY_LEN: usize = 24;
const ND_OPT_LEN: usize = 8;

/// Untagged solicitation and advertisement frames are always this long.
pub const ND_FRAME_LEN: usize = ETHER_HEADER_LEN + IPV6_HEADER_LEN + ND_BODY_LEN + ND_OPT_LEN;

/// The solicited-node multicast group for `target`, ff02::1:ff00:0/104
/// joined with the target's low 24 bits.
pub fn solicited_node_multicast(target: &Ipv6Addr) -> Ipv6Addr {
    let t = target.octets();
    let mut group = [0u8; 16];
    group[0] = 0xff;
    group[1] = 0x02;
    group[11] = 0x01;
    group[12] = 0xff;
    group[13..16].copy_from_slice(&t[13..16]);
    Ipv6Addr::from(group)
}

/// Builds a neighbor solicitation for `target`, sent from `src_mac` and
/// `src` to the target's solicited-node multicast group, broadcast at the
/// link layer and carrying a source link-layer address option.
pub fn solicit(src_mac: MacAddr, src: Ipv6Addr, target: Ipv6Addr) -> Ipv6Frame {
    let mut data = vec![0u8; ND_FRAME_LEN];
    let l3 = ETHER_HEADER_LEN;
    let l4 = l3 + IPV6_HEADER_LEN;

    ethernet::set_dest_mac(&mut data, MacAddr::broadcast());
    ethernet::set_src_mac(&mut data, src_mac);
    ethernet::set_ether_type(&mut data, IPV6_ETHER_TYPE);

    data[l3] = 0x60;
    let upper_len = (ND_BODY_LEN + ND_OPT_LEN) as u16;
    data[l3 + 4..l3 + 6].copy_from_slice(&upper_len.to_be_bytes());
    data[l3 + 6] = IP_PROTOCOL_ICMPV6;
    data[l3 + 7] = 255;
    data[l3 + 8..l3 + 24].copy_from_slice(&src.octets());
    data[l3 + 24..l3 + 40].copy_from_slice(&solicited_node_multicast(&target).octets());

    data[l4] = ND_NEIGHBOR_SOLICIT;
    data[l4 + 8..l4 + 24].copy_from_slice(&target.octets());
    data[l4 + 24] = ND_SOURCE_LINK_ADDR_OPT;
    data[l4 + 25] = 1;
    data[l4 + 26..l4 + 32].copy_from_slice(&src_mac.bytes);

    let sum = checksum::compute(
        &src.octets(),
        &solicited_node_multicast(&target).octets(),
        IP_PROTOCOL_ICMPV6,
        &data[l4..],
    );
    data[l4 + 2..l4 + 4].copy_from_slice(&sum.to_be_bytes());

    Ipv6Frame { data, l3_offset: l3 }
}

/// Builds the advertisement answering `solicitation`, claiming `mac` for
/// the solicited target. The advertisement's source address is the
/// solicited target when the solicitation went to a multicast group, or
/// the solicitation's destination otherwise; the answering address
/// argument is not consulted, since RFC 4861 derives every reply address
/// from the solicitation itself. A VLAN tag on the solicitation is
/// carried over unchanged.
pub fn advertise(
    solicitation: &[u8],
    mac: MacAddr,
    _addr: Ipv6Addr,
) -> Result<Ipv6Frame, FormatError> {
    let (ether_type, sol_l3) =
        ethernet::network_payload(solicitation).ok_or(FormatError::Truncated)?;
    if ether_type != IPV6_ETHER_TYPE {
        return Err(FormatError::NotIpv6);
    }
    let message = parse_payload(&solicitation[sol_l3..]).ok_or(FormatError::Truncated)?;
    if message.kind != NdKind::Solicit {
        return Err(FormatError::WrongProtocol);
    }

    let sol_dst_first = solicitation[sol_l3 + 24];
    let reply_src = if sol_dst_first == 0xff {
        message.target
    } else {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&solicitation[sol_l3 + 24..sol_l3 + 40]);
        Ipv6Addr::from(bytes)
    };
    let reply_dst = message.src;

    let mut data = vec![0u8; ND_FRAME_LEN];
    let l3 = ETHER_HEADER_LEN;
    let l4 = l3 + IPV6_HEADER_LEN;

    ethernet::set_dest_mac(&mut data, ethernet::src_mac(solicitation));
    ethernet::set_src_mac(&mut data, mac);
    ethernet::set_ether_type(&mut data, IPV6_ETHER_TYPE);

    data[l3] = 0x60;
    let upper_len = (ND_BODY_LEN + ND_OPT_LEN) as u16;
    data[l3 + 4..l3 + 6].copy_from_slice(&upper_len.to_be_bytes());
    data[l3 + 6] = IP_PROTOCOL_ICMPV6;
    data[l3 + 7] = 255;
    data[l3 + 8..l3 + 24].copy_from_slice(&reply_src.octets());
    data[l3 + 24..l3 + 40].copy_from_slice(&reply_dst.octets());

    data[l4] = ND_NEIGHBOR_ADVERT;
    data[l4 + 4] = 0x60; // solicited, override
    data[l4 + 8..l4 + 24].copy_from_slice(&message.target.octets());
    data[l4 + 24] = ND_TARGET_LINK_ADDR_OPT;
    data[l4 + 25] = 1;
    data[l4 + 26..l4 + 32].copy_from_slice(&mac.bytes);

    let sum = checksum::compute(
        &reply_src.octets(),
        &reply_dst.octets(),
        IP_PROTOCOL_ICMPV6,
        &data[l4..],
    );
    data[l4 + 2..l4 + 4].copy_from_slice(&sum.to_be_bytes());

    match ethernet::vlan_tci(solicitation) {
        Some(tci) => Ok(Ipv6Frame {
            data: ethernet::insert_vlan_tag(&data, tci),
            l3_offset: l3 + ethernet::VLAN_TAG_LEN,
        }),
        None => Ok(Ipv6Frame { data, l3_offset: l3 }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NdKind {
    Solicit,
    Advert,
    Other(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NdMessage {
    pub kind: NdKind,
    /// IPv6 source address of the carrying packet.
    pub src: Ipv6Addr,
    /// Target address from the message body.
    pub target: Ipv6Addr,
}

/// Parses a full Ethernet frame as a Neighbor Discovery message, looking
/// behind an 802.1Q tag when one is present.
pub fn parse(frame: &[u8]) -> Option<NdMessage> {
    let (ether_type, l3) = ethernet::network_payload(frame)?;
    if ether_type != IPV6_ETHER_TYPE {
        return None;
    }
    parse_payload(&frame[l3..])
}

/// Parses an IPv6 packet (starting at its fixed header) as a Neighbor
/// Discovery message. The target is only meaningful for solicitations and
/// advertisements; other ICMPv6 types come back with an unspecified
/// target, so callers check `kind` first.
pub fn parse_payload(packet: &[u8]) -> Option<NdMessage> {
    if packet.len() < IPV6_HEADER_LEN + 4 {
        return None;
    }
    if packet[0] >> 4 != 6 || packet[6] != IP_PROTOCOL_ICMPV6 {
        return None;
    }
    let kind = match packet[IPV6_HEADER_LEN] {
        ND_NEIGHBOR_SOLICIT => NdKind::Solicit,
        ND_NEIGHBOR_ADVERT => NdKind::Advert,
        other => NdKind::Other(other),
    };
    let mut src = [0u8; 16];
    src.copy_from_slice(&packet[8..24]);
    let target = match kind {
        NdKind::Solicit | NdKind::Advert => {
            if packet.len() < IPV6_HEADER_LEN + ND_BODY_LEN {
                return None;
            }
            let mut target = [0u8; 16];
            target.copy_from_slice(&packet[IPV6_HEADER_LEN + 8..IPV6_HEADER_LEN + 24]);
            Ipv6Addr::from(target)
        }
        NdKind::Other(_) => Ipv6Addr::UNSPECIFIED,
    };
    Some(NdMessage {
        kind,
        src: Ipv6Addr::from(src),
        target,
    })
}

/// The MAC carried in an advertisement's target link-layer address
/// option, when the first option is one.
pub fn advert_link_addr(packet: &[u8]) -> Option<MacAddr> {
    let opt = IPV6_HEADER_LEN + ND_BODY_LEN;
    if packet.len() < opt + ND_OPT_LEN {
        return None;
    }
    if packet[opt] != ND_TARGET_LINK_ADDR_OPT || packet[opt + 1] != 1 {
        return None;
    }
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(&packet[opt + 2..opt + 8]);
    Some(MacAddr::new(bytes))
}

//! Helpers over the Ethernet II header of a frame buffer, including the
//! optional 802.1Q tag between the MAC pair and the EtherType.

use crate::{MacAddr, PacketData, VLAN_ETHER_TYPE};

pub const ETHER_HEADER_LEN: usize = 14;
pub const VLAN_TAG_LEN: usize = 4;

pub fn dest_mac(frame: &[u8]) -> MacAddr {
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(&frame[0..6]);
    MacAddr::new(bytes)
}

pub fn src_mac(frame: &[u8]) -> MacAddr {
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(&frame[6..12]);
    MacAddr::new(bytes)
}

pub fn set_dest_mac(frame: &mut [u8], mac: MacAddr) {
    frame[0..6].copy_from_slice(&mac.bytes);
}

pub fn set_src_mac(frame: &mut [u8], mac: MacAddr) {
    frame[6..12].copy_from_slice(&mac.bytes);
}

pub fn ether_type(frame: &[u8]) -> u16 {
    u16::from_be_bytes([frame[12], frame[13]])
}

pub fn set_ether_type(frame: &mut [u8], ether_type: u16) {
    frame[12..14].copy_from_slice(&ether_type.to_be_bytes());
}

/// The 16-bit tag control field when the frame carries an 802.1Q tag.
pub fn vlan_tci(frame: &[u8]) -> Option<u16> {
    if frame.len() >= ETHER_HEADER_LEN + VLAN_TAG_LEN && ether_type(frame) == VLAN_ETHER_TYPE {
        Some(u16::from_be_bytes([frame[14], frame[15]]))
    } else {
        None
    }
}

/// Returns the EtherType of the network payload and its offset, looking
/// behind an 802.1Q tag when one is present. None if the buffer cannot
/// hold the headers it claims.
pub fn network_payload(frame: &[u8]) -> Option<(u16, usize)> {
    if frame.len() < ETHER_HEADER_LEN {
        return None;
    }
    match ether_type(frame) {
        VLAN_ETHER_TYPE => {
            if frame.len() < ETHER_HEADER_LEN + VLAN_TAG_LEN {
                return None;
            }
            let inner = u16::from_be_bytes([frame[16], frame[17]]);
            Some((inner, ETHER_HEADER_LEN + VLAN_TAG_LEN))
        }
        ether_type => Some((ether_type, ETHER_HEADER_LEN)),
    }
}

/// Builds a copy of `frame` with an 802.1Q tag spliced in after the
/// 12-byte MAC pair; the original EtherType follows the tag.
pub fn insert_vlan_tag(frame: &[u8], tci: u16) -> PacketData {
    let mut tagged = Vec::with_capacity(frame.len() + VLAN_TAG_LEN);
    tagged.extend_from_slice(&frame[..12]);
    tagged.extend_from_slice(&VLAN_ETHER_TYPE.to_be_bytes());
    tagged.extend_from_slice(&tci.to_be_bytes());
    tagged.extend_from_slice(&frame[12..]);
    tagged
}

//! ARP over Ethernet for IPv4, enough to ask for and recognize a
//! hardware address.

use crate::ethernet::{self, ETHER_HEADER_LEN};
use crate::{MacAddr, PacketData, ARP_ETHER_TYPE, IPV4_ETHER_TYPE};
use std::net::Ipv4Addr;

pub const ARP_PAYLOAD_LEN: usize = 28;
pub const ARP_FRAME_LEN: usize = ETHER_HEADER_LEN + ARP_PAYLOAD_LEN;

pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

/// An Ethernet frame carrying an ARP payload at `arp_offset`.
#[derive(Clone, Debug)]
pub struct ArpFrame {
    pub data: PacketData,
    pub arp_offset: usize,
}

impl ArpFrame {
    /// Builds a who-has request for `target`, broadcast from `sender_mac`
    /// and `sender`. The target hardware address is left zeroed.
    pub fn query(sender_mac: MacAddr, sender: Ipv4Addr, target: Ipv4Addr) -> ArpFrame {
        let mut data = vec![0u8; ARP_FRAME_LEN];
        ethernet::set_dest_mac(&mut data, MacAddr::broadcast());
        ethernet::set_src_mac(&mut data, sender_mac);
        ethernet::set_ether_type(&mut data, ARP_ETHER_TYPE);

        let arp = ETHER_HEADER_LEN;
        data[arp..arp + 2].copy_from_slice(&1u16.to_be_bytes()); // Ethernet
        data[arp + 2..arp + 4].copy_from_slice(&IPV4_ETHER_TYPE.to_be_bytes());
        data[arp + 4] = 6;
        data[arp + 5] = 4;
        data[arp + 6..arp + 8].copy_from_slice(&ARP_OP_REQUEST.to_be_bytes());
        data[arp + 8..arp + 14].copy_from_slice(&sender_mac.bytes);
        data[arp + 14..arp + 18].copy_from_slice(&sender.octets());
        data[arp + 24..arp + 28].copy_from_slice(&target.octets());

        ArpFrame {
            data,
            arp_offset: arp,
        }
    }

    pub fn opcode(&self) -> u16 {
        let arp = self.arp_offset;
        u16::from_be_bytes([self.data[arp + 6], self.data[arp + 7]])
    }

    pub fn sender_hardware_addr(&self) -> MacAddr {
        let arp = self.arp_offset;
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&self.data[arp + 8..arp + 14]);
        MacAddr::new(bytes)
    }

    pub fn sender_protocol_addr(&self) -> Ipv4Addr {
        let arp = self.arp_offset;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[arp + 14..arp + 18]);
        Ipv4Addr::from(bytes)
    }

    pub fn target_protocol_addr(&self) -> Ipv4Addr {
        let arp = self.arp_offset;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[arp + 24..arp + 28]);
        Ipv4Addr::from(bytes)
    }
}

/// Checks an ARP payload for a reply whose sender protocol address is
/// `expect`, yielding the sender's hardware address.
pub fn match_reply(payload: &[u8], expect: Ipv4Addr) -> Option<MacAddr> {
    if payload.len() < ARP_PAYLOAD_LEN {
        return None;
    }
    if u16::from_be_bytes([payload[6], payload[7]]) != ARP_OP_REPLY {
        return None;
    }
    if payload[14..18] != expect.octets() {
        return None;
    }
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(&payload[8..14]);
    Some(MacAddr::new(bytes))
}

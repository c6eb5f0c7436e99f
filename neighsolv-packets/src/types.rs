use std::fmt;

pub type PacketData = Vec<u8>;

pub const IPV4_ETHER_TYPE: u16 = 0x0800;
pub const ARP_ETHER_TYPE: u16 = 0x0806;
pub const VLAN_ETHER_TYPE: u16 = 0x8100;
pub const IPV6_ETHER_TYPE: u16 = 0x86DD;

pub const IP_PROTOCOL_TCP: u8 = 6;
pub const IP_PROTOCOL_UDP: u8 = 17;
pub const IP_PROTOCOL_ICMPV6: u8 = 58;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MacAddr {
    pub bytes: [u8; 6],
}

impl MacAddr {
    pub fn new(bytes: [u8; 6]) -> MacAddr {
        MacAddr { bytes }
    }

    pub fn broadcast() -> MacAddr {
        MacAddr {
            bytes: [0xff; 6],
        }
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Why a mutator refused to touch the buffer. Every mutator checks the
/// buffer before writing, so a returned error means the bytes are exactly
/// as they were.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("buffer does not hold an IPv6 packet")]
    NotIpv6,
    #[error("next header does not match the expected protocol")]
    WrongProtocol,
    #[error("buffer is too short for the accessed field")]
    Truncated,
}

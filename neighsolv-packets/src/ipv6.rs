use crate::checksum;
use crate::ethernet::{self, ETHER_HEADER_LEN};
use crate::*;
use std::net::Ipv6Addr;

pub const IPV6_HEADER_LEN: usize = 40;

/// An owned frame buffer holding an Ethernet header at the front and an
/// IPv6 packet at `l3_offset`. Every checksum-covered mutator keeps the
/// upper-layer checksum consistent by applying the incremental update law,
/// so the stored checksum is valid after each call returns.
///
/// Buffers must start from one of the template constructors (which compute
/// the checksum from scratch) or from `from_buffer` over an already valid
/// packet; the mutators only ever apply deltas.
#[derive(Clone, Debug)]
pub struct Ipv6Frame {
    pub data: PacketData,
    pub l3_offset: usize,
}

impl Ipv6Frame {
    /// ICMPv6 template: zero-filled frame of `frame_len` bytes with hop
    /// limit 255 and a checksum valid for the all-zero body.
    pub fn icmpv6_template(frame_len: usize) -> Result<Ipv6Frame, FormatError> {
        Ipv6Frame::template(IP_PROTOCOL_ICMPV6, 255, frame_len)
    }

    /// UDP template: hop limit 64, UDP length field mirroring the IPv6
    /// payload length.
    pub fn udp_template(frame_len: usize) -> Result<Ipv6Frame, FormatError> {
        Ipv6Frame::template(IP_PROTOCOL_UDP, 64, frame_len)
    }

    /// TCP template: hop limit 64, data offset of five words.
    pub fn tcp_template(frame_len: usize) -> Result<Ipv6Frame, FormatError> {
        Ipv6Frame::template(IP_PROTOCOL_TCP, 64, frame_len)
    }

    fn template(next_header: u8, hop_limit: u8, frame_len: usize) -> Result<Ipv6Frame, FormatError> {
        let l4_header_len = match next_header {
            IP_PROTOCOL_ICMPV6 => 4,
            IP_PROTOCOL_UDP => 8,
            IP_PROTOCOL_TCP => 20,
            _ => return Err(FormatError::WrongProtocol),
        };
        if frame_len < ETHER_HEADER_LEN + IPV6_HEADER_LEN + l4_header_len {
            return Err(FormatError::Truncated);
        }

        let mut data = vec![0u8; frame_len];
        ethernet::set_ether_type(&mut data, IPV6_ETHER_TYPE);

        let l3 = ETHER_HEADER_LEN;
        let l4 = l3 + IPV6_HEADER_LEN;
        let upper_len = (frame_len - l4) as u16;
        data[l3] = 0x60;
        data[l3 + 4..l3 + 6].copy_from_slice(&upper_len.to_be_bytes());
        data[l3 + 6] = next_header;
        data[l3 + 7] = hop_limit;
        match next_header {
            IP_PROTOCOL_UDP => data[l4 + 4..l4 + 6].copy_from_slice(&upper_len.to_be_bytes()),
            IP_PROTOCOL_TCP => data[l4 + 12] = 5 << 4,
            _ => {}
        }

        let mut frame = Ipv6Frame { data, l3_offset: l3 };
        frame.store_checksum_from_scratch()?;
        Ok(frame)
    }

    /// Wraps a received buffer. Validates the version nibble and that the
    /// buffer can hold the payload its length field claims.
    pub fn from_buffer(data: PacketData, l3_offset: usize) -> Result<Ipv6Frame, FormatError> {
        if data.len() < l3_offset + IPV6_HEADER_LEN {
            return Err(FormatError::Truncated);
        }
        if data[l3_offset] >> 4 != 6 {
            return Err(FormatError::NotIpv6);
        }
        let payload_len =
            u16::from_be_bytes([data[l3_offset + 4], data[l3_offset + 5]]) as usize;
        if data.len() < l3_offset + IPV6_HEADER_LEN + payload_len {
            return Err(FormatError::Truncated);
        }
        Ok(Ipv6Frame { data, l3_offset })
    }

    pub fn src_addr(&self) -> Ipv6Addr {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.data[self.l3_offset + 8..self.l3_offset + 24]);
        Ipv6Addr::from(bytes)
    }

    pub fn dest_addr(&self) -> Ipv6Addr {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.data[self.l3_offset + 24..self.l3_offset + 40]);
        Ipv6Addr::from(bytes)
    }

    pub fn next_header(&self) -> u8 {
        self.data[self.l3_offset + 6]
    }

    pub fn payload_length(&self) -> u16 {
        u16::from_be_bytes([self.data[self.l3_offset + 4], self.data[self.l3_offset + 5]])
    }

    pub fn hop_limit(&self) -> u8 {
        self.data[self.l3_offset + 7]
    }

    pub fn flow_label(&self) -> u32 {
        u32::from_be_bytes([
            0,
            self.data[self.l3_offset + 1] & 0x0f,
            self.data[self.l3_offset + 2],
            self.data[self.l3_offset + 3],
        ])
    }

    /// Rewrites the source address, applying the update law once per
    /// 16-bit word of the address (the pseudo-header covers all eight).
    pub fn set_src_addr(&mut self, addr: Ipv6Addr) -> Result<(), FormatError> {
        self.set_addr(8, addr)
    }

    pub fn set_dest_addr(&mut self, addr: Ipv6Addr) -> Result<(), FormatError> {
        self.set_addr(24, addr)
    }

    fn set_addr(&mut self, field: usize, addr: Ipv6Addr) -> Result<(), FormatError> {
        self.check_version()?;
        let cksum_off = self.checksum_offset()?;
        self.ensure(cksum_off + 2)?;

        let start = self.l3_offset + field;
        let new = addr.octets();
        for word in 0..8 {
            let old = self.read_u16(start + 2 * word);
            let new = u16::from_be_bytes([new[2 * word], new[2 * word + 1]]);
            self.apply_delta(cksum_off, old, new);
        }
        self.data[start..start + 16].copy_from_slice(&new);
        Ok(())
    }

    /// Source port for UDP or TCP, chosen by the next-header field.
    pub fn set_src_port(&mut self, port: u16) -> Result<(), FormatError> {
        self.set_port(0, port)
    }

    pub fn set_dest_port(&mut self, port: u16) -> Result<(), FormatError> {
        self.set_port(2, port)
    }

    fn set_port(&mut self, field: usize, port: u16) -> Result<(), FormatError> {
        self.check_version()?;
        let l4 = self.l4_offset();
        let cksum_off = match self.next_header() {
            IP_PROTOCOL_UDP => l4 + 6,
            IP_PROTOCOL_TCP => l4 + 16,
            _ => return Err(FormatError::WrongProtocol),
        };
        self.ensure(cksum_off + 2)?;
        let old = self.read_u16(l4 + field);
        self.write_u16(l4 + field, port);
        self.apply_delta(cksum_off, old, port);
        Ok(())
    }

    /// Rewrites the IPv6 payload length to `len`. The pseudo-header
    /// carries the upper-layer length, so UDP takes the delta twice (once
    /// for the pseudo-header, once for its own length field, which is
    /// rewritten too) and TCP once.
    pub fn set_payload_length(&mut self, len: u16) -> Result<(), FormatError> {
        self.check_version()?;
        let l4 = self.l4_offset();
        let old = self.payload_length();
        match self.next_header() {
            IP_PROTOCOL_UDP => {
                self.ensure(l4 + 8)?;
                let l3 = self.l3_offset;
                self.write_u16(l3 + 4, len);
                self.write_u16(l4 + 4, len);
                self.apply_delta(l4 + 6, old, len);
                self.apply_delta(l4 + 6, old, len);
            }
            IP_PROTOCOL_TCP => {
                self.ensure(l4 + 18)?;
                let l3 = self.l3_offset;
                self.write_u16(l3 + 4, len);
                self.apply_delta(l4 + 16, old, len);
            }
            _ => return Err(FormatError::WrongProtocol),
        }
        Ok(())
    }

    /// Flow label occupies the low 20 bits of the first word; the version
    /// nibble and traffic class are preserved. No checksum impact.
    pub fn set_flow_label(&mut self, flow: u32) -> Result<(), FormatError> {
        self.check_version()?;
        let l3 = self.l3_offset;
        self.data[l3 + 1] = (self.data[l3 + 1] & 0xf0) | ((flow >> 16) as u8 & 0x0f);
        self.data[l3 + 2] = (flow >> 8) as u8;
        self.data[l3 + 3] = flow as u8;
        Ok(())
    }

    /// No checksum impact; the hop limit is outside the pseudo-header.
    pub fn set_hop_limit(&mut self, hop_limit: u8) -> Result<(), FormatError> {
        self.check_version()?;
        let l3 = self.l3_offset;
        self.data[l3 + 7] = hop_limit;
        Ok(())
    }

    /// Offset of the first payload byte behind the upper-layer header.
    /// TCP honors its data-offset field; unknown protocols yield the start
    /// of the upper layer itself.
    pub fn payload_offset(&self) -> Result<usize, FormatError> {
        self.check_version()?;
        let l4 = self.l4_offset();
        let offset = match self.next_header() {
            IP_PROTOCOL_UDP => l4 + 8,
            IP_PROTOCOL_TCP => {
                self.ensure(l4 + 20)?;
                l4 + ((self.data[l4 + 12] >> 4) as usize) * 4
            }
            IP_PROTOCOL_ICMPV6 => l4 + 4,
            _ => l4,
        };
        Ok(offset)
    }

    /// Checksum-maintaining write into the payload at `offset` bytes past
    /// the first payload byte. Applied word by word, with a leading byte
    /// landing in the low half of its word and a trailing byte in the high
    /// half handled separately.
    pub fn write_payload(&mut self, offset: usize, bytes: &[u8]) -> Result<(), FormatError> {
        self.check_version()?;
        let cksum_off = self.checksum_offset()?;
        let start = self.payload_offset()? + offset;
        self.ensure(start + bytes.len())?;
        self.ensure(cksum_off + 2)?;
        let l4 = self.l4_offset();

        let mut pos = start;
        let mut src = bytes;
        if (pos - l4) & 1 == 1 {
            if let Some((&byte, rest)) = src.split_first() {
                let old = self.data[pos] as u16;
                self.data[pos] = byte;
                self.apply_delta(cksum_off, old, byte as u16);
                pos += 1;
                src = rest;
            }
        }
        while src.len() >= 2 {
            let old = self.read_u16(pos);
            let new = u16::from_be_bytes([src[0], src[1]]);
            self.write_u16(pos, new);
            self.apply_delta(cksum_off, old, new);
            pos += 2;
            src = &src[2..];
        }
        if let Some(&byte) = src.first() {
            let old = (self.data[pos] as u16) << 8;
            self.data[pos] = byte;
            self.apply_delta(cksum_off, old, (byte as u16) << 8);
        }
        Ok(())
    }

    /// Checksum-neutral read of `out.len()` payload bytes at `offset`.
    pub fn read_payload(&self, offset: usize, out: &mut [u8]) -> Result<(), FormatError> {
        self.check_version()?;
        let start = self.payload_offset()? + offset;
        self.ensure(start + out.len())?;
        out.copy_from_slice(&self.data[start..start + out.len()]);
        Ok(())
    }

    /// Recomputes the checksum from scratch with the stored field in
    /// place; a valid packet sums to zero.
    pub fn checksum_valid(&self) -> Result<bool, FormatError> {
        self.check_version()?;
        self.checksum_offset()?;
        let l4 = self.l4_offset();
        let upper_len = self.payload_length() as usize;
        self.ensure(l4 + upper_len)?;
        let src = self.src_addr().octets();
        let dst = self.dest_addr().octets();
        let sum = checksum::compute(&src, &dst, self.next_header(), &self.data[l4..l4 + upper_len]);
        Ok(sum == 0)
    }

    pub(crate) fn store_checksum_from_scratch(&mut self) -> Result<(), FormatError> {
        let cksum_off = self.checksum_offset()?;
        let l4 = self.l4_offset();
        let upper_len = self.payload_length() as usize;
        self.ensure(l4 + upper_len)?;
        self.write_u16(cksum_off, 0);
        let src = self.src_addr().octets();
        let dst = self.dest_addr().octets();
        let sum = checksum::compute(&src, &dst, self.next_header(), &self.data[l4..l4 + upper_len]);
        self.write_u16(cksum_off, sum);
        Ok(())
    }

    pub(crate) fn check_version(&self) -> Result<(), FormatError> {
        if self.data.len() < self.l3_offset + IPV6_HEADER_LEN {
            return Err(FormatError::Truncated);
        }
        if self.data[self.l3_offset] >> 4 != 6 {
            return Err(FormatError::NotIpv6);
        }
        Ok(())
    }

    pub(crate) fn l4_offset(&self) -> usize {
        self.l3_offset + IPV6_HEADER_LEN
    }

    /// Offset of the upper-layer checksum field for the three protocols
    /// the mutators understand.
    pub(crate) fn checksum_offset(&self) -> Result<usize, FormatError> {
        let l4 = self.l4_offset();
        match self.next_header() {
            IP_PROTOCOL_ICMPV6 => Ok(l4 + 2),
            IP_PROTOCOL_UDP => Ok(l4 + 6),
            IP_PROTOCOL_TCP => Ok(l4 + 16),
            _ => Err(FormatError::WrongProtocol),
        }
    }

    pub(crate) fn ensure(&self, end: usize) -> Result<(), FormatError> {
        if self.data.len() < end {
            return Err(FormatError::Truncated);
        }
        Ok(())
    }

    pub(crate) fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    pub(crate) fn write_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn apply_delta(&mut self, cksum_off: usize, old: u16, new: u16) {
        let current = self.read_u16(cksum_off);
        let updated = checksum::update(current, old, new);
        self.write_u16(cksum_off, updated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn addr(last: u16) -> Ipv6Addr {
        Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, last)
    }

    #[test]
    fn templates_start_valid() {
        for frame in &[
            Ipv6Frame::icmpv6_template(86).unwrap(),
            Ipv6Frame::udp_template(90).unwrap(),
            Ipv6Frame::tcp_template(94).unwrap(),
        ] {
            assert!(frame.checksum_valid().unwrap());
            assert_eq!(frame.data[frame.l3_offset] >> 4, 6);
            assert_eq!(
                frame.payload_length() as usize,
                frame.data.len() - ETHER_HEADER_LEN - IPV6_HEADER_LEN
            );
        }
    }

    #[test]
    fn template_hop_limits() {
        assert_eq!(Ipv6Frame::icmpv6_template(60).unwrap().hop_limit(), 255);
        assert_eq!(Ipv6Frame::udp_template(70).unwrap().hop_limit(), 64);
        assert_eq!(Ipv6Frame::tcp_template(80).unwrap().hop_limit(), 64);
    }

    #[test]
    fn template_too_short() {
        assert!(matches!(
            Ipv6Frame::tcp_template(60),
            Err(FormatError::Truncated)
        ));
    }

    #[test]
    fn udp_mutator_sequence_keeps_checksum() {
        let mut frame = Ipv6Frame::udp_template(120).unwrap();
        frame.set_src_addr(addr(1)).unwrap();
        frame.set_dest_addr(addr(2)).unwrap();
        frame.set_src_port(4242).unwrap();
        frame.set_dest_port(53).unwrap();
        frame.write_payload(0, b"hello, checksum").unwrap();
        frame.set_hop_limit(1).unwrap();
        frame.set_flow_label(0xabcde).unwrap();
        assert!(frame.checksum_valid().unwrap());

        assert_eq!(frame.src_addr(), addr(1));
        assert_eq!(frame.dest_addr(), addr(2));
        assert_eq!(frame.hop_limit(), 1);
        assert_eq!(frame.flow_label(), 0xabcde);
    }

    #[test]
    fn tcp_mutator_sequence_keeps_checksum() {
        let mut frame = Ipv6Frame::tcp_template(140).unwrap();
        frame.set_src_addr(addr(3)).unwrap();
        frame.set_dest_addr(addr(4)).unwrap();
        frame.set_src_port(32000).unwrap();
        frame.set_dest_port(80).unwrap();
        frame.set_tcp_seq(0xdeadbeef).unwrap();
        frame.set_tcp_ack(0x01020304).unwrap();
        frame.set_tcp_flags(0x18).unwrap();
        frame.set_tcp_window(8192).unwrap();
        frame.set_tcp_urgent(7).unwrap();
        frame.write_payload(3, &[0xaa, 0xbb, 0xcc]).unwrap();
        assert!(frame.checksum_valid().unwrap());
    }

    #[test]
    fn icmpv6_mutator_sequence_keeps_checksum() {
        let mut frame = Ipv6Frame::icmpv6_template(100).unwrap();
        frame.set_src_addr(addr(5)).unwrap();
        frame.set_dest_addr(addr(6)).unwrap();
        frame.set_icmpv6_type(128).unwrap();
        frame.set_icmpv6_code(0).unwrap();
        frame.set_icmpv6_id(0x1234).unwrap();
        frame.set_icmpv6_seq(9).unwrap();
        assert!(frame.checksum_valid().unwrap());
    }

    #[test]
    fn random_payload_writes_keep_checksum() {
        let mut rng = rand::thread_rng();
        let mut frame = Ipv6Frame::udp_template(256).unwrap();
        for _ in 0..50 {
            let len = rng.gen_range(0, 32);
            let offset = rng.gen_range(0, 256 - 62 - 32);
            let mut bytes = vec![0u8; len];
            rng.fill(&mut bytes[..]);
            frame.write_payload(offset, &bytes).unwrap();
            assert!(frame.checksum_valid().unwrap());
        }
    }

    #[test]
    fn payload_round_trip() {
        let mut frame = Ipv6Frame::udp_template(100).unwrap();
        frame.write_payload(5, &[1, 2, 3, 4, 5]).unwrap();
        let mut out = [0u8; 5];
        frame.read_payload(5, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn set_payload_length_udp() {
        let mut frame = Ipv6Frame::udp_template(120).unwrap();
        frame.set_payload_length(20).unwrap();
        assert_eq!(frame.payload_length(), 20);
        assert_eq!(frame.read_u16(frame.l4_offset() + 4), 20);
        // validity over the shortened coverage
        let l4 = frame.l4_offset();
        let src = frame.src_addr().octets();
        let dst = frame.dest_addr().octets();
        assert_eq!(
            checksum::compute(&src, &dst, IP_PROTOCOL_UDP, &frame.data[l4..l4 + 20]),
            0
        );
    }

    #[test]
    fn set_payload_length_tcp() {
        let mut frame = Ipv6Frame::tcp_template(120).unwrap();
        frame.set_payload_length(30).unwrap();
        assert_eq!(frame.payload_length(), 30);
        let l4 = frame.l4_offset();
        let src = frame.src_addr().octets();
        let dst = frame.dest_addr().octets();
        assert_eq!(
            checksum::compute(&src, &dst, IP_PROTOCOL_TCP, &frame.data[l4..l4 + 30]),
            0
        );
    }

    #[test]
    fn not_ipv6_leaves_buffer_unchanged() {
        let mut frame = Ipv6Frame::udp_template(80).unwrap();
        frame.data[frame.l3_offset] = 0x45;
        let before = frame.data.clone();

        assert_eq!(frame.set_src_addr(addr(9)), Err(FormatError::NotIpv6));
        assert_eq!(frame.set_src_port(99), Err(FormatError::NotIpv6));
        assert_eq!(frame.set_payload_length(10), Err(FormatError::NotIpv6));
        assert_eq!(frame.set_flow_label(1), Err(FormatError::NotIpv6));
        assert_eq!(frame.set_hop_limit(1), Err(FormatError::NotIpv6));
        assert_eq!(frame.write_payload(0, &[1]), Err(FormatError::NotIpv6));
        assert_eq!(frame.data, before);
    }

    #[test]
    fn ports_on_icmpv6_are_wrong_protocol() {
        let mut frame = Ipv6Frame::icmpv6_template(80).unwrap();
        let before = frame.data.clone();
        assert_eq!(frame.set_src_port(1), Err(FormatError::WrongProtocol));
        assert_eq!(frame.set_dest_port(1), Err(FormatError::WrongProtocol));
        assert_eq!(frame.set_payload_length(4), Err(FormatError::WrongProtocol));
        assert_eq!(frame.data, before);
    }

    #[test]
    fn flow_label_preserves_version() {
        let mut frame = Ipv6Frame::udp_template(80).unwrap();
        frame.set_flow_label(0xfffff).unwrap();
        assert_eq!(frame.data[frame.l3_offset] >> 4, 6);
        assert_eq!(frame.flow_label(), 0xfffff);
        assert!(frame.checksum_valid().unwrap());
        // and a later mutator still passes the version check
        frame.set_src_port(5).unwrap();
    }

    #[test]
    fn from_buffer_validates() {
        let frame = Ipv6Frame::udp_template(80).unwrap();
        let ok = Ipv6Frame::from_buffer(frame.data.clone(), 14).unwrap();
        assert_eq!(ok.next_header(), IP_PROTOCOL_UDP);

        let mut bad = frame.data.clone();
        bad[14] = 0x45;
        assert!(matches!(
            Ipv6Frame::from_buffer(bad, 14),
            Err(FormatError::NotIpv6)
        ));
        assert!(matches!(
            Ipv6Frame::from_buffer(vec![0u8; 20], 14),
            Err(FormatError::Truncated)
        ));
    }
}

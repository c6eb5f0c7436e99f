//! ICMPv6 header fields of an [`Ipv6Frame`], with the checksum kept
//! consistent on every write.

use crate::ipv6::Ipv6Frame;
use crate::{FormatError, IP_PROTOCOL_ICMPV6};

pub const ICMPV6_ECHO_REQUEST: u8 = 128;
pub const ICMPV6_ECHO_REPLY: u8 = 129;

impl Ipv6Frame {
    /// A reply frame answering this echo request: addresses swapped and
    /// the type flipped to echo reply. Swapping the addresses is
    /// checksum-neutral since both sit in the pseudo-header, so only the
    /// type change takes a delta. Identifier, sequence and payload carry
    /// over untouched.
    pub fn echo_reply(&self) -> Result<Ipv6Frame, FormatError> {
        self.check_version()?;
        let mut reply = self.clone();
        reply.set_icmpv6_type(ICMPV6_ECHO_REPLY)?;
        let l3 = reply.l3_offset;
        let src = self.src_addr().octets();
        let dst = self.dest_addr().octets();
        reply.data[l3 + 8..l3 + 24].copy_from_slice(&dst);
        reply.data[l3 + 24..l3 + 40].copy_from_slice(&src);
        Ok(reply)
    }

    pub fn icmpv6_type(&self) -> Result<u8, FormatError> {
        self.icmpv6_u8(0)
    }

    pub fn icmpv6_code(&self) -> Result<u8, FormatError> {
        self.icmpv6_u8(1)
    }

    pub fn set_icmpv6_type(&mut self, value: u8) -> Result<(), FormatError> {
        self.set_icmpv6_u8(0, value)
    }

    pub fn set_icmpv6_code(&mut self, value: u8) -> Result<(), FormatError> {
        self.set_icmpv6_u8(1, value)
    }

    /// Identifier field of an echo-style message body.
    pub fn set_icmpv6_id(&mut self, value: u16) -> Result<(), FormatError> {
        self.set_icmpv6_u16(4, value)
    }

    pub fn set_icmpv6_seq(&mut self, value: u16) -> Result<(), FormatError> {
        self.set_icmpv6_u16(6, value)
    }

    fn icmpv6_u8(&self, field: usize) -> Result<u8, FormatError> {
        let offset = self.icmpv6_field(field, 1)?;
        Ok(self.data[offset])
    }

    fn set_icmpv6_u8(&mut self, field: usize, value: u8) -> Result<(), FormatError> {
        let offset = self.icmpv6_field(field, 1)?;
        let cksum_off = self.l4_offset() + 2;
        // scale the byte into its half of the containing word
        let (old, new) = if field & 1 == 1 {
            (self.data[offset] as u16, value as u16)
        } else {
            ((self.data[offset] as u16) << 8, (value as u16) << 8)
        };
        self.data[offset] = value;
        self.apply_delta(cksum_off, old, new);
        Ok(())
    }

    fn set_icmpv6_u16(&mut self, field: usize, value: u16) -> Result<(), FormatError> {
        let offset = self.icmpv6_field(field, 2)?;
        let cksum_off = self.l4_offset() + 2;
        let old = self.read_u16(offset);
        self.write_u16(offset, value);
        self.apply_delta(cksum_off, old, value);
        Ok(())
    }

    fn icmpv6_field(&self, field: usize, width: usize) -> Result<usize, FormatError> {
        self.check_version()?;
        if self.next_header() != IP_PROTOCOL_ICMPV6 {
            return Err(FormatError::WrongProtocol);
        }
        let l4 = self.l4_offset();
        // the checksum word gets rewritten along with the field
        self.ensure(l4 + 4)?;
        let offset = l4 + field;
        self.ensure(offset + width)?;
        Ok(offset)
    }
}

//! TCP header fields of an [`Ipv6Frame`], with the checksum kept
//! consistent on every write.

use crate::ipv6::Ipv6Frame;
use crate::{FormatError, IP_PROTOCOL_TCP};

impl Ipv6Frame {
    pub fn set_tcp_seq(&mut self, value: u32) -> Result<(), FormatError> {
        self.set_tcp_u32(4, value)
    }

    pub fn set_tcp_ack(&mut self, value: u32) -> Result<(), FormatError> {
        self.set_tcp_u32(8, value)
    }

    /// The flags byte sits at an odd offset, so it scales into the low
    /// half of its word.
    pub fn set_tcp_flags(&mut self, flags: u8) -> Result<(), FormatError> {
        let offset = self.tcp_field(13, 1)?;
        let cksum_off = self.l4_offset() + 16;
        let old = self.data[offset] as u16;
        self.data[offset] = flags;
        self.apply_delta(cksum_off, old, flags as u16);
        Ok(())
    }

    pub fn tcp_flags(&self) -> Result<u8, FormatError> {
        let offset = self.tcp_field(13, 1)?;
        Ok(self.data[offset])
    }

    pub fn set_tcp_window(&mut self, value: u16) -> Result<(), FormatError> {
        self.set_tcp_u16(14, value)
    }

    pub fn set_tcp_urgent(&mut self, value: u16) -> Result<(), FormatError> {
        self.set_tcp_u16(18, value)
    }

    fn set_tcp_u16(&mut self, field: usize, value: u16) -> Result<(), FormatError> {
        let offset = self.tcp_field(field, 2)?;
        let cksum_off = self.l4_offset() + 16;
        let old = self.read_u16(offset);
        self.write_u16(offset, value);
        self.apply_delta(cksum_off, old, value);
        Ok(())
    }

    fn set_tcp_u32(&mut self, field: usize, value: u32) -> Result<(), FormatError> {
        let offset = self.tcp_field(field, 4)?;
        let cksum_off = self.l4_offset() + 16;
        let high = (value >> 16) as u16;
        let low = value as u16;
        let old_high = self.read_u16(offset);
        let old_low = self.read_u16(offset + 2);
        self.write_u16(offset, high);
        self.write_u16(offset + 2, low);
        self.apply_delta(cksum_off, old_high, high);
        self.apply_delta(cksum_off, old_low, low);
        Ok(())
    }

    fn tcp_field(&self, field: usize, width: usize) -> Result<usize, FormatError> {
        self.check_version()?;
        if self.next_header() != IP_PROTOCOL_TCP {
            return Err(FormatError::WrongProtocol);
        }
        let l4 = self.l4_offset();
        // the checksum word gets rewritten along with the field
        self.ensure(l4 + 18)?;
        let offset = l4 + field;
        self.ensure(offset + width)?;
        Ok(offset)
    }
}

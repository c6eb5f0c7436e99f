//! One's-complement checksum arithmetic for the IPv6 upper layers.
//!
//! Checksum fields are stored big-endian on the wire; all arithmetic here
//! is done on the big-endian-read values in host order, which keeps every
//! delta consistent no matter which half of a word changed.

/// Reduce a 32-bit accumulated sum to 16 bits by folding the carries back
/// in until none remain.
pub fn fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xffff);
    }
    sum as u16
}

/// Partial sum over a byte slice, taken as big-endian 16-bit words. An odd
/// trailing byte counts as the high half of a final word.
pub fn of_slice(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]) as u32);
    }
    if let Some(&odd) = chunks.remainder().first() {
        sum = sum.wrapping_add((odd as u32) << 8);
    }
    sum
}

/// Partial sum of the RFC 8200 pseudo-header: both addresses, the
/// upper-layer length and the next-header value.
pub fn pseudo_header_sum(src: &[u8; 16], dst: &[u8; 16], next_header: u8, upper_len: u32) -> u32 {
    of_slice(src)
        .wrapping_add(of_slice(dst))
        .wrapping_add(upper_len >> 16)
        .wrapping_add(upper_len & 0xffff)
        .wrapping_add(next_header as u32)
}

/// From-scratch checksum over pseudo-header plus upper-layer bytes.
/// Verifying a packet: recompute with the stored checksum still in place
/// and expect zero.
pub fn compute(src: &[u8; 16], dst: &[u8; 16], next_header: u8, upper: &[u8]) -> u16 {
    let sum = pseudo_header_sum(src, dst, next_header, upper.len() as u32)
        .wrapping_add(of_slice(upper));
    !fold(sum)
}

/// Incremental update: a 16-bit word covered by `cksum` changed from `old`
/// to `new`. The old word is removed by adding its complement (RFC 1624
/// eq. 3); a plain wrapping subtraction drops the end-around borrow and
/// comes out one too high whenever `old` exceeds the complemented sum.
/// Single-byte edits must be scaled by the caller into the correct half
/// of their containing word before applying this.
pub fn update(cksum: u16, old: u16, new: u16) -> u16 {
    let sum = ((!cksum as u32) & 0xffff) + (!old as u32) + new as u32;
    !fold(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_carries() {
        assert_eq!(fold(0), 0);
        assert_eq!(fold(0xffff), 0xffff);
        assert_eq!(fold(0x1_0000), 1);
        assert_eq!(fold(0x2_fffe), 1);
        assert_eq!(fold(0xffff_ffff), 0xffff);
    }

    #[test]
    fn of_slice_odd_byte_is_high_half() {
        assert_eq!(of_slice(&[0x12, 0x34]), 0x1234);
        assert_eq!(of_slice(&[0x12, 0x34, 0x56]), 0x1234 + 0x5600);
    }

    #[test]
    fn update_matches_recompute() {
        let src = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let dst = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2];
        let mut upper = vec![0u8; 16];
        let cksum = compute(&src, &dst, 17, &upper);

        // change the word at offset 8 from 0 to 0xabcd
        upper[8] = 0xab;
        upper[9] = 0xcd;
        let expected = compute(&src, &dst, 17, &upper);
        assert_eq!(update(cksum, 0, 0xabcd), expected);
    }

    #[test]
    fn update_underflow_wraps() {
        let src = [0u8; 16];
        let dst = [0u8; 16];
        let mut upper = vec![0xff, 0xff, 0, 0];
        let cksum = compute(&src, &dst, 58, &upper);

        upper[0] = 0;
        upper[1] = 1;
        let expected = compute(&src, &dst, 58, &upper);
        assert_eq!(update(cksum, 0xffff, 0x0001), expected);
    }
}

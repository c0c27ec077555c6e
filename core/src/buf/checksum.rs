//! One's-complement Internet checksum (RFC 1071), with the pseudo-header
//! folding TCP and UDP need.

use super::netbuf::NetBuffer;
use crate::types::Ipv4Addr;

pub fn ones_complement_sum(data: &[u8], mut sum: u32) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    sum
}

pub fn fold_checksum(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

fn add_pseudo_header(sum: u32, src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, length: u16) -> u32 {
    let mut sum = sum;
    sum = ones_complement_sum(&src.to_octets(), sum);
    sum = ones_complement_sum(&dst.to_octets(), sum);
    sum += protocol as u32;
    sum += length as u32;
    sum
}

/// Checksum over an IPv4 header (no pseudo-header, payload not included).
pub fn compute_ipv4_checksum(header: &[u8]) -> u16 {
    fold_checksum(ones_complement_sum(header, 0))
}

/// One's-complement sum over `[start_offset, start_offset + len)` of `buf`'s
/// payload, straddling node boundaries without copying. The carry byte left
/// over when a node ends on an odd boundary is folded into the next node's
/// first byte, same as if the whole range were one contiguous slice.
fn sum_buffer_range(buf: &NetBuffer, start_offset: u32, len: u32) -> u32 {
    let mut sum = 0u32;
    let mut consumed = 0u32;
    let mut carry: Option<u8> = None;
    let end = start_offset + len;
    for chunk in buf.iter_chunks() {
        let chunk_len = chunk.len() as u32;
        let chunk_start = consumed;
        let chunk_end = consumed + chunk_len;
        consumed = chunk_end;
        if chunk_end <= start_offset || chunk_start >= end {
            continue;
        }
        let local_start = start_offset.saturating_sub(chunk_start) as usize;
        let local_end = (end.min(chunk_end) - chunk_start) as usize;
        let slice = &chunk[local_start..local_end];

        let mut iter = slice;
        if let Some(lo) = carry.take() {
            if !iter.is_empty() {
                sum += u16::from_be_bytes([lo, iter[0]]) as u32;
                iter = &iter[1..];
            } else {
                carry = Some(lo);
            }
        }
        let mut pairs = iter.chunks_exact(2);
        for pair in &mut pairs {
            sum += u16::from_be_bytes([pair[0], pair[1]]) as u32;
        }
        if let [last] = pairs.remainder() {
            carry = Some(*last);
        }
    }
    if let Some(lo) = carry {
        sum += (lo as u32) << 8;
    }
    sum
}

/// Checksum a byte range of `buf` directly, the primitive a protocol module
/// reaches for when it needs something other than the ready-made UDP/TCP
/// helpers below — ICMP, IGMP, or a partial checksum it folds in by hand.
/// `finalize` selects between the raw running sum (so a caller can add more
/// to it first) and the folded, ones-complemented result ready to drop into
/// a header.
pub fn checksum_data(buf: &NetBuffer, offset: u32, len: u32, finalize: bool) -> u16 {
    let sum = sum_buffer_range(buf, offset, len);
    if finalize { fold_checksum(sum) } else { sum as u16 }
}

/// RFC 768 UDP checksum: zero computed checksum is transmitted as `0xFFFF`
/// because `0` means "no checksum was computed".
pub fn compute_udp_checksum(buf: &NetBuffer, header_offset: u32, src: Ipv4Addr, dst: Ipv4Addr) -> u16 {
    let length = (buf.len() - header_offset) as u16;
    let sum = add_pseudo_header(0, src, dst, 17, length);
    let sum = sum_buffer_range(buf, header_offset, buf.len() - header_offset) + sum;
    let folded = fold_checksum(sum);
    if folded == 0 { 0xFFFF } else { folded }
}

pub fn compute_tcp_checksum(buf: &NetBuffer, header_offset: u32, src: Ipv4Addr, dst: Ipv4Addr) -> u16 {
    let length = (buf.len() - header_offset) as u16;
    let sum = add_pseudo_header(0, src, dst, 6, length);
    let sum = sum_buffer_range(buf, header_offset, buf.len() - header_offset) + sum;
    fold_checksum(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, pass};

    pub fn test_checksum_data_matches_manual_sum() -> TestResult {
        let mut buf = NetBuffer::alloc().unwrap();
        let payload: alloc::vec::Vec<u8> = (0..64u16).map(|b| b as u8).collect();
        buf.append_data(&payload).unwrap();
        let expected = fold_checksum(ones_complement_sum(&payload, 0));
        assert_eq_test!(checksum_data(&buf, 0, 64, true), expected);
        pass!()
    }

    pub fn test_checksum_data_unfinalized_is_additive() -> TestResult {
        let mut buf = NetBuffer::alloc().unwrap();
        buf.append_data(&[0x12, 0x34, 0x56, 0x78]).unwrap();
        let whole = checksum_data(&buf, 0, 4, false) as u32;
        let half_a = checksum_data(&buf, 0, 2, false) as u32;
        let half_b = checksum_data(&buf, 2, 2, false) as u32;
        assert_eq_test!(whole, half_a + half_b);
        pass!()
    }

    netstack_support::define_test_suite!(
        checksum,
        [test_checksum_data_matches_manual_sum, test_checksum_data_unfinalized_is_additive]
    );
}

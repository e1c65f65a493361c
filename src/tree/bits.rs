//! Bit-level helpers over byte slices
//!
//! Bits are addressed from the most significant bit of the first byte, so bit 0
//! of a path picks the branch directly under the root.

/// Path bit that selects the right child
pub const RIGHT: u8 = 1;

/// Gets the bit at `position`, counted from the most significant bit.
/// Panics if `position >= data.len() * 8`.
#[inline]
pub fn get_bit(data: &[u8], position: usize) -> u8 {
    (data[position / 8] >> (7 - position % 8)) & 1
}

/// Sets the bit at `position`, counted from the most significant bit
#[inline]
pub fn set_bit(data: &mut [u8], position: usize) {
    data[position / 8] |= 1 << (7 - position % 8);
}

/// Number of set bits in `data`
pub fn count_set_bits(data: &[u8]) -> usize {
    data.iter().map(|b| b.count_ones() as usize).sum()
}

/// Number of leading bits `a` and `b` have in common, at most `a.len() * 8`.
///
/// This is the depth at which the two paths diverge in the tree.
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let bytes = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    if bytes == a.len() || bytes == b.len() {
        return bytes * 8;
    }
    bytes * 8 + (a[bytes] ^ b[bytes]).leading_zeros() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bit() {
        let data = [0b1000_0001, 0b0100_0000];
        assert_eq!(get_bit(&data, 0), 1);
        assert_eq!(get_bit(&data, 1), 0);
        assert_eq!(get_bit(&data, 7), 1);
        assert_eq!(get_bit(&data, 9), 1);
        assert_eq!(get_bit(&data, 15), 0);
    }

    #[test]
    #[should_panic]
    fn test_get_bit_out_of_range() {
        get_bit(&[0u8; 2], 16);
    }

    #[test]
    fn test_set_bit() {
        let mut data = [0u8; 2];
        set_bit(&mut data, 0);
        set_bit(&mut data, 10);
        assert_eq!(data, [0b1000_0000, 0b0010_0000]);

        // setting twice is a no-op
        set_bit(&mut data, 10);
        assert_eq!(count_set_bits(&data), 2);
    }

    #[test]
    fn test_common_prefix() {
        let a = *b"abcdefgh12345678abcdefgh12345678";
        assert_eq!(common_prefix_len(&a, &a), 256);

        let b = *b"abcDEFgh12345678abcdefgh12345678";
        // 'd' is 01100100, 'D' is 01000100
        assert_eq!(common_prefix_len(&a, &b), 3 * 8 + 2);

        let b = *b"\xffbcdefgh12345678abcdefgh12345678";
        assert_eq!(common_prefix_len(&a, &b), 0);
    }

    #[test]
    fn test_common_prefix_matches_bitwise_scan() {
        let a = [0b1011_0110, 0b0000_1111];
        let b = [0b1011_0110, 0b0001_1111];
        let scanned = (0..16)
            .take_while(|&i| get_bit(&a, i) == get_bit(&b, i))
            .count();
        assert_eq!(common_prefix_len(&a, &b), scanned);
        assert_eq!(scanned, 11);
    }
}

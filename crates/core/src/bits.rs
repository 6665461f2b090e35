//! Single-bit helpers over `u8`.
//!
//! Every register and data-space cell is a plain `u8`; the bit-addressed
//! instructions (BST/BLD, SBRC/SBRS, SBI/CBI, SBIC/SBIS) view it through
//! these helpers. Bit 0 is the LSB, bit 7 the MSB.

/// Read bit `b` (0–7) of `v`.
#[inline(always)]
pub fn bit(v: u8, b: u8) -> bool {
    v & (1 << b) != 0
}

/// Return `v` with bit `b` (0–7) set or cleared.
#[inline(always)]
pub fn with_bit(v: u8, b: u8, set: bool) -> u8 {
    if set { v | (1 << b) } else { v & !(1 << b) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit() {
        assert!(bit(0b1000_0000, 7));
        assert!(!bit(0b1000_0000, 0));
        assert!(bit(0x01, 0));
    }

    #[test]
    fn test_with_bit() {
        assert_eq!(with_bit(0x00, 3, true), 0x08);
        assert_eq!(with_bit(0xFF, 3, false), 0xF7);
        // setting an already-set bit is a no-op
        assert_eq!(with_bit(0x08, 3, true), 0x08);
    }

    #[test]
    fn test_roundtrip_all_bits() {
        for b in 0..8u8 {
            assert!(bit(with_bit(0, b, true), b));
            assert!(!bit(with_bit(0xFF, b, false), b));
        }
    }
}

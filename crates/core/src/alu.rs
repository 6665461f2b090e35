//! Pure ALU and flag engine.
//!
//! Every function takes the operands plus the current SREG byte and returns
//! the result together with the new SREG, without touching any machine
//! state. All of ADD/ADC/SUB/SBC/CP/CPC/INC/DEC/NEG (and LSL/ROL, which are
//! ADD/ADC of a register with itself) derive C, H, and V from one shared
//! carry-chain primitive instead of per-instruction formula copies.
//!
//! SREG bit layout (bit 0 first): C Z N V S H T I. Flag formulas follow
//! the AVR instruction set manual; the subtle cases are
//!
//! * INC/DEC leave C and H untouched,
//! * SBC/SBCI/CPC only ever clear Z (multi-byte compare chains),
//! * shift/rotate compute V as N xor C from the post-shift N and the
//!   shifted-out C.

/// Carry (or borrow) out of every bit position.
///
/// For each bit `i`, bit `i` of the returned byte is the carry out of that
/// ripple-adder stage: `maj(Rd_i, Rr_i, Cin_i)`, expressed through the
/// result so the whole chain vectorizes:
///
/// * add:  `Rd·Rr + Rr·!R + !R·Rd`
/// * sub:  `!Rd·Rr + Rr·R + R·!Rd`  (borrow)
///
/// Bit 7 is the C flag, bit 3 the H flag, and `bit7 ^ bit6` (carry out of
/// the MSB vs carry into it) is the two's-complement overflow V.
#[inline]
fn carry_chain(rd: u8, rr: u8, r: u8, borrow: bool) -> u8 {
    if borrow {
        (!rd & rr) | (rr & r) | (r & !rd)
    } else {
        (rd & rr) | (rr & !r) | (!r & rd)
    }
}

/// Pack flag bits C/Z/N/V/S/H (each 0 or 1) into SREG, preserving T and I.
#[inline]
fn pack(sreg: u8, c: u8, z: u8, n: u8, v: u8, h: u8) -> u8 {
    let s = n ^ v;
    (sreg & 0b1100_0000) | (h << 5) | (s << 4) | (v << 3) | (n << 2) | (z << 1) | c
}

/// ADD / ADC. `carry_in` is false for ADD, the current C flag for ADC.
pub fn add(sreg: u8, rd: u8, rr: u8, carry_in: bool) -> (u8, u8) {
    let r = rd.wrapping_add(rr).wrapping_add(carry_in as u8);
    let chain = carry_chain(rd, rr, r, false);
    let c = chain >> 7;
    let h = (chain >> 3) & 1;
    let v = ((chain >> 7) ^ (chain >> 6)) & 1;
    let n = r >> 7;
    let z = (r == 0) as u8;
    (r, pack(sreg, c, z, n, v, h))
}

/// SUB / SBC / CP / CPC. `borrow_in` is the current C flag for the
/// with-carry forms. When `set_z` is false (SBC/SBCI/CPC) the Z flag is
/// only cleared, never set, so a zero low byte cannot mask a non-zero
/// high byte in a multi-byte comparison.
pub fn sub(sreg: u8, rd: u8, rr: u8, borrow_in: bool, set_z: bool) -> (u8, u8) {
    let r = rd.wrapping_sub(rr).wrapping_sub(borrow_in as u8);
    let chain = carry_chain(rd, rr, r, true);
    let c = chain >> 7;
    let h = (chain >> 3) & 1;
    let v = ((chain >> 7) ^ (chain >> 6)) & 1;
    let n = r >> 7;
    let z = if set_z {
        (r == 0) as u8
    } else if r != 0 {
        0
    } else {
        (sreg >> 1) & 1
    };
    (r, pack(sreg, c, z, n, v, h))
}

/// Flags for AND/OR/EOR and their immediate forms: V cleared, N/Z from the
/// result, S recomputed, C and H untouched. The caller supplies the result.
pub fn logic_flags(sreg: u8, r: u8) -> u8 {
    let n = r >> 7;
    let z = (r == 0) as u8;
    let s = n; // V = 0
    (sreg & 0b1110_0001) | (s << 4) | (n << 2) | (z << 1)
}

/// INC. Same chain as ADD with 1, but C and H keep their previous values
/// so INC works on loop counters inside multi-byte arithmetic.
pub fn inc(sreg: u8, rd: u8) -> (u8, u8) {
    let (r, full) = add(sreg, rd, 1, false);
    (r, (sreg & 0b1110_0001) | (full & 0b0001_1110))
}

/// DEC. Borrow chain of SUB with 1; C and H preserved like INC.
pub fn dec(sreg: u8, rd: u8) -> (u8, u8) {
    let (r, full) = sub(sreg, rd, 1, false, true);
    (r, (sreg & 0b1110_0001) | (full & 0b0001_1110))
}

/// COM: one's complement. Flags as logic, with C forced set.
pub fn com(sreg: u8, rd: u8) -> (u8, u8) {
    let r = !rd;
    (r, logic_flags(sreg, r) | 1)
}

/// NEG: two's complement, computed as `0 - Rd` through the borrow chain.
pub fn neg(sreg: u8, rd: u8) -> (u8, u8) {
    sub(sreg, 0, rd, false, true)
}

/// LSR: logical shift right, 0 into bit 7, bit 0 out to C.
pub fn lsr(sreg: u8, rd: u8) -> (u8, u8) {
    let r = rd >> 1;
    let c = rd & 1;
    let n = 0;
    let v = n ^ c;
    (r, pack(sreg, c, (r == 0) as u8, n, v, (sreg >> 5) & 1))
}

/// ASR: arithmetic shift right, bit 7 held, bit 0 out to C.
pub fn asr(sreg: u8, rd: u8) -> (u8, u8) {
    let r = ((rd as i8) >> 1) as u8;
    let c = rd & 1;
    let n = r >> 7;
    let v = n ^ c;
    (r, pack(sreg, c, (r == 0) as u8, n, v, (sreg >> 5) & 1))
}

/// ROR: rotate right through carry. The old C enters bit 7, bit 0 leaves
/// into C; applying ROL then ROR with the same starting C is the identity.
pub fn ror(sreg: u8, rd: u8) -> (u8, u8) {
    let r = (rd >> 1) | ((sreg & 1) << 7);
    let c = rd & 1;
    let n = r >> 7;
    let v = n ^ c;
    (r, pack(sreg, c, (r == 0) as u8, n, v, (sreg >> 5) & 1))
}

/// LSL is ADD of the register with itself (the hardware encodes it so).
pub fn lsl(sreg: u8, rd: u8) -> (u8, u8) {
    add(sreg, rd, rd, false)
}

/// ROL is ADC of the register with itself.
pub fn rol(sreg: u8, rd: u8) -> (u8, u8) {
    add(sreg, rd, rd, sreg & 1 != 0)
}

/// ADIW: add a 6-bit immediate to a 16-bit register pair.
pub fn adiw(sreg: u8, val: u16, k: u8) -> (u16, u8) {
    let r = val.wrapping_add(k as u16);
    let rdh7 = (val >> 15) as u8;
    let r15 = (r >> 15) as u8;
    let v = (rdh7 ^ 1) & r15;
    let c = (r15 ^ 1) & rdh7;
    let z = (r == 0) as u8;
    let s = r15 ^ v;
    let sreg = (sreg & 0b1110_0000) | (s << 4) | (v << 3) | (r15 << 2) | (z << 1) | c;
    (r, sreg)
}

/// SBIW: subtract a 6-bit immediate from a 16-bit register pair.
pub fn sbiw(sreg: u8, val: u16, k: u8) -> (u16, u8) {
    let r = val.wrapping_sub(k as u16);
    let rdh7 = (val >> 15) as u8;
    let r15 = (r >> 15) as u8;
    let v = rdh7 & (r15 ^ 1);
    let c = r15 & (rdh7 ^ 1);
    let z = (r == 0) as u8;
    let s = r15 ^ v;
    let sreg = (sreg & 0b1110_0000) | (s << 4) | (v << 3) | (r15 << 2) | (z << 1) | c;
    (r, sreg)
}

/// MUL/MULS/MULSU: C = bit 15 of the 16-bit product, Z from the full
/// product.
pub fn mul_flags(sreg: u8, product: u16) -> u8 {
    let c = (product >> 15) as u8;
    let z = (product == 0) as u8;
    (sreg & 0b1111_1100) | (z << 1) | c
}

/// FMUL/FMULS/FMULSU: C is bit 15 of the raw product, Z tests the shifted
/// result that actually lands in R1:R0.
pub fn fmul_flags(sreg: u8, product: u16, res: u16) -> u8 {
    let c = (product >> 15) as u8;
    let z = (res == 0) as u8;
    (sreg & 0b1111_1100) | (z << 1) | c
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: u8 = 1 << 0;
    const Z: u8 = 1 << 1;
    const N: u8 = 1 << 2;
    const V: u8 = 1 << 3;
    const S: u8 = 1 << 4;
    const H: u8 = 1 << 5;

    #[test]
    fn test_add_half_carry() {
        // 0x0F + 0x01 = 0x10 carries out of bit 3 only
        let (r, f) = add(0, 0x0F, 0x01, false);
        assert_eq!(r, 0x10);
        assert_eq!(f & (C | Z | N | V | H), H);
    }

    #[test]
    fn test_add_carry_and_zero() {
        let (r, f) = add(0, 0xFF, 0x01, false);
        assert_eq!(r, 0x00);
        assert!(f & C != 0);
        assert!(f & Z != 0);
        assert!(f & H != 0);
        assert!(f & V == 0);
    }

    #[test]
    fn test_add_signed_overflow() {
        // 0x7F + 0x01 = 0x80: positive + positive -> negative
        let (r, f) = add(0, 0x7F, 0x01, false);
        assert_eq!(r, 0x80);
        assert!(f & V != 0);
        assert!(f & N != 0);
        assert!(f & S == 0); // S = N ^ V
        assert!(f & C == 0);
    }

    #[test]
    fn test_adc_uses_carry_in() {
        let (r, _) = add(C, 0x10, 0x20, true);
        assert_eq!(r, 0x31);
    }

    #[test]
    fn test_sub_borrow() {
        // 0x00 - 0x01 borrows
        let (r, f) = sub(0, 0x00, 0x01, false, true);
        assert_eq!(r, 0xFF);
        assert!(f & C != 0);
        assert!(f & N != 0);
        assert!(f & H != 0);
        assert!(f & V == 0);
    }

    #[test]
    fn test_sub_signed_overflow() {
        // 0x80 - 0x01 = 0x7F: negative - positive -> positive
        let (_, f) = sub(0, 0x80, 0x01, false, true);
        assert!(f & V != 0);
        assert!(f & N == 0);
        assert!(f & S != 0);
    }

    #[test]
    fn test_sbc_z_only_clears() {
        // Result zero but Z was clear: stays clear
        let (_, f) = sub(0, 0x01, 0x01, false, false);
        assert!(f & Z == 0);
        // Result zero and Z was set: stays set
        let (_, f) = sub(Z, 0x01, 0x01, false, false);
        assert!(f & Z != 0);
        // Non-zero result always clears Z
        let (_, f) = sub(Z, 0x02, 0x01, false, false);
        assert!(f & Z == 0);
    }

    #[test]
    fn test_inc_preserves_carry() {
        let (r, f) = inc(C | H, 0xFF);
        assert_eq!(r, 0x00);
        assert!(f & Z != 0);
        assert!(f & C != 0, "INC must not touch C");
        assert!(f & H != 0, "INC must not touch H");
        assert!(f & V == 0);
    }

    #[test]
    fn test_inc_overflow_at_7f() {
        let (r, f) = inc(0, 0x7F);
        assert_eq!(r, 0x80);
        assert!(f & V != 0);
        assert!(f & N != 0);
    }

    #[test]
    fn test_dec_overflow_at_80() {
        let (r, f) = dec(C, 0x80);
        assert_eq!(r, 0x7F);
        assert!(f & V != 0);
        assert!(f & C != 0, "DEC must not touch C");
    }

    #[test]
    fn test_com_sets_carry() {
        let (r, f) = com(0, 0x55);
        assert_eq!(r, 0xAA);
        assert!(f & C != 0);
        assert!(f & N != 0);
        assert!(f & V == 0);
    }

    #[test]
    fn test_neg() {
        let (r, f) = neg(0, 0x01);
        assert_eq!(r, 0xFF);
        assert!(f & C != 0);
        let (r, f) = neg(0, 0x00);
        assert_eq!(r, 0x00);
        assert!(f & Z != 0);
        assert!(f & C == 0);
    }

    #[test]
    fn test_logic_clears_v() {
        let f = logic_flags(V | S, 0x80);
        assert!(f & V == 0);
        assert!(f & N != 0);
        assert!(f & S != 0); // S = N ^ 0
    }

    #[test]
    fn test_lsl_shifts_msb_to_carry() {
        let (r, f) = lsl(0, 0b1000_0001);
        assert_eq!(r, 0b0000_0010);
        assert!(f & C != 0);
        // N=0, C=1 -> V=1
        assert!(f & V != 0);
    }

    #[test]
    fn test_lsr() {
        let (r, f) = lsr(0, 0b0000_0011);
        assert_eq!(r, 0b0000_0001);
        assert!(f & C != 0);
        assert!(f & N == 0);
        assert!(f & V != 0); // V = N ^ C = 1
    }

    #[test]
    fn test_asr_holds_sign() {
        let (r, f) = asr(0, 0x81);
        assert_eq!(r, 0xC0);
        assert!(f & C != 0);
        assert!(f & N != 0);
        assert!(f & V == 0); // N=1, C=1
    }

    #[test]
    fn test_rol_ror_inverse() {
        for v in [0x00u8, 0x01, 0x80, 0x55, 0xAA, 0xFF] {
            for c0 in [0u8, 1] {
                let (mid, f1) = rol(c0, v);
                let (back, f2) = ror(f1, mid);
                assert_eq!(back, v);
                assert_eq!(f2 & 1, c0, "carry must round-trip for {v:#04x}");
            }
        }
    }

    #[test]
    fn test_adiw_sbiw() {
        let (r, f) = adiw(0, 0xFFFF, 1);
        assert_eq!(r, 0);
        assert!(f & C != 0);
        assert!(f & Z != 0);
        let (r, f) = sbiw(0, 0x0000, 1);
        assert_eq!(r, 0xFFFF);
        assert!(f & C != 0);
    }

    #[test]
    fn test_mul_flags() {
        let f = mul_flags(0, 0x8000);
        assert!(f & C != 0);
        assert!(f & Z == 0);
        let f = mul_flags(C, 0x0000);
        assert!(f & Z != 0);
        assert!(f & C == 0);
    }

    // Cross-check the vectorized chain against a bit-serial ripple adder.
    #[test]
    fn test_chain_matches_ripple_model() {
        for rd in 0..=255u8 {
            for rr in [0u8, 1, 0x0F, 0x7F, 0x80, 0xF0, 0xFF] {
                let (r, f) = add(0, rd, rr, false);
                let wide = rd as u16 + rr as u16;
                assert_eq!(r, wide as u8);
                assert_eq!(f & C != 0, wide > 0xFF);
                let half = (rd & 0x0F) as u16 + (rr & 0x0F) as u16;
                assert_eq!(f & H != 0, half > 0x0F);

                let (r, f) = sub(0, rd, rr, false, true);
                assert_eq!(r, rd.wrapping_sub(rr));
                assert_eq!(f & C != 0, (rd as u16) < (rr as u16));
                assert_eq!(f & H != 0, (rd & 0x0F) < (rr & 0x0F));
            }
        }
    }
}

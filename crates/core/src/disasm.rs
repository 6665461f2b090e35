//! Assembly-text formatting for decoded instructions.
//!
//! Used by the trace output and register dumps. The text follows AVR
//! assembly conventions (e.g. `ADD R1, R2`); relative branch and call
//! targets are resolved against the supplied PC.

use crate::opcodes::Instruction;

/// Format a decoded instruction as an assembly string.
///
/// `pc` is the word address of the instruction, used to resolve relative
/// targets (the offset is relative to the following word).
pub fn disassemble(inst: Instruction, pc: u16) -> String {
    let rel = |k: i32| (pc as i32 + 1 + k) as u16;
    match inst {
        Instruction::Nop => "NOP".into(),
        Instruction::Add { d, r } => format!("ADD R{}, R{}", d, r),
        Instruction::Adc { d, r } => format!("ADC R{}, R{}", d, r),
        Instruction::Adiw { d, k } => format!("ADIW R{}:R{}, {}", d + 1, d, k),
        Instruction::Sub { d, r } => format!("SUB R{}, R{}", d, r),
        Instruction::Subi { d, k } => format!("SUBI R{}, 0x{:02X}", d, k),
        Instruction::Sbc { d, r } => format!("SBC R{}, R{}", d, r),
        Instruction::Sbci { d, k } => format!("SBCI R{}, 0x{:02X}", d, k),
        Instruction::Sbiw { d, k } => format!("SBIW R{}:R{}, {}", d + 1, d, k),
        Instruction::Inc { d } => format!("INC R{}", d),
        Instruction::Dec { d } => format!("DEC R{}", d),
        Instruction::Neg { d } => format!("NEG R{}", d),
        Instruction::Com { d } => format!("COM R{}", d),
        Instruction::And { d, r } => format!("AND R{}, R{}", d, r),
        Instruction::Andi { d, k } => format!("ANDI R{}, 0x{:02X}", d, k),
        Instruction::Or { d, r } => format!("OR R{}, R{}", d, r),
        Instruction::Ori { d, k } => format!("ORI R{}, 0x{:02X}", d, k),
        Instruction::Eor { d, r } => format!("EOR R{}, R{}", d, r),
        Instruction::Clr { d } => format!("CLR R{}", d),
        Instruction::Tst { d } => format!("TST R{}", d),
        Instruction::Ser { d } => format!("SER R{}", d),
        Instruction::Sbr { d, k } => format!("SBR R{}, 0x{:02X}", d, k),
        Instruction::Cbr { d, k } => format!("CBR R{}, 0x{:02X}", d, k),
        Instruction::Cp { d, r } => format!("CP R{}, R{}", d, r),
        Instruction::Cpc { d, r } => format!("CPC R{}, R{}", d, r),
        Instruction::Cpi { d, k } => format!("CPI R{}, 0x{:02X}", d, k),
        Instruction::Lsl { d } => format!("LSL R{}", d),
        Instruction::Lsr { d } => format!("LSR R{}", d),
        Instruction::Asr { d } => format!("ASR R{}", d),
        Instruction::Rol { d } => format!("ROL R{}", d),
        Instruction::Ror { d } => format!("ROR R{}", d),
        Instruction::Swap { d } => format!("SWAP R{}", d),
        Instruction::Mul { d, r } => format!("MUL R{}, R{}", d, r),
        Instruction::Muls { d, r } => format!("MULS R{}, R{}", d, r),
        Instruction::Mulsu { d, r } => format!("MULSU R{}, R{}", d, r),
        Instruction::Fmul { d, r } => format!("FMUL R{}, R{}", d, r),
        Instruction::Fmuls { d, r } => format!("FMULS R{}, R{}", d, r),
        Instruction::Fmulsu { d, r } => format!("FMULSU R{}, R{}", d, r),
        Instruction::Bset { s } => format!("BSET {}", s),
        Instruction::Bclr { s } => format!("BCLR {}", s),
        Instruction::Bst { d, b } => format!("BST R{}, {}", d, b),
        Instruction::Bld { d, b } => format!("BLD R{}, {}", d, b),
        Instruction::Sbi { a, b } => format!("SBI 0x{:02X}, {}", a, b),
        Instruction::Cbi { a, b } => format!("CBI 0x{:02X}, {}", a, b),
        Instruction::Mov { d, r } => format!("MOV R{}, R{}", d, r),
        Instruction::Movw { d, r } => format!("MOVW R{}:R{}, R{}:R{}", d + 1, d, r + 1, r),
        Instruction::Ldi { d, k } => format!("LDI R{}, 0x{:02X}", d, k),
        Instruction::Lds { d, k } => format!("LDS R{}, 0x{:04X}", d, k),
        Instruction::Sts { k, r } => format!("STS 0x{:04X}, R{}", k, r),
        Instruction::LdX { d } => format!("LD R{}, X", d),
        Instruction::LdXInc { d } => format!("LD R{}, X+", d),
        Instruction::LdXDec { d } => format!("LD R{}, -X", d),
        Instruction::LdY { d } => format!("LD R{}, Y", d),
        Instruction::LdYInc { d } => format!("LD R{}, Y+", d),
        Instruction::LdYDec { d } => format!("LD R{}, -Y", d),
        Instruction::LdYQ { d, q } => format!("LDD R{}, Y+{}", d, q),
        Instruction::LdZ { d } => format!("LD R{}, Z", d),
        Instruction::LdZInc { d } => format!("LD R{}, Z+", d),
        Instruction::LdZDec { d } => format!("LD R{}, -Z", d),
        Instruction::LdZQ { d, q } => format!("LDD R{}, Z+{}", d, q),
        Instruction::StX { r } => format!("ST X, R{}", r),
        Instruction::StXInc { r } => format!("ST X+, R{}", r),
        Instruction::StXDec { r } => format!("ST -X, R{}", r),
        Instruction::StY { r } => format!("ST Y, R{}", r),
        Instruction::StYInc { r } => format!("ST Y+, R{}", r),
        Instruction::StYDec { r } => format!("ST -Y, R{}", r),
        Instruction::StYQ { r, q } => format!("STD Y+{}, R{}", q, r),
        Instruction::StZ { r } => format!("ST Z, R{}", r),
        Instruction::StZInc { r } => format!("ST Z+, R{}", r),
        Instruction::StZDec { r } => format!("ST -Z, R{}", r),
        Instruction::StZQ { r, q } => format!("STD Z+{}, R{}", q, r),
        Instruction::In { d, a } => format!("IN R{}, 0x{:02X}", d, a),
        Instruction::Out { a, r } => format!("OUT 0x{:02X}, R{}", a, r),
        Instruction::Push { r } => format!("PUSH R{}", r),
        Instruction::Pop { d } => format!("POP R{}", d),
        Instruction::Rjmp { k } => format!("RJMP 0x{:04X}", rel(k as i32)),
        Instruction::Jmp { k } => format!("JMP 0x{:04X}", k),
        Instruction::Ijmp => "IJMP".into(),
        Instruction::Rcall { k } => format!("RCALL 0x{:04X}", rel(k as i32)),
        Instruction::Call { k } => format!("CALL 0x{:04X}", k),
        Instruction::Icall => "ICALL".into(),
        Instruction::Ret => "RET".into(),
        Instruction::Reti => "RETI".into(),
        Instruction::Brbs { s, k } => format!("BRBS {}, 0x{:04X}", s, rel(k as i32)),
        Instruction::Brbc { s, k } => format!("BRBC {}, 0x{:04X}", s, rel(k as i32)),
        Instruction::Cpse { d, r } => format!("CPSE R{}, R{}", d, r),
        Instruction::Sbrc { r, b } => format!("SBRC R{}, {}", r, b),
        Instruction::Sbrs { r, b } => format!("SBRS R{}, {}", r, b),
        Instruction::Sbic { a, b } => format!("SBIC 0x{:02X}, {}", a, b),
        Instruction::Sbis { a, b } => format!("SBIS 0x{:02X}, {}", a, b),
        Instruction::Sleep => "SLEEP".into(),
        Instruction::Break => "BREAK".into(),
        Instruction::Wdr => "WDR".into(),
        Instruction::Des { k } => format!("DES 0x{:02X}", k),
        Instruction::Lpm0 => "LPM".into(),
        Instruction::LpmD { d } => format!("LPM R{}, Z", d),
        Instruction::LpmDInc { d } => format!("LPM R{}, Z+", d),
        Instruction::Spm
        | Instruction::Elpm
        | Instruction::Eijmp
        | Instruction::Eicall => inst.mnemonic().into(),
        Instruction::Lac { d } => format!("LAC Z, R{}", d),
        Instruction::Las { d } => format!("LAS Z, R{}", d),
        Instruction::Lat { d } => format!("LAT Z, R{}", d),
        Instruction::Xch { d } => format!("XCH Z, R{}", d),
    }
}

/// Format the SREG byte as a flag string like "ithsvnzc" (lowercase=clear,
/// UPPER=set).
pub fn format_sreg(sreg: u8) -> String {
    let flags = ['I', 'T', 'H', 'S', 'V', 'N', 'Z', 'C'];
    let mut s = String::with_capacity(8);
    for (i, &f) in flags.iter().enumerate() {
        let bit = 7 - i;
        if sreg & (1 << bit) != 0 {
            s.push(f);
        } else {
            s.push(f.to_ascii_lowercase());
        }
    }
    s
}

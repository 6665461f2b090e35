//! Decoded AVR instruction set.
//!
//! The execution core consumes instructions that an external decoder has
//! already turned into this typed [`Instruction`] enum. Keeping the set
//! closed gives exhaustive dispatch in [`crate::Avr::execute`]: adding a
//! variant fails to compile until every handler site is updated.
//!
//! Register fields `d` and `r` are register indices 0–31, `k` is an
//! immediate constant or (for branches) a signed word displacement, `a` is
//! an I/O-space address (data address 0x20 + `a`), `b` a bit index 0–7, and `s` a
//! SREG flag index 0–7 (see the `SREG_*` constants in the crate root).

/// A decoded AVR instruction with its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    // Arithmetic
    Add { d: u8, r: u8 },
    Adc { d: u8, r: u8 },
    Adiw { d: u8, k: u8 },
    Sub { d: u8, r: u8 },
    Subi { d: u8, k: u8 },
    Sbc { d: u8, r: u8 },
    Sbci { d: u8, k: u8 },
    Sbiw { d: u8, k: u8 },
    Inc { d: u8 },
    Dec { d: u8 },
    Neg { d: u8 },
    Com { d: u8 },
    // Logic (CLR/TST/SER/SBR/CBR are the hardware synonyms; they reuse the
    // EOR/AND/ORI flag paths rather than carrying their own formulas)
    And { d: u8, r: u8 },
    Andi { d: u8, k: u8 },
    Or { d: u8, r: u8 },
    Ori { d: u8, k: u8 },
    Eor { d: u8, r: u8 },
    Clr { d: u8 },
    Tst { d: u8 },
    Ser { d: u8 },
    Sbr { d: u8, k: u8 },
    Cbr { d: u8, k: u8 },
    // Compare
    Cp { d: u8, r: u8 },
    Cpc { d: u8, r: u8 },
    Cpi { d: u8, k: u8 },
    // Shift / rotate
    Lsl { d: u8 },
    Lsr { d: u8 },
    Asr { d: u8 },
    Rol { d: u8 },
    Ror { d: u8 },
    Swap { d: u8 },
    // Multiply (result always lands in R1:R0)
    Mul { d: u8, r: u8 },
    Muls { d: u8, r: u8 },
    Mulsu { d: u8, r: u8 },
    Fmul { d: u8, r: u8 },
    Fmuls { d: u8, r: u8 },
    Fmulsu { d: u8, r: u8 },
    // SREG / bit manipulation. SEC/CLC, SEZ/CLZ, ... SEI/CLI all decode to
    // Bset/Bclr with the flag index.
    Bset { s: u8 },
    Bclr { s: u8 },
    Bst { d: u8, b: u8 },
    Bld { d: u8, b: u8 },
    Sbi { a: u8, b: u8 },
    Cbi { a: u8, b: u8 },
    // Data transfer
    Mov { d: u8, r: u8 },
    Movw { d: u8, r: u8 },
    Ldi { d: u8, k: u8 },
    Lds { d: u8, k: u16 },
    Sts { k: u16, r: u8 },
    LdX { d: u8 },
    LdXInc { d: u8 },
    LdXDec { d: u8 },
    LdY { d: u8 },
    LdYInc { d: u8 },
    LdYDec { d: u8 },
    LdYQ { d: u8, q: u8 },
    LdZ { d: u8 },
    LdZInc { d: u8 },
    LdZDec { d: u8 },
    LdZQ { d: u8, q: u8 },
    StX { r: u8 },
    StXInc { r: u8 },
    StXDec { r: u8 },
    StY { r: u8 },
    StYInc { r: u8 },
    StYDec { r: u8 },
    StYQ { r: u8, q: u8 },
    StZ { r: u8 },
    StZInc { r: u8 },
    StZDec { r: u8 },
    StZQ { r: u8, q: u8 },
    In { d: u8, a: u8 },
    Out { a: u8, r: u8 },
    // Stack
    Push { r: u8 },
    Pop { d: u8 },
    // Control flow
    Rjmp { k: i16 },
    Jmp { k: u16 },
    Ijmp,
    Rcall { k: i16 },
    Call { k: u16 },
    Icall,
    Ret,
    Reti,
    Brbs { s: u8, k: i8 },
    Brbc { s: u8, k: i8 },
    Cpse { d: u8, r: u8 },
    Sbrc { r: u8, b: u8 },
    Sbrs { r: u8, b: u8 },
    Sbic { a: u8, b: u8 },
    Sbis { a: u8, b: u8 },
    // Misc
    Sleep,
    Break,
    Wdr,
    // Recognized mnemonics without a handler. Executing one reports
    // `ExecError::Unimplemented` instead of silently advancing.
    Des { k: u8 },
    Spm,
    Lpm0,
    LpmD { d: u8 },
    LpmDInc { d: u8 },
    Elpm,
    Lac { d: u8 },
    Las { d: u8 },
    Lat { d: u8 },
    Xch { d: u8 },
    Eijmp,
    Eicall,
}

impl Instruction {
    /// The assembly mnemonic, used in error reports and disassembly.
    pub fn mnemonic(&self) -> &'static str {
        use Instruction::*;
        match self {
            Nop => "NOP",
            Add { .. } => "ADD",
            Adc { .. } => "ADC",
            Adiw { .. } => "ADIW",
            Sub { .. } => "SUB",
            Subi { .. } => "SUBI",
            Sbc { .. } => "SBC",
            Sbci { .. } => "SBCI",
            Sbiw { .. } => "SBIW",
            Inc { .. } => "INC",
            Dec { .. } => "DEC",
            Neg { .. } => "NEG",
            Com { .. } => "COM",
            And { .. } => "AND",
            Andi { .. } => "ANDI",
            Or { .. } => "OR",
            Ori { .. } => "ORI",
            Eor { .. } => "EOR",
            Clr { .. } => "CLR",
            Tst { .. } => "TST",
            Ser { .. } => "SER",
            Sbr { .. } => "SBR",
            Cbr { .. } => "CBR",
            Cp { .. } => "CP",
            Cpc { .. } => "CPC",
            Cpi { .. } => "CPI",
            Lsl { .. } => "LSL",
            Lsr { .. } => "LSR",
            Asr { .. } => "ASR",
            Rol { .. } => "ROL",
            Ror { .. } => "ROR",
            Swap { .. } => "SWAP",
            Mul { .. } => "MUL",
            Muls { .. } => "MULS",
            Mulsu { .. } => "MULSU",
            Fmul { .. } => "FMUL",
            Fmuls { .. } => "FMULS",
            Fmulsu { .. } => "FMULSU",
            Bset { .. } => "BSET",
            Bclr { .. } => "BCLR",
            Bst { .. } => "BST",
            Bld { .. } => "BLD",
            Sbi { .. } => "SBI",
            Cbi { .. } => "CBI",
            Mov { .. } => "MOV",
            Movw { .. } => "MOVW",
            Ldi { .. } => "LDI",
            Lds { .. } => "LDS",
            Sts { .. } => "STS",
            LdX { .. } | LdXInc { .. } | LdXDec { .. }
            | LdY { .. } | LdYInc { .. } | LdYDec { .. }
            | LdZ { .. } | LdZInc { .. } | LdZDec { .. } => "LD",
            LdYQ { .. } | LdZQ { .. } => "LDD",
            StX { .. } | StXInc { .. } | StXDec { .. }
            | StY { .. } | StYInc { .. } | StYDec { .. }
            | StZ { .. } | StZInc { .. } | StZDec { .. } => "ST",
            StYQ { .. } | StZQ { .. } => "STD",
            In { .. } => "IN",
            Out { .. } => "OUT",
            Push { .. } => "PUSH",
            Pop { .. } => "POP",
            Rjmp { .. } => "RJMP",
            Jmp { .. } => "JMP",
            Ijmp => "IJMP",
            Rcall { .. } => "RCALL",
            Call { .. } => "CALL",
            Icall => "ICALL",
            Ret => "RET",
            Reti => "RETI",
            Brbs { .. } => "BRBS",
            Brbc { .. } => "BRBC",
            Cpse { .. } => "CPSE",
            Sbrc { .. } => "SBRC",
            Sbrs { .. } => "SBRS",
            Sbic { .. } => "SBIC",
            Sbis { .. } => "SBIS",
            Sleep => "SLEEP",
            Break => "BREAK",
            Wdr => "WDR",
            Des { .. } => "DES",
            Spm => "SPM",
            Lpm0 | LpmD { .. } | LpmDInc { .. } => "LPM",
            Elpm => "ELPM",
            Lac { .. } => "LAC",
            Las { .. } => "LAS",
            Lat { .. } => "LAT",
            Xch { .. } => "XCH",
            Eijmp => "EIJMP",
            Eicall => "EICALL",
        }
    }
}

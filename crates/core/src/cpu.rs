//! CPU state and instruction execution.
//!
//! Implements the execution state machine for the decoded AVR instruction
//! set: operand resolution through the data space, ALU dispatch, write-back,
//! and exactly one PC update rule per instruction. Flag computation lives
//! in [`crate::alu`]; this module owns the PC/SP/SREG bookkeeping and the
//! stack discipline.
//!
//! PC rules (word addresses):
//!
//! * every instruction first advances PC by 1;
//! * a taken conditional branch adds its signed offset `k` on top, so the
//!   offset is relative to the *next* instruction;
//! * a satisfied skip advances one extra word (see [`Avr::execute`] for the
//!   two-word-target limitation);
//! * CALL/RCALL/ICALL push the already-advanced PC (the return address is
//!   the instruction after the call) before overwriting it; RET pops it.

use crate::alu;
use crate::bits;
use crate::disasm;
use crate::memory::Memory;
use crate::opcodes::Instruction;
use crate::{Avr, ExecError, RAM_START, SPH_ADDR, SPL_ADDR, SREG_ADDR};
use crate::{SREG_I, SREG_T};

/// CPU execution state.
///
/// The register file lives in [`Memory::data`] at 0x00–0x1F; this struct
/// holds everything else: program counter, stack pointer, status register,
/// a monotonically increasing instruction counter, and the sleep latch.
pub struct Cpu {
    /// Program counter (word address into the decoded instruction stream)
    pub pc: u16,
    /// Stack pointer (byte address in data space)
    pub sp: u16,
    /// Status register: I T H S V N Z C (bits 7..0)
    pub sreg: u8,
    /// Instructions executed since reset
    pub tick: u64,
    /// Set by SLEEP; an external driver decides when to wake
    pub sleeping: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu { pc: 0, sp: 0, sreg: 0, tick: 0, sleeping: false }
    }

    #[inline(always)]
    pub fn flag(&self, bit: u8) -> bool {
        self.sreg & (1 << bit) != 0
    }

    #[inline(always)]
    pub fn set_flag(&mut self, bit: u8, v: bool) {
        self.sreg = bits::with_bit(self.sreg, bit, v);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Mirror the CPU SREG into its memory-mapped I/O address (0x5F).
#[inline(always)]
pub fn sync_sreg(cpu: &Cpu, mem: &mut Memory) {
    mem.data[SREG_ADDR as usize] = cpu.sreg;
}

/// Mirror the stack pointer into SPL/SPH (0x5D/0x5E).
#[inline(always)]
pub fn sync_sp(cpu: &Cpu, mem: &mut Memory) {
    mem.data[SPL_ADDR as usize] = cpu.sp as u8;
    mem.data[SPH_ADDR as usize] = (cpu.sp >> 8) as u8;
}

impl Avr {
    /// Execute one decoded instruction.
    ///
    /// PC is advanced past the instruction before the handler runs, so a
    /// reported error leaves PC pointing at the next instruction; all other
    /// state is untouched by a failed step. The return-address convention
    /// for calls is fixed as "the word after the call, with the call
    /// counted as one word" — `CALL k` at PC=10 pushes 11.
    ///
    /// Satisfied skips (CPSE, SBRC/SBRS, SBIC/SBIS) always advance a flat
    /// two words. Without a decoder the core cannot see whether the skipped
    /// instruction is a two-word encoding, so callers feeding real AVR
    /// streams must not place LDS/STS/JMP/CALL directly after a skip.
    pub fn execute(&mut self, inst: Instruction) -> Result<(), ExecError> {
        if self.trace {
            eprintln!("{:04X}: {}", self.cpu.pc, disasm::disassemble(inst, self.cpu.pc));
        }
        self.cpu.pc = self.cpu.pc.wrapping_add(1);

        match inst {
            Instruction::Nop => {}

            // -- Arithmetic --
            Instruction::Add { d, r } => {
                let (res, sreg) = alu::add(self.cpu.sreg, self.mem.reg(d), self.mem.reg(r), false);
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Adc { d, r } => {
                let carry = self.cpu.flag(crate::SREG_C);
                let (res, sreg) = alu::add(self.cpu.sreg, self.mem.reg(d), self.mem.reg(r), carry);
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Adiw { d, k } => {
                let (res, sreg) = alu::adiw(self.cpu.sreg, self.mem.reg_pair(d), k);
                self.mem.set_reg_pair(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Sub { d, r } => {
                let (res, sreg) =
                    alu::sub(self.cpu.sreg, self.mem.reg(d), self.mem.reg(r), false, true);
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Subi { d, k } => {
                let (res, sreg) = alu::sub(self.cpu.sreg, self.mem.reg(d), k, false, true);
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Sbc { d, r } => {
                let borrow = self.cpu.flag(crate::SREG_C);
                let (res, sreg) =
                    alu::sub(self.cpu.sreg, self.mem.reg(d), self.mem.reg(r), borrow, false);
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Sbci { d, k } => {
                let borrow = self.cpu.flag(crate::SREG_C);
                let (res, sreg) = alu::sub(self.cpu.sreg, self.mem.reg(d), k, borrow, false);
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Sbiw { d, k } => {
                let (res, sreg) = alu::sbiw(self.cpu.sreg, self.mem.reg_pair(d), k);
                self.mem.set_reg_pair(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Inc { d } => {
                let (res, sreg) = alu::inc(self.cpu.sreg, self.mem.reg(d));
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Dec { d } => {
                let (res, sreg) = alu::dec(self.cpu.sreg, self.mem.reg(d));
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Neg { d } => {
                let (res, sreg) = alu::neg(self.cpu.sreg, self.mem.reg(d));
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Com { d } => {
                let (res, sreg) = alu::com(self.cpu.sreg, self.mem.reg(d));
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }

            // -- Logic --
            Instruction::And { d, r } => {
                let res = self.mem.reg(d) & self.mem.reg(r);
                self.mem.set_reg(d, res);
                self.apply_sreg(alu::logic_flags(self.cpu.sreg, res));
            }
            Instruction::Andi { d, k } => {
                let res = self.mem.reg(d) & k;
                self.mem.set_reg(d, res);
                self.apply_sreg(alu::logic_flags(self.cpu.sreg, res));
            }
            Instruction::Or { d, r } => {
                let res = self.mem.reg(d) | self.mem.reg(r);
                self.mem.set_reg(d, res);
                self.apply_sreg(alu::logic_flags(self.cpu.sreg, res));
            }
            Instruction::Ori { d, k } | Instruction::Sbr { d, k } => {
                let res = self.mem.reg(d) | k;
                self.mem.set_reg(d, res);
                self.apply_sreg(alu::logic_flags(self.cpu.sreg, res));
            }
            Instruction::Eor { d, r } => {
                let res = self.mem.reg(d) ^ self.mem.reg(r);
                self.mem.set_reg(d, res);
                self.apply_sreg(alu::logic_flags(self.cpu.sreg, res));
            }
            // CLR is EOR of a register with itself; going through the same
            // flag path keeps its behavior identical to hardware.
            Instruction::Clr { d } => {
                self.mem.set_reg(d, 0);
                self.apply_sreg(alu::logic_flags(self.cpu.sreg, 0));
            }
            // TST is AND with self: flags only, operand untouched.
            Instruction::Tst { d } => {
                let res = self.mem.reg(d);
                self.apply_sreg(alu::logic_flags(self.cpu.sreg, res));
            }
            // SER loads all-ones and defines no flags.
            Instruction::Ser { d } => {
                self.mem.set_reg(d, 0xFF);
            }
            Instruction::Cbr { d, k } => {
                let res = self.mem.reg(d) & !k;
                self.mem.set_reg(d, res);
                self.apply_sreg(alu::logic_flags(self.cpu.sreg, res));
            }

            // -- Compare (flags as SUB/SBC, result discarded) --
            Instruction::Cp { d, r } => {
                let (_, sreg) =
                    alu::sub(self.cpu.sreg, self.mem.reg(d), self.mem.reg(r), false, true);
                self.apply_sreg(sreg);
            }
            Instruction::Cpc { d, r } => {
                let borrow = self.cpu.flag(crate::SREG_C);
                let (_, sreg) =
                    alu::sub(self.cpu.sreg, self.mem.reg(d), self.mem.reg(r), borrow, false);
                self.apply_sreg(sreg);
            }
            Instruction::Cpi { d, k } => {
                let (_, sreg) = alu::sub(self.cpu.sreg, self.mem.reg(d), k, false, true);
                self.apply_sreg(sreg);
            }

            // -- Shift / rotate --
            Instruction::Lsl { d } => {
                let (res, sreg) = alu::lsl(self.cpu.sreg, self.mem.reg(d));
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Lsr { d } => {
                let (res, sreg) = alu::lsr(self.cpu.sreg, self.mem.reg(d));
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Asr { d } => {
                let (res, sreg) = alu::asr(self.cpu.sreg, self.mem.reg(d));
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Rol { d } => {
                let (res, sreg) = alu::rol(self.cpu.sreg, self.mem.reg(d));
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Ror { d } => {
                let (res, sreg) = alu::ror(self.cpu.sreg, self.mem.reg(d));
                self.mem.set_reg(d, res);
                self.apply_sreg(sreg);
            }
            Instruction::Swap { d } => {
                let rd = self.mem.reg(d);
                self.mem.set_reg(d, (rd >> 4) | (rd << 4));
            }

            // -- Multiply --
            Instruction::Mul { d, r } => {
                let res = (self.mem.reg(d) as u16) * (self.mem.reg(r) as u16);
                self.set_product(res);
                self.apply_sreg(alu::mul_flags(self.cpu.sreg, res));
            }
            Instruction::Muls { d, r } => {
                let res = ((self.mem.reg(d) as i8 as i16) * (self.mem.reg(r) as i8 as i16)) as u16;
                self.set_product(res);
                self.apply_sreg(alu::mul_flags(self.cpu.sreg, res));
            }
            Instruction::Mulsu { d, r } => {
                let res = ((self.mem.reg(d) as i8 as i16) * (self.mem.reg(r) as i16)) as u16;
                self.set_product(res);
                self.apply_sreg(alu::mul_flags(self.cpu.sreg, res));
            }
            Instruction::Fmul { d, r } => {
                let product = (self.mem.reg(d) as u16) * (self.mem.reg(r) as u16);
                let res = product.wrapping_shl(1);
                self.set_product(res);
                self.apply_sreg(alu::fmul_flags(self.cpu.sreg, product, res));
            }
            Instruction::Fmuls { d, r } => {
                let product = ((self.mem.reg(d) as i8 as i16) * (self.mem.reg(r) as i8 as i16)) as u16;
                let res = product.wrapping_shl(1);
                self.set_product(res);
                self.apply_sreg(alu::fmul_flags(self.cpu.sreg, product, res));
            }
            Instruction::Fmulsu { d, r } => {
                let product = ((self.mem.reg(d) as i8 as i16) * (self.mem.reg(r) as i16)) as u16;
                let res = product.wrapping_shl(1);
                self.set_product(res);
                self.apply_sreg(alu::fmul_flags(self.cpu.sreg, product, res));
            }

            // -- SREG / bit manipulation --
            Instruction::Bset { s } => {
                self.cpu.sreg |= 1 << s;
                sync_sreg(&self.cpu, &mut self.mem);
            }
            Instruction::Bclr { s } => {
                self.cpu.sreg &= !(1 << s);
                sync_sreg(&self.cpu, &mut self.mem);
            }
            Instruction::Bst { d, b } => {
                let t = bits::bit(self.mem.reg(d), b);
                self.cpu.set_flag(SREG_T, t);
                sync_sreg(&self.cpu, &mut self.mem);
            }
            Instruction::Bld { d, b } => {
                let t = self.cpu.flag(SREG_T);
                let rd = bits::with_bit(self.mem.reg(d), b, t);
                self.mem.set_reg(d, rd);
            }
            // SBI/CBI address the I/O space (data address 0x20 + A).
            Instruction::Sbi { a, b } => {
                let addr = crate::REG_COUNT as u16 + a as u16;
                let v = self.mem.read(addr)?;
                self.write_data(addr, bits::with_bit(v, b, true))?;
            }
            Instruction::Cbi { a, b } => {
                let addr = crate::REG_COUNT as u16 + a as u16;
                let v = self.mem.read(addr)?;
                self.write_data(addr, bits::with_bit(v, b, false))?;
            }

            // -- Data transfer --
            Instruction::Mov { d, r } => {
                let v = self.mem.reg(r);
                self.mem.set_reg(d, v);
            }
            Instruction::Movw { d, r } => {
                let v = self.mem.reg_pair(r);
                self.mem.set_reg_pair(d, v);
            }
            Instruction::Ldi { d, k } => self.mem.set_reg(d, k),
            Instruction::Lds { d, k } => {
                let v = self.mem.read(k)?;
                self.mem.set_reg(d, v);
            }
            Instruction::Sts { k, r } => {
                let v = self.mem.reg(r);
                self.write_data(k, v)?;
            }

            Instruction::LdX { d } => {
                let v = self.mem.read(self.mem.x())?;
                self.mem.set_reg(d, v);
            }
            Instruction::LdXInc { d } => {
                let a = self.mem.x();
                let v = self.mem.read(a)?;
                self.mem.set_reg(d, v);
                self.mem.set_x(a.wrapping_add(1));
            }
            Instruction::LdXDec { d } => {
                let a = self.mem.x().wrapping_sub(1);
                let v = self.mem.read(a)?;
                self.mem.set_x(a);
                self.mem.set_reg(d, v);
            }
            Instruction::LdY { d } => {
                let v = self.mem.read(self.mem.y())?;
                self.mem.set_reg(d, v);
            }
            Instruction::LdYInc { d } => {
                let a = self.mem.y();
                let v = self.mem.read(a)?;
                self.mem.set_reg(d, v);
                self.mem.set_y(a.wrapping_add(1));
            }
            Instruction::LdYDec { d } => {
                let a = self.mem.y().wrapping_sub(1);
                let v = self.mem.read(a)?;
                self.mem.set_y(a);
                self.mem.set_reg(d, v);
            }
            Instruction::LdYQ { d, q } => {
                let v = self.mem.read(self.mem.y().wrapping_add(q as u16))?;
                self.mem.set_reg(d, v);
            }
            Instruction::LdZ { d } => {
                let v = self.mem.read(self.mem.z())?;
                self.mem.set_reg(d, v);
            }
            Instruction::LdZInc { d } => {
                let a = self.mem.z();
                let v = self.mem.read(a)?;
                self.mem.set_reg(d, v);
                self.mem.set_z(a.wrapping_add(1));
            }
            Instruction::LdZDec { d } => {
                let a = self.mem.z().wrapping_sub(1);
                let v = self.mem.read(a)?;
                self.mem.set_z(a);
                self.mem.set_reg(d, v);
            }
            Instruction::LdZQ { d, q } => {
                let v = self.mem.read(self.mem.z().wrapping_add(q as u16))?;
                self.mem.set_reg(d, v);
            }

            Instruction::StX { r } => {
                let v = self.mem.reg(r);
                self.write_data(self.mem.x(), v)?;
            }
            Instruction::StXInc { r } => {
                let a = self.mem.x();
                let v = self.mem.reg(r);
                self.write_data(a, v)?;
                self.mem.set_x(a.wrapping_add(1));
            }
            Instruction::StXDec { r } => {
                let a = self.mem.x().wrapping_sub(1);
                let v = self.mem.reg(r);
                self.write_data(a, v)?;
                self.mem.set_x(a);
            }
            Instruction::StY { r } => {
                let v = self.mem.reg(r);
                self.write_data(self.mem.y(), v)?;
            }
            Instruction::StYInc { r } => {
                let a = self.mem.y();
                let v = self.mem.reg(r);
                self.write_data(a, v)?;
                self.mem.set_y(a.wrapping_add(1));
            }
            Instruction::StYDec { r } => {
                let a = self.mem.y().wrapping_sub(1);
                let v = self.mem.reg(r);
                self.write_data(a, v)?;
                self.mem.set_y(a);
            }
            Instruction::StYQ { r, q } => {
                let v = self.mem.reg(r);
                self.write_data(self.mem.y().wrapping_add(q as u16), v)?;
            }
            Instruction::StZ { r } => {
                let v = self.mem.reg(r);
                self.write_data(self.mem.z(), v)?;
            }
            Instruction::StZInc { r } => {
                let a = self.mem.z();
                let v = self.mem.reg(r);
                self.write_data(a, v)?;
                self.mem.set_z(a.wrapping_add(1));
            }
            Instruction::StZDec { r } => {
                let a = self.mem.z().wrapping_sub(1);
                let v = self.mem.reg(r);
                self.write_data(a, v)?;
                self.mem.set_z(a);
            }
            Instruction::StZQ { r, q } => {
                let v = self.mem.reg(r);
                self.write_data(self.mem.z().wrapping_add(q as u16), v)?;
            }

            // IN/OUT address the I/O space, which sits at data address
            // 0x20 + A.
            Instruction::In { d, a } => {
                let v = self.mem.read(crate::REG_COUNT as u16 + a as u16)?;
                self.mem.set_reg(d, v);
            }
            Instruction::Out { a, r } => {
                let v = self.mem.reg(r);
                self.write_data(crate::REG_COUNT as u16 + a as u16, v)?;
            }

            // -- Stack --
            Instruction::Push { r } => {
                let v = self.mem.reg(r);
                self.push_byte(v)?;
            }
            Instruction::Pop { d } => {
                let v = self.pop_byte()?;
                self.mem.set_reg(d, v);
            }

            // -- Control flow --
            Instruction::Rjmp { k } => {
                self.cpu.pc = (self.cpu.pc as i32 + k as i32) as u16;
            }
            Instruction::Jmp { k } => self.cpu.pc = k,
            Instruction::Ijmp => self.cpu.pc = self.mem.z(),
            Instruction::Rcall { k } => {
                let ret = self.cpu.pc;
                self.push_word(ret)?;
                self.cpu.pc = (self.cpu.pc as i32 + k as i32) as u16;
            }
            Instruction::Call { k } => {
                let ret = self.cpu.pc;
                self.push_word(ret)?;
                self.cpu.pc = k;
            }
            Instruction::Icall => {
                let ret = self.cpu.pc;
                self.push_word(ret)?;
                self.cpu.pc = self.mem.z();
            }
            Instruction::Ret => self.cpu.pc = self.pop_word()?,
            Instruction::Reti => {
                self.cpu.pc = self.pop_word()?;
                self.cpu.sreg |= 1 << SREG_I;
                sync_sreg(&self.cpu, &mut self.mem);
            }

            Instruction::Brbs { s, k } => {
                if self.cpu.flag(s) {
                    self.cpu.pc = (self.cpu.pc as i32 + k as i32) as u16;
                }
            }
            Instruction::Brbc { s, k } => {
                if !self.cpu.flag(s) {
                    self.cpu.pc = (self.cpu.pc as i32 + k as i32) as u16;
                }
            }
            Instruction::Cpse { d, r } => {
                if self.mem.reg(d) == self.mem.reg(r) {
                    self.skip_next();
                }
            }
            Instruction::Sbrc { r, b } => {
                if !bits::bit(self.mem.reg(r), b) {
                    self.skip_next();
                }
            }
            Instruction::Sbrs { r, b } => {
                if bits::bit(self.mem.reg(r), b) {
                    self.skip_next();
                }
            }
            Instruction::Sbic { a, b } => {
                let v = self.mem.read(crate::REG_COUNT as u16 + a as u16)?;
                if !bits::bit(v, b) {
                    self.skip_next();
                }
            }
            Instruction::Sbis { a, b } => {
                let v = self.mem.read(crate::REG_COUNT as u16 + a as u16)?;
                if bits::bit(v, b) {
                    self.skip_next();
                }
            }

            // -- Misc --
            Instruction::Sleep => self.cpu.sleeping = true,
            Instruction::Break | Instruction::Wdr => {}

            // The LPM family needs a program-memory model the core does
            // not carry; it reports like the rest of this group.
            Instruction::Des { .. }
            | Instruction::Spm
            | Instruction::Lpm0
            | Instruction::LpmD { .. }
            | Instruction::LpmDInc { .. }
            | Instruction::Elpm
            | Instruction::Lac { .. }
            | Instruction::Las { .. }
            | Instruction::Lat { .. }
            | Instruction::Xch { .. }
            | Instruction::Eijmp
            | Instruction::Eicall => {
                return Err(ExecError::Unimplemented(inst.mnemonic()));
            }
        }

        self.cpu.tick += 1;
        Ok(())
    }

    /// Install a new SREG and mirror it into data space.
    #[inline(always)]
    fn apply_sreg(&mut self, sreg: u8) {
        self.cpu.sreg = sreg;
        sync_sreg(&self.cpu, &mut self.mem);
    }

    /// Write R1:R0 with a 16-bit multiply product.
    #[inline(always)]
    fn set_product(&mut self, res: u16) {
        self.mem.set_reg(0, res as u8);
        self.mem.set_reg(1, (res >> 8) as u8);
    }

    /// Data-space write that keeps the memory-mapped CPU registers
    /// coherent: storing to 0x5F/0x5E/0x5D also updates SREG/SP.
    pub(crate) fn write_data(&mut self, addr: u16, v: u8) -> Result<(), ExecError> {
        self.mem.write(addr, v)?;
        match addr {
            SREG_ADDR => self.cpu.sreg = v,
            SPL_ADDR => self.cpu.sp = (self.cpu.sp & 0xFF00) | v as u16,
            SPH_ADDR => self.cpu.sp = (self.cpu.sp & 0x00FF) | ((v as u16) << 8),
            _ => {}
        }
        Ok(())
    }

    /// Advance PC past the next instruction word (flat one-word skip).
    #[inline(always)]
    fn skip_next(&mut self) {
        self.cpu.pc = self.cpu.pc.wrapping_add(1);
    }

    /// Push one byte: write at SP, then decrement.
    ///
    /// SP must point into SRAM; pushing below `RAM_START` (or outside the
    /// configured data space) is a stack fault, not a wrap.
    fn push_byte(&mut self, v: u8) -> Result<(), ExecError> {
        let sp = self.cpu.sp;
        if sp < RAM_START || (sp as usize) >= self.mem.size() {
            return Err(ExecError::StackFault { sp });
        }
        self.mem.write(sp, v)?;
        self.cpu.sp = sp - 1;
        sync_sp(&self.cpu, &mut self.mem);
        Ok(())
    }

    /// Pop one byte: increment SP, then read.
    fn pop_byte(&mut self) -> Result<u8, ExecError> {
        let sp = self.cpu.sp.wrapping_add(1);
        if sp < RAM_START || (sp as usize) >= self.mem.size() {
            return Err(ExecError::StackFault { sp });
        }
        self.cpu.sp = sp;
        sync_sp(&self.cpu, &mut self.mem);
        self.mem.read(sp)
    }

    /// Push a 16-bit return address, high byte at the higher address.
    fn push_word(&mut self, val: u16) -> Result<(), ExecError> {
        self.push_byte((val >> 8) as u8)?;
        self.push_byte(val as u8)
    }

    /// Pop a 16-bit return address.
    fn pop_word(&mut self) -> Result<u16, ExecError> {
        let lo = self.pop_byte()?;
        let hi = self.pop_byte()?;
        Ok((hi as u16) << 8 | lo as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SREG_C, SREG_H, SREG_N, SREG_V, SREG_Z};

    #[test]
    fn test_add() {
        let mut a = Avr::new();
        a.mem.set_reg(0, 10);
        a.mem.set_reg(1, 20);
        a.execute(Instruction::Add { d: 0, r: 1 }).unwrap();
        assert_eq!(a.mem.reg(0), 30);
        assert_eq!(a.cpu.pc, 1);
    }

    #[test]
    fn test_add_overflow() {
        let mut a = Avr::new();
        a.mem.set_reg(0, 200);
        a.mem.set_reg(1, 100);
        a.execute(Instruction::Add { d: 0, r: 1 }).unwrap();
        assert_eq!(a.mem.reg(0), 44);
        assert!(a.cpu.flag(SREG_C));
    }

    #[test]
    fn test_add_half_carry_scenario() {
        // R0=0x0F + R1=0x01 -> 0x10 with H set, C/Z/N clear
        let mut a = Avr::new();
        a.mem.set_reg(0, 0x0F);
        a.mem.set_reg(1, 0x01);
        a.execute(Instruction::Add { d: 0, r: 1 }).unwrap();
        assert_eq!(a.mem.reg(0), 0x10);
        assert!(a.cpu.flag(SREG_H));
        assert!(!a.cpu.flag(SREG_C));
        assert!(!a.cpu.flag(SREG_Z));
        assert!(!a.cpu.flag(SREG_N));
    }

    #[test]
    fn test_inc_keeps_carry_flag() {
        let mut a = Avr::new();
        a.cpu.set_flag(SREG_C, true);
        a.mem.set_reg(0, 0xFF);
        a.execute(Instruction::Inc { d: 0 }).unwrap();
        assert_eq!(a.mem.reg(0), 0x00);
        assert!(a.cpu.flag(SREG_Z));
        assert!(!a.cpu.flag(SREG_N));
        assert!(!a.cpu.flag(SREG_V));
        assert!(a.cpu.flag(SREG_C), "INC excludes C");
    }

    #[test]
    fn test_cp_does_not_mutate() {
        let mut a = Avr::new();
        a.mem.set_reg(3, 0x44);
        a.mem.set_reg(4, 0x44);
        a.execute(Instruction::Cp { d: 3, r: 4 }).unwrap();
        assert_eq!(a.mem.reg(3), 0x44);
        assert_eq!(a.mem.reg(4), 0x44);
        assert!(a.cpu.flag(SREG_Z));
    }

    #[test]
    fn test_push_pop() {
        let mut a = Avr::new();
        let sp0 = a.cpu.sp;
        a.mem.set_reg(5, 0x42);
        a.execute(Instruction::Push { r: 5 }).unwrap();
        assert_eq!(a.cpu.sp, sp0 - 1);
        assert_eq!(a.mem.read(sp0).unwrap(), 0x42);
        a.execute(Instruction::Pop { d: 6 }).unwrap();
        assert_eq!(a.cpu.sp, sp0);
        assert_eq!(a.mem.reg(6), 0x42);
    }

    #[test]
    fn test_pop_empty_stack_faults() {
        let mut a = Avr::new();
        let err = a.execute(Instruction::Pop { d: 0 }).unwrap_err();
        assert!(matches!(err, ExecError::StackFault { .. }));
    }

    #[test]
    fn test_push_overflow_faults() {
        let mut a = Avr::new();
        // SP just below the SRAM floor
        a.cpu.sp = RAM_START - 1;
        let err = a.execute(Instruction::Push { r: 0 }).unwrap_err();
        assert!(matches!(err, ExecError::StackFault { sp } if sp == RAM_START - 1));
    }

    #[test]
    fn test_branch_taken_and_not_taken() {
        let mut a = Avr::new();
        a.cpu.pc = 10;
        a.cpu.set_flag(SREG_Z, true);
        a.execute(Instruction::Brbs { s: SREG_Z, k: 5 }).unwrap();
        assert_eq!(a.cpu.pc, 16); // 10 + 1 + 5

        a.cpu.pc = 10;
        a.cpu.set_flag(SREG_Z, false);
        a.execute(Instruction::Brbs { s: SREG_Z, k: 5 }).unwrap();
        assert_eq!(a.cpu.pc, 11);
    }

    #[test]
    fn test_backward_branch() {
        let mut a = Avr::new();
        a.cpu.pc = 20;
        a.cpu.set_flag(SREG_C, true);
        a.execute(Instruction::Brbs { s: SREG_C, k: -6 }).unwrap();
        assert_eq!(a.cpu.pc, 15); // 20 + 1 - 6
    }

    #[test]
    fn test_call_ret() {
        let mut a = Avr::new();
        a.cpu.pc = 10;
        a.execute(Instruction::Call { k: 100 }).unwrap();
        assert_eq!(a.cpu.pc, 100);
        a.execute(Instruction::Ret).unwrap();
        assert_eq!(a.cpu.pc, 11, "return address is the word after the call");
    }

    #[test]
    fn test_rcall_ret() {
        let mut a = Avr::new();
        a.cpu.pc = 0x100;
        a.execute(Instruction::Rcall { k: 5 }).unwrap();
        assert_eq!(a.cpu.pc, 0x106);
        a.execute(Instruction::Ret).unwrap();
        assert_eq!(a.cpu.pc, 0x101);
    }

    #[test]
    fn test_skip_flat_two_words() {
        let mut a = Avr::new();
        a.mem.set_reg(2, 0x80);
        a.cpu.pc = 7;
        a.execute(Instruction::Sbrs { r: 2, b: 7 }).unwrap();
        assert_eq!(a.cpu.pc, 9, "satisfied skip advances two words");
        a.cpu.pc = 7;
        a.execute(Instruction::Sbrc { r: 2, b: 7 }).unwrap();
        assert_eq!(a.cpu.pc, 8, "unsatisfied skip falls through");
    }

    #[test]
    fn test_cpse() {
        let mut a = Avr::new();
        a.mem.set_reg(0, 5);
        a.mem.set_reg(1, 5);
        a.execute(Instruction::Cpse { d: 0, r: 1 }).unwrap();
        assert_eq!(a.cpu.pc, 2);
    }

    #[test]
    fn test_out_to_sreg_and_sp() {
        let mut a = Avr::new();
        a.mem.set_reg(16, 0x42);
        // SREG lives at I/O address 0x3F, SPH at 0x3E.
        a.execute(Instruction::Out { a: 0x3F, r: 16 }).unwrap();
        assert_eq!(a.cpu.sreg, 0x42);
        a.execute(Instruction::In { d: 17, a: 0x3F }).unwrap();
        assert_eq!(a.mem.reg(17), 0x42);

        a.mem.set_reg(18, 0x02);
        a.execute(Instruction::Out { a: 0x3E, r: 18 }).unwrap();
        assert_eq!(a.cpu.sp & 0xFF00, 0x0200);
    }

    #[test]
    fn test_lds_out_of_range() {
        let mut a = Avr::new();
        let err = a.execute(Instruction::Lds { d: 0, k: 0x7FFF }).unwrap_err();
        assert!(matches!(err, ExecError::Addressing { addr: 0x7FFF, .. }));
    }

    #[test]
    fn test_unimplemented_reports() {
        let mut a = Avr::new();
        let err = a.execute(Instruction::Spm).unwrap_err();
        assert!(matches!(err, ExecError::Unimplemented("SPM")));
    }

    #[test]
    fn test_lpm_reports_unimplemented() {
        // All three addressing forms decode, none executes.
        let mut a = Avr::new();
        for inst in [
            Instruction::Lpm0,
            Instruction::LpmD { d: 16 },
            Instruction::LpmDInc { d: 16 },
        ] {
            let err = a.execute(inst).unwrap_err();
            assert_eq!(err, ExecError::Unimplemented("LPM"));
        }
    }

    #[test]
    fn test_sbi_cbi() {
        let mut a = Avr::new();
        // I/O address 0x10 is data address 0x30
        a.execute(Instruction::Sbi { a: 0x10, b: 3 }).unwrap();
        assert_eq!(a.mem.read(0x30).unwrap(), 0x08);
        a.execute(Instruction::Sbi { a: 0x10, b: 0 }).unwrap();
        assert_eq!(a.mem.read(0x30).unwrap(), 0x09);
        a.execute(Instruction::Cbi { a: 0x10, b: 3 }).unwrap();
        assert_eq!(a.mem.read(0x30).unwrap(), 0x01);
    }

    #[test]
    fn test_sbic_sbis_skip_on_io_bit() {
        let mut a = Avr::new();
        a.write(0x30, 0x04).unwrap();
        a.cpu.pc = 5;
        a.execute(Instruction::Sbis { a: 0x10, b: 2 }).unwrap();
        assert_eq!(a.cpu.pc, 7, "set bit satisfies SBIS");
        a.cpu.pc = 5;
        a.execute(Instruction::Sbic { a: 0x10, b: 2 }).unwrap();
        assert_eq!(a.cpu.pc, 6, "set bit falls through SBIC");
        a.cpu.pc = 5;
        a.execute(Instruction::Sbic { a: 0x10, b: 0 }).unwrap();
        assert_eq!(a.cpu.pc, 7, "clear bit satisfies SBIC");
    }

    #[test]
    fn test_swap_nibbles() {
        let mut a = Avr::new();
        a.mem.set_reg(16, 0xA5);
        let sreg0 = a.cpu.sreg;
        a.execute(Instruction::Swap { d: 16 }).unwrap();
        assert_eq!(a.mem.reg(16), 0x5A);
        assert_eq!(a.cpu.sreg, sreg0, "SWAP defines no flags");
    }

    #[test]
    fn test_ldd_std_displacement() {
        let mut a = Avr::new();
        a.mem.set_y(0x0200);
        a.mem.set_z(0x0240);
        a.mem.set_reg(16, 0x77);
        a.execute(Instruction::StYQ { r: 16, q: 5 }).unwrap();
        assert_eq!(a.mem.read(0x0205).unwrap(), 0x77);
        assert_eq!(a.mem.y(), 0x0200, "displacement store leaves Y alone");

        a.mem.set_reg(17, 0x88);
        a.execute(Instruction::StZQ { r: 17, q: 63 }).unwrap();
        a.execute(Instruction::LdZQ { d: 18, q: 63 }).unwrap();
        assert_eq!(a.mem.reg(18), 0x88);
        assert_eq!(a.mem.z(), 0x0240);

        a.execute(Instruction::LdYQ { d: 19, q: 5 }).unwrap();
        assert_eq!(a.mem.reg(19), 0x77);
    }

    #[test]
    fn test_sbci_carry_propagation() {
        // 32-bit increment via SUBI/SBCI with K=0xFF (subtracting -1)
        let mut a = Avr::new();
        a.mem.set_reg(24, 0xFF);
        a.execute(Instruction::Subi { d: 24, k: 0xFF }).unwrap();
        a.execute(Instruction::Sbci { d: 25, k: 0xFF }).unwrap();
        a.execute(Instruction::Sbci { d: 26, k: 0xFF }).unwrap();
        a.execute(Instruction::Sbci { d: 27, k: 0xFF }).unwrap();
        assert_eq!(a.mem.reg(24), 0x00);
        assert_eq!(a.mem.reg(25), 0x01);
        assert_eq!(a.mem.reg(26), 0x00);
        assert_eq!(a.mem.reg(27), 0x00);
    }

    #[test]
    fn test_cpc_16bit_compare() {
        // 0x0100 vs 0x00FF: no borrow, Z must not be set by the zero high byte
        let mut a = Avr::new();
        a.mem.set_reg(20, 0x00);
        a.mem.set_reg(21, 0x01);
        a.mem.set_reg(22, 0xFF);
        a.mem.set_reg(23, 0x00);
        a.execute(Instruction::Cp { d: 20, r: 22 }).unwrap();
        a.execute(Instruction::Cpc { d: 21, r: 23 }).unwrap();
        assert!(!a.cpu.flag(SREG_C), "0x0100 > 0x00FF");
        assert!(!a.cpu.flag(SREG_Z));
    }

    #[test]
    fn test_bst_bld() {
        let mut a = Avr::new();
        a.mem.set_reg(4, 0b0010_0000);
        a.execute(Instruction::Bst { d: 4, b: 5 }).unwrap();
        assert!(a.cpu.flag(SREG_T));
        a.execute(Instruction::Bld { d: 9, b: 0 }).unwrap();
        assert_eq!(a.mem.reg(9), 0x01);
    }

    #[test]
    fn test_ld_st_through_z() {
        let mut a = Avr::new();
        a.mem.set_z(0x0200);
        a.mem.set_reg(16, 0xAB);
        a.execute(Instruction::StZInc { r: 16 }).unwrap();
        assert_eq!(a.mem.read(0x0200).unwrap(), 0xAB);
        assert_eq!(a.mem.z(), 0x0201);
        a.execute(Instruction::LdZDec { d: 17 }).unwrap();
        assert_eq!(a.mem.reg(17), 0xAB);
        assert_eq!(a.mem.z(), 0x0200);
    }

    #[test]
    fn test_mul() {
        let mut a = Avr::new();
        a.mem.set_reg(2, 10);
        a.mem.set_reg(3, 20);
        a.execute(Instruction::Mul { d: 2, r: 3 }).unwrap();
        assert_eq!(a.mem.reg(0), 0xC8);
        assert_eq!(a.mem.reg(1), 0x00);
    }

    #[test]
    fn test_adiw_on_z() {
        let mut a = Avr::new();
        a.mem.set_z(0x1000);
        a.execute(Instruction::Adiw { d: 30, k: 5 }).unwrap();
        assert_eq!(a.mem.z(), 0x1005);
    }

    #[test]
    fn test_reti_sets_interrupt_flag() {
        let mut a = Avr::new();
        a.cpu.pc = 50;
        a.execute(Instruction::Call { k: 200 }).unwrap();
        a.execute(Instruction::Reti).unwrap();
        assert_eq!(a.cpu.pc, 51);
        assert!(a.cpu.flag(SREG_I));
    }

    #[test]
    fn test_sreg_mirrored_in_data_space() {
        let mut a = Avr::new();
        a.mem.set_reg(0, 0xFF);
        a.mem.set_reg(1, 0x01);
        a.execute(Instruction::Add { d: 0, r: 1 }).unwrap();
        assert_eq!(a.mem.read(SREG_ADDR).unwrap(), a.cpu.sreg);
    }
}

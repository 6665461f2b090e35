//! Unified AVR data space.
//!
//! One linear byte array covers the whole addressing contract:
//!
//! | Address Range | Content                      |
//! |---------------|------------------------------|
//! | 0x0000–0x001F | General registers R0–R31     |
//! | 0x0020–0x00FF | I/O + extended I/O registers |
//! | 0x0100–top    | SRAM (stack grows downward)  |
//!
//! The size is fixed at construction. [`Memory::read`] and
//! [`Memory::write`] are the only way instructions touch non-register
//! addresses; an out-of-range address is [`ExecError::Addressing`], never
//! a silent clamp or wrap.

use crate::{ExecError, RAM_START, REG_COUNT};

/// The data space: registers, I/O registers, and SRAM as one address range.
pub struct Memory {
    /// Backing store; length is the configured data-space size.
    pub data: Vec<u8>,
}

impl Memory {
    /// Create a data space of `size` bytes, zero-filled. `size` must cover
    /// at least the register file and I/O region plus one byte of SRAM.
    pub fn new_with_size(size: usize) -> Self {
        assert!(size > RAM_START as usize, "data space must include SRAM");
        Memory { data: vec![0u8; size] }
    }

    /// Total data-space size in bytes.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    // --- Register file ---
    //
    // Register indices come from the decoder, which guarantees 0-31; they
    // are a separate contract from data-space addresses and stay infallible.

    #[inline(always)]
    pub fn reg(&self, r: u8) -> u8 {
        debug_assert!((r as usize) < REG_COUNT);
        self.data[r as usize]
    }

    #[inline(always)]
    pub fn set_reg(&mut self, r: u8, v: u8) {
        debug_assert!((r as usize) < REG_COUNT);
        self.data[r as usize] = v;
    }

    /// Read a 16-bit register pair rooted at register `lo` (little-endian).
    #[inline(always)]
    pub fn reg_pair(&self, lo: u8) -> u16 {
        self.reg(lo) as u16 | ((self.reg(lo + 1) as u16) << 8)
    }

    /// Write a 16-bit register pair rooted at register `lo`.
    #[inline(always)]
    pub fn set_reg_pair(&mut self, lo: u8, v: u16) {
        self.set_reg(lo, v as u8);
        self.set_reg(lo + 1, (v >> 8) as u8);
    }

    /// X pointer (R27:R26)
    #[inline(always)]
    pub fn x(&self) -> u16 {
        self.reg_pair(26)
    }

    /// Y pointer (R29:R28)
    #[inline(always)]
    pub fn y(&self) -> u16 {
        self.reg_pair(28)
    }

    /// Z pointer (R31:R30)
    #[inline(always)]
    pub fn z(&self) -> u16 {
        self.reg_pair(30)
    }

    #[inline(always)]
    pub fn set_x(&mut self, v: u16) {
        self.set_reg_pair(26, v);
    }

    #[inline(always)]
    pub fn set_y(&mut self, v: u16) {
        self.set_reg_pair(28, v);
    }

    #[inline(always)]
    pub fn set_z(&mut self, v: u16) {
        self.set_reg_pair(30, v);
    }

    // --- Checked data-space access ---

    /// Read any data-space address.
    #[inline]
    pub fn read(&self, addr: u16) -> Result<u8, ExecError> {
        self.data
            .get(addr as usize)
            .copied()
            .ok_or(ExecError::Addressing { addr, size: self.data.len() })
    }

    /// Write any data-space address.
    #[inline]
    pub fn write(&mut self, addr: u16, v: u8) -> Result<(), ExecError> {
        let size = self.data.len();
        match self.data.get_mut(addr as usize) {
            Some(slot) => {
                *slot = v;
                Ok(())
            }
            None => Err(ExecError::Addressing { addr, size }),
        }
    }
}

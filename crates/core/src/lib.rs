//! # avr8-core
//!
//! Instruction-level execution core for the 8-bit AVR instruction set.
//!
//! The crate models the part of a CPU simulator with real algorithmic
//! content: the unified data space (register file + I/O registers + SRAM),
//! the status register and its per-instruction flag formulas, the downward
//! growing call stack, and the program-counter update rules for sequential,
//! branching, skipping, and call/return instructions.
//!
//! Fetch and decode are an external collaborator's job: the core consumes
//! already-decoded [`Instruction`] values and makes no assumptions about
//! where they came from. Peripherals, interrupt dispatch, and any loader or
//! display tooling are likewise out of scope.
//!
//! ## Architecture
//!
//! - [`Avr`] — the machine: CPU state plus data space, with the single
//!   [`Avr::execute`] entry point
//! - [`Cpu`] — PC, SP, SREG, instruction counter, sleep latch
//! - [`Memory`] — unified data space with checked addressing
//! - [`alu`] — pure flag engine built around one shared carry-chain
//!   primitive
//! - [`opcodes`] — the decoded [`Instruction`] enum
//! - [`disasm`] — instruction and SREG formatting for traces and dumps
//! - [`savestate`] — serialized machine state (bincode + deflate)
//! - [`snapshot`] — in-memory snapshot ring for rewind-style debugging
//!
//! ## Error model
//!
//! Execution is deterministic and synchronous. A failed instruction reports
//! one [`ExecError`] and leaves the machine halted from the caller's point
//! of view; nothing is retried and nothing is silently turned into a no-op,
//! since swallowing a fault would corrupt flag/PC state invisibly.

pub mod alu;
pub mod bits;
pub mod cpu;
pub mod disasm;
pub mod memory;
pub mod opcodes;
pub mod savestate;
pub mod snapshot;

pub use cpu::Cpu;
pub use memory::Memory;
pub use opcodes::Instruction;

use thiserror::Error;

/// Number of general-purpose registers (R0–R31)
pub const REG_COUNT: usize = 32;
/// I/O + extended I/O register space size (0x20..0x100)
pub const IO_SIZE: usize = 224;
/// Default SRAM size: 2 KiB
pub const SRAM_SIZE: usize = 2 * 1024;
/// First SRAM address; also the floor of the stack region
pub const RAM_START: u16 = (REG_COUNT + IO_SIZE) as u16;
/// Default total data space: registers + I/O + SRAM
pub const DATA_SIZE: usize = REG_COUNT + IO_SIZE + SRAM_SIZE;

// SREG bit positions
pub const SREG_C: u8 = 0;
pub const SREG_Z: u8 = 1;
pub const SREG_N: u8 = 2;
pub const SREG_V: u8 = 3;
pub const SREG_S: u8 = 4;
pub const SREG_H: u8 = 5;
pub const SREG_T: u8 = 6;
pub const SREG_I: u8 = 7;

// Memory-mapped CPU registers (data-space addresses)
pub const SPL_ADDR: u16 = 0x5D;
pub const SPH_ADDR: u16 = 0x5E;
pub const SREG_ADDR: u16 = 0x5F;

/// Fatal execution errors.
///
/// Each one aborts the current instruction; the caller decides whether to
/// reset, reseed state, or stop. PC has already advanced past the failing
/// instruction when the error is reported.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecError {
    /// Operand address outside the configured data space.
    #[error("data space address 0x{addr:04X} out of range (size 0x{size:04X})")]
    Addressing { addr: u16, size: usize },
    /// Decoded mnemonic has no handler in this core.
    #[error("unimplemented instruction: {0}")]
    Unimplemented(&'static str),
    /// Stack pointer pushed or popped outside the stack region.
    #[error("stack pointer 0x{sp:04X} outside stack region")]
    StackFault { sp: u16 },
}

/// The AVR machine: CPU state plus unified data space.
///
/// All state is owned exclusively by this struct; execution is
/// single-threaded and each instruction is one atomic step relative to any
/// observer.
pub struct Avr {
    pub cpu: Cpu,
    pub mem: Memory,
    /// Print each executed instruction to stderr (debug aid)
    pub trace: bool,
}

impl Avr {
    /// Create a machine with the default 2 KiB of SRAM.
    pub fn new() -> Self {
        Self::with_sram_size(SRAM_SIZE)
    }

    /// Create a machine with `sram` bytes of SRAM. The data-space size is
    /// fixed for the lifetime of the machine; SP starts at the top of SRAM.
    pub fn with_sram_size(sram: usize) -> Self {
        let data_size = REG_COUNT + IO_SIZE + sram;
        let mut avr = Avr {
            cpu: Cpu::new(),
            mem: Memory::new_with_size(data_size),
            trace: false,
        };
        avr.cpu.sp = (data_size - 1) as u16;
        cpu::sync_sp(&avr.cpu, &mut avr.mem);
        avr
    }

    /// Reset to power-on state: data space zeroed, PC=0, SREG=0, SP at the
    /// top of SRAM. The data-space size is unchanged.
    pub fn reset(&mut self) {
        self.mem.data.fill(0);
        self.cpu = Cpu::new();
        self.cpu.sp = (self.mem.size() - 1) as u16;
        cpu::sync_sp(&self.cpu, &mut self.mem);
    }

    /// Execute decoded instructions from `program`, treating PC as an index
    /// into the slice. Stops when PC leaves the slice, when the CPU goes to
    /// sleep, or after `max_steps` instructions. Returns the number of
    /// instructions executed.
    pub fn run(&mut self, program: &[Instruction], max_steps: u64) -> Result<u64, ExecError> {
        let mut steps = 0;
        while steps < max_steps && !self.cpu.sleeping {
            let Some(&inst) = program.get(self.cpu.pc as usize) else {
                break;
            };
            self.execute(inst)?;
            steps += 1;
        }
        Ok(steps)
    }

    /// Read any data-space address.
    pub fn read(&self, addr: u16) -> Result<u8, ExecError> {
        self.mem.read(addr)
    }

    /// Write any data-space address. Writes to the SREG/SPL/SPH addresses
    /// update the corresponding CPU fields, as OUT does.
    pub fn write(&mut self, addr: u16, v: u8) -> Result<(), ExecError> {
        self.write_data(addr, v)
    }

    /// Read general-purpose register `r` (0–31).
    pub fn reg(&self, r: u8) -> u8 {
        self.mem.reg(r)
    }

    /// Write general-purpose register `r` (0–31).
    pub fn set_reg(&mut self, r: u8, v: u8) {
        self.mem.set_reg(r, v);
    }

    /// Read a single SREG flag by bit index (`SREG_C` .. `SREG_I`).
    pub fn flag(&self, bit: u8) -> bool {
        self.cpu.flag(bit)
    }

    /// Current program counter (word address).
    pub fn pc(&self) -> u16 {
        self.cpu.pc
    }

    /// Current stack pointer (data-space address).
    pub fn sp(&self) -> u16 {
        self.cpu.sp
    }

    /// Format a register dump with R0–R31, PC, SP, SREG, and the pointer
    /// pairs, for debug output.
    pub fn dump_regs(&self) -> String {
        let mut s = String::new();
        for i in 0..REG_COUNT {
            if i % 8 == 0 && i > 0 {
                s.push('\n');
            }
            s.push_str(&format!("R{:2}={:02X} ", i, self.mem.data[i]));
        }
        s.push_str(&format!(
            "\nPC={:04X} SP={:04X} SREG={} (0x{:02X})",
            self.cpu.pc,
            self.cpu.sp,
            disasm::format_sreg(self.cpu.sreg),
            self.cpu.sreg
        ));
        s.push_str(&format!(
            "\nX={:04X} Y={:04X} Z={:04X}",
            self.mem.x(),
            self.mem.y(),
            self.mem.z()
        ));
        s
    }
}

impl Default for Avr {
    fn default() -> Self {
        Self::new()
    }
}

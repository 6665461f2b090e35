//! Machine state serialization (quick save / quick load).
//!
//! Captures the full execution state — CPU registers and the entire data
//! space — using bincode with deflate compression, so a caller can park a
//! machine and restore it bit-for-bit later.
//!
//! ## Format
//!
//! ```text
//! +------------------+
//! | Magic "AVRS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```
//!
//! Restoring requires a machine with the same data-space size; the size is
//! part of the captured state and is checked on load.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::Avr;

/// Magic bytes identifying an avr8-core save state.
const MAGIC: &[u8; 4] = b"AVRS";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("decompress error: {0}")]
    Decompress(String),
    #[error("not a save state (bad magic)")]
    BadMagic,
    #[error("unsupported save state version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("data space size mismatch: save has 0x{saved:04X}, machine has 0x{current:04X}")]
    SizeMismatch { saved: usize, current: usize },
}

/// Serializable snapshot of the whole machine.
#[derive(Serialize, Deserialize)]
pub struct SaveState {
    pub pc: u16,
    pub sp: u16,
    pub sreg: u8,
    pub tick: u64,
    pub sleeping: bool,
    /// Full data space: registers + I/O + SRAM
    pub data: Vec<u8>,
}

impl Avr {
    /// Capture the machine as a serializable [`SaveState`].
    pub fn to_state(&self) -> SaveState {
        SaveState {
            pc: self.cpu.pc,
            sp: self.cpu.sp,
            sreg: self.cpu.sreg,
            tick: self.cpu.tick,
            sleeping: self.cpu.sleeping,
            data: self.mem.data.clone(),
        }
    }

    /// Restore the machine from a [`SaveState`].
    pub fn apply_state(&mut self, state: &SaveState) -> Result<(), StateError> {
        if state.data.len() != self.mem.size() {
            return Err(StateError::SizeMismatch {
                saved: state.data.len(),
                current: self.mem.size(),
            });
        }
        self.cpu.pc = state.pc;
        self.cpu.sp = state.sp;
        self.cpu.sreg = state.sreg;
        self.cpu.tick = state.tick;
        self.cpu.sleeping = state.sleeping;
        self.mem.data.copy_from_slice(&state.data);
        Ok(())
    }

    /// Serialize the machine to the framed, compressed byte format.
    pub fn save_state(&self) -> Result<Vec<u8>, StateError> {
        to_bytes(&self.to_state())
    }

    /// Restore the machine from bytes produced by [`Avr::save_state`].
    pub fn restore_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let state = from_bytes(bytes)?;
        self.apply_state(&state)
    }
}

/// Encode a state with header and deflate compression.
pub fn to_bytes(state: &SaveState) -> Result<Vec<u8>, StateError> {
    let payload = bincode::serialize(state)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(8 + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decode a state, verifying magic and version.
pub fn from_bytes(bytes: &[u8]) -> Result<SaveState, StateError> {
    if bytes.len() < 8 || &bytes[0..4] != MAGIC {
        return Err(StateError::BadMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(StateError::Version { found: version, expected: FORMAT_VERSION });
    }
    let payload = miniz_oxide::inflate::decompress_to_vec(&bytes[8..])
        .map_err(|e| StateError::Decompress(format!("{e:?}")))?;
    Ok(bincode::deserialize(&payload)?)
}

/// Save a machine state to a file.
pub fn save_to_file(avr: &Avr, path: &Path) -> Result<(), StateError> {
    let bytes = avr.save_state()?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Load a machine state from a file.
pub fn load_from_file(avr: &mut Avr, path: &Path) -> Result<(), StateError> {
    let bytes = std::fs::read(path)?;
    avr.restore_state(&bytes)
}

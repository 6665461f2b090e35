//! In-memory execution snapshots for stepping backwards.
//!
//! Unlike [`crate::savestate`] these are uncompressed and never leave the
//! process: the intended use is a driver that snapshots every N instructions
//! and lets the user rewind through a ring of recent machine states.

use crate::Avr;

/// A frozen copy of the machine at one point in execution.
#[derive(Clone)]
pub struct Snapshot {
    pub pc: u16,
    pub sp: u16,
    pub sreg: u8,
    pub tick: u64,
    pub sleeping: bool,
    /// Full data space (registers + I/O + SRAM)
    pub data: Vec<u8>,
}

impl Avr {
    /// Freeze the current machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pc: self.cpu.pc,
            sp: self.cpu.sp,
            sreg: self.cpu.sreg,
            tick: self.cpu.tick,
            sleeping: self.cpu.sleeping,
            data: self.mem.data.clone(),
        }
    }

    /// Restore a previously taken snapshot.
    ///
    /// The snapshot must come from a machine with the same data-space size;
    /// mixing sizes is a caller bug.
    pub fn restore(&mut self, snap: &Snapshot) {
        assert_eq!(snap.data.len(), self.mem.size(), "snapshot size mismatch");
        self.cpu.pc = snap.pc;
        self.cpu.sp = snap.sp;
        self.cpu.sreg = snap.sreg;
        self.cpu.tick = snap.tick;
        self.cpu.sleeping = snap.sleeping;
        self.mem.data.copy_from_slice(&snap.data);
    }
}

/// Ring buffer of snapshots for rewind.
pub struct RewindBuffer {
    buf: Vec<Option<Snapshot>>,
    /// Next slot to overwrite
    write_pos: usize,
    /// Number of valid snapshots
    count: usize,
    /// Instructions between snapshots
    pub interval: u64,
    step_counter: u64,
}

impl RewindBuffer {
    /// Create a rewind buffer holding up to `capacity` snapshots, one per
    /// `interval` executed instructions. `capacity` must be nonzero.
    pub fn new(capacity: usize, interval: u64) -> Self {
        assert!(capacity > 0, "rewind buffer needs at least one slot");
        let mut buf = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            buf.push(None);
        }
        RewindBuffer { buf, write_pos: 0, count: 0, interval, step_counter: 0 }
    }

    /// Notify that one instruction retired. Returns true when it is time to
    /// take a snapshot.
    pub fn tick_step(&mut self) -> bool {
        self.step_counter += 1;
        if self.step_counter >= self.interval {
            self.step_counter = 0;
            true
        } else {
            false
        }
    }

    /// Push a snapshot, evicting the oldest when full.
    pub fn push(&mut self, snap: Snapshot) {
        self.buf[self.write_pos] = Some(snap);
        self.write_pos = (self.write_pos + 1) % self.buf.len();
        if self.count < self.buf.len() {
            self.count += 1;
        }
    }

    /// Pop the most recent snapshot. Returns None if empty.
    pub fn pop(&mut self) -> Option<Snapshot> {
        if self.count == 0 {
            return None;
        }
        if self.write_pos == 0 {
            self.write_pos = self.buf.len() - 1;
        } else {
            self.write_pos -= 1;
        }
        self.count -= 1;
        self.buf[self.write_pos].take()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        for slot in self.buf.iter_mut() {
            *slot = None;
        }
        self.count = 0;
        self.write_pos = 0;
        self.step_counter = 0;
    }
}

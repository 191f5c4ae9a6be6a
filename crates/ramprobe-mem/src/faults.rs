//! Fault-injection wrappers.
//!
//! Each wrapper decorates an inner [`WordStore`] and corrupts one path the
//! way a board-level defect would: data lines, address lines, or individual
//! cells. Wrappers compose, so a test can stack a stuck data line on top of
//! an aliased bank.

use crate::store::{MemoryError, Result, WordStore};
use crate::word::WordWidth;

/// A defect on the data path, applied to every word crossing the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataLineFault {
    /// Masked lines always read as 0.
    StuckLow(u64),
    /// Masked lines always read as 1.
    StuckHigh(u64),
    /// Two lines shorted together; both carry the wired-AND of the pair.
    Bridged(u8, u8),
}

/// Wrapper that drives [`DataLineFault`] onto both the write and the read
/// path, like a physical short would.
pub struct FaultyDataLines<S> {
    inner: S,
    fault: DataLineFault,
}

impl<S: WordStore> FaultyDataLines<S> {
    pub fn new(inner: S, fault: DataLineFault) -> Result<Self> {
        let bits = inner.width().bits();
        match fault {
            DataLineFault::StuckLow(mask) | DataLineFault::StuckHigh(mask) => {
                let excess = mask & !inner.width().mask();
                if excess != 0 {
                    let line = (63 - excess.leading_zeros()) as u8;
                    return Err(MemoryError::BadFaultLine { line, bits });
                }
            }
            DataLineFault::Bridged(a, b) => {
                for line in [a, b] {
                    if u32::from(line) >= bits {
                        return Err(MemoryError::BadFaultLine { line, bits });
                    }
                }
                if a == b {
                    return Err(MemoryError::BadFaultLine { line: a, bits });
                }
            }
        }
        Ok(Self { inner, fault })
    }

    fn corrupt(&self, value: u64) -> u64 {
        let mask = self.inner.width().mask();
        match self.fault {
            DataLineFault::StuckLow(lines) => value & !lines,
            DataLineFault::StuckHigh(lines) => (value | lines) & mask,
            DataLineFault::Bridged(a, b) => {
                let wired = ((value >> a) & 1) & ((value >> b) & 1);
                let cleared = value & !((1u64 << a) | (1u64 << b));
                cleared | (wired << a) | (wired << b)
            }
        }
    }
}

impl<S: WordStore> WordStore for FaultyDataLines<S> {
    fn width(&self) -> WordWidth {
        self.inner.width()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read_word(&mut self, addr: u64) -> Result<u64> {
        let value = self.inner.read_word(addr)?;
        Ok(self.corrupt(value))
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        let driven = self.corrupt(value);
        self.inner.write_word(addr, driven)
    }
}

/// A defect on the address path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressLineFault {
    /// The line never asserts; every access sees it as 0.
    StuckLow(u8),
    /// The line is always asserted.
    StuckHigh(u8),
    /// `victim` is wired to `driven`: the victim line carries whatever the
    /// driven line carries.
    ShortedTo { driven: u8, victim: u8 },
}

/// Wrapper that remaps every access through an [`AddressLineFault`].
///
/// The remapped address wraps into the bank (`% size`), matching hardware
/// where every decoded combination selects some cell. Lines below the word
/// alignment are rejected; they would split words.
pub struct MiswiredAddressLines<S> {
    inner: S,
    fault: AddressLineFault,
}

impl<S: WordStore> MiswiredAddressLines<S> {
    pub fn new(inner: S, fault: AddressLineFault) -> Result<Self> {
        let low = inner.width().addr_align_bits();
        let check = |line: u8| -> Result<()> {
            if u32::from(line) < low || line >= 64 {
                return Err(MemoryError::BadFaultLine { line, bits: 64 });
            }
            Ok(())
        };
        match fault {
            AddressLineFault::StuckLow(line) | AddressLineFault::StuckHigh(line) => check(line)?,
            AddressLineFault::ShortedTo { driven, victim } => {
                check(driven)?;
                check(victim)?;
                if driven == victim {
                    return Err(MemoryError::BadFaultLine { line: driven, bits: 64 });
                }
            }
        }
        Ok(Self { inner, fault })
    }

    fn remap(&self, addr: u64) -> u64 {
        let wired = match self.fault {
            AddressLineFault::StuckLow(line) => addr & !(1u64 << line),
            AddressLineFault::StuckHigh(line) => addr | (1u64 << line),
            AddressLineFault::ShortedTo { driven, victim } => {
                let bit = (addr >> driven) & 1;
                (addr & !(1u64 << victim)) | (bit << victim)
            }
        };
        wired % self.inner.size()
    }
}

impl<S: WordStore> WordStore for MiswiredAddressLines<S> {
    fn width(&self) -> WordWidth {
        self.inner.width()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read_word(&mut self, addr: u64) -> Result<u64> {
        check_request(addr, self.inner.width(), self.inner.size())?;
        let cell = self.remap(addr);
        self.inner.read_word(cell)
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        check_request(addr, self.inner.width(), self.inner.size())?;
        let cell = self.remap(addr);
        self.inner.write_word(cell, value)
    }
}

// The requested address is validated against the nominal window before
// remapping; the remapped cell is in range by construction.
fn check_request(addr: u64, width: WordWidth, size: u64) -> Result<()> {
    if !width.is_aligned(addr) {
        return Err(MemoryError::Misaligned {
            addr,
            width: width.bytes(),
        });
    }
    if addr >= size {
        return Err(MemoryError::OutOfRange { addr, size });
    }
    Ok(())
}

/// A retention defect in one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellFault {
    /// Cell is frozen: reads always return this value.
    Stuck(u64),
    /// Cell stores its first `writes` values, then freezes and reads as
    /// `garbage`.
    WearOut { writes: u32, garbage: u64 },
    /// Cell answers the read-back immediately following its own write, then
    /// reads as `garbage` once any other cell is written.
    Decay { garbage: u64 },
}

struct CellState {
    addr: u64,
    fault: CellFault,
    writes_seen: u32,
}

/// Wrapper with per-cell retention faults. Writes always reach the inner
/// store (the bus transfer happens); reads are overridden per the fault.
pub struct CellFaults<S> {
    inner: S,
    cells: Vec<CellState>,
    last_write: Option<u64>,
}

impl<S: WordStore> CellFaults<S> {
    /// `cells` maps word addresses to their defect.
    pub fn new(inner: S, cells: Vec<(u64, CellFault)>) -> Self {
        let cells = cells
            .into_iter()
            .map(|(addr, fault)| CellState {
                addr,
                fault,
                writes_seen: 0,
            })
            .collect();
        Self {
            inner,
            cells,
            last_write: None,
        }
    }
}

impl<S: WordStore> WordStore for CellFaults<S> {
    fn width(&self) -> WordWidth {
        self.inner.width()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read_word(&mut self, addr: u64) -> Result<u64> {
        let stored = self.inner.read_word(addr)?;
        let mask = self.inner.width().mask();
        let Some(cell) = self.cells.iter().find(|c| c.addr == addr) else {
            return Ok(stored);
        };
        Ok(match cell.fault {
            CellFault::Stuck(value) => value & mask,
            CellFault::WearOut { writes, garbage } if cell.writes_seen > writes => garbage & mask,
            CellFault::WearOut { .. } => stored,
            CellFault::Decay { garbage } if self.last_write != Some(addr) => garbage & mask,
            CellFault::Decay { .. } => stored,
        })
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        self.inner.write_word(addr, value)?;
        if let Some(cell) = self.cells.iter_mut().find(|c| c.addr == addr) {
            if let CellFault::WearOut { .. } = cell.fault {
                cell.writes_seen = cell.writes_seen.saturating_add(1);
            }
        }
        self.last_write = Some(addr);
        Ok(())
    }
}

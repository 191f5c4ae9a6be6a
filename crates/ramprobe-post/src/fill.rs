use thiserror::Error;
use tracing::debug;

use ramprobe_mem::WordStore;

/// A cell did not retain its self-address during a fill pass.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cell 0x{addr:x} did not retain 0x{wrote:x} (read 0x{read:x})")]
pub struct FillMismatch {
    pub addr: u64,
    pub wrote: u64,
    pub read: u64,
}

/// Writes every word in `[start, end)` its own address and verifies each
/// write immediately.
///
/// An immediate mismatch means the cell is not writable at all — unlike the
/// aliasing the later scan looks for, where the value only changes once a
/// higher address is written. Both bounds must be word-aligned with
/// `start <= end` (the probe validates its region up front).
pub fn fill_with_addresses(
    store: &mut dyn WordStore,
    start: u64,
    end: u64,
) -> crate::Result<Option<FillMismatch>> {
    let bytes = store.width().bytes();
    debug!(start, end, "self-address fill");
    let mut addr = start;
    while addr < end {
        store.write_word(addr, addr)?;
        let read = store.read_word(addr)?;
        if read != addr {
            return Ok(Some(FillMismatch {
                addr,
                wrote: addr,
                read,
            }));
        }
        addr += bytes;
    }
    Ok(None)
}

//! Wraparound sizing.
//!
//! After the window holds the self-address pattern, the largest prefix in
//! which every word still reads its own address is exactly the usable
//! capacity: an address beyond the true physical size lands on some lower
//! cell and leaves its own address behind there, so the victim is the first
//! word the forward scan finds disagreeing.
//!
//! Sizing runs as a fixed point, not a binary search. Each pass scans
//! `[start, probe_limit)`; a mismatch shrinks `probe_limit`, the narrowed
//! window is refilled, and the next pass re-checks, until a pass is clean or
//! the pass cap converts a pathological fault pattern into
//! [`ScanOutcome::Inconclusive`].

use tracing::debug;

use ramprobe_mem::{WordStore, WordWidth};

use crate::fill::{fill_with_addresses, FillMismatch};
use crate::region::MemoryRegion;
use crate::report::ReportSink;

/// Working state of one sizing run.
///
/// `probe_limit` is the current hypothesis for the top of usable memory; it
/// never exceeds the nominal limit and only ever shrinks. `previous_limit`
/// is the hypothesis before the most recent shift.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanState {
    pub start: u64,
    pub probe_limit: u64,
    pub previous_limit: u64,
    pub converged: bool,
}

impl ScanState {
    fn new(region: MemoryRegion) -> Self {
        Self {
            start: region.base,
            probe_limit: region.limit,
            previous_limit: region.limit,
            converged: false,
        }
    }

    /// Usable byte count under the current hypothesis, clamped non-negative.
    pub fn usable_bytes(&self) -> u64 {
        self.probe_limit.saturating_sub(self.start)
    }
}

/// How a sizing run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A full pass found every word holding its own address.
    Converged { state: ScanState, passes: u32 },
    /// The first cell read a value no wraparound hypothesis explains;
    /// capacity is 0.
    Collapsed { addr: u64, observed: u64, passes: u32 },
    /// A narrowed window failed its refill write-verify; capacity is 0.
    RefillFailed { mismatch: FillMismatch, passes: u32 },
    /// The pass cap ran out before a clean pass.
    Inconclusive { state: ScanState, passes: u32 },
}

enum Finding {
    CleanWraparound { new_limit: u64 },
    RogueBit { new_limit: u64 },
    Collapse,
}

/// The stored value names the fill write that landed on the scanned cell, so
/// a foreign value is only wraparound-consistent if it is a word-aligned
/// address above the cell and below the current hypothesis; the implied
/// aliasing period is `observed - addr`.
///
/// With an ascending fill, genuine modulo aliasing always strikes the window
/// base first (every cell holds its highest alias), so an overlap at `start`
/// is the clean case and the period lands the new limit exactly on the
/// observed value. A first mismatch above `start` means some line protected
/// part of the window — a rogue address bit. It narrows by the same period
/// arithmetic when the value is consistent, and otherwise falls back to the
/// prefix the pass just verified.
fn classify(state: &ScanState, width: WordWidth, addr: u64, observed: u64) -> Finding {
    let consistent =
        observed > addr && observed < state.probe_limit && width.is_aligned(observed);
    if addr == state.start {
        if consistent {
            Finding::CleanWraparound {
                new_limit: state.start + (observed - addr),
            }
        } else {
            Finding::Collapse
        }
    } else if consistent {
        Finding::RogueBit {
            new_limit: state.start + (observed - addr),
        }
    } else {
        Finding::RogueBit { new_limit: addr }
    }
}

fn scan_pass(store: &mut dyn WordStore, state: &ScanState) -> crate::Result<Option<(u64, u64)>> {
    let bytes = store.width().bytes();
    let mut addr = state.start;
    while addr < state.probe_limit {
        let stored = store.read_word(addr)?;
        if stored != addr {
            return Ok(Some((addr, stored)));
        }
        addr += bytes;
    }
    Ok(None)
}

/// Converges on the largest aliasing-free prefix of a filled window.
///
/// Precondition: the region is validated against `store` and
/// `[start, limit)` already holds the self-address pattern. Refills between
/// passes are handled here; `max_passes` bounds the scan count.
pub fn discover_usable(
    store: &mut dyn WordStore,
    region: MemoryRegion,
    max_passes: u32,
    sink: &mut dyn ReportSink,
) -> crate::Result<ScanOutcome> {
    let width = store.width();
    let mut state = ScanState::new(region);
    let mut passes = 0u32;

    while passes < max_passes {
        passes += 1;
        debug!(pass = passes, probe_limit = state.probe_limit, "address scan");

        let Some((addr, observed)) = scan_pass(store, &state)? else {
            state.converged = true;
            return Ok(ScanOutcome::Converged { state, passes });
        };

        let new_limit = match classify(&state, width, addr, observed) {
            Finding::Collapse => {
                sink.line(&format!(
                    "unusable: first cell 0x{addr:x} reads 0x{observed:x}, no wraparound hypothesis fits"
                ));
                return Ok(ScanOutcome::Collapsed {
                    addr,
                    observed,
                    passes,
                });
            }
            Finding::CleanWraparound { new_limit } => {
                sink.line(&format!(
                    "wraparound: 0x{addr:x} reads 0x{observed:x}; period 0x{:x}; usable top 0x{:x} -> 0x{new_limit:x}",
                    new_limit - state.start,
                    state.probe_limit,
                ));
                new_limit
            }
            Finding::RogueBit { new_limit } => {
                sink.line(&format!(
                    "rogue address bit: 0x{addr:x} reads 0x{observed:x} (expected 0x{addr:x}); usable top 0x{:x} -> 0x{new_limit:x}",
                    state.probe_limit,
                ));
                new_limit
            }
        };

        debug_assert!(new_limit > state.start && new_limit < state.probe_limit);
        state.previous_limit = state.probe_limit;
        state.probe_limit = new_limit;
        debug!(
            pass = passes,
            previous_limit = state.previous_limit,
            probe_limit = state.probe_limit,
            "hypothesis narrowed"
        );

        if passes >= max_passes {
            break;
        }
        if let Some(mismatch) = fill_with_addresses(store, state.start, state.probe_limit)? {
            sink.line(&format!("refill failed: {mismatch}"));
            return Ok(ScanOutcome::RefillFailed { mismatch, passes });
        }
    }

    sink.line(&format!(
        "sizing did not settle after {passes} passes; last hypothesis 0x{:x}",
        state.probe_limit
    ));
    Ok(ScanOutcome::Inconclusive { state, passes })
}

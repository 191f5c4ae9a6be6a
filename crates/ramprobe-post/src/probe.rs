//! Diagnostic orchestration.
//!
//! [`MemoryProbe::run`] chains the three phases over any [`WordStore`]:
//! data-bus walk, self-address fill, wraparound sizing. Phases run strictly
//! in order and a fatal finding in one phase stops the run before the next
//! touches memory.

use std::fmt;

use thiserror::Error;
use tracing::info;

use ramprobe_mem::{MemoryError, WordStore, WordWidth};

use crate::databus::{walk_data_bus, DataBusFault};
use crate::fill::{fill_with_addresses, FillMismatch};
use crate::region::{MemoryRegion, RegionError};
use crate::report::ReportSink;
use crate::sizer::{discover_usable, ScanOutcome};

/// A probe run that could not even start or lost access to the store mid-run.
///
/// Distinct from a fault *finding*: findings are ordinary [`ProbeOutcome`]
/// values, errors mean the store rejected an access the probe believed valid.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticError {
    #[error("region rejected: {0}")]
    InvalidRegion(#[from] RegionError),
    #[error("memory access failed: {0}")]
    Memory(#[from] MemoryError),
}

pub type Result<T> = std::result::Result<T, DiagnosticError>;

/// What and how hard to probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeConfig {
    pub region: MemoryRegion,
    /// Cap on sizing passes; `None` derives one from the window size.
    pub max_passes: Option<u32>,
}

impl ProbeConfig {
    pub fn new(region: MemoryRegion) -> Self {
        Self {
            region,
            max_passes: None,
        }
    }

    /// The derived default allows one pass per halving of the window plus
    /// slack for multi-layer aliasing, so any fault pattern that narrows
    /// geometrically still converges within the cap.
    pub fn effective_max_passes(&self, width: WordWidth) -> u32 {
        if let Some(cap) = self.max_passes {
            return cap;
        }
        let words = self.region.word_count(width).max(1);
        let ceil_log2 = 64 - (words - 1).leading_zeros();
        ceil_log2 + 4
    }
}

/// Result of a completed probe run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The window (or a prefix of it) is usable. `usable_bytes` is 0 when
    /// the very first cell came back unexplainable.
    Sized { usable_bytes: u64, passes: u32 },
    /// A data line cannot carry its bit; halted before any pattern write.
    DataBusFault(DataBusFault),
    /// A write-verify failed, either while seeding the window (`refill`
    /// false) or while re-seeding a narrowed one (`refill` true).
    FillFailure { mismatch: FillMismatch, refill: bool },
    /// The pass cap expired before a clean scan.
    Inconclusive { passes: u32, last_probe_limit: u64 },
}

impl ProbeOutcome {
    /// Bytes confirmed usable. Conservatively 0 for every outcome that
    /// failed to confirm a prefix, including [`ProbeOutcome::Inconclusive`].
    pub fn usable_bytes(&self) -> u64 {
        match self {
            ProbeOutcome::Sized { usable_bytes, .. } => *usable_bytes,
            _ => 0,
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Sized {
                usable_bytes,
                passes,
            } => write!(f, "usable memory: 0x{usable_bytes:x} bytes ({passes} passes)"),
            ProbeOutcome::DataBusFault(fault) => write!(f, "halted: {fault}"),
            ProbeOutcome::FillFailure {
                mismatch,
                refill: false,
            } => write!(f, "halted: {mismatch}"),
            ProbeOutcome::FillFailure {
                mismatch,
                refill: true,
            } => write!(f, "halted on refill: {mismatch}"),
            ProbeOutcome::Inconclusive {
                passes,
                last_probe_limit,
            } => write!(
                f,
                "inconclusive after {passes} passes; last hypothesis 0x{last_probe_limit:x}"
            ),
        }
    }
}

/// The full three-phase diagnostic over one region.
#[derive(Clone, Copy, Debug)]
pub struct MemoryProbe {
    config: ProbeConfig,
}

impl MemoryProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Runs the diagnostic, reporting progress through `sink`. Every run
    /// ends with a `result:` line carrying the [`ProbeOutcome`].
    pub fn run(
        &self,
        store: &mut dyn WordStore,
        sink: &mut dyn ReportSink,
    ) -> Result<ProbeOutcome> {
        let outcome = self.execute(store, sink)?;
        sink.line(&format!("result: {outcome}"));
        info!(%outcome, "memory diagnostic complete");
        Ok(outcome)
    }

    fn execute(
        &self,
        store: &mut dyn WordStore,
        sink: &mut dyn ReportSink,
    ) -> Result<ProbeOutcome> {
        let width = store.width();
        let region = self.config.region;

        // 1) The window must be addressable before anything touches memory.
        region.validate(width, store.size())?;
        info!(
            base = region.base,
            limit = region.limit,
            bits = width.bits(),
            "memory diagnostic start"
        );

        // 2) Walk a single 1 across every data line at the window base.
        if let Some(fault) = walk_data_bus(store, region.base)? {
            return Ok(ProbeOutcome::DataBusFault(fault));
        }
        sink.line(&format!(
            "data bus clean: {} lines at 0x{:x}",
            width.bits(),
            region.base
        ));

        // 3) Seed the whole window with the self-address pattern.
        if let Some(mismatch) = fill_with_addresses(store, region.base, region.limit)? {
            return Ok(ProbeOutcome::FillFailure {
                mismatch,
                refill: false,
            });
        }
        sink.line(&format!(
            "pattern seeded: 0x{:x} words over [0x{:x}, 0x{:x})",
            region.word_count(width),
            region.base,
            region.limit
        ));

        // 4) Shrink the size hypothesis until a scan pass comes back clean.
        let max_passes = self.config.effective_max_passes(width);
        let outcome = match discover_usable(store, region, max_passes, sink)? {
            ScanOutcome::Converged { state, passes } => ProbeOutcome::Sized {
                usable_bytes: state.usable_bytes(),
                passes,
            },
            ScanOutcome::Collapsed { passes, .. } => ProbeOutcome::Sized {
                usable_bytes: 0,
                passes,
            },
            ScanOutcome::RefillFailed { mismatch, .. } => ProbeOutcome::FillFailure {
                mismatch,
                refill: true,
            },
            ScanOutcome::Inconclusive { state, passes } => ProbeOutcome::Inconclusive {
                passes,
                last_probe_limit: state.probe_limit,
            },
        };
        Ok(outcome)
    }
}

/// One-call form of the diagnostic: probes `region` with default settings
/// and returns the usable byte count, 0 when any fault halted the run or the
/// region itself was rejected.
pub fn probe_memory(
    store: &mut dyn WordStore,
    region: MemoryRegion,
    sink: &mut dyn ReportSink,
) -> u64 {
    let probe = MemoryProbe::new(ProbeConfig::new(region));
    match probe.run(store, sink) {
        Ok(outcome) => outcome.usable_bytes(),
        Err(err) => {
            sink.line(&format!("aborted: {err}"));
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::BufferSink;
    use ramprobe_mem::{CellFault, CellFaults, DenseRam, WordWidth};

    #[test]
    fn derived_pass_cap_scales_with_the_window() {
        let cfg = ProbeConfig::new(MemoryRegion::new(0x1000, 0x2000));
        // 0x400 32-bit words: ceil(log2) = 10, plus slack.
        assert_eq!(cfg.effective_max_passes(WordWidth::W32), 14);

        let one_word = ProbeConfig::new(MemoryRegion::new(0x1000, 0x1004));
        assert_eq!(one_word.effective_max_passes(WordWidth::W32), 4);

        let mut capped = ProbeConfig::new(MemoryRegion::new(0x1000, 0x2000));
        capped.max_passes = Some(2);
        assert_eq!(capped.effective_max_passes(WordWidth::W32), 2);
    }

    #[test]
    fn healthy_window_reports_its_full_size() {
        let mut ram = DenseRam::new(0x2000, WordWidth::W32).unwrap();
        let mut sink = BufferSink::new();
        let probe = MemoryProbe::new(ProbeConfig::new(MemoryRegion::new(0x1000, 0x2000)));
        let outcome = probe.run(&mut ram, &mut sink).unwrap();
        assert_eq!(
            outcome,
            ProbeOutcome::Sized {
                usable_bytes: 0x1000,
                passes: 1
            }
        );
        assert_eq!(outcome.usable_bytes(), 0x1000);
        assert!(sink.contains("data bus clean"));
        assert!(sink.contains("result: usable memory: 0x1000 bytes"));
    }

    #[test]
    fn collapsed_window_reports_zero_usable_bytes() {
        let ram = DenseRam::new(0x40, WordWidth::W32).unwrap();
        let mut bus = CellFaults::new(ram, vec![(0x10, CellFault::Decay { garbage: 0x3 })]);
        let mut sink = BufferSink::new();
        let probe = MemoryProbe::new(ProbeConfig::new(MemoryRegion::new(0x10, 0x40)));
        let outcome = probe.run(&mut bus, &mut sink).unwrap();
        assert!(matches!(
            outcome,
            ProbeOutcome::Sized {
                usable_bytes: 0,
                ..
            }
        ));
        assert!(sink.contains("no wraparound hypothesis fits"));
    }

    #[test]
    fn rejected_region_yields_zero_and_an_abort_line() {
        let mut ram = DenseRam::new(0x100, WordWidth::W32).unwrap();
        let mut sink = BufferSink::new();
        // Limit beyond the store.
        let usable = probe_memory(&mut ram, MemoryRegion::new(0x0, 0x200), &mut sink);
        assert_eq!(usable, 0);
        assert!(sink.contains("aborted: region rejected"));
    }
}

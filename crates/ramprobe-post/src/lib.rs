//! Early-boot RAM diagnostic.
//!
//! Before anything trusts a freshly brought-up DRAM bank, two questions need
//! answers: are the data lines intact, and how much of the advertised window
//! is real? This crate answers both over an abstract word bus
//! ([`ramprobe_mem::WordStore`]), with no pointer tricks, so the same code
//! runs against hardware-shaped models on a host.
//!
//! The sequence mirrors classic board bring-up code:
//!
//! 1. [`walk_data_bus`]: walk a single set bit across the bus at one address;
//!    any stuck or shorted data line fails fast.
//! 2. [`fill_with_addresses`]: store every word its own address, verifying
//!    each write immediately.
//! 3. [`discover_usable`]: re-scan for a word that lost its address — the
//!    signature of address aliasing — and shrink the usable bound until the
//!    window is self-consistent.
//!
//! [`MemoryProbe`] orchestrates the three steps, reports through a
//! [`ReportSink`], and yields a [`ProbeOutcome`]; [`probe_memory`] wraps that
//! into the classic "byte count, 0 on fault" contract.

#![forbid(unsafe_code)]

mod databus;
mod fill;
mod probe;
mod region;
mod report;
mod sizer;

pub use databus::{walk_data_bus, DataBusFault};
pub use fill::{fill_with_addresses, FillMismatch};
pub use probe::{probe_memory, DiagnosticError, MemoryProbe, ProbeConfig, ProbeOutcome, Result};
pub use region::{MemoryRegion, RegionError};
pub use report::{BufferSink, ReportSink};
pub use sizer::{discover_usable, ScanOutcome, ScanState};

#[cfg(test)]
mod proptests;

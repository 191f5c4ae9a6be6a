//! Word-addressed memory models for the RAM diagnostic.
//!
//! The diagnostic never touches raw pointers: every access goes through
//! [`WordStore`], a word-granular bus interface over opaque backing storage.
//! This crate provides the interface plus deterministic backings, healthy and
//! broken:
//!
//! - [`DenseRam`]: a fault-free bank over heap bytes
//! - [`AliasedRam`]: a nominal window backed by fewer physical bytes, wrapping
//!   like a bank whose high address lines are not decoded
//! - [`FaultyDataLines`]: wrapper that corrupts the data path (stuck/bridged
//!   lines)
//! - [`MiswiredAddressLines`]: wrapper that corrupts the address path
//!   (stuck/shorted lines)
//! - [`CellFaults`]: wrapper with per-cell retention faults (stuck, wear-out,
//!   decay)
//!
//! All models are single-threaded and read-your-write: a write is observable
//! to the next read unless a configured fault says otherwise.

#![forbid(unsafe_code)]

mod faults;
mod ram;
mod store;
mod word;

pub use faults::{
    AddressLineFault, CellFault, CellFaults, DataLineFault, FaultyDataLines, MiswiredAddressLines,
};
pub use ram::{AliasedRam, DenseRam};
pub use store::{MemoryError, Result, WordStore};
pub use word::WordWidth;

#[cfg(test)]
mod proptests;

use thiserror::Error;

use crate::word::WordWidth;

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors raised by word stores and their fault wrappers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    #[error("word access out of range: addr=0x{addr:x} size=0x{size:x}")]
    OutOfRange { addr: u64, size: u64 },

    #[error("misaligned word access: addr=0x{addr:x} (word is {width} bytes)")]
    Misaligned { addr: u64, width: u64 },

    #[error("invalid store geometry: size=0x{size:x} (word is {width} bytes)")]
    InvalidGeometry { size: u64, width: u64 },

    #[error("fault line {line} outside the usable address/data lines ({bits} bits)")]
    BadFaultLine { line: u8, bits: u32 },
}

/// Word-granular access to a candidate RAM bank.
///
/// Addresses are byte addresses in `0..size()`, aligned to [`width`]. Values
/// are masked to the word width on write and never exceed it on read. Reads
/// take `&mut self` so fault models can keep state (wear counters, decay
/// tracking).
///
/// [`width`]: WordStore::width
pub trait WordStore {
    fn width(&self) -> WordWidth;

    /// Total byte size of the addressable window (exclusive top).
    fn size(&self) -> u64;

    fn read_word(&mut self, addr: u64) -> Result<u64>;

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()>;
}

impl<S: WordStore + ?Sized> WordStore for &mut S {
    fn width(&self) -> WordWidth {
        (**self).width()
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_word(&mut self, addr: u64) -> Result<u64> {
        (**self).read_word(addr)
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        (**self).write_word(addr, value)
    }
}

impl<S: WordStore + ?Sized> WordStore for Box<S> {
    fn width(&self) -> WordWidth {
        (**self).width()
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_word(&mut self, addr: u64) -> Result<u64> {
        (**self).read_word(addr)
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        (**self).write_word(addr, value)
    }
}

/// Validates one word access and returns the backing byte offset.
pub(crate) fn check_access(addr: u64, width: WordWidth, size: u64) -> Result<usize> {
    let bytes = width.bytes();
    if !width.is_aligned(addr) {
        return Err(MemoryError::Misaligned { addr, width: bytes });
    }
    let end = addr
        .checked_add(bytes)
        .ok_or(MemoryError::OutOfRange { addr, size })?;
    if end > size {
        return Err(MemoryError::OutOfRange { addr, size });
    }
    Ok(addr as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_access_accepts_aligned_in_range() {
        assert_eq!(check_access(0x10, WordWidth::W32, 0x20), Ok(0x10));
        assert_eq!(check_access(0x1C, WordWidth::W32, 0x20), Ok(0x1C));
    }

    #[test]
    fn check_access_rejects_misaligned() {
        assert!(matches!(
            check_access(0x11, WordWidth::W32, 0x20),
            Err(MemoryError::Misaligned { addr: 0x11, .. })
        ));
    }

    #[test]
    fn check_access_rejects_out_of_range_without_overflow() {
        assert!(matches!(
            check_access(0x20, WordWidth::W32, 0x20),
            Err(MemoryError::OutOfRange { .. })
        ));
        assert!(matches!(
            check_access(u64::MAX - 7, WordWidth::W64, u64::MAX),
            Err(MemoryError::OutOfRange { .. })
        ));
    }
}

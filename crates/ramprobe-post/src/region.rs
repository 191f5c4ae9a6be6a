use thiserror::Error;

use ramprobe_mem::WordWidth;

/// Why a candidate window cannot be probed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    #[error("empty region: base=0x{base:x} limit=0x{limit:x}")]
    Empty { base: u64, limit: u64 },

    #[error("region bound 0x{addr:x} not aligned to {width}-byte words")]
    Misaligned { addr: u64, width: u64 },

    #[error("region [0x{base:x}, 0x{limit:x}) exceeds store size 0x{size:x}")]
    OutsideStore { base: u64, limit: u64, size: u64 },

    #[error("address 0x{addr:x} does not fit in a {bits}-bit word")]
    UnencodableAddress { addr: u64, bits: u32 },
}

/// Candidate RAM window: `base` is the first testable word, `limit` is
/// one-past-the-last (the advertised top of the bank).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: u64,
    pub limit: u64,
}

impl MemoryRegion {
    pub const fn new(base: u64, limit: u64) -> Self {
        Self { base, limit }
    }

    /// Byte span of the window, clamped non-negative.
    pub fn len_bytes(&self) -> u64 {
        self.limit.saturating_sub(self.base)
    }

    pub fn word_count(&self, width: WordWidth) -> u64 {
        self.len_bytes() / width.bytes()
    }

    /// Checks the window against the store it will be probed through.
    ///
    /// Beyond bounds and alignment, every address the self-address pattern
    /// will store must fit in one word, or the pattern could not round-trip.
    pub fn validate(&self, width: WordWidth, store_size: u64) -> Result<(), RegionError> {
        if self.base >= self.limit {
            return Err(RegionError::Empty {
                base: self.base,
                limit: self.limit,
            });
        }
        for addr in [self.base, self.limit] {
            if !width.is_aligned(addr) {
                return Err(RegionError::Misaligned {
                    addr,
                    width: width.bytes(),
                });
            }
        }
        if self.limit > store_size {
            return Err(RegionError::OutsideStore {
                base: self.base,
                limit: self.limit,
                size: store_size,
            });
        }
        let top_word = self.limit - width.bytes();
        if top_word > width.mask() {
            return Err(RegionError::UnencodableAddress {
                addr: top_word,
                bits: width.bits(),
            });
        }
        Ok(())
    }
}

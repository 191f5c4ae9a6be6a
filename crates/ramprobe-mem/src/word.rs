/// Width of one bus word.
///
/// The diagnostic treats memory as an array of words of this width; addresses
/// are byte addresses that must be aligned to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WordWidth {
    W16,
    W32,
    W64,
}

impl WordWidth {
    pub const fn bytes(self) -> u64 {
        match self {
            WordWidth::W16 => 2,
            WordWidth::W32 => 4,
            WordWidth::W64 => 8,
        }
    }

    pub const fn bits(self) -> u32 {
        (self.bytes() * 8) as u32
    }

    /// All-ones value of this width; stored words never exceed it.
    pub const fn mask(self) -> u64 {
        match self {
            WordWidth::W16 => 0xFFFF,
            WordWidth::W32 => 0xFFFF_FFFF,
            WordWidth::W64 => u64::MAX,
        }
    }

    /// Number of low address bits that select a byte within the word.
    pub const fn addr_align_bits(self) -> u32 {
        self.bytes().trailing_zeros()
    }

    pub const fn is_aligned(self, addr: u64) -> bool {
        addr % self.bytes() == 0
    }

    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(WordWidth::W16),
            32 => Some(WordWidth::W32),
            64 => Some(WordWidth::W64),
            _ => None,
        }
    }
}

impl Default for WordWidth {
    /// 32-bit words, the common early-boot bus width.
    fn default() -> Self {
        WordWidth::W32
    }
}

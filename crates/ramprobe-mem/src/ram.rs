use crate::store::{check_access, MemoryError, Result, WordStore};
use crate::word::WordWidth;

fn load_word(bytes: &[u8], offset: usize, width: WordWidth) -> u64 {
    match width {
        WordWidth::W16 => {
            let mut b = [0u8; 2];
            b.copy_from_slice(&bytes[offset..offset + 2]);
            u16::from_le_bytes(b) as u64
        }
        WordWidth::W32 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(&bytes[offset..offset + 4]);
            u32::from_le_bytes(b) as u64
        }
        WordWidth::W64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[offset..offset + 8]);
            u64::from_le_bytes(b)
        }
    }
}

fn store_word(bytes: &mut [u8], offset: usize, width: WordWidth, value: u64) {
    match width {
        WordWidth::W16 => {
            bytes[offset..offset + 2].copy_from_slice(&(value as u16).to_le_bytes());
        }
        WordWidth::W32 => {
            bytes[offset..offset + 4].copy_from_slice(&(value as u32).to_le_bytes());
        }
        WordWidth::W64 => {
            bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        }
    }
}

fn check_geometry(size: u64, width: WordWidth) -> Result<usize> {
    let bytes = width.bytes();
    if size == 0 || size % bytes != 0 {
        return Err(MemoryError::InvalidGeometry { size, width: bytes });
    }
    usize::try_from(size).map_err(|_| MemoryError::InvalidGeometry { size, width: bytes })
}

/// Fault-free RAM bank: every address is distinct and retains what was
/// written. Little-endian words over zero-initialized heap bytes.
pub struct DenseRam {
    width: WordWidth,
    bytes: Box<[u8]>,
}

impl DenseRam {
    pub fn new(size: u64, width: WordWidth) -> Result<Self> {
        let len = check_geometry(size, width)?;
        Ok(Self {
            width,
            bytes: vec![0u8; len].into_boxed_slice(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl WordStore for DenseRam {
    fn width(&self) -> WordWidth {
        self.width
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_word(&mut self, addr: u64) -> Result<u64> {
        let offset = check_access(addr, self.width, self.size())?;
        Ok(load_word(&self.bytes, offset, self.width))
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        let offset = check_access(addr, self.width, self.size())?;
        store_word(&mut self.bytes, offset, self.width, value & self.width.mask());
        Ok(())
    }
}

/// Bank that advertises `nominal` bytes but is backed by only `physical`
/// bytes: accesses wrap at the physical size (`cell = addr % physical`).
///
/// This is what an undecoded high address line looks like from the bus — the
/// window repeats the same cells every `physical` bytes.
pub struct AliasedRam {
    width: WordWidth,
    nominal: u64,
    bytes: Box<[u8]>,
}

impl AliasedRam {
    pub fn new(nominal: u64, physical: u64, width: WordWidth) -> Result<Self> {
        // The nominal window must cover the backing, and both must be whole words.
        if physical > nominal || nominal % width.bytes() != 0 {
            return Err(MemoryError::InvalidGeometry {
                size: nominal,
                width: width.bytes(),
            });
        }
        let len = check_geometry(physical, width)?;
        Ok(Self {
            width,
            nominal,
            bytes: vec![0u8; len].into_boxed_slice(),
        })
    }

    pub fn physical_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn fold(&self, addr: u64) -> usize {
        (addr % self.physical_size()) as usize
    }
}

impl WordStore for AliasedRam {
    fn width(&self) -> WordWidth {
        self.width
    }

    fn size(&self) -> u64 {
        self.nominal
    }

    fn read_word(&mut self, addr: u64) -> Result<u64> {
        check_access(addr, self.width, self.nominal)?;
        let offset = self.fold(addr);
        Ok(load_word(&self.bytes, offset, self.width))
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        check_access(addr, self.width, self.nominal)?;
        let offset = self.fold(addr);
        store_word(&mut self.bytes, offset, self.width, value & self.width.mask());
        Ok(())
    }
}

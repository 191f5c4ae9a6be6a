use thiserror::Error;
use tracing::trace;

use ramprobe_mem::WordStore;

/// A data line failed the walk test.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("data bus fault at bit {failing_bit}: wrote 0x{wrote:x}, read 0x{read:x}")]
pub struct DataBusFault {
    pub failing_bit: u8,
    pub wrote: u64,
    pub read: u64,
}

/// Walks a single set bit across every data line at `addr`.
///
/// Each pattern `1 << j` must read back exactly: one bit, at the expected
/// position. The first disagreement names the failing line and the run must
/// not trust any wider test afterwards. Clobbers the probed word.
pub fn walk_data_bus(
    store: &mut dyn WordStore,
    addr: u64,
) -> crate::Result<Option<DataBusFault>> {
    let bits = store.width().bits();
    for bit in 0..bits {
        let pattern = 1u64 << bit;
        store.write_word(addr, pattern)?;
        let read = store.read_word(addr)?;
        trace!(bit, wrote = pattern, read, "bus walk step");
        if read != pattern {
            return Ok(Some(DataBusFault {
                failing_bit: bit as u8,
                wrote: pattern,
                read,
            }));
        }
    }
    Ok(None)
}

//! Differential flash update.
//!
//! Walks a byte range in erase-block-sized chunks and only erases and
//! rewrites chunks whose current contents differ from the source,
//! saving wear and time on regions that are already correct. The
//! comparison buffer holds a single erase block, so memory stays
//! bounded no matter how large the range is.

use crate::driver::FlashDevice;
use crate::error::Error;
use core::fmt;

/// The step of the update algorithm that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    /// Comparison buffer allocation; no device mutation has occurred.
    Allocation,
    /// Reading back the existing chunk contents.
    Read,
    /// Erasing a chunk that needs to change.
    Erase,
    /// Programming the new chunk contents.
    Write,
}

impl UpdateStage {
    /// Stage name used in operator diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStage::Allocation => "allocation",
            UpdateStage::Read => "read",
            UpdateStage::Erase => "erase",
            UpdateStage::Write => "write",
        }
    }
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<UpdateStage> for Error {
    fn from(stage: UpdateStage) -> Error {
        match stage {
            UpdateStage::Allocation => Error::AllocationFailed,
            UpdateStage::Read => Error::ReadFailed,
            UpdateStage::Erase => Error::EraseFailed,
            UpdateStage::Write => Error::WriteFailed,
        }
    }
}

/// Outcome of a differential update.
///
/// `written + skipped` covers the chunks processed before any failure.
/// Completed chunks are never rolled back; a failing chunk leaves its
/// own content undefined but nothing outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    /// Bytes erased and rewritten.
    pub written: usize,
    /// Bytes left untouched because they already matched.
    pub skipped: usize,
    /// The stage that aborted the update, if any.
    pub failed: Option<UpdateStage>,
}

impl UpdateResult {
    /// True when the whole range was processed.
    pub fn is_ok(&self) -> bool {
        self.failed.is_none()
    }
}

/// Update one chunk, skipping it if flash already holds the data.
///
/// Skipping happens at whole-chunk granularity only; a single changed
/// byte rewrites the full chunk.
fn update_block(
    dev: &mut FlashDevice,
    offset: u32,
    src: &[u8],
    cmp_buf: &mut [u8],
    skipped: &mut usize,
) -> Option<UpdateStage> {
    let cmp = &mut cmp_buf[..src.len()];
    if dev.read(offset, cmp).is_err() {
        return Some(UpdateStage::Read);
    }
    if cmp == src {
        log::debug!("skip region {:#x} size {:#x}: no change", offset, src.len());
        *skipped += src.len();
        return None;
    }
    if dev.erase(offset, src.len() as u32).is_err() {
        return Some(UpdateStage::Erase);
    }
    if dev.write(offset, src).is_err() {
        return Some(UpdateStage::Write);
    }
    None
}

/// Allocate the one-erase-block comparison buffer, attributing failure
/// to the allocation stage.
fn alloc_cmp_buf(block: usize) -> core::result::Result<Vec<u8>, UpdateStage> {
    let mut buf = Vec::new();
    if buf.try_reserve_exact(block).is_err() {
        return Err(UpdateStage::Allocation);
    }
    buf.resize(block, 0);
    Ok(buf)
}

/// Mutate `[offset, offset + source.len())` to match `source`, chunk by
/// chunk, skipping chunks that already match.
///
/// The chunk size is the device erase-block size; the final chunk is
/// truncated to the remaining byte count. The update aborts at the
/// first failing stage and reports how far it got.
pub fn update(dev: &mut FlashDevice, offset: u32, source: &[u8]) -> UpdateResult {
    if source.is_empty() {
        return UpdateResult::default();
    }

    // A zero-sized erase block would never advance the cursor.
    let block = (dev.erase_block_size as usize).max(1);

    log::trace!(
        "update: offset={:#x} len={:#x} erase_block_size={:#x}",
        offset,
        source.len(),
        dev.erase_block_size
    );

    update_with(dev, offset, source, alloc_cmp_buf(block))
}

/// The update loop proper, fed the comparison-buffer allocation
/// outcome. A failed allocation aborts before any device access.
fn update_with(
    dev: &mut FlashDevice,
    offset: u32,
    source: &[u8],
    cmp_buf: core::result::Result<Vec<u8>, UpdateStage>,
) -> UpdateResult {
    let mut result = UpdateResult::default();
    let mut cmp_buf = match cmp_buf {
        Ok(buf) => buf,
        Err(stage) => {
            result.failed = Some(stage);
            return result;
        }
    };

    let block = cmp_buf.len();
    let mut processed = 0usize;
    let mut cursor = offset;
    for chunk in source.chunks(block) {
        match update_block(dev, cursor, chunk, &mut cmp_buf, &mut result.skipped) {
            Some(stage) => {
                result.failed = Some(stage);
                break;
            }
            None => {
                processed += chunk.len();
                cursor += chunk.len() as u32;
            }
        }
    }

    result.written = processed - result.skipped;
    result
}

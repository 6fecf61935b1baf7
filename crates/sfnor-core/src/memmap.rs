//! Physical memory mapping service.
//!
//! Read, write and update commands address a memory buffer by physical
//! address. The mapping is scoped to a single call: the returned handle
//! releases it when dropped, on every exit path, so a failing flash
//! operation can never leak a mapping.

use core::ops::{Deref, DerefMut};

use crate::error::Result;

/// Provider of CPU-addressable views over physical memory.
pub trait Memory {
    /// Map `len` bytes at `addr`.
    ///
    /// Fails with [`Error::MapFailed`](crate::Error::MapFailed) when
    /// the range is not mappable; nothing is held on failure.
    fn map(&mut self, addr: u64, len: usize) -> Result<Mapping<'_>>;
}

/// Scoped view of a mapped physical memory range.
///
/// Dropping the handle is the unmap.
pub struct Mapping<'a> {
    addr: u64,
    bytes: &'a mut [u8],
}

impl<'a> Mapping<'a> {
    /// Wrap a mapped byte range. Used by [`Memory`] implementations.
    pub fn new(addr: u64, bytes: &'a mut [u8]) -> Self {
        log::trace!("mapped {:#x} (+{:#x})", addr, bytes.len());
        Self { addr, bytes }
    }

    /// The physical address this mapping starts at.
    pub fn addr(&self) -> u64 {
        self.addr
    }
}

impl Deref for Mapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl DerefMut for Mapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

impl Drop for Mapping<'_> {
    fn drop(&mut self) {
        log::trace!("unmapped {:#x} (+{:#x})", self.addr, self.bytes.len());
    }
}

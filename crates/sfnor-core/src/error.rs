//! Error types shared across the sfnor crates.

use thiserror::Error;

/// Errors reported by flash operations and the command dispatcher.
///
/// [`Error::Usage`] means the arguments were malformed and no hardware
/// was touched; callers show command help for it instead of a failure
/// diagnostic. Everything else carries the specific failing stage so
/// operators can tell a dead probe from a dead erase.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed or missing command arguments.
    #[error("{0}")]
    Usage(&'static str),

    /// A command other than `probe` ran before any device was selected.
    #[error("no SPI flash selected, run `sf probe` first")]
    NoDeviceSelected,

    /// Device initialization failed during probe.
    #[error("failed to initialize SPI flash at {bus}:{cs}")]
    ProbeFailed {
        /// SPI bus number that was probed.
        bus: u32,
        /// Chip select on that bus.
        cs: u32,
    },

    /// A device read failed.
    #[error("read operation failed")]
    ReadFailed,

    /// A device erase failed.
    #[error("erase operation failed")]
    EraseFailed,

    /// A device write failed.
    #[error("write operation failed")]
    WriteFailed,

    /// The comparison buffer could not be allocated; no device mutation
    /// has occurred when this is reported.
    #[error("failed to allocate comparison buffer")]
    AllocationFailed,

    /// The device lacks the requested capability (e.g. bulk erase).
    #[error("operation not supported by this device")]
    Unsupported,

    /// The physical memory range could not be mapped.
    #[error("failed to map physical memory at {addr:#x} (+{len:#x})")]
    MapFailed {
        /// Requested physical address.
        addr: u64,
        /// Requested mapping length in bytes.
        len: usize,
    },
}

impl Error {
    /// True for argument errors, which exit with a status distinct from
    /// hardware failures.
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }
}

/// Result type alias using the shared [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

//! Device driver interface and the probed flash device handle.

use core::fmt;

use crate::error::{Error, Result};

/// Raw capability set of one physical SPI NOR chip.
///
/// Implementations own the transport and chip command set; this crate
/// only sequences the calls. Offsets and lengths are device offsets in
/// bytes. A request outside the device capacity must fail without
/// touching unrelated regions.
pub trait NorDriver {
    /// Read `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Erase `len` bytes starting at `offset`.
    fn erase(&mut self, offset: u32, len: u32) -> Result<()>;

    /// Program `data` starting at `offset`. The range must have been
    /// erased first.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<()>;

    /// Erase the entire chip. Optional capability; the default reports
    /// [`Error::Unsupported`], which callers keep distinct from a
    /// generic failure.
    fn bulk_erase(&mut self) -> Result<()> {
        Err(Error::Unsupported)
    }
}

/// Probe primitive used by the registry to bring up a chip.
pub trait FlashBus {
    /// Initialize the chip at `bus:cs` with the given clock speed and
    /// SPI transfer mode.
    fn probe(&mut self, bus: u32, cs: u32, speed_hz: u32, mode: u32) -> Result<FlashDevice>;
}

/// A probed flash chip together with its bus addressing and geometry.
///
/// Exclusively owned by the [`Registry`](crate::registry::Registry); a
/// new probe replaces and drops the previous handle.
pub struct FlashDevice {
    driver: Box<dyn NorDriver>,
    /// SPI bus number the chip was probed on.
    pub bus: u32,
    /// Chip select on that bus.
    pub cs: u32,
    /// SPI clock speed in Hz.
    pub speed_hz: u32,
    /// SPI transfer mode (0-3).
    pub mode: u32,
    /// Minimum erasable unit; also the updater's chunk size.
    pub erase_block_size: u32,
    /// Total chip capacity in bytes.
    pub total_size: u32,
}

impl FlashDevice {
    /// Wrap a driver together with its probed geometry.
    pub fn new(
        driver: Box<dyn NorDriver>,
        bus: u32,
        cs: u32,
        speed_hz: u32,
        mode: u32,
        erase_block_size: u32,
        total_size: u32,
    ) -> Self {
        Self {
            driver,
            bus,
            cs,
            speed_hz,
            mode,
            erase_block_size,
            total_size,
        }
    }

    /// Read from the device. See [`NorDriver::read`].
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.driver.read(offset, buf)
    }

    /// Erase a device range. See [`NorDriver::erase`].
    pub fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        self.driver.erase(offset, len)
    }

    /// Program the device. See [`NorDriver::write`].
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.driver.write(offset, data)
    }

    /// Erase the entire chip, if the device supports it.
    pub fn bulk_erase(&mut self) -> Result<()> {
        self.driver.bulk_erase()
    }
}

impl fmt::Display for FlashDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SPI flash {}:{} ({} bytes, {} byte erase blocks, {} Hz, mode {})",
            self.bus, self.cs, self.total_size, self.erase_block_size, self.speed_hz, self.mode
        )
    }
}

impl fmt::Debug for FlashDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlashDevice")
            .field("bus", &self.bus)
            .field("cs", &self.cs)
            .field("speed_hz", &self.speed_hz)
            .field("mode", &self.mode)
            .field("erase_block_size", &self.erase_block_size)
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

//! sfnor-sim - In-memory SPI NOR flash emulation
//!
//! This crate provides a simulated flash chip and a simulated physical
//! memory window. It is useful for testing and for driving the CLI
//! without real hardware: contents behave like NOR flash (erase sets
//! `0xFF`, programming only clears bits), every driver call is
//! recorded, and faults can be injected per operation so failure
//! attribution is observable.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sfnor_core::driver::{FlashBus, FlashDevice, NorDriver};
use sfnor_core::error::{Error, Result};
use sfnor_core::memmap::{Mapping, Memory};

/// The erased value for NOR flash (all bits set).
const ERASED_VALUE: u8 = 0xFF;

/// Driver entry points a fault can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `NorDriver::read`
    Read,
    /// `NorDriver::erase`
    Erase,
    /// `NorDriver::write`
    Write,
    /// `NorDriver::bulk_erase`
    BulkErase,
}

impl Op {
    fn index(self) -> usize {
        match self {
            Op::Read => 0,
            Op::Erase => 1,
            Op::Write => 2,
            Op::BulkErase => 3,
        }
    }

    fn error(self) -> Error {
        match self {
            Op::Read => Error::ReadFailed,
            Op::Erase | Op::BulkErase => Error::EraseFailed,
            Op::Write => Error::WriteFailed,
        }
    }
}

/// Geometry and capabilities of the simulated chip.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Chip capacity in bytes.
    pub size: u32,
    /// Erase block (sector) size in bytes.
    pub erase_block_size: u32,
    /// Whether the chip supports whole-chip erase.
    pub bulk_erase_supported: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        // A generic 16 MiB part with 4 KiB sectors.
        Self {
            size: 16 * 1024 * 1024,
            erase_block_size: 4096,
            bulk_erase_supported: true,
        }
    }
}

/// Chip state shared between the bus and the devices it hands out, so
/// re-probing preserves contents and callers can inspect afterwards.
struct ChipState {
    data: Vec<u8>,
    reads: Vec<(u32, u32)>,
    erases: Vec<(u32, u32)>,
    writes: Vec<(u32, u32)>,
    /// Fail the nth call (0-based) of an operation.
    fail_on: Option<(Op, usize)>,
    calls: [usize; 4],
}

impl ChipState {
    fn new(size: u32) -> Self {
        Self {
            data: vec![ERASED_VALUE; size as usize],
            reads: Vec::new(),
            erases: Vec::new(),
            writes: Vec::new(),
            fail_on: None,
            calls: [0; 4],
        }
    }

    /// Count the call and decide whether an injected fault trips.
    fn trip(&mut self, op: Op) -> bool {
        let n = self.calls[op.index()];
        self.calls[op.index()] += 1;
        self.fail_on == Some((op, n))
    }

    fn range(&self, offset: u32, len: usize) -> Option<std::ops::Range<usize>> {
        let start = offset as usize;
        let end = start.checked_add(len).filter(|&end| end <= self.data.len());
        if end.is_none() {
            log::debug!("sim: access {:#x} (+{:#x}) out of bounds", offset, len);
        }
        end.map(|end| start..end)
    }
}

/// Simulated flash chip driver. Created by [`SimBus::probe`].
pub struct SimFlash {
    state: Rc<RefCell<ChipState>>,
    bulk_erase_supported: bool,
}

impl NorDriver for SimFlash {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        let mut st = self.state.borrow_mut();
        if st.trip(Op::Read) {
            return Err(Op::Read.error());
        }
        let range = st.range(offset, buf.len()).ok_or(Error::ReadFailed)?;
        st.reads.push((offset, buf.len() as u32));
        buf.copy_from_slice(&st.data[range]);
        Ok(())
    }

    fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        let mut st = self.state.borrow_mut();
        if st.trip(Op::Erase) {
            return Err(Op::Erase.error());
        }
        let range = st.range(offset, len as usize).ok_or(Error::EraseFailed)?;
        st.erases.push((offset, len));
        st.data[range].fill(ERASED_VALUE);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        let mut st = self.state.borrow_mut();
        if st.trip(Op::Write) {
            return Err(Op::Write.error());
        }
        let range = st.range(offset, data.len()).ok_or(Error::WriteFailed)?;
        st.writes.push((offset, data.len() as u32));
        // NOR programming only clears bits; an erase must precede a
        // rewrite for the data to come out right.
        for (slot, byte) in st.data[range].iter_mut().zip(data) {
            *slot &= byte;
        }
        Ok(())
    }

    fn bulk_erase(&mut self) -> Result<()> {
        if !self.bulk_erase_supported {
            return Err(Error::Unsupported);
        }
        let mut st = self.state.borrow_mut();
        if st.trip(Op::BulkErase) {
            return Err(Op::BulkErase.error());
        }
        let len = st.data.len();
        st.erases.push((0, len as u32));
        st.data.fill(ERASED_VALUE);
        Ok(())
    }
}

/// Simulated SPI bus holding one chip, optionally backed by an image
/// file so CLI runs have persistent effect.
pub struct SimBus {
    config: SimConfig,
    state: Rc<RefCell<ChipState>>,
    image: Option<PathBuf>,
    probe_ok: bool,
}

impl SimBus {
    /// Create a bus with an erased chip of the given geometry.
    pub fn new(config: SimConfig) -> Self {
        let state = Rc::new(RefCell::new(ChipState::new(config.size)));
        Self {
            config,
            state,
            image: None,
            probe_ok: true,
        }
    }

    /// Create a bus whose chip contents are loaded from `path`. A
    /// missing file starts erased; a short file is padded with the
    /// erased value and a long one truncated to the chip size.
    pub fn with_image(config: SimConfig, path: &Path) -> io::Result<Self> {
        let mut bus = Self::new(config);
        match fs::read(path) {
            Ok(contents) => {
                let mut st = bus.state.borrow_mut();
                let n = contents.len().min(st.data.len());
                st.data[..n].copy_from_slice(&contents[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("image {} not found, starting erased", path.display());
            }
            Err(e) => return Err(e),
        }
        bus.image = Some(path.to_path_buf());
        Ok(bus)
    }

    /// Write the chip contents back to the backing image, if any.
    pub fn save_image(&self) -> io::Result<()> {
        if let Some(path) = &self.image {
            fs::write(path, &self.state.borrow().data)?;
        }
        Ok(())
    }

    /// Preset chip contents at `offset`, bypassing the driver (and its
    /// operation log).
    pub fn preload(&self, offset: u32, data: &[u8]) {
        let mut st = self.state.borrow_mut();
        let start = offset as usize;
        st.data[start..start + data.len()].copy_from_slice(data);
    }

    /// Snapshot of the chip contents.
    pub fn contents(&self) -> Vec<u8> {
        self.state.borrow().data.clone()
    }

    /// `(offset, len)` of every read issued so far.
    pub fn reads(&self) -> Vec<(u32, u32)> {
        self.state.borrow().reads.clone()
    }

    /// `(offset, len)` of every erase issued so far.
    pub fn erases(&self) -> Vec<(u32, u32)> {
        self.state.borrow().erases.clone()
    }

    /// `(offset, len)` of every write issued so far.
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.state.borrow().writes.clone()
    }

    /// Fail the nth call (0-based) of `op`. Replaces any earlier fault.
    pub fn fail_on(&self, op: Op, nth: usize) {
        self.state.borrow_mut().fail_on = Some((op, nth));
    }

    /// Remove any injected fault.
    pub fn clear_fault(&self) {
        self.state.borrow_mut().fail_on = None;
    }

    /// Make subsequent probes fail, as if no chip answered.
    pub fn deny_probe(&mut self) {
        self.probe_ok = false;
    }
}

impl FlashBus for SimBus {
    fn probe(&mut self, bus: u32, cs: u32, speed_hz: u32, mode: u32) -> Result<FlashDevice> {
        if !self.probe_ok {
            return Err(Error::ProbeFailed { bus, cs });
        }
        log::debug!("sim: probed chip at {}:{} ({} Hz, mode {})", bus, cs, speed_hz, mode);
        let driver = SimFlash {
            state: Rc::clone(&self.state),
            bulk_erase_supported: self.config.bulk_erase_supported,
        };
        Ok(FlashDevice::new(
            Box::new(driver),
            bus,
            cs,
            speed_hz,
            mode,
            self.config.erase_block_size,
            self.config.size,
        ))
    }
}

/// Simulated physical memory: one RAM window at a base address.
pub struct SimMemory {
    base: u64,
    bytes: Vec<u8>,
}

impl SimMemory {
    /// Create a zeroed RAM window of `size` bytes starting at `base`.
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            bytes: vec![0; size],
        }
    }

    /// The window's base address.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Copy `data` into the window at `addr`. Panics when the range is
    /// outside the window; test and CLI setup only.
    pub fn load(&mut self, addr: u64, data: &[u8]) {
        let start = (addr - self.base) as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }

    /// The window contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Memory for SimMemory {
    fn map(&mut self, addr: u64, len: usize) -> Result<Mapping<'_>> {
        let out_of_window = Error::MapFailed { addr, len };
        let start = addr
            .checked_sub(self.base)
            .filter(|&s| s <= self.bytes.len() as u64)
            .ok_or(out_of_window)? as usize;
        let end = start.checked_add(len).filter(|&e| e <= self.bytes.len()).ok_or(out_of_window)?;
        Ok(Mapping::new(addr, &mut self.bytes[start..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimConfig {
        SimConfig {
            size: 0x4000,
            erase_block_size: 0x1000,
            bulk_erase_supported: true,
        }
    }

    #[test]
    fn chip_starts_erased_and_survives_reprobe() {
        let mut bus = SimBus::new(small_config());
        let mut dev = bus.probe(0, 0, 1_000_000, 3).unwrap();
        dev.write(0, &[0x12, 0x34]).unwrap();

        let mut dev = bus.probe(0, 0, 1_000_000, 3).unwrap();
        let mut buf = [0u8; 3];
        dev.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0x12, 0x34, ERASED_VALUE]);
    }

    #[test]
    fn write_only_clears_bits_until_erased() {
        let mut bus = SimBus::new(small_config());
        let mut dev = bus.probe(0, 0, 1_000_000, 3).unwrap();

        dev.write(0, &[0x0F]).unwrap();
        dev.write(0, &[0xF1]).unwrap();
        let mut buf = [0u8; 1];
        dev.read(0, &mut buf).unwrap();
        assert_eq!(buf[0], 0x01);

        dev.erase(0, 0x1000).unwrap();
        dev.write(0, &[0xF1]).unwrap();
        dev.read(0, &mut buf).unwrap();
        assert_eq!(buf[0], 0xF1);
    }

    #[test]
    fn out_of_bounds_access_fails() {
        let mut bus = SimBus::new(small_config());
        let mut dev = bus.probe(0, 0, 1_000_000, 3).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(dev.read(0x3FFF, &mut buf), Err(Error::ReadFailed));
        assert_eq!(dev.erase(0x4000, 1), Err(Error::EraseFailed));
        assert_eq!(dev.write(0x3FFF, &[0, 0]), Err(Error::WriteFailed));
    }

    #[test]
    fn injected_fault_trips_once_on_the_nth_call() {
        let mut bus = SimBus::new(small_config());
        bus.fail_on(Op::Erase, 1);
        let mut dev = bus.probe(0, 0, 1_000_000, 3).unwrap();

        dev.erase(0, 0x1000).unwrap();
        assert_eq!(dev.erase(0x1000, 0x1000), Err(Error::EraseFailed));
        dev.erase(0x2000, 0x1000).unwrap();
        assert_eq!(bus.erases().len(), 2);
    }

    #[test]
    fn bulk_erase_capability_flag() {
        let mut config = small_config();
        config.bulk_erase_supported = false;
        let mut bus = SimBus::new(config);
        let mut dev = bus.probe(0, 0, 1_000_000, 3).unwrap();
        assert_eq!(dev.bulk_erase(), Err(Error::Unsupported));

        let mut bus = SimBus::new(small_config());
        bus.preload(0x100, &[0x00; 4]);
        let mut dev = bus.probe(0, 0, 1_000_000, 3).unwrap();
        dev.bulk_erase().unwrap();
        assert!(bus.contents().iter().all(|&b| b == ERASED_VALUE));
    }

    #[test]
    fn memory_window_maps_and_rejects() {
        let mut ram = SimMemory::new(0x8000_0000, 0x100);
        ram.load(0x8000_0010, &[1, 2, 3]);

        {
            let mut map = ram.map(0x8000_0010, 3).unwrap();
            assert_eq!(&map[..], &[1, 2, 3]);
            map[0] = 9;
        }
        assert_eq!(ram.bytes()[0x10], 9);

        let mut ram = SimMemory::new(0x8000_0000, 0x100);
        assert!(ram.map(0x7FFF_FFFF, 1).is_err());
        assert!(ram.map(0x8000_00FF, 2).is_err());
        assert!(ram.map(0x8000_0100, 1).is_err());
    }
}

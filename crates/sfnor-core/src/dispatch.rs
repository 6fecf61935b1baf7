//! The `sf` command dispatcher.
//!
//! Routes the discrete flash operations against the device registry and
//! the differential updater. Every operation except `probe` requires a
//! selected device; argument errors are [`Error::Usage`] and never
//! touch hardware.

use crate::args::{self, LengthSpec};
use crate::driver::FlashBus;
use crate::error::{Error, Result};
use crate::memmap::Memory;
use crate::registry::Registry;
use crate::update::{self, UpdateResult};

/// Bus probed when the addressing token names only a chip select.
pub const DEFAULT_BUS: u32 = 0;
/// Chip select probed when no addressing token is given.
pub const DEFAULT_CS: u32 = 0;
/// Probe clock speed when none is given.
pub const DEFAULT_SPEED_HZ: u32 = 1_000_000;
/// Probe SPI transfer mode when none is given; mode 3 is the common
/// default for serial NOR parts.
pub const DEFAULT_MODE: u32 = 3;

const USAGE: &str = "sf probe|read|write|update|erase|bulkerase";
const USAGE_PROBE: &str = "sf probe [[bus:]cs] [hz] [mode]";
const USAGE_RW: &str = "sf read|write|update <addr> <offset> <len>";
const USAGE_ERASE: &str = "sf erase <offset> <len>|+<len>";
const USAGE_BULK: &str = "sf bulkerase";

/// Translates `sf` command tokens into registry and updater calls.
///
/// Owns the registry, the probe backend and the memory mapping service
/// for the duration of a session.
pub struct Dispatcher<B, M> {
    registry: Registry,
    bus: B,
    memory: M,
}

impl<B: FlashBus, M: Memory> Dispatcher<B, M> {
    /// Create a dispatcher with no device selected.
    pub fn new(bus: B, memory: M) -> Self {
        Self {
            registry: Registry::new(),
            bus,
            memory,
        }
    }

    /// The device registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the registry, primarily for callers that
    /// inspect the selected device.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The probe backend.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// The memory mapping service.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Mutable access to the memory mapping service, for callers that
    /// stage source data before an operation.
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Route one command given as argv-style tokens, sub-command first.
    pub fn dispatch(&mut self, argv: &[&str]) -> Result<()> {
        let (&cmd, rest) = argv.split_first().ok_or(Error::Usage(USAGE))?;

        if cmd == "probe" {
            return self.probe(rest);
        }

        // The remaining commands require a selected device, checked
        // before their arguments are even looked at.
        self.registry.current()?;

        match cmd {
            "read" | "write" | "update" => self.read_write_update(cmd, rest),
            "erase" => self.erase(rest),
            "bulkerase" => self.bulk_erase(rest),
            _ => Err(Error::Usage(USAGE)),
        }
    }

    /// `sf probe [[bus:]cs] [hz] [mode]`
    pub fn probe(&mut self, args: &[&str]) -> Result<()> {
        if args.len() > 3 {
            return Err(Error::Usage(USAGE_PROBE));
        }

        let (mut bus, mut cs) = (DEFAULT_BUS, DEFAULT_CS);
        let mut speed_hz = DEFAULT_SPEED_HZ;
        let mut mode = DEFAULT_MODE;

        if let Some(target) = args.first() {
            (bus, cs) = args::parse_probe_target(target, DEFAULT_BUS)?;
        }
        if let Some(token) = args.get(1) {
            speed_hz = args::parse_uint(token)?;
        }
        if let Some(token) = args.get(2) {
            mode = args::parse_hex(token)?;
        }

        self.registry.probe(&mut self.bus, bus, cs, speed_hz, mode)?;
        Ok(())
    }

    /// `sf read|write|update <addr> <offset> <len>`
    ///
    /// Maps `[addr, addr + len)` for the duration of the call; the
    /// mapping is released on every exit path.
    fn read_write_update(&mut self, cmd: &str, args: &[&str]) -> Result<()> {
        let [addr, offset, len] = args else {
            return Err(Error::Usage(USAGE_RW));
        };
        let addr = args::parse_hex(addr)? as u64;
        let offset = args::parse_hex(offset)?;
        let len = args::parse_hex(len)? as usize;

        let Self {
            registry, memory, ..
        } = self;
        let device = registry.current()?;
        let mut buf = memory.map(addr, len)?;

        let result = match cmd {
            "read" => device.read(offset, &mut buf),
            "write" => device.write(offset, &buf),
            _ => report_update(update::update(device, offset, &buf)),
        };

        if let Err(e) = &result {
            log::error!("SPI flash {} failed: {}", cmd, e);
        }
        result
    }

    /// `sf erase <offset> <len>|+<len>`
    fn erase(&mut self, args: &[&str]) -> Result<()> {
        let [offset, len] = args else {
            return Err(Error::Usage(USAGE_ERASE));
        };
        let offset = args::parse_hex(offset)?;

        let device = self.registry.current()?;
        let spec = LengthSpec::parse(len, device.erase_block_size)?;
        if spec.rounded_up {
            log::debug!("erase length rounded up to {:#x}", spec.bytes);
        }

        device.erase(offset, spec.bytes).inspect_err(|e| {
            log::error!("SPI flash erase failed: {}", e);
        })
    }

    /// `sf bulkerase`
    fn bulk_erase(&mut self, args: &[&str]) -> Result<()> {
        if !args.is_empty() {
            return Err(Error::Usage(USAGE_BULK));
        }

        self.registry.current()?.bulk_erase().inspect_err(|e| match e {
            Error::Unsupported => log::error!("SPI flash bulkerase not supported"),
            _ => log::error!("SPI flash bulkerase failed: {}", e),
        })
    }
}

/// Convert an update outcome into the operator diagnostic and status.
fn report_update(result: UpdateResult) -> Result<()> {
    match result.failed {
        Some(stage) => {
            log::error!("SPI flash failed in {} step", stage);
            Err(stage.into())
        }
        None => {
            println!("{} bytes written, {} bytes skipped", result.written, result.skipped);
            Ok(())
        }
    }
}

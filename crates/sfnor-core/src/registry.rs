//! Single active flash device registry.

use crate::driver::{FlashBus, FlashDevice};
use crate::error::{Error, Result};

/// Holds the one currently selected flash device.
///
/// At most one device is active at any time; a fresh probe releases the
/// previous handle before installing the new one. The registry is an
/// ordinary value owned by its caller, not hidden global state, so
/// single-device semantics fall out of ownership. Re-probing while a
/// nested invocation still holds a borrow will not compile.
#[derive(Debug, Default)]
pub struct Registry {
    active: Option<FlashDevice>,
}

impl Registry {
    /// Create an empty registry with no device selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the chip at `bus:cs` and install it as the active
    /// device, dropping any previously selected one.
    pub fn probe(
        &mut self,
        bus_if: &mut dyn FlashBus,
        bus: u32,
        cs: u32,
        speed_hz: u32,
        mode: u32,
    ) -> Result<&mut FlashDevice> {
        let new = bus_if.probe(bus, cs, speed_hz, mode)?;
        if let Some(old) = self.active.take() {
            log::debug!("releasing previously selected device at {}:{}", old.bus, old.cs);
        }
        log::info!("{}", new);
        Ok(self.active.insert(new))
    }

    /// The active device, or [`Error::NoDeviceSelected`].
    pub fn current(&mut self) -> Result<&mut FlashDevice> {
        self.active.as_mut().ok_or(Error::NoDeviceSelected)
    }

    /// Whether a device is currently selected.
    pub fn is_selected(&self) -> bool {
        self.active.is_some()
    }
}

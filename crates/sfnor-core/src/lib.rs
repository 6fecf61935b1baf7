//! sfnor-core - SPI NOR flash provisioning primitives
//!
//! This crate implements the device-facing half of an `sf`-style flash
//! command set: a registry holding the single selected device, argument
//! parsing for hexadecimal and round-up length tokens, a differential
//! updater that skips erase-block chunks whose contents already match,
//! and a dispatcher that routes the discrete operations.
//!
//! The physical transport is behind the [`driver::NorDriver`] trait and
//! probing behind [`driver::FlashBus`]; this crate never talks to
//! hardware directly.
//!
//! # Example
//!
//! ```ignore
//! use sfnor_core::dispatch::Dispatcher;
//!
//! fn provision<B, M>(bus: B, memory: M) -> sfnor_core::Result<()>
//! where
//!     B: sfnor_core::driver::FlashBus,
//!     M: sfnor_core::memmap::Memory,
//! {
//!     let mut sf = Dispatcher::new(bus, memory);
//!     sf.dispatch(&["probe", "0:0"])?;
//!     sf.dispatch(&["update", "80000000", "0", "40000"])?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod args;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod memmap;
pub mod registry;
pub mod update;

pub use error::{Error, Result};

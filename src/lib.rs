//! Sweep I2C port-expanders and analog multiplexers into one sample frame.
//!
//! A controller with few pins can read many inputs through two kinds of fan-out hardware:
//!
//! - **Port-expanders** (MCP23017, PCA9555, PCF8575, ...) on a shared I2C bus, each offering a
//!   16-bit digital port.  These are grouped in an [`ExpanderBank`].
//! - **Analog multiplexers** (74HC4067 and friends) sharing a set of select lines, each with its
//!   own enable line and its own converter input.  These are grouped in a [`MultiplexerBank`],
//!   which guarantees that at most one device is enabled at any time.
//!
//! A [`ScanEngine`] reads everything once per [`scan()`][Scanner::scan] and returns a
//! [`SampleFrame`] whose shape only depends on the configuration.  Devices that fail during a
//! sweep show up as [`Reading::Unavailable`] instead of aborting the sweep, unless
//! [`FailurePolicy::Abort`] is configured.
//!
//! All hardware access goes through `embedded-hal` 1.0 traits, except for the analog converter
//! which is consumed through [`RawConverter`].
#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

mod bus;
mod common;
mod config;
pub mod dev;
mod engine;
#[cfg(feature = "async")]
mod engine_async;
mod error;
mod expander;
mod frame;
mod mutex;
mod mux;
mod selector;

pub use bus::RetryI2c;
pub use common::{InputSetup, PortDriver, RegisterOp, MAX_PAYLOAD};
pub use config::{EnablePolarity, FailurePolicy, RetryPolicy, ScanConfig, DEFAULT_SETTLE_US};
pub use engine::{ScanEngine, Scanner};
#[cfg(feature = "async")]
pub use engine_async::AsyncScanEngine;
pub use error::{ConfigError, Error, FailureKind};
pub use expander::{ExpanderBank, ExpanderDevice};
pub use frame::{ChannelSamples, PortBits, Reading, SampleFrame, MAX_CHANNELS};
pub use mutex::{ScanMutex, SharedScanner};
pub use mux::{ChannelValues, MultiplexerBank, MuxDevice, RawConverter};
pub use selector::{select_bus_width, ChannelSelector, MAX_SELECT_LINES};

pub(crate) use bus::I2cExt;

pub use dev::mcp23017::Mcp23017;
pub use dev::pca9555::Pca9555;
pub use dev::pcf8575::Pcf8575;

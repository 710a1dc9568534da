//! Digital port-expander bank.
use embedded_hal::i2c::I2c;

use crate::common::PortDriver;
use crate::error::{ConfigError, Error, FailureKind};
use crate::frame::PortBits;
use crate::mux::index;
use crate::I2cExt;

/// One expander on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpanderDevice {
    address: u8,
    online: bool,
}

impl ExpanderDevice {
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Whether the device accepted its setup and is being polled.
    pub fn is_online(&self) -> bool {
        self.online
    }
}

/// `M` expanders of chip type `P` on a shared I2C bus.
///
/// Devices are identified by their position in the bank.  Each is addressed by an index that
/// corresponds to the level of its hardware address pins, e.g. index 5 of an MCP23017 means
/// `A2=1, A1=0, A0=1`, address `0x25`.
pub struct ExpanderBank<I2C, P, const M: usize> {
    pub(crate) i2c: I2C,
    pub(crate) chip: P,
    pub(crate) devices: [ExpanderDevice; M],
}

impl<I2C, P: PortDriver, const M: usize> ExpanderBank<I2C, P, M> {
    /// Create a bank.  Devices start offline until [`initialize()`][Self::initialize].
    pub fn new(i2c: I2C, chip: P, indices: [u8; M]) -> Result<Self, ConfigError> {
        let mut devices = [ExpanderDevice {
            address: 0,
            online: false,
        }; M];
        for (i, &idx) in indices.iter().enumerate() {
            let address = P::address(idx).ok_or(ConfigError::AddressOutOfRange {
                device: index(i),
                index: idx,
            })?;
            if devices[..i].iter().any(|d| d.address == address) {
                return Err(ConfigError::DuplicateAddress {
                    device: index(i),
                    address,
                });
            }
            devices[i].address = address;
        }
        Ok(Self { i2c, chip, devices })
    }

    pub fn devices(&self) -> &[ExpanderDevice; M] {
        &self.devices
    }

    pub fn is_online(&self, device: usize) -> bool {
        self.devices.get(device).map_or(false, |d| d.online)
    }

    /// Port width of every device in the bank.
    pub fn width(&self) -> u8 {
        P::port_width()
    }

    /// Give back the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub(crate) fn device(&self, device: usize) -> Result<ExpanderDevice, Error> {
        self.devices
            .get(device)
            .copied()
            .ok_or(Error::UnknownDevice {
                device: index(device),
            })
    }

    /// Address of an online device, or the error a read of it reports.
    pub(crate) fn polled_address(&self, device: usize) -> Result<u8, Error> {
        let dev = self.device(device)?;
        if !dev.online {
            return Err(Error::PortRead {
                device: index(device),
                kind: FailureKind::Offline,
            });
        }
        Ok(dev.address)
    }

    pub(crate) fn set_online(&mut self, device: usize, online: bool) {
        if let Some(d) = self.devices.get_mut(device) {
            d.online = online;
        }
    }
}

impl<I2C: I2c, P: PortDriver, const M: usize> ExpanderBank<I2C, P, M> {
    /// Put every device into all-inputs mode.
    ///
    /// All devices are attempted.  Devices that respond go online, the others stay offline and
    /// the first failure is returned.  The bank stays usable with the online devices.
    pub fn initialize(&mut self) -> Result<(), Error> {
        let mut first = Ok(());
        for device in 0..M {
            if let Err(e) = self.initialize_device(device) {
                log::warn!("{}", e);
                first = first.and(Err(e));
            }
        }
        first
    }

    /// Put a single device into all-inputs mode, bringing it back online on success.
    pub fn initialize_device(&mut self, device: usize) -> Result<(), Error> {
        let addr = self.device(device)?.address;
        self.set_online(device, false);
        for op in self.chip.input_setup().iter() {
            self.i2c.apply(addr, op).map_err(|e| Error::DeviceInit {
                device: index(device),
                kind: FailureKind::from_i2c(&e),
            })?;
        }
        self.set_online(device, true);
        log::debug!("expander {} online at 0x{:02x}", device, addr);
        Ok(())
    }

    /// Read all pins of one device in a single bus transaction.
    ///
    /// Offline devices fail with [`FailureKind::Offline`] without touching the bus.
    pub fn read_port(&mut self, device: usize) -> Result<PortBits, Error> {
        let addr = self.polled_address(device)?;
        let bits = self
            .i2c
            .read_port(addr, &self.chip)
            .map_err(|e| Error::PortRead {
                device: index(device),
                kind: FailureKind::from_i2c(&e),
            })?;
        Ok(PortBits::new(bits, P::port_width()))
    }

    /// Read every device.  A failing device does not keep the others from being read.
    pub fn read_all_ports(&mut self) -> [Result<PortBits, Error>; M] {
        core::array::from_fn(|device| self.read_port(device))
    }
}

//! Error types for the scanning engine.
//!
//! Every error names the device (and channel) that caused it.  None of them carry the underlying
//! HAL error value: bus, pin and converter errors are collapsed into a [`FailureKind`] so that a
//! single `Copy` error type can flow through sample frames and logs without generics.

use core::fmt;

/// What went wrong at the hardware boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailureKind {
    /// The addressed device did not acknowledge on the bus.
    NoAcknowledge,
    /// The bus transaction did not complete in time.
    Timeout,
    /// Any other bus fault (arbitration loss, overrun, ...).
    Bus,
    /// Driving a select or enable line failed.
    Line,
    /// The raw converter failed to produce a sample.
    Converter,
    /// The device failed initialization and is not being polled.
    Offline,
}

impl FailureKind {
    /// Classify an I2C error.
    ///
    /// HALs report transaction timeouts as [`ErrorKind::Other`][embedded_hal::i2c::ErrorKind].
    pub fn from_i2c<E: embedded_hal::i2c::Error>(err: &E) -> Self {
        use embedded_hal::i2c::ErrorKind;

        match err.kind() {
            ErrorKind::NoAcknowledge(_) => FailureKind::NoAcknowledge,
            ErrorKind::Other => FailureKind::Timeout,
            _ => FailureKind::Bus,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::NoAcknowledge => "no acknowledge",
            FailureKind::Timeout => "timeout",
            FailureKind::Bus => "bus error",
            FailureKind::Line => "line control error",
            FailureKind::Converter => "converter error",
            FailureKind::Offline => "device offline",
        };
        f.write_str(s)
    }
}

/// Runtime errors of the expander bank, the multiplexer bank and the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A device could not be brought into its idle state: an expander did not accept its
    /// input-mode setup, or a multiplexer enable line could not be driven.
    DeviceInit { device: u8, kind: FailureKind },
    /// A port-wide read of an expander failed.
    PortRead { device: u8, kind: FailureKind },
    /// A multiplexer channel could not be read.
    ChannelRead {
        device: u8,
        channel: u8,
        kind: FailureKind,
    },
    /// The channel is not below the device's configured channel count.
    ChannelOutOfRange { device: u8, channel: u8 },
    /// No device is configured at this index.
    UnknownDevice { device: u8 },
    /// A read was completed on a multiplexer that does not hold the enable token.
    NotEnabled { device: u8 },
    /// The shared select lines could not be driven to their idle state.
    SelectBus,
    /// The sweep did not finish before its deadline.
    SweepTimeout,
}

impl Error {
    /// The hardware failure behind this error, if it was caused by one.
    pub fn kind(&self) -> Option<FailureKind> {
        match *self {
            Error::DeviceInit { kind, .. }
            | Error::PortRead { kind, .. }
            | Error::ChannelRead { kind, .. } => Some(kind),
            Error::SelectBus => Some(FailureKind::Line),
            Error::SweepTimeout => Some(FailureKind::Timeout),
            Error::ChannelOutOfRange { .. }
            | Error::UnknownDevice { .. }
            | Error::NotEnabled { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DeviceInit { device, kind } => {
                write!(f, "device {device} failed to initialize: {kind}")
            }
            Error::PortRead { device, kind } => {
                write!(f, "expander {device} port read failed: {kind}")
            }
            Error::ChannelRead {
                device,
                channel,
                kind,
            } => write!(f, "multiplexer {device} channel {channel} read failed: {kind}"),
            Error::ChannelOutOfRange { device, channel } => {
                write!(f, "channel {channel} is not configured on multiplexer {device}")
            }
            Error::UnknownDevice { device } => write!(f, "no device at index {device}"),
            Error::NotEnabled { device } => write!(f, "multiplexer {device} is not enabled"),
            Error::SelectBus => f.write_str("select lines could not be driven"),
            Error::SweepTimeout => f.write_str("sweep deadline exceeded"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Rejected static configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The expander index does not fit the chip's hardware address pins.
    AddressOutOfRange { device: u8, index: u8 },
    /// Two expanders resolve to the same bus address.
    DuplicateAddress { device: u8, address: u8 },
    /// A multiplexer is configured with zero active channels.
    NoChannels { device: u8 },
    /// A multiplexer is configured with more channels than a device has.
    TooManyChannels { device: u8, channels: u8 },
    /// The select bus cannot address all configured channels.
    SelectBusTooNarrow { device: u8, channels: u8, width: u8 },
    /// More select lines than a channel number has bits.
    SelectBusTooWide { width: u8 },
    /// The settle delay must be nonzero.
    SettleTooShort { settle_us: u32 },
    /// A retry policy needs at least one attempt.
    NoAttempts,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::AddressOutOfRange { device, index } => {
                write!(f, "expander {device}: address index {index} out of range")
            }
            ConfigError::DuplicateAddress { device, address } => {
                write!(f, "expander {device}: address 0x{address:02x} already in use")
            }
            ConfigError::NoChannels { device } => {
                write!(f, "multiplexer {device} has no active channels")
            }
            ConfigError::TooManyChannels { device, channels } => {
                write!(f, "multiplexer {device}: {channels} channels exceed device width")
            }
            ConfigError::SelectBusTooNarrow {
                device,
                channels,
                width,
            } => write!(
                f,
                "multiplexer {device}: {channels} channels need more than {width} select lines"
            ),
            ConfigError::SelectBusTooWide { width } => {
                write!(f, "{width} select lines exceed the 8-bit channel number")
            }
            ConfigError::SettleTooShort { settle_us } => {
                write!(f, "settle delay of {settle_us}us is too short")
            }
            ConfigError::NoAttempts => f.write_str("retry policy allows zero attempts"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

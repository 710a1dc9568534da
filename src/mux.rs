//! Analog multiplexer bank.
//!
//! A bank is a group of multiplexer devices (74HC4067 and friends) that share one set of select
//! lines.  Each device has its own enable line and its common output wired to its own converter
//! input.  Because the select lines are shared, only one device may be enabled at any time, which
//! the bank tracks with a single "active device" token.
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::{EnablePolarity, ScanConfig};
use crate::error::{ConfigError, Error, FailureKind};
use crate::frame::MAX_CHANNELS;
use crate::selector::{ChannelSelector, MAX_SELECT_LINES};

/// Raw analog-to-digital conversion on a single input.
///
/// `embedded-hal` 1.0 has no ADC trait, so the bank consumes the converter through this one.
/// Implementations decide how a `Pin` identifier maps to a converter input.
pub trait RawConverter {
    /// Identifies one converter input.
    type Pin: Copy;
    type Error: core::fmt::Debug;

    /// Largest value `sample()` can return (4095 for a 12-bit converter).
    const MAX_VALUE: u16 = u16::MAX;

    /// Take one sample from `pin`.
    fn sample(&mut self, pin: Self::Pin) -> Result<u16, Self::Error>;
}

/// One multiplexer device of a bank.
pub struct MuxDevice<EN, PIN> {
    /// Line that connects the device's common output when enabled.
    pub enable: EN,
    /// Converter input the common output is wired to.
    pub converter_pin: PIN,
    /// Channels in use, counted from channel 0.
    pub channels: u8,
}

impl<EN, PIN> MuxDevice<EN, PIN> {
    pub fn new(enable: EN, converter_pin: PIN, channels: u8) -> Self {
        Self {
            enable,
            converter_pin,
            channels,
        }
    }
}

/// Raw values of one multiplexer, channel 0 first.
pub type ChannelValues = heapless::Vec<u16, MAX_CHANNELS>;

/// `N` multiplexer devices sharing a `W`-bit select bus.
pub struct MultiplexerBank<SEL, EN, ADC: RawConverter, D, const W: usize, const N: usize> {
    selector: ChannelSelector<SEL, W>,
    devices: [MuxDevice<EN, ADC::Pin>; N],
    converter: ADC,
    delay: D,
    settle_us: u32,
    polarity: EnablePolarity,
    /// The only device whose enable line may be active.
    active: Option<usize>,
}

pub(crate) fn index(i: usize) -> u8 {
    u8::try_from(i).unwrap_or(u8::MAX)
}

impl<SEL, EN, ADC, D, const W: usize, const N: usize> MultiplexerBank<SEL, EN, ADC, D, W, N>
where
    SEL: OutputPin,
    EN: OutputPin,
    ADC: RawConverter,
{
    /// Create a bank.  No lines are touched until [`initialize()`][Self::initialize].
    pub fn new(
        select_lines: [SEL; W],
        devices: [MuxDevice<EN, ADC::Pin>; N],
        converter: ADC,
        delay: D,
        config: &ScanConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if W > MAX_SELECT_LINES {
            return Err(ConfigError::SelectBusTooWide { width: index(W) });
        }
        for (i, device) in devices.iter().enumerate() {
            let channels = device.channels;
            if channels == 0 {
                return Err(ConfigError::NoChannels { device: index(i) });
            }
            if usize::from(channels) > MAX_CHANNELS {
                return Err(ConfigError::TooManyChannels {
                    device: index(i),
                    channels,
                });
            }
            if usize::from(channels) > ChannelSelector::<SEL, W>::capacity() {
                return Err(ConfigError::SelectBusTooNarrow {
                    device: index(i),
                    channels,
                    width: index(W),
                });
            }
        }

        Ok(Self {
            selector: ChannelSelector::new(select_lines),
            devices,
            converter,
            delay,
            settle_us: config.settle_us,
            polarity: config.enable_polarity,
            active: None,
        })
    }

    /// Disable every device and drive the select bus low.
    pub fn initialize(&mut self) -> Result<(), Error> {
        let inactive = self.polarity.level(false);
        for (i, device) in self.devices.iter_mut().enumerate() {
            device
                .enable
                .set_state(inactive)
                .map_err(|_| Error::DeviceInit {
                    device: index(i),
                    kind: FailureKind::Line,
                })?;
        }
        self.active = None;
        self.selector.idle().map_err(|_| Error::SelectBus)
    }

    pub fn device_count(&self) -> usize {
        N
    }

    /// Active channel count of `device`.
    pub fn channel_count(&self, device: usize) -> Option<u8> {
        self.devices.get(device).map(|d| d.channels)
    }

    /// Device currently holding the enable token.
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn settle_us(&self) -> u32 {
        self.settle_us
    }

    /// Hand the enable token to `device`.
    ///
    /// Every other device is disabled before `device` is enabled, so two devices are never
    /// enabled at the same time, not even during the handover.
    fn activate(&mut self, device: usize) -> Result<(), FailureKind> {
        let inactive = self.polarity.level(false);
        for (i, other) in self.devices.iter_mut().enumerate() {
            if i != device {
                other
                    .enable
                    .set_state(inactive)
                    .map_err(|_| FailureKind::Line)?;
            }
        }
        self.active = None;

        self.devices[device]
            .enable
            .set_state(self.polarity.level(true))
            .map_err(|_| FailureKind::Line)?;
        self.active = Some(device);
        Ok(())
    }

    /// Disable the token holder.  On failure the token stays where it was.
    pub fn deactivate(&mut self) -> Result<(), FailureKind> {
        if let Some(i) = self.active {
            self.devices[i]
                .enable
                .set_state(self.polarity.level(false))
                .map_err(|_| FailureKind::Line)?;
            self.active = None;
        }
        Ok(())
    }

    fn check(&self, device: usize, channel: u8) -> Result<(), Error> {
        let configured = self
            .channel_count(device)
            .ok_or(Error::UnknownDevice {
                device: index(device),
            })?;
        if channel >= configured {
            return Err(Error::ChannelOutOfRange {
                device: index(device),
                channel,
            });
        }
        Ok(())
    }

    /// First half of a channel read: enable `device` and select `channel`.
    ///
    /// The caller must wait [`settle_us()`][Self::settle_us] before calling
    /// [`finish_read()`][Self::finish_read].
    pub(crate) fn begin_read(&mut self, device: usize, channel: u8) -> Result<(), Error> {
        self.check(device, channel)?;
        let failed = |kind| Error::ChannelRead {
            device: index(device),
            channel,
            kind,
        };

        self.activate(device).map_err(failed)?;
        if self.selector.select(channel).is_err() {
            // The select error is the one worth reporting.
            let _ = self.deactivate();
            return Err(failed(FailureKind::Line));
        }
        Ok(())
    }

    /// Second half of a channel read: sample the converter and disable the device again.
    ///
    /// The device is disabled even if sampling fails.  Fails without sampling unless `device`
    /// holds the enable token.
    pub(crate) fn finish_read(&mut self, device: usize, channel: u8) -> Result<u16, Error> {
        self.check(device, channel)?;
        if self.active != Some(device) {
            return Err(Error::NotEnabled {
                device: index(device),
            });
        }
        let failed = |kind| Error::ChannelRead {
            device: index(device),
            channel,
            kind,
        };

        let sample = self.converter.sample(self.devices[device].converter_pin);
        let released = self.deactivate();
        let value = sample.map_err(|e| {
            log::debug!("converter failed on mux {} ch {}: {:?}", device, channel, e);
            failed(FailureKind::Converter)
        })?;
        released.map_err(failed)?;

        debug_assert!(value <= ADC::MAX_VALUE);
        log::trace!("mux {} ch {} = {}", device, channel, value);
        Ok(value)
    }

    /// Give back the select lines, the devices, the converter and the delay.
    pub fn release(self) -> ([SEL; W], [MuxDevice<EN, ADC::Pin>; N], ADC, D) {
        (
            self.selector.release(),
            self.devices,
            self.converter,
            self.delay,
        )
    }
}

impl<SEL, EN, ADC, D, const W: usize, const N: usize> MultiplexerBank<SEL, EN, ADC, D, W, N>
where
    SEL: OutputPin,
    EN: OutputPin,
    ADC: RawConverter,
    D: DelayNs,
{
    /// Read one channel of one device.
    ///
    /// Enables `device` (disabling all others first), selects `channel`, waits for the settle
    /// time measured from the last line write, samples the converter and disables the device.
    /// Nothing is retried.
    pub fn read_channel(&mut self, device: usize, channel: u8) -> Result<u16, Error> {
        self.begin_read(device, channel)?;
        self.delay.delay_us(self.settle_us);
        self.finish_read(device, channel)
    }

    /// Read every configured channel of every device, stopping at the first failure.
    pub fn read_all_channels(&mut self) -> Result<[ChannelValues; N], Error> {
        let mut values: [ChannelValues; N] = core::array::from_fn(|_| ChannelValues::new());
        for (device, out) in values.iter_mut().enumerate() {
            for channel in 0..self.devices[device].channels {
                let value = self.read_channel(device, channel)?;
                // Channel counts are validated against MAX_CHANNELS.
                let _ = out.push(value);
            }
        }
        Ok(values)
    }
}

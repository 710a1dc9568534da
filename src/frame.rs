//! Sample frames: the result of one sweep.
use core::fmt;

use crate::error::FailureKind;

/// Most channels a single multiplexer device can expose.
pub const MAX_CHANNELS: usize = 16;

/// One entry of a sample frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading<T> {
    /// The value read from hardware.
    Value(T),
    /// The device could not be read during this sweep.
    Unavailable(FailureKind),
}

impl<T: Copy> Reading<T> {
    /// The value, or `None` if the entry is unavailable.
    pub fn value(&self) -> Option<T> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Value(_))
    }
}

/// State of all pins of one expander port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortBits {
    bits: u32,
    width: u8,
}

impl PortBits {
    /// Bits above `width` are discarded.  Widths above 32 are treated as 32.
    pub fn new(bits: u32, width: u8) -> Self {
        let width = width.min(32);
        let mask = if width >= 32 {
            u32::MAX
        } else {
            (1 << width) - 1
        };
        Self {
            bits: bits & mask,
            width,
        }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Whether `pin` read as logic-high.  Pins outside the port read as low.
    pub fn is_high(&self, pin: u8) -> bool {
        pin < self.width && self.bits & (1 << pin) != 0
    }

    /// Pin levels, pin 0 first.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.width).map(move |pin| self.is_high(pin))
    }
}

/// Raw samples of one multiplexer, channel 0 first.
pub type ChannelSamples = heapless::Vec<Reading<u16>, MAX_CHANNELS>;

/// Snapshot of every configured input, taken by one sweep.
///
/// `M` is the number of expanders and `N` the number of multiplexers.  The shape of a frame only
/// depends on the static configuration: there is always one port entry per expander and exactly
/// as many samples per multiplexer as it has active channels.  Failed reads show up as
/// [`Reading::Unavailable`] in place of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFrame<const M: usize, const N: usize> {
    ports: [Reading<PortBits>; M],
    channels: [ChannelSamples; N],
}

impl<const M: usize, const N: usize> SampleFrame<M, N> {
    pub(crate) fn new(ports: [Reading<PortBits>; M], channels: [ChannelSamples; N]) -> Self {
        Self { ports, channels }
    }

    /// All expander ports, in configuration order.
    pub fn ports(&self) -> &[Reading<PortBits>; M] {
        &self.ports
    }

    pub fn port(&self, device: usize) -> Option<Reading<PortBits>> {
        self.ports.get(device).copied()
    }

    /// Samples of one multiplexer, in channel order.
    pub fn channels(&self, device: usize) -> Option<&[Reading<u16>]> {
        self.channels.get(device).map(|c| c.as_slice())
    }

    /// Number of samples per multiplexer.
    pub fn channel_counts(&self) -> [usize; N] {
        core::array::from_fn(|i| self.channels[i].len())
    }

    /// Whether every entry of the frame holds a value.
    pub fn is_complete(&self) -> bool {
        self.ports.iter().all(Reading::is_available)
            && self
                .channels
                .iter()
                .all(|c| c.iter().all(Reading::is_available))
    }
}

/// One line per input, e.g. `EXP0 pin 3 = 1` or `MUX1 ch 9 = 512`.
impl<const M: usize, const N: usize> fmt::Display for SampleFrame<M, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (device, port) in self.ports.iter().enumerate() {
            match port {
                Reading::Value(bits) => {
                    for (pin, high) in bits.iter().enumerate() {
                        writeln!(f, "EXP{device} pin {pin} = {}", u8::from(high))?;
                    }
                }
                Reading::Unavailable(kind) => writeln!(f, "EXP{device} n/a ({kind})")?,
            }
        }
        for (device, samples) in self.channels.iter().enumerate() {
            for (channel, sample) in samples.iter().enumerate() {
                match sample {
                    Reading::Value(v) => writeln!(f, "MUX{device} ch {channel} = {v}")?,
                    Reading::Unavailable(kind) => {
                        writeln!(f, "MUX{device} ch {channel} = n/a ({kind})")?
                    }
                }
            }
        }
        Ok(())
    }
}

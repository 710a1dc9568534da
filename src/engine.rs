//! The scanning engine: one sweep over every expander and multiplexer.
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use crate::common::PortDriver;
use crate::config::{FailurePolicy, ScanConfig};
use crate::error::{ConfigError, Error, FailureKind};
use crate::expander::ExpanderBank;
use crate::frame::{ChannelSamples, Reading, SampleFrame};
use crate::mux::{MultiplexerBank, RawConverter};

/// Anything that produces a complete sample frame per call.
pub trait Scanner {
    type Frame;

    /// Run one sweep.
    fn scan(&mut self) -> Result<Self::Frame, Error>;
}

/// Turn the result of one read into a frame entry, according to `policy`.
pub(crate) fn outcome<T>(
    policy: FailurePolicy,
    result: Result<T, Error>,
    failures: &mut usize,
) -> Result<Reading<T>, Error> {
    match result {
        Ok(v) => Ok(Reading::Value(v)),
        Err(e) if policy == FailurePolicy::BestEffort => {
            let kind = e.kind().unwrap_or(FailureKind::Bus);
            if kind == FailureKind::Offline {
                log::trace!("{}", e);
            } else {
                log::warn!("{}", e);
            }
            *failures += 1;
            Ok(Reading::Unavailable(kind))
        }
        Err(e) => Err(e),
    }
}

/// Sweeps an [`ExpanderBank`] and a [`MultiplexerBank`] into [`SampleFrame`]s.
///
/// The engine keeps no state between sweeps apart from the banks themselves: each call to
/// [`scan()`][Scanner::scan] reads everything afresh, digital inputs first, then analog inputs
/// device by device and channel by channel.
///
/// The select lines and the bus are shared hardware.  Create one engine for them at startup and
/// share it (see [`SharedScanner`][crate::SharedScanner]) rather than building a second one.
pub struct ScanEngine<X, A> {
    expanders: X,
    multiplexers: A,
    policy: FailurePolicy,
}

impl<X, A> ScanEngine<X, A> {
    pub fn expanders(&self) -> &X {
        &self.expanders
    }

    pub fn expanders_mut(&mut self) -> &mut X {
        &mut self.expanders
    }

    pub fn multiplexers(&self) -> &A {
        &self.multiplexers
    }

    pub fn multiplexers_mut(&mut self) -> &mut A {
        &mut self.multiplexers
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Give back both banks.
    pub fn release(self) -> (X, A) {
        (self.expanders, self.multiplexers)
    }
}

impl<I2C, P, SEL, EN, ADC, D, const M: usize, const W: usize, const N: usize>
    ScanEngine<ExpanderBank<I2C, P, M>, MultiplexerBank<SEL, EN, ADC, D, W, N>>
where
    I2C: I2c,
    P: PortDriver,
    SEL: OutputPin,
    EN: OutputPin,
    ADC: RawConverter,
    D: DelayNs,
{
    /// Create an engine.  Call [`initialize()`][Self::initialize] before the first sweep.
    pub fn new(
        expanders: ExpanderBank<I2C, P, M>,
        multiplexers: MultiplexerBank<SEL, EN, ADC, D, W, N>,
        config: &ScanConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            expanders,
            multiplexers,
            policy: config.policy,
        })
    }

    /// Bring all devices into their idle state.
    ///
    /// Expanders that fail to initialize are left offline and reported as unavailable in every
    /// frame; the engine starts in a degraded mode instead of failing.  Failing to drive the
    /// multiplexer lines is fatal, since the enable exclusion can no longer be guaranteed.
    pub fn initialize(&mut self) -> Result<(), Error> {
        self.multiplexers.initialize()?;
        if let Err(e) = self.expanders.initialize() {
            let online = (0..M).filter(|d| self.expanders.is_online(*d)).count();
            log::warn!(
                "starting degraded, {}/{} expanders online (first failure: {})",
                online,
                M,
                e
            );
        }
        Ok(())
    }
}

impl<I2C, P, SEL, EN, ADC, D, const M: usize, const W: usize, const N: usize> Scanner
    for ScanEngine<ExpanderBank<I2C, P, M>, MultiplexerBank<SEL, EN, ADC, D, W, N>>
where
    I2C: I2c,
    P: PortDriver,
    SEL: OutputPin,
    EN: OutputPin,
    ADC: RawConverter,
    D: DelayNs,
{
    type Frame = SampleFrame<M, N>;

    fn scan(&mut self) -> Result<SampleFrame<M, N>, Error> {
        let mut failures = 0;

        let mut ports = [Reading::Unavailable(FailureKind::Offline); M];
        for (device, port) in ports.iter_mut().enumerate() {
            *port = outcome(self.policy, self.expanders.read_port(device), &mut failures)?;
        }

        let mut channels: [ChannelSamples; N] = core::array::from_fn(|_| ChannelSamples::new());
        for (device, samples) in channels.iter_mut().enumerate() {
            let count = self.multiplexers.channel_count(device).unwrap_or(0);
            for channel in 0..count {
                let result = self.multiplexers.read_channel(device, channel);
                // Channel counts are validated against MAX_CHANNELS.
                let _ = samples.push(outcome(self.policy, result, &mut failures)?);
            }
        }

        log::debug!("sweep complete, {} unavailable entries", failures);
        Ok(SampleFrame::new(ports, channels))
    }
}

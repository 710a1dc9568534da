//! Asynchronous scanning, using `embedded-hal-async`'s I2C and delay traits.
//!
//! This module is only built if the `"async"` feature is enabled.  It sweeps the same banks as
//! the blocking [`ScanEngine`][crate::ScanEngine], but awaits bus transactions and settle delays
//! so an executor can run other tasks meanwhile.  The multiplexer lines and the converter stay
//! blocking; they are fast compared to the settle time.
//!
//! Only the async engine offers a sweep deadline, since a blocking bus transaction that never
//! returns cannot be interrupted from the same thread.
use embassy_futures::select::{select, Either};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::bus::asynch;
use crate::common::PortDriver;
use crate::config::{FailurePolicy, ScanConfig};
use crate::engine::outcome;
use crate::error::{ConfigError, Error, FailureKind};
use crate::expander::ExpanderBank;
use crate::frame::{ChannelSamples, PortBits, Reading, SampleFrame};
use crate::mux::{index, MultiplexerBank, RawConverter};

impl<I2C: I2c, P: PortDriver, const M: usize> ExpanderBank<I2C, P, M> {
    /// Async version of [`initialize()`][ExpanderBank::initialize].
    pub async fn initialize_async(&mut self) -> Result<(), Error> {
        let mut first = Ok(());
        for device in 0..M {
            if let Err(e) = self.initialize_device_async(device).await {
                log::warn!("{}", e);
                first = first.and(Err(e));
            }
        }
        first
    }

    /// Async version of [`initialize_device()`][ExpanderBank::initialize_device].
    pub async fn initialize_device_async(&mut self, device: usize) -> Result<(), Error> {
        let addr = self.device(device)?.address();
        self.set_online(device, false);
        for op in self.chip.input_setup().iter() {
            asynch::apply(&mut self.i2c, addr, op)
                .await
                .map_err(|e| Error::DeviceInit {
                    device: index(device),
                    kind: FailureKind::from_i2c(&e),
                })?;
        }
        self.set_online(device, true);
        log::debug!("expander {} online at 0x{:02x}", device, addr);
        Ok(())
    }

    /// Async version of [`read_port()`][ExpanderBank::read_port].
    pub async fn read_port_async(&mut self, device: usize) -> Result<PortBits, Error> {
        let addr = self.polled_address(device)?;
        let bits = asynch::read_port(&mut self.i2c, addr, &self.chip)
            .await
            .map_err(|e| Error::PortRead {
                device: index(device),
                kind: FailureKind::from_i2c(&e),
            })?;
        Ok(PortBits::new(bits, P::port_width()))
    }
}

/// Async counterpart of [`ScanEngine`][crate::ScanEngine].
///
/// The multiplexer bank's own delay is not used; settle delays are awaited on `DLY` instead.
pub struct AsyncScanEngine<X, A, DLY> {
    expanders: X,
    multiplexers: A,
    delay: DLY,
    policy: FailurePolicy,
}

impl<X, A, DLY> AsyncScanEngine<X, A, DLY> {
    pub fn expanders(&self) -> &X {
        &self.expanders
    }

    pub fn multiplexers(&self) -> &A {
        &self.multiplexers
    }

    /// Give back both banks and the delay.
    pub fn release(self) -> (X, A, DLY) {
        (self.expanders, self.multiplexers, self.delay)
    }
}

impl<I2C, P, SEL, EN, ADC, D, DLY, const M: usize, const W: usize, const N: usize>
    AsyncScanEngine<ExpanderBank<I2C, P, M>, MultiplexerBank<SEL, EN, ADC, D, W, N>, DLY>
where
    I2C: I2c,
    P: PortDriver,
    SEL: OutputPin,
    EN: OutputPin,
    ADC: RawConverter,
    DLY: DelayNs,
{
    pub fn new(
        expanders: ExpanderBank<I2C, P, M>,
        multiplexers: MultiplexerBank<SEL, EN, ADC, D, W, N>,
        delay: DLY,
        config: &ScanConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            expanders,
            multiplexers,
            delay,
            policy: config.policy,
        })
    }

    /// Bring all devices into their idle state, tolerating offline expanders.
    pub async fn initialize(&mut self) -> Result<(), Error> {
        self.multiplexers.initialize()?;
        if let Err(e) = self.expanders.initialize_async().await {
            log::warn!("starting degraded (first failure: {})", e);
        }
        Ok(())
    }

    async fn read_channel(&mut self, device: usize, channel: u8) -> Result<u16, Error> {
        self.multiplexers.begin_read(device, channel)?;
        self.delay.delay_us(self.multiplexers.settle_us()).await;
        self.multiplexers.finish_read(device, channel)
    }

    /// Run one sweep.
    pub async fn scan(&mut self) -> Result<SampleFrame<M, N>, Error> {
        let mut failures = 0;

        let mut ports = [Reading::Unavailable(FailureKind::Offline); M];
        for (device, port) in ports.iter_mut().enumerate() {
            let result = self.expanders.read_port_async(device).await;
            *port = outcome(self.policy, result, &mut failures)?;
        }

        let mut channels: [ChannelSamples; N] = core::array::from_fn(|_| ChannelSamples::new());
        for (device, samples) in channels.iter_mut().enumerate() {
            let count = self.multiplexers.channel_count(device).unwrap_or(0);
            for channel in 0..count {
                let result = self.read_channel(device, channel).await;
                // Channel counts are validated against MAX_CHANNELS.
                let _ = samples.push(outcome(self.policy, result, &mut failures)?);
            }
        }

        log::debug!("sweep complete, {} unavailable entries", failures);
        Ok(SampleFrame::new(ports, channels))
    }

    /// Run one sweep, giving up after `timeout_us` as measured by `timer`.
    ///
    /// On timeout the sweep is dropped wherever it was.  If a multiplexer was enabled at that
    /// point it is disabled again before [`Error::SweepTimeout`] is returned.
    pub async fn scan_with_deadline<T: DelayNs>(
        &mut self,
        timeout_us: u32,
        timer: &mut T,
    ) -> Result<SampleFrame<M, N>, Error> {
        let result = select(self.scan(), timer.delay_us(timeout_us)).await;
        match result {
            Either::First(frame) => frame,
            Either::Second(()) => {
                log::warn!("sweep exceeded {}us deadline", timeout_us);
                if self.multiplexers.deactivate().is_err() {
                    log::warn!("could not disable mux {:?}", self.multiplexers.active());
                }
                Err(Error::SweepTimeout)
            }
        }
    }
}

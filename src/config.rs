//! Static scan configuration.
//!
//! The device topology (which expanders, which multiplexers, which pins) is handed to the banks as
//! const-generic arrays when they are constructed.  What remains here is the plain-data part that
//! tunes how a sweep behaves.

use crate::error::ConfigError;

/// Settle time for 74HC4067-class multiplexers after an enable or select transition.
pub const DEFAULT_SETTLE_US: u32 = 50;

/// What the engine does when one device fails during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailurePolicy {
    /// Mark the failing entry as unavailable and keep sweeping.
    #[default]
    BestEffort,
    /// Stop the sweep and return the first error.
    Abort,
}

/// Bounded retry at the bus-transaction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryPolicy {
    /// Total attempts per transaction, including the first one.
    pub attempts: u8,
    /// Delay before the first retry.  Doubles with every further retry.
    pub backoff_us: u32,
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub const NONE: RetryPolicy = RetryPolicy {
        attempts: 1,
        backoff_us: 0,
    };

    pub const fn new(attempts: u8, backoff_us: u32) -> Self {
        Self {
            attempts,
            backoff_us,
        }
    }

    /// Backoff before retry number `retry` (starting at 1).
    pub fn backoff_for(&self, retry: u8) -> u32 {
        let shift = u32::from(retry.saturating_sub(1)).min(16);
        self.backoff_us.saturating_mul(1 << shift)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

/// Logic level that enables a multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EnablePolarity {
    /// Enabled while the line is LOW (74HC4067, CD74HC4067, 74HC4051).
    #[default]
    ActiveLow,
    /// Enabled while the line is HIGH.
    ActiveHigh,
}

impl EnablePolarity {
    pub(crate) fn level(self, enabled: bool) -> embedded_hal::digital::PinState {
        match self {
            EnablePolarity::ActiveLow => (!enabled).into(),
            EnablePolarity::ActiveHigh => enabled.into(),
        }
    }
}

/// Sweep behavior shared by the synchronous and asynchronous engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanConfig {
    /// Delay between the last enable/select line assertion and sampling.
    pub settle_us: u32,
    /// Enable level of the multiplexer devices.
    pub enable_polarity: EnablePolarity,
    /// Sweep-level failure handling.
    pub policy: FailurePolicy,
    /// Bus retry.  The engines and banks never retry on their own; this only takes effect when
    /// the bus is wrapped with [`RetryI2c::from_config()`][crate::RetryI2c::from_config].
    pub retry: RetryPolicy,
}

impl ScanConfig {
    pub const fn new() -> Self {
        Self {
            settle_us: DEFAULT_SETTLE_US,
            enable_polarity: EnablePolarity::ActiveLow,
            policy: FailurePolicy::BestEffort,
            retry: RetryPolicy::NONE,
        }
    }

    pub const fn with_settle_us(mut self, settle_us: u32) -> Self {
        self.settle_us = settle_us;
        self
    }

    pub const fn with_enable_polarity(mut self, polarity: EnablePolarity) -> Self {
        self.enable_polarity = polarity;
        self
    }

    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settle_us == 0 {
            return Err(ConfigError::SettleTooShort {
                settle_us: self.settle_us,
            });
        }
        self.retry.validate()
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

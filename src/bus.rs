use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self as hal_i2c, I2c};

use crate::common::{payload, PortDriver, RegisterOp, MAX_PAYLOAD};
use crate::config::{RetryPolicy, ScanConfig};

pub(crate) trait I2cExt {
    type Error;

    fn write_reg<R: Into<u8>>(&mut self, addr: u8, reg: R, value: u8) -> Result<(), Self::Error>;
    fn update_reg<R: Into<u8>>(
        &mut self,
        addr: u8,
        reg: R,
        mask_set: u8,
        mask_clear: u8,
    ) -> Result<(), Self::Error>;
    fn read_reg<R: Into<u8>>(&mut self, addr: u8, reg: R) -> Result<u8, Self::Error>;

    /// Run one chip setup operation.
    fn apply(&mut self, addr: u8, op: &RegisterOp) -> Result<(), Self::Error>;

    /// Read every input pin of a device in a single bus transaction.
    fn read_port<P: PortDriver>(&mut self, addr: u8, chip: &P) -> Result<u32, Self::Error>;
}

impl<I2C: I2c> I2cExt for I2C {
    type Error = I2C::Error;

    fn write_reg<R: Into<u8>>(&mut self, addr: u8, reg: R, value: u8) -> Result<(), Self::Error> {
        self.write(addr, &[reg.into(), value])?;
        Ok(())
    }

    fn update_reg<R: Into<u8>>(
        &mut self,
        addr: u8,
        reg: R,
        mask_set: u8,
        mask_clear: u8,
    ) -> Result<(), Self::Error> {
        let reg = reg.into();
        let mut value = self.read_reg(addr, reg)?;
        value |= mask_set;
        value &= !mask_clear;
        self.write_reg(addr, reg, value)
    }

    fn read_reg<R: Into<u8>>(&mut self, addr: u8, reg: R) -> Result<u8, Self::Error> {
        let mut buf = [0x00];
        self.write_read(addr, &[reg.into()], &mut buf)?;
        Ok(buf[0])
    }

    fn apply(&mut self, addr: u8, op: &RegisterOp) -> Result<(), Self::Error> {
        match *op {
            RegisterOp::Write { reg, data, len } => {
                let (buf, n) = prefixed(reg, &data, len);
                self.write(addr, &buf[..n])
            }
            RegisterOp::Update { reg, set, clear } => self.update_reg(addr, reg, set, clear),
            RegisterOp::Raw { data, len } => self.write(addr, payload(&data, len)),
        }
    }

    fn read_port<P: PortDriver>(&mut self, addr: u8, chip: &P) -> Result<u32, Self::Error> {
        let mut buf = [0x00; MAX_PAYLOAD];
        let n = P::port_bytes();
        match chip.port_register() {
            Some(reg) => self.write_read(addr, &[reg], &mut buf[..n])?,
            None => self.read(addr, &mut buf[..n])?,
        }
        Ok(P::decode_port(&buf[..n]))
    }
}

fn prefixed(reg: u8, data: &[u8; MAX_PAYLOAD], len: u8) -> ([u8; MAX_PAYLOAD + 1], usize) {
    let data = payload(data, len);
    let mut buf = [0x00; MAX_PAYLOAD + 1];
    buf[0] = reg;
    buf[1..=data.len()].copy_from_slice(data);
    (buf, data.len() + 1)
}

/// I2C bus wrapper that retries failed transactions.
///
/// Each call on the wrapped bus is attempted up to [`RetryPolicy::attempts`] times.  Between
/// attempts the wrapper sleeps for [`RetryPolicy::backoff_us`], doubling the delay after every
/// failed retry.  The error of the last attempt is returned.
///
/// ```
/// # use embedded_hal_mock::eh1::{delay::NoopDelay, i2c as mock_i2c};
/// # let i2c = mock_i2c::Mock::new(&[]);
/// let bus = io_scanner::RetryI2c::new(i2c, NoopDelay::new(), io_scanner::RetryPolicy::new(3, 200));
/// # bus.release().0.done();
/// ```
pub struct RetryI2c<I2C, D> {
    i2c: I2C,
    delay: D,
    policy: RetryPolicy,
}

impl<I2C, D> RetryI2c<I2C, D> {
    pub fn new(i2c: I2C, delay: D, policy: RetryPolicy) -> Self {
        Self { i2c, delay, policy }
    }

    /// Wrap `i2c` with the retry policy of `config`.
    pub fn from_config(i2c: I2C, delay: D, config: &ScanConfig) -> Self {
        Self::new(i2c, delay, config.retry)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Give back the bus and the delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

impl<I2C: I2c, D: DelayNs> RetryI2c<I2C, D> {
    fn retry<T>(
        &mut self,
        address: u8,
        mut f: impl FnMut(&mut I2C) -> Result<T, I2C::Error>,
    ) -> Result<T, I2C::Error> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match f(&mut self.i2c) {
                Ok(v) => return Ok(v),
                Err(e) if attempt < attempts => {
                    let backoff = self.policy.backoff_for(attempt);
                    log::warn!(
                        "i2c 0x{:02x}: attempt {}/{} failed ({:?}), retrying in {}us",
                        address,
                        attempt,
                        attempts,
                        hal_i2c::Error::kind(&e),
                        backoff
                    );
                    self.delay.delay_us(backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<I2C: I2c, D> hal_i2c::ErrorType for RetryI2c<I2C, D> {
    type Error = I2C::Error;
}

impl<I2C: I2c, D: DelayNs> I2c for RetryI2c<I2C, D> {
    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.retry(address, |i2c| i2c.read(address, read))
    }

    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.retry(address, |i2c| i2c.write(address, write))
    }

    fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.retry(address, |i2c| i2c.write_read(address, write, read))
    }

    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [hal_i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.retry(address, |i2c| i2c.transaction(address, operations))
    }
}

#[cfg(feature = "async")]
pub(crate) mod asynch {
    use embedded_hal_async::i2c::I2c;

    use super::prefixed;
    use crate::common::{payload, PortDriver, RegisterOp, MAX_PAYLOAD};

    pub(crate) async fn apply<I2C: I2c>(
        i2c: &mut I2C,
        addr: u8,
        op: &RegisterOp,
    ) -> Result<(), I2C::Error> {
        match *op {
            RegisterOp::Write { reg, data, len } => {
                let (buf, n) = prefixed(reg, &data, len);
                i2c.write(addr, &buf[..n]).await
            }
            RegisterOp::Update { reg, set, clear } => {
                let mut value = [0x00];
                i2c.write_read(addr, &[reg], &mut value).await?;
                let value = (value[0] | set) & !clear;
                i2c.write(addr, &[reg, value]).await
            }
            RegisterOp::Raw { data, len } => i2c.write(addr, payload(&data, len)).await,
        }
    }

    pub(crate) async fn read_port<I2C: I2c, P: PortDriver>(
        i2c: &mut I2C,
        addr: u8,
        chip: &P,
    ) -> Result<u32, I2C::Error> {
        let mut buf = [0x00; MAX_PAYLOAD];
        let n = P::port_bytes();
        match chip.port_register() {
            Some(reg) => i2c.write_read(addr, &[reg], &mut buf[..n]).await?,
            None => i2c.read(addr, &mut buf[..n]).await?,
        }
        Ok(P::decode_port(&buf[..n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c as mock_i2c;

    #[test]
    fn register_helpers() {
        let expectations = [
            mock_i2c::Transaction::write(0x20, vec![0x00, 0xff]),
            mock_i2c::Transaction::write_read(0x20, vec![0x0a], vec![0b1010_0100]),
            mock_i2c::Transaction::write(0x20, vec![0x0a, 0b0000_0101]),
            mock_i2c::Transaction::write(0x21, vec![0x06, 0xff, 0xff]),
            mock_i2c::Transaction::write(0x22, vec![0xff, 0xff]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        bus.write_reg(0x20, 0x00u8, 0xff).unwrap();
        bus.update_reg(0x20, 0x0au8, 0b0000_0001, 0b1010_0000).unwrap();
        bus.apply(0x21, &RegisterOp::write_word(0x06, 0xffff, 16))
            .unwrap();
        bus.apply(0x22, &RegisterOp::raw_word(0xffff, 16)).unwrap();

        bus.done();
    }

    #[test]
    fn oversized_ops_are_clamped() {
        let expectations = [
            mock_i2c::Transaction::write(0x20, vec![0x06, 1, 2, 3, 4]),
            mock_i2c::Transaction::write(0x20, vec![1, 2, 3, 4]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let data = [1, 2, 3, 4];
        bus.apply(0x20, &RegisterOp::Write { reg: 0x06, data, len: 9 })
            .unwrap();
        bus.apply(0x20, &RegisterOp::Raw { data, len: 200 }).unwrap();

        bus.done();
    }

    #[test]
    fn policy_from_config() {
        let config = ScanConfig::new().with_retry(RetryPolicy::new(4, 250));
        let retry = RetryI2c::from_config(mock_i2c::Mock::new(&[]), NoopDelay::new(), &config);
        assert_eq!(retry.policy(), RetryPolicy::new(4, 250));
        retry.release().0.done();
    }

    #[test]
    fn retry_until_success() {
        let expectations = [
            mock_i2c::Transaction::write_read(0x20, vec![0x12], vec![0x00, 0x00])
                .with_error(ErrorKind::Other),
            mock_i2c::Transaction::write_read(0x20, vec![0x12], vec![0x00, 0x00])
                .with_error(ErrorKind::Other),
            mock_i2c::Transaction::write_read(0x20, vec![0x12], vec![0xe1, 0xac]),
        ];
        let bus = mock_i2c::Mock::new(&expectations);
        let mut retry = RetryI2c::new(bus, NoopDelay::new(), RetryPolicy::new(3, 10));

        let mut buf = [0x00; 2];
        retry.write_read(0x20, &[0x12], &mut buf).unwrap();
        assert_eq!(buf, [0xe1, 0xac]);

        retry.release().0.done();
    }

    #[test]
    fn retry_gives_up() {
        let expectations = [
            mock_i2c::Transaction::write(0x20, vec![0x00, 0xff]).with_error(ErrorKind::Other),
            mock_i2c::Transaction::write(0x20, vec![0x00, 0xff]).with_error(ErrorKind::Other),
        ];
        let bus = mock_i2c::Mock::new(&expectations);
        let mut retry = RetryI2c::new(bus, NoopDelay::new(), RetryPolicy::new(2, 10));

        assert_eq!(retry.write(0x20, &[0x00, 0xff]), Err(ErrorKind::Other));

        retry.release().0.done();
    }
}

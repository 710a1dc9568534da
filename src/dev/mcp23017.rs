//! Support for the `MCP23017` "16-Bit I/O Expander with Serial Interface"
//!
//! Datasheet: https://ww1.microchip.com/downloads/en/devicedoc/20001952c.pdf
//!
//! The whole port is read with a single write-read starting at `GPIOA`.  This relies on the
//! register pointer advancing from `GPIOA` to `GPIOB`, which holds for `IOCON.BANK = 0` with
//! sequential operation enabled.  Both are the reset state, but setup enforces them anyway since
//! a previous user of the bus may have changed them.
//!
//! With `IOCON.BANK = 1` the register map is different and IOCON sits at `0x05`.  Setup therefore
//! first writes `0x00` to `0x05`, which resets IOCON in that mode and clears GPINTENB (interrupt
//! on change, unused here) otherwise.  All other IOCON bits return to their reset values when
//! the device was in bank mode.
//!
//! The upper byte of a port value corresponds to port B (pins 7..0) and the lower byte to port A.
use crate::common::{InputSetup, PortDriver, RegisterOp};

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Register addresses for `IOCON.BANK = 0`.
enum Regs {
    /// IODIR: input/output direction: 0=output; 1=input
    IODIRA = 0x00,
    IODIRB = 0x01,
    /// IOCON while `IOCON.BANK = 1`, GPINTENB otherwise
    IOCONALT = 0x05,
    /// IOCON: configuration register, shared between both ports
    IOCON = 0x0a,
    /// GPPU: weak internal pull-ups for pins configured as inputs
    GPPUA = 0x0c,
    GPPUB = 0x0d,
    /// GPIO: reflects logic level on pins
    GPIOA = 0x12,
    GPIOB = 0x13,
}

impl From<Regs> for u8 {
    fn from(r: Regs) -> u8 {
        r as u8
    }
}

/// IOCON.BANK: registers of one port are grouped together when set
const IOCON_BANK: u8 = 1 << 7;
/// IOCON.SEQOP: sequential operation is *disabled* when set
const IOCON_SEQOP: u8 = 1 << 5;

/// `MCP23017` with all 16 pins as inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mcp23017 {
    pull_ups: u16,
}

impl Mcp23017 {
    pub const fn new() -> Self {
        Self { pull_ups: 0x0000 }
    }

    /// Enable the internal pull-ups for all pins in `mask`.
    pub const fn with_pull_ups(mask: u16) -> Self {
        Self { pull_ups: mask }
    }
}

impl PortDriver for Mcp23017 {
    const WIDTH: u8 = 16;
    const BASE_ADDRESS: u8 = 0x20;
    const ADDRESS_PINS: u8 = 3;

    fn input_setup(&self) -> InputSetup {
        let mut ops = InputSetup::new();
        // Capacity is 4, these are exactly 4.
        let _ = ops.push(RegisterOp::write_word(Regs::IOCONALT.into(), 0x00, 8));
        let _ = ops.push(RegisterOp::Update {
            reg: Regs::IOCON.into(),
            set: 0,
            clear: IOCON_BANK | IOCON_SEQOP,
        });
        let _ = ops.push(RegisterOp::write_word(Regs::IODIRA.into(), 0xffff, 16));
        let _ = ops.push(RegisterOp::write_word(
            Regs::GPPUA.into(),
            u32::from(self.pull_ups),
            16,
        ));
        ops
    }

    fn port_register(&self) -> Option<u8> {
        Some(Regs::GPIOA.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::I2cExt;
    use embedded_hal_mock::eh1::i2c as mock_i2c;

    #[test]
    fn mcp23017() {
        let expectations = [
            // leave bank mode, then force BANK=0, sequential operation
            mock_i2c::Transaction::write(0x22, vec![0x05, 0x00]),
            mock_i2c::Transaction::write_read(0x22, vec![0x0a], vec![0xa4]),
            mock_i2c::Transaction::write(0x22, vec![0x0a, 0x04]),
            // all pins input
            mock_i2c::Transaction::write(0x22, vec![0x00, 0xff, 0xff]),
            // pull-ups on gpa0 and gpb7
            mock_i2c::Transaction::write(0x22, vec![0x0c, 0x01, 0x80]),
            // port read
            mock_i2c::Transaction::write_read(0x22, vec![0x12], vec![0xe1, 0xac]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::with_pull_ups(0x8001);
        let addr = Mcp23017::address(2).unwrap();
        for op in chip.input_setup().iter() {
            bus.apply(addr, op).unwrap();
        }
        assert_eq!(bus.read_port(addr, &chip).unwrap(), 0xace1);

        bus.done();
    }

    /// Register file of one MCP23017 that follows the addressing of either IOCON.BANK mode.
    struct Banked {
        /// `[register][port]`, registers in datasheet order from IODIR (0) to OLAT (10)
        regs: [[u8; 2]; 11],
        pins: u16,
    }

    const IODIR: usize = 0;
    const IPOL: usize = 1;
    const IOCON: usize = 5;
    const GPIO: usize = 9;

    impl Banked {
        fn locate(&self, addr: u8) -> (usize, usize) {
            let addr = usize::from(addr);
            let (reg, port) = if self.regs[IOCON][0] & IOCON_BANK != 0 {
                (addr & 0x0f, addr >> 4)
            } else {
                (addr / 2, addr % 2)
            };
            assert!(reg < 11 && port < 2, "no register at 0x{:02x}", addr);
            (reg, port)
        }
    }

    impl embedded_hal::i2c::ErrorType for Banked {
        type Error = embedded_hal::i2c::ErrorKind;
    }

    impl embedded_hal::i2c::I2c for Banked {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [embedded_hal::i2c::Operation<'_>],
        ) -> Result<(), Self::Error> {
            use embedded_hal::i2c::Operation;

            let mut pointer = 0;
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(data) => {
                        let Some((first, rest)) = data.split_first() else {
                            continue;
                        };
                        pointer = *first;
                        for b in rest {
                            let (reg, port) = self.locate(pointer);
                            if reg == IOCON {
                                self.regs[IOCON] = [*b, *b];
                            } else {
                                self.regs[reg][port] = *b;
                            }
                            pointer += 1;
                        }
                    }
                    Operation::Read(buf) => {
                        for b in buf.iter_mut() {
                            let (reg, port) = self.locate(pointer);
                            *b = if reg == GPIO {
                                self.pins.to_le_bytes()[port] ^ self.regs[IPOL][port]
                            } else {
                                self.regs[reg][port]
                            };
                            pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn setup_leaves_bank_mode() {
        // a previous bus user switched to bank mode and made every pin an output
        let mut regs = [[0x00; 2]; 11];
        regs[IOCON] = [IOCON_BANK, IOCON_BANK];
        let mut bus = Banked { regs, pins: 0xace1 };

        let chip = Mcp23017::new();
        for op in chip.input_setup().iter() {
            bus.apply(0x20, op).unwrap();
        }

        assert_eq!(bus.regs[IOCON][0] & IOCON_BANK, 0);
        assert_eq!(bus.regs[IODIR], [0xff, 0xff]);
        assert_eq!(bus.regs[IPOL], [0x00, 0x00]);
        assert_eq!(bus.read_port(0x20, &chip).unwrap(), 0xace1);
    }
}

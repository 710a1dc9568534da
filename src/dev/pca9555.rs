//! Support for the `PCA9555` "16-bit I2C-bus and SMBus I/O port with interrupt"
use crate::common::{InputSetup, PortDriver, RegisterOp};

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regs {
    InputPort0 = 0x00,
    InputPort1 = 0x01,
    Configuration0 = 0x06,
    Configuration1 = 0x07,
}

impl From<Regs> for u8 {
    fn from(r: Regs) -> u8 {
        r as u8
    }
}

/// `PCA9555` with all 16 pins as inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pca9555;

impl PortDriver for Pca9555 {
    const WIDTH: u8 = 16;
    const BASE_ADDRESS: u8 = 0x20;
    const ADDRESS_PINS: u8 = 3;

    fn input_setup(&self) -> InputSetup {
        let mut ops = InputSetup::new();
        // The register pointer toggles between the two registers of a pair.
        let _ = ops.push(RegisterOp::write_word(
            Regs::Configuration0.into(),
            0xffff,
            16,
        ));
        ops
    }

    fn port_register(&self) -> Option<u8> {
        Some(Regs::InputPort0.into())
    }
}

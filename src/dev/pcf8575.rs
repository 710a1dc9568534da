//! Support for the `PCF8575` "Remote 16-bit I/O expander for I2C-bus with interrupt"
//!
//! The PCF8575 has no direction register.  Its quasi-bidirectional pins act as inputs once they
//! are released by writing a 1, after which a plain two-byte read returns the pin levels.
use crate::common::{InputSetup, PortDriver, RegisterOp};

/// `PCF8575` with all 16 pins released as inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pcf8575;

impl PortDriver for Pcf8575 {
    const WIDTH: u8 = 16;
    const BASE_ADDRESS: u8 = 0x20;
    const ADDRESS_PINS: u8 = 3;

    fn input_setup(&self) -> InputSetup {
        let mut ops = InputSetup::new();
        let _ = ops.push(RegisterOp::raw_word(0xffff, 16));
        ops
    }

    fn port_register(&self) -> Option<u8> {
        None
    }
}

//! A fake controller board: MCP23017 expanders on an I2C bus, 74HC4067 multiplexers with
//! active-low enables, shared select lines and a converter.  Every line transition is recorded
//! and checked against the one-enabled-multiplexer rule.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::i2c::{ErrorKind, ErrorType as I2cErrorType, I2c, NoAcknowledgeSource, Operation};
use io_scanner::RawConverter;

pub const A0: u8 = 54;
pub const A1: u8 = 55;
pub const A2: u8 = 56;

const GPIOA: usize = 0x12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Select(usize),
    Enable(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Set(Line, bool),
    Settle(u32),
    Sample { device: usize, channel: u8 },
}

#[derive(Debug, Default)]
pub struct Expander {
    pub regs: [u8; 0x16],
    pub nack: bool,
}

impl Expander {
    pub fn set_port(&mut self, value: u16) {
        self.regs[GPIOA..GPIOA + 2].copy_from_slice(&value.to_le_bytes());
    }
}

#[derive(Debug, Default)]
pub struct Board {
    pub select: [bool; 8],
    /// Enable line levels, `true` = HIGH = disabled.
    pub enables: Vec<bool>,
    /// Converter pin of each multiplexer.
    pub mux_pins: Vec<u8>,
    /// Analog value per (multiplexer, channel).
    pub analog: BTreeMap<(usize, u8), u16>,
    pub expanders: BTreeMap<u8, Expander>,
    /// Fail this many bus transactions with a timeout before serving again.
    pub flaky: usize,
    pub events: Vec<Event>,
    pub violations: usize,
    pub max_enabled: usize,
}

pub type Shared = Rc<RefCell<Board>>;

impl Board {
    pub fn new(mux_count: usize) -> Shared {
        Rc::new(RefCell::new(Board {
            enables: vec![true; mux_count],
            mux_pins: vec![0; mux_count],
            ..Default::default()
        }))
    }

    pub fn enabled(&self) -> Vec<usize> {
        self.enables
            .iter()
            .enumerate()
            .filter(|(_, high)| !**high)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn selected_channel(&self) -> u8 {
        self.select
            .iter()
            .enumerate()
            .fold(0, |acc, (bit, high)| acc | (u8::from(*high) << bit))
    }

    pub fn samples(&self) -> Vec<(usize, u8)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Sample { device, channel } => Some((*device, *channel)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

pub struct FakeLine {
    board: Shared,
    line: Line,
}

pub fn select_lines<const W: usize>(board: &Shared) -> [FakeLine; W] {
    core::array::from_fn(|i| FakeLine {
        board: board.clone(),
        line: Line::Select(i),
    })
}

pub fn enable_line(board: &Shared, device: usize) -> FakeLine {
    FakeLine {
        board: board.clone(),
        line: Line::Enable(device),
    }
}

impl FakeLine {
    fn set(&mut self, high: bool) {
        let mut board = self.board.borrow_mut();
        match self.line {
            Line::Select(i) => board.select[i] = high,
            Line::Enable(i) => board.enables[i] = high,
        }
        board.events.push(Event::Set(self.line, high));

        let enabled = board.enabled().len();
        board.max_enabled = board.max_enabled.max(enabled);
        if enabled > 1 {
            board.violations += 1;
        }
    }
}

impl PinErrorType for FakeLine {
    type Error = core::convert::Infallible;
}

impl OutputPin for FakeLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

/// Samples the common output of whichever multiplexer is wired to the pin.
pub struct FakeAdc {
    board: Shared,
}

impl FakeAdc {
    pub fn new(board: &Shared) -> Self {
        Self {
            board: board.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Floating;

impl RawConverter for FakeAdc {
    type Pin = u8;
    type Error = Floating;
    const MAX_VALUE: u16 = 4095;

    fn sample(&mut self, pin: u8) -> Result<u16, Floating> {
        let mut board = self.board.borrow_mut();
        let device = board
            .mux_pins
            .iter()
            .position(|p| *p == pin)
            .ok_or(Floating)?;
        if board.enables[device] {
            // common output is disconnected
            return Err(Floating);
        }
        let channel = board.selected_channel();
        board.events.push(Event::Sample { device, channel });
        board
            .analog
            .get(&(device, channel))
            .copied()
            .ok_or(Floating)
    }
}

pub struct FakeDelay {
    board: Shared,
}

impl FakeDelay {
    pub fn new(board: &Shared) -> Self {
        Self {
            board: board.clone(),
        }
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.board.borrow_mut().events.push(Event::Settle(ns / 1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.board.borrow_mut().events.push(Event::Settle(us));
    }
}

/// I2C bus with MCP23017 register files behind it.
pub struct FakeI2c {
    board: Shared,
}

impl FakeI2c {
    pub fn new(board: &Shared) -> Self {
        Self {
            board: board.clone(),
        }
    }
}

impl I2cErrorType for FakeI2c {
    type Error = ErrorKind;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut board = self.board.borrow_mut();
        if board.flaky > 0 {
            board.flaky -= 1;
            return Err(ErrorKind::Other);
        }
        let device = board
            .expanders
            .get_mut(&address)
            .filter(|d| !d.nack)
            .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;

        let mut pointer = 0;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => {
                    if let Some((reg, rest)) = data.split_first() {
                        pointer = usize::from(*reg);
                        for (i, b) in rest.iter().enumerate() {
                            device.regs[pointer + i] = *b;
                        }
                    }
                }
                Operation::Read(buf) => {
                    for (i, b) in buf.iter_mut().enumerate() {
                        *b = device.regs[pointer + i];
                    }
                }
            }
        }
        Ok(())
    }
}

/// Most data bytes a [`RegisterOp`] carries, and most bytes in one port-wide read.
pub const MAX_PAYLOAD: usize = 4;

/// A single register-level operation on an expander.
///
/// A `len` above [`MAX_PAYLOAD`] is clamped to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOp {
    /// Write `len` bytes of `data`, starting at register `reg`.  Chips without a register pointer
    /// ignore `reg` and use [`RegisterOp::Raw`] instead.
    Write {
        reg: u8,
        data: [u8; MAX_PAYLOAD],
        len: u8,
    },
    /// Read register `reg`, set the bits in `set`, clear the bits in `clear`, write it back.
    Update { reg: u8, set: u8, clear: u8 },
    /// Write `len` bytes of `data` without a register prefix.
    Raw { data: [u8; MAX_PAYLOAD], len: u8 },
}

/// The first `len` bytes of `data`, at most all of them.
pub(crate) fn payload(data: &[u8; MAX_PAYLOAD], len: u8) -> &[u8] {
    &data[..usize::from(len).min(MAX_PAYLOAD)]
}

impl RegisterOp {
    /// Write `value` as a `width`-bit little-endian word starting at `reg`.
    pub const fn write_word(reg: u8, value: u32, width: u8) -> Self {
        let b = value.to_le_bytes();
        RegisterOp::Write {
            reg,
            data: b,
            len: width / 8,
        }
    }

    /// Write `value` as a `width`-bit little-endian word without a register prefix.
    pub const fn raw_word(value: u32, width: u8) -> Self {
        RegisterOp::Raw {
            data: value.to_le_bytes(),
            len: width / 8,
        }
    }
}

/// Register operations that bring a chip into all-inputs mode.
pub type InputSetup = heapless::Vec<RegisterOp, 4>;

/// Description of an expander chip.
///
/// The bank does not keep a driver object per device; the chip type only tells it how to talk to
/// every device of that type.  All pins are inputs, so there is no output state to track.
pub trait PortDriver {
    /// Number of pins in one port-wide read.  Must be a multiple of 8, at most 32; larger widths
    /// are read as 32 pins.
    const WIDTH: u8;
    /// Bus address of the device with all address pins tied low.
    const BASE_ADDRESS: u8;
    /// Number of hardware address pins.
    const ADDRESS_PINS: u8;

    /// Operations that put every pin of the device into input mode.
    fn input_setup(&self) -> InputSetup;

    /// Register to select before reading all inputs at once.
    ///
    /// `None` for chips that answer a plain read with their input state.
    fn port_register(&self) -> Option<u8>;

    /// Bus address of the device at `index`, if the index fits the address pins.
    fn address(index: u8) -> Option<u8> {
        if u16::from(index) < (1u16 << Self::ADDRESS_PINS) {
            Some(Self::BASE_ADDRESS | index)
        } else {
            None
        }
    }

    /// Bytes in one port-wide read.
    fn port_bytes() -> usize {
        usize::from(Self::WIDTH / 8).min(MAX_PAYLOAD)
    }

    /// Pins reported per port.
    fn port_width() -> u8 {
        Self::WIDTH.min(32)
    }

    /// Decode the bytes of a port-wide read.  Port 0 comes first on the wire.
    fn decode_port(buf: &[u8]) -> u32 {
        buf.iter()
            .take(Self::port_bytes())
            .enumerate()
            .fold(0, |acc, (i, b)| acc | (u32::from(*b) << (8 * i)))
    }
}

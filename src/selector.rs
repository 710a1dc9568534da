use embedded_hal::digital::{OutputPin, PinState};

/// Most select lines a bus can have: one per bit of a `u8` channel number.
pub const MAX_SELECT_LINES: usize = 8;

/// Number of select lines needed to address `channels` channels.
pub const fn select_bus_width(channels: usize) -> usize {
    let mut width = 0;
    while (1usize << width) < channels {
        width += 1;
    }
    width
}

/// Drives the select lines shared by all multiplexer devices.
///
/// Line `i` carries bit `i` of the channel number.  The lines are written one after the other;
/// this is safe as long as devices are only sampled after the settle delay that follows the last
/// line write, which [`MultiplexerBank`][crate::MultiplexerBank] guarantees.
pub struct ChannelSelector<P, const W: usize> {
    lines: [P; W],
}

impl<P: OutputPin, const W: usize> ChannelSelector<P, W> {
    pub fn new(lines: [P; W]) -> Self {
        Self { lines }
    }

    /// Number of channels the select bus can address.
    pub const fn capacity() -> usize {
        if W >= usize::BITS as usize {
            usize::MAX
        } else {
            1 << W
        }
    }

    /// Present `channel` on the select lines.
    ///
    /// `channel` must be below [`capacity()`][Self::capacity].  This is checked in debug builds
    /// only; callers validate channel counts against the bus width at configuration time.
    pub fn select(&mut self, channel: u8) -> Result<(), P::Error> {
        debug_assert!(
            usize::from(channel) < Self::capacity(),
            "channel {} exceeds {}-bit select bus",
            channel,
            W
        );
        for (bit, line) in self.lines.iter_mut().enumerate() {
            // Lines beyond the width of a channel number stay low.
            let high = bit < MAX_SELECT_LINES && (channel >> bit) & 1 != 0;
            line.set_state(PinState::from(high))?;
        }
        Ok(())
    }

    /// Drive every select line low.
    pub fn idle(&mut self) -> Result<(), P::Error> {
        for line in self.lines.iter_mut() {
            line.set_low()?;
        }
        Ok(())
    }

    /// Give back the select lines.
    pub fn release(self) -> [P; W] {
        self.lines
    }
}

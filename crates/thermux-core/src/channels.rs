//! Channel map: logical channel index to physical selector line
//!
//! Each thermistor sits behind its own switch (a MOSFET on the reference
//! board) driven by one GPIO. Driving the line high connects that thermistor
//! to the shared converter input.

use core::fmt;

use embedded_hal::digital::OutputPin;

/// Most channels a board can have, every index must fit a [`Channel`]
pub const MAX_CHANNELS: usize = u8::MAX as usize + 1;

/// Logical thermistor channel, `0..N`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    /// Build a channel from a zero-based index.
    ///
    /// # Panics
    /// If `index` is above 255.
    pub const fn new(index: usize) -> Self {
        assert!(index <= u8::MAX as usize);
        Self(index as u8)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Channel {
    // Channels are labelled 1-based on the board silkscreen
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0 as u16 + 1)
    }
}

/// What a single conversion is measuring
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanTarget {
    Thermistor(Channel),
    /// The converter's own temperature diode
    InternalTemperature,
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thermistor(channel) => fmt::Display::fmt(channel, f),
            Self::InternalTemperature => f.write_str("internal temperature"),
        }
    }
}

/// Fixed table of selector lines, one per channel
pub struct ChannelMap<P, const N: usize> {
    lines: [P; N],
}

impl<P, const N: usize> ChannelMap<P, N>
where
    P: OutputPin,
{
    pub const fn new(lines: [P; N]) -> Self {
        const { assert!(N <= MAX_CHANNELS, "channel count does not fit a Channel") };
        Self { lines }
    }

    /// Number of channels in the map
    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Iterate every channel in scan order
    pub fn channels(&self) -> impl Iterator<Item = Channel> + use<P, N> {
        (0..N).map(Channel::new)
    }

    /// Selector line for `channel`
    ///
    /// Channels are only ever created from `0..N`, so indexing cannot fail
    /// for a channel obtained from [`ChannelMap::channels`].
    pub fn line_mut(&mut self, channel: Channel) -> &mut P {
        &mut self.lines[channel.index()]
    }

    /// Drive every selector line low.
    ///
    /// Returns the first channel whose line could not be driven, after
    /// attempting all of them.
    pub fn release_all(&mut self) -> Result<(), Channel> {
        let mut first_failure = None;
        for (index, line) in self.lines.iter_mut().enumerate() {
            if line.set_low().is_err() && first_failure.is_none() {
                first_failure = Some(Channel::new(index));
            }
        }
        match first_failure {
            Some(channel) => Err(channel),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBoard;

    #[test]
    fn test_channel_display_is_one_based() {
        use core::fmt::Write;
        let mut label = heapless::String::<8>::new();
        write!(label, "{}", Channel::new(0)).unwrap();
        assert_eq!(label.as_str(), "T1");
    }

    #[test]
    fn test_last_channel_index_fits() {
        use core::fmt::Write;
        let last = Channel::new(MAX_CHANNELS - 1);
        assert_eq!(last.index(), 255);
        let mut label = heapless::String::<8>::new();
        write!(label, "{}", last).unwrap();
        assert_eq!(label.as_str(), "T256");
    }

    #[test]
    #[should_panic]
    fn test_index_past_last_channel_panics() {
        let _ = Channel::new(MAX_CHANNELS);
    }

    #[test]
    fn test_release_all_drives_every_line_low() {
        let board = TestBoard::new();
        let mut map = ChannelMap::new(board.lines::<4>());
        for channel in map.channels().collect::<heapless::Vec<_, 4>>() {
            map.line_mut(channel).set_high().unwrap();
        }
        assert!(map.release_all().is_ok());
        assert_eq!(board.asserted_count(), 0);
    }

    #[test]
    fn test_channels_in_scan_order() {
        let board = TestBoard::new();
        let map = ChannelMap::new(board.lines::<3>());
        let indices: heapless::Vec<usize, 3> = map.channels().map(Channel::index).collect();
        assert_eq!(indices.as_slice(), &[0, 1, 2]);
    }
}

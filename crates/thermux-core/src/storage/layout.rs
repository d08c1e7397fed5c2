//! Byte layout of the persisted calibration record.
//!
//! Binary format (little-endian IEEE-754 binary32 floats):
//! - flag: 1 byte at address 0 (`0x01` = calibrated, anything else = not)
//! - ref_low: 4 bytes (f32)
//! - ref_high: 4 bytes (f32)
//! - per channel, in channel order: raw_low (f32), raw_high (f32)
//!
//! For the 32-channel board the record is 265 bytes. Offsets never move
//! between firmware versions; a calibration survives a firmware update.

use crate::channels::Channel;

/// Flag byte value marking a complete calibration
pub const CALIBRATED: u8 = 0x01;
/// Flag byte value written when calibration is cleared or in progress
pub const NOT_CALIBRATED: u8 = 0x00;

pub const FLAG_ADDR: usize = 0;
pub const REF_LOW_ADDR: usize = 1;
pub const REF_HIGH_ADDR: usize = REF_LOW_ADDR + FIELD_SIZE;

/// Width of every float field
pub const FIELD_SIZE: usize = core::mem::size_of::<f32>();

/// First byte of the per-channel pairs
const CHANNELS_ADDR: usize = REF_HIGH_ADDR + FIELD_SIZE;
const PAIR_SIZE: usize = 2 * FIELD_SIZE;

/// Total record size for `channels` channels
pub const fn record_size(channels: usize) -> usize {
    CHANNELS_ADDR + channels * PAIR_SIZE
}

/// A float field of the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RefLow,
    RefHigh,
    RawLow(Channel),
    RawHigh(Channel),
}

impl Field {
    /// Byte address of the field
    pub const fn address(self) -> usize {
        match self {
            Self::RefLow => REF_LOW_ADDR,
            Self::RefHigh => REF_HIGH_ADDR,
            Self::RawLow(channel) => CHANNELS_ADDR + channel.index() * PAIR_SIZE,
            Self::RawHigh(channel) => CHANNELS_ADDR + channel.index() * PAIR_SIZE + FIELD_SIZE,
        }
    }

    /// Name used in log lines and errors
    pub const fn name(self) -> &'static str {
        match self {
            Self::RefLow => "ref_low",
            Self::RefHigh => "ref_high",
            Self::RawLow(_) => "raw_low",
            Self::RawHigh(_) => "raw_high",
        }
    }

    pub fn encode(value: f32) -> [u8; FIELD_SIZE] {
        value.to_le_bytes()
    }

    pub fn decode(bytes: [u8; FIELD_SIZE]) -> f32 {
        f32::from_le_bytes(bytes)
    }
}

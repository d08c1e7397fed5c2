//! Calibration memory backed by a fixed-size file on the SD card
//!
//! The file is created once, padded with `0xFF` to [`CALIBRATION_FILE_SIZE`]
//! bytes (an erased EEPROM), and afterwards only overwritten in place. Every
//! write opens, seeks, writes and closes the file, so the data and the FAT are
//! on the card before `write` returns.
//!
//! SD card operations are blocking, like the rest of the SPI3 bus.

use embedded_sdmmc::{
    Mode, SdCard, SdCardError, TimeSource, Timestamp, VolumeIdx, VolumeManager,
};
use log::{info, warn};
use thermux_core::NvMemory;
use thiserror_no_std::Error;

/// 8.3 name in the root directory
pub const CALIBRATION_FILE: &str = "THERMCAL.BIN";

/// Large enough for the 32-channel record with room to spare
pub const CALIBRATION_FILE_SIZE: usize = 512;

const PADDING: [u8; 64] = [0xFF; 64];

#[derive(Error, Debug)]
pub enum SdMemoryError {
    #[error("SD card error: {0:?}")]
    Card(embedded_sdmmc::Error<SdCardError>),
    #[error("access of {len} bytes at {address} is outside the calibration file")]
    OutOfBounds { address: usize, len: usize },
}

impl From<embedded_sdmmc::Error<SdCardError>> for SdMemoryError {
    fn from(error: embedded_sdmmc::Error<SdCardError>) -> Self {
        Self::Card(error)
    }
}

/// The board has no RTC; files carry a fixed timestamp
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 56,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub struct SdCardMemory<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
}

impl<S, D, T> SdCardMemory<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    /// Mount the card and make sure the calibration file exists at full size
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Result<Self, SdMemoryError> {
        let memory = Self {
            volume_mgr: VolumeManager::new(sd_card, ts),
        };
        memory.ensure_file()?;
        Ok(memory)
    }

    fn ensure_file(&self) -> Result<(), SdMemoryError> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(CALIBRATION_FILE, Mode::ReadWriteCreateOrAppend)?;

        let mut length = file.length() as usize;
        if length < CALIBRATION_FILE_SIZE {
            info!(
                "Padding {} from {} to {} bytes",
                CALIBRATION_FILE, length, CALIBRATION_FILE_SIZE
            );
        }
        while length < CALIBRATION_FILE_SIZE {
            let chunk = PADDING.len().min(CALIBRATION_FILE_SIZE - length);
            file.write(&PADDING[..chunk])?;
            length += chunk;
        }

        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }

    fn check_range(address: usize, len: usize) -> Result<u32, SdMemoryError> {
        match address.checked_add(len) {
            Some(end) if end <= CALIBRATION_FILE_SIZE => Ok(address as u32),
            _ => Err(SdMemoryError::OutOfBounds { address, len }),
        }
    }
}

impl<S, D, T> NvMemory for SdCardMemory<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    type Error = SdMemoryError;

    fn capacity(&self) -> usize {
        CALIBRATION_FILE_SIZE
    }

    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        let offset = Self::check_range(address, buf.len())?;

        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(CALIBRATION_FILE, Mode::ReadOnly)?;
        file.seek_from_start(offset)?;

        let mut filled = 0;
        while filled < buf.len() {
            let read = file.read(&mut buf[filled..])?;
            if read == 0 {
                // Short file reads as erased
                warn!("{} ended at {}", CALIBRATION_FILE, address + filled);
                buf[filled..].fill(0xFF);
                break;
            }
            filled += read;
        }

        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }

    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error> {
        let offset = Self::check_range(address, data.len())?;

        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(CALIBRATION_FILE, Mode::ReadWriteAppend)?;
        file.seek_from_start(offset)?;
        file.write(data)?;

        // Closing flushes the data block and the directory entry
        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }
}

//! Persistence of the calibration record
//!
//! The record is written field by field while a calibration runs, and the
//! flag byte is committed last. A power cut part-way through therefore leaves
//! the flag clear, and [`CalibrationStore::load`] never trusts the remaining
//! bytes unless the flag says they are complete.

pub mod layout;
mod memory;

pub use layout::Field;
pub use memory::{OutOfBounds, RamMemory};

use core::fmt::Debug;

use log::{debug, error, warn};

use crate::calibration::CalibrationState;
use crate::channels::Channel;
use crate::error::StoreError;
use layout::{CALIBRATED, FIELD_SIZE, FLAG_ADDR, NOT_CALIBRATED, record_size};

/// Byte-addressed non-volatile memory (EEPROM, a flash page, a file on SD)
pub trait NvMemory {
    type Error: Debug;

    /// Usable size in bytes
    fn capacity(&self) -> usize;

    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `data` at `address`. Must be durable when this returns.
    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error>;
}

/// Calibration record for `N` channels on top of an [`NvMemory`]
pub struct CalibrationStore<M, const N: usize> {
    memory: M,
}

impl<M, const N: usize> CalibrationStore<M, N>
where
    M: NvMemory,
{
    /// Record size for this channel count
    pub const RECORD_SIZE: usize = record_size(N);

    pub fn new(memory: M) -> Result<Self, StoreError> {
        let capacity = memory.capacity();
        if capacity < Self::RECORD_SIZE {
            error!(
                "Calibration record needs {} bytes, memory only has {}",
                Self::RECORD_SIZE,
                capacity
            );
            return Err(StoreError::LayoutTooLarge {
                required: Self::RECORD_SIZE,
                capacity,
            });
        }
        Ok(Self { memory })
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn into_memory(self) -> M {
        self.memory
    }

    /// Whether the flag byte marks a complete calibration
    pub fn read_flag(&mut self) -> Result<bool, StoreError> {
        let mut flag = [0u8; 1];
        self.memory.read(FLAG_ADDR, &mut flag).map_err(|e| {
            error!("Failed to read calibration flag: {:?}", e);
            StoreError::Memory { address: FLAG_ADDR }
        })?;
        Ok(flag[0] == CALIBRATED)
    }

    /// Read the calibration record.
    ///
    /// When the flag is clear the other fields are not read and the returned
    /// state is all zero. When it is set, every field must be finite or
    /// [`StoreError::Inconsistent`] is returned.
    pub fn load(&mut self) -> Result<CalibrationState<N>, StoreError> {
        let mut state = CalibrationState::new();
        if !self.read_flag()? {
            debug!("No stored calibration");
            return Ok(state);
        }

        state.ref_low = self.read_field(Field::RefLow)?;
        state.ref_high = self.read_field(Field::RefHigh)?;
        for index in 0..N {
            let channel = Channel::new(index);
            state.raw_low[index] = self.read_field(Field::RawLow(channel))?;
            state.raw_high[index] = self.read_field(Field::RawHigh(channel))?;
        }
        state.calibrated = true;
        Ok(state)
    }

    /// Commit the flag byte
    pub fn write_flag(&mut self, calibrated: bool) -> Result<(), StoreError> {
        let flag = if calibrated { CALIBRATED } else { NOT_CALIBRATED };
        self.memory.write(FLAG_ADDR, &[flag]).map_err(|e| {
            error!("Failed to write calibration flag: {:?}", e);
            StoreError::Memory { address: FLAG_ADDR }
        })
    }

    /// Write one float field at its fixed offset
    pub fn write_field(&mut self, field: Field, value: f32) -> Result<(), StoreError> {
        let address = field.address();
        self.memory
            .write(address, &Field::encode(value))
            .map_err(|e| {
                error!("Failed to write {} at {}: {:?}", field.name(), address, e);
                StoreError::Memory { address }
            })
    }

    /// Clear the flag, then zero every field.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.write_flag(false)?;
        self.write_field(Field::RefLow, 0.0)?;
        self.write_field(Field::RefHigh, 0.0)?;
        for index in 0..N {
            let channel = Channel::new(index);
            self.write_field(Field::RawLow(channel), 0.0)?;
            self.write_field(Field::RawHigh(channel), 0.0)?;
        }
        Ok(())
    }

    fn read_field(&mut self, field: Field) -> Result<f32, StoreError> {
        let address = field.address();
        let mut bytes = [0u8; FIELD_SIZE];
        self.memory.read(address, &mut bytes).map_err(|e| {
            error!("Failed to read {} at {}: {:?}", field.name(), address, e);
            StoreError::Memory { address }
        })?;

        let value = Field::decode(bytes);
        if !value.is_finite() {
            warn!("Stored {} at {} is not finite ({})", field.name(), address, value);
            return Err(StoreError::Inconsistent {
                field: field.name(),
            });
        }
        Ok(value)
    }
}

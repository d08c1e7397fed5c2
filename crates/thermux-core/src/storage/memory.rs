use super::NvMemory;

/// Out-of-range access on a [`RamMemory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    pub address: usize,
    pub len: usize,
}

/// Byte array standing in for non-volatile memory.
///
/// Starts erased (`0xFF`, like a fresh EEPROM or flash page). Tests take a
/// [`RamMemory::snapshot`] between two writes to model a power cut.
#[derive(Clone, Debug)]
pub struct RamMemory<const SIZE: usize> {
    bytes: [u8; SIZE],
    writes: usize,
}

impl<const SIZE: usize> RamMemory<SIZE> {
    pub const fn new() -> Self {
        Self {
            bytes: [0xFF; SIZE],
            writes: 0,
        }
    }

    /// Restore memory contents saved earlier
    pub const fn from_bytes(bytes: [u8; SIZE]) -> Self {
        Self { bytes, writes: 0 }
    }

    /// Copy of the current contents
    pub const fn snapshot(&self) -> [u8; SIZE] {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Write operations performed since construction
    pub const fn writes(&self) -> usize {
        self.writes
    }

    fn range(&self, address: usize, len: usize) -> Result<core::ops::Range<usize>, OutOfBounds> {
        match address.checked_add(len) {
            Some(end) if end <= SIZE => Ok(address..end),
            _ => Err(OutOfBounds { address, len }),
        }
    }
}

impl<const SIZE: usize> Default for RamMemory<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> NvMemory for RamMemory<SIZE> {
    type Error = OutOfBounds;

    fn capacity(&self) -> usize {
        SIZE
    }

    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(address, data.len())?;
        self.bytes[range].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}

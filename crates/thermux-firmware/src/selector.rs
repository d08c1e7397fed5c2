//! Thermistor selector lines on a 74HC595 shift-register chain
//!
//! Four cascaded 74HC595 drive the 32 MOSFET gates. The chain is written as a
//! whole 32-bit image on every change; the chip-select line of the SPI device
//! is wired to the storage-register clock, so the image latches onto the
//! outputs when the transaction ends.
//!
//! The registers power up with random contents, so their output-enable pin is
//! held high (outputs off) until an all-low image has been latched.
//!
//! Each [`SelectorLine`] exposes one bit of the image as an `OutputPin`.

use core::cell::RefCell;

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use embedded_hal::spi::SpiDevice;
use log::error;

/// Number of outputs on the chain
pub const CHAIN_OUTPUTS: usize = 32;

struct ChainState<S, E> {
    spi: S,
    output_enable: E,
    image: u32,
}

pub struct SelectorChain<S, E> {
    state: RefCell<ChainState<S, E>>,
}

impl<S, E> SelectorChain<S, E>
where
    S: SpiDevice,
    E: OutputPin,
{
    /// `output_enable` is the active-low OE line shared by the chain. It
    /// must already be high.
    pub const fn new(spi: S, output_enable: E) -> Self {
        Self {
            state: RefCell::new(ChainState {
                spi,
                output_enable,
                image: 0,
            }),
        }
    }

    /// Latch an all-low image, then switch the outputs on
    pub fn clear_and_enable(&self) -> Result<(), SelectorError> {
        self.write_image(|_| 0)?;
        let mut state = self.state.try_borrow_mut().map_err(|_| SelectorError)?;
        state.output_enable.set_low().map_err(|e| {
            error!("Selector output enable failed: {:?}", e);
            SelectorError
        })
    }

    /// One line per channel, channel `c` on output `c`
    pub fn lines<const N: usize>(&self) -> [SelectorLine<'_, S, E>; N] {
        const { assert!(N <= CHAIN_OUTPUTS) };
        core::array::from_fn(|output| SelectorLine {
            chain: self,
            output: output as u8,
        })
    }

    fn write_image(&self, update: impl FnOnce(u32) -> u32) -> Result<(), SelectorError> {
        let mut state = self.state.try_borrow_mut().map_err(|_| SelectorError)?;
        let image = update(state.image);
        // First byte out ends up in the last register of the chain
        state.spi.write(&image.to_be_bytes()).map_err(|e| {
            error!("Selector chain write failed: {:?}", e);
            SelectorError
        })?;
        state.image = image;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorError;

impl digital::Error for SelectorError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct SelectorLine<'a, S, E> {
    chain: &'a SelectorChain<S, E>,
    output: u8,
}

impl<S, E> ErrorType for SelectorLine<'_, S, E> {
    type Error = SelectorError;
}

impl<S, E> OutputPin for SelectorLine<'_, S, E>
where
    S: SpiDevice,
    E: OutputPin,
{
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mask = 1u32 << self.output;
        self.chain.write_image(|image| image & !mask)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mask = 1u32 << self.output;
        self.chain.write_image(|image| image | mask)
    }
}

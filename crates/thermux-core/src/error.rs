//! Error types for acquisition, calibration and persistence
//!
//! Collaborator errors (SPI, GPIO, flash) are logged where they are mapped
//! and replaced by a variant carrying static context, so every error here is
//! `Copy` and cheap to move through the acquisition loop.

use thiserror_no_std::Error;

use crate::channels::{Channel, ScanTarget};
use crate::converter::ConverterMode;

/// Failure of a single conversion handshake
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    #[error("conversion timed out on {target}")]
    ConversionTimeout { target: ScanTarget },
    #[error("converter failed to {operation} on {target}")]
    Converter {
        target: ScanTarget,
        operation: &'static str,
    },
    #[error("converter rejected the switch to {mode:?}")]
    ModeSwitch { mode: ConverterMode },
    #[error("selector line for {channel} could not be driven")]
    SelectLine { channel: Channel },
}

/// Failure of the calibration persistence layer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("non-volatile memory access failed at address {address}")]
    Memory { address: usize },
    #[error("calibration flag is set but {field} is not a finite value")]
    Inconsistent { field: &'static str },
    #[error("calibration layout needs {required} bytes, memory holds {capacity}")]
    LayoutTooLarge { required: usize, capacity: usize },
}

/// Failure of a calibration command or of the calibrated mapping
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("calibration span of {channel} is zero")]
    Degenerate { channel: Channel },
    #[error("calibration point must be 1 or 2, got {0}")]
    InvalidPoint(u8),
    #[error("reference temperature must be a finite value")]
    InvalidReference,
    #[error("calibration point 1 has not been captured")]
    LowPointMissing,
    #[error("scan failed during calibration: {0}")]
    Scan(#[from] ScanError),
    #[error("calibration storage failed: {0}")]
    Store(#[from] StoreError),
}

/// Fatal start-up errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("hardware initialization failed: {component}")]
    HardwareInit { component: &'static str },
    #[error("calibration storage unavailable: {0}")]
    Storage(#[from] StoreError),
}

/// Why a channel has no value in a published cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFault {
    /// Every pass of the cycle timed out waiting for the converter
    ConversionTimeout,
    /// The converter reported an error on every pass
    ConverterFault,
    /// The channel's selector line could not be driven
    SelectLineFault,
    /// Calibrated, but the stored raw span is zero
    CalibrationDegenerate,
}

impl From<ScanError> for ChannelFault {
    fn from(error: ScanError) -> Self {
        match error {
            ScanError::ConversionTimeout { .. } => Self::ConversionTimeout,
            ScanError::Converter { .. } | ScanError::ModeSwitch { .. } => Self::ConverterFault,
            ScanError::SelectLine { .. } => Self::SelectLineFault,
        }
    }
}

impl ChannelFault {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ConversionTimeout => "conversion timeout",
            Self::ConverterFault => "converter fault",
            Self::SelectLineFault => "selector line fault",
            Self::CalibrationDegenerate => "calibration degenerate",
        }
    }
}

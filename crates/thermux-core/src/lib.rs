//! Hardware-independent core library for thermux
//!
//! This crate contains the platform-agnostic part of the thermistor
//! multiplexer: channel selection, the conversion handshake with the ADC,
//! per-channel smoothing, two-point calibration and its non-volatile layout,
//! and the acquisition controller that ties them together.
//!
//! It is `#![no_std]` so it compiles on both the embedded target (ESP32-S3)
//! and desktop hosts (for the simulator and tests). Hardware enters through
//! the [`converter::Converter`], [`storage::NvMemory`] and
//! [`report::Publisher`] traits plus `embedded_hal` output pins.
//!
//! ```text
//! AcquisitionController
//!   ├── MuxScanner ── ChannelMap (selector lines)
//!   │      └── ConversionSync  <── DRDY interrupt
//!   ├── SampleAverager
//!   ├── CalibrationEngine
//!   └── CalibrationStore ── NvMemory
//! ```

#![no_std]

pub mod averager;
pub mod calibration;
pub mod channels;
pub mod command;
pub mod config;
pub mod controller;
pub mod converter;
pub mod error;
pub mod report;
pub mod scanner;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use averager::{RunningValue, SampleAverager};
pub use calibration::{CalibrationEngine, CalibrationPhase, CalibrationPoint, CalibrationState};
pub use channels::{Channel, ChannelMap, MAX_CHANNELS, ScanTarget};
pub use command::{Command, ParseCommandError};
pub use config::{AcquisitionConfig, THERMISTOR_CHANNELS};
pub use controller::AcquisitionController;
pub use converter::{Converter, ConverterMode};
pub use error::{AppError, CalibrationError, ChannelFault, ScanError, StoreError};
pub use report::{CalibrationStatus, ChannelReading, CycleReport, Publisher};
pub use scanner::MuxScanner;
pub use storage::{CalibrationStore, NvMemory, RamMemory};
pub use sync::ConversionSync;

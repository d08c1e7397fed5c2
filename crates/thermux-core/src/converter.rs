//! Converter port - the shared analog-to-digital converter
//!
//! Register programming lives in the implementation (the firmware's MCP3561R
//! driver, the simulator's model). The core only needs to switch the input
//! between the thermistor mux and the internal temperature diode, start a
//! conversion, and read the result once the ready signal fired.

use core::fmt::Debug;

/// Input the converter is configured to sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterMode {
    /// The common node of the thermistor mux
    ThermistorMux,
    /// The converter's internal temperature sensor
    InternalTemperature,
}

/// Trait for the shared converter.
///
/// Completion of [`Converter::start_conversion`] is reported out of band,
/// through the data-ready interrupt feeding a
/// [`ConversionSync`](crate::sync::ConversionSync).
pub trait Converter {
    type Error: Debug;

    /// Route the converter input. Must be called before the matching scan group.
    fn set_mode(&mut self, mode: ConverterMode) -> impl Future<Output = Result<(), Self::Error>>;

    /// Trigger a conversion on the currently routed input.
    fn start_conversion(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Read the most recent completed conversion.
    ///
    /// Only valid after the ready signal for that conversion was consumed.
    fn read_data(&mut self) -> impl Future<Output = Result<f32, Self::Error>>;
}

//! MCP3561R 24-bit delta-sigma ADC over async SPI
//!
//! Every SPI transaction starts with a command byte:
//!
//! ```text
//! [7:6] device address (0b01)  [5:2] register or fast command  [1:0] type
//! ```
//!
//! The converter runs in one-shot standby mode: a fast "conversion start"
//! command triggers a single conversion, after which the IRQ pin falls. The
//! result is read from ADCDATA in the default 24-bit format.

use embedded_hal_async::spi::SpiDevice;
use log::{debug, info};
use thermux_core::{Converter, ConverterMode};
use thiserror_no_std::Error;

const DEVICE_ADDRESS: u8 = 0b01;

// Command types
const FAST_COMMAND: u8 = 0b00;
const STATIC_READ: u8 = 0b01;
const INCREMENTAL_WRITE: u8 = 0b10;
const INCREMENTAL_READ: u8 = 0b11;

// Fast commands
const CONVERSION_START: u8 = 0b1010;
const FULL_RESET: u8 = 0b1110;

// Registers
const REG_ADCDATA: u8 = 0x0;
const REG_CONFIG0: u8 = 0x1;
const REG_MUX: u8 = 0x6;

/// CONFIG0..IRQ written at start-up:
/// - CONFIG0: external reference, internal clock, standby
/// - CONFIG1: OSR 256
/// - CONFIG2: boost x1, gain x1, no auto-zero
/// - CONFIG3: one-shot then standby, 24-bit data, no digital calibration
/// - IRQ: IRQ output with inactive-high push-pull, fast commands enabled
const CONFIGURATION: [u8; 5] = [0x62, 0x0C, 0x8B, 0x80, 0x07];

/// VIN+ = CH0 (common node of the thermistor mux), VIN- = AGND
const MUX_THERMISTOR: u8 = 0x08;
/// VIN+ = TEMP diode P, VIN- = TEMP diode M
const MUX_INTERNAL_TEMPERATURE: u8 = 0xDE;

/// STATUS bit 2, low while a new conversion result is waiting
const STATUS_DATA_READY_N: u8 = 1 << 2;

/// Full-scale code of the 24-bit format
const FULL_SCALE: f32 = 8_388_608.0;

/// First-order transfer function of the temperature diode at a 3.3 V
/// reference and unity gain, in degrees C per LSB and degrees C
const TEMPERATURE_SLOPE: f32 = 4.0096e-4;
const TEMPERATURE_OFFSET: f32 = 269.13;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mcp3561Error<E: core::fmt::Debug> {
    #[error("SPI transfer failed: {0:?}")]
    Spi(E),
    #[error("configuration read back as {read:#04x}, expected {expected:#04x}")]
    NotDetected { read: u8, expected: u8 },
    #[error("no conversion result waiting (status {0:#04x})")]
    NoData(u8),
}

const fn command(address_or_fast: u8, kind: u8) -> u8 {
    (DEVICE_ADDRESS << 6) | (address_or_fast << 2) | kind
}

/// Sign-extend a 24-bit two's complement code
fn sign_extend(bytes: [u8; 3]) -> i32 {
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], 0]) >> 8
}

pub struct Mcp3561<S> {
    spi: S,
    vref: f32,
    mode: ConverterMode,
}

impl<S> Mcp3561<S>
where
    S: SpiDevice,
{
    /// `vref` is the external reference voltage in volts
    pub fn new(spi: S, vref: f32) -> Self {
        Self {
            spi,
            vref,
            mode: ConverterMode::ThermistorMux,
        }
    }

    /// Reset the converter, write the configuration and check it stuck.
    pub async fn init(&mut self) -> Result<(), Mcp3561Error<S::Error>> {
        self.fast_command(FULL_RESET).await?;

        let mut write = [0u8; 1 + CONFIGURATION.len()];
        write[0] = command(REG_CONFIG0, INCREMENTAL_WRITE);
        write[1..].copy_from_slice(&CONFIGURATION);
        self.spi.write(&write).await.map_err(Mcp3561Error::Spi)?;

        let mut read = [0u8; 2];
        read[0] = command(REG_CONFIG0, INCREMENTAL_READ);
        self.spi
            .transfer_in_place(&mut read)
            .await
            .map_err(Mcp3561Error::Spi)?;
        if read[1] != CONFIGURATION[0] {
            return Err(Mcp3561Error::NotDetected {
                read: read[1],
                expected: CONFIGURATION[0],
            });
        }

        self.write_mux(MUX_THERMISTOR).await?;
        info!("MCP3561R configured, reference {} V", self.vref);
        Ok(())
    }

    async fn fast_command(&mut self, fast: u8) -> Result<u8, Mcp3561Error<S::Error>> {
        let mut buf = [command(fast, FAST_COMMAND)];
        self.spi
            .transfer_in_place(&mut buf)
            .await
            .map_err(Mcp3561Error::Spi)?;
        Ok(buf[0])
    }

    async fn write_mux(&mut self, mux: u8) -> Result<(), Mcp3561Error<S::Error>> {
        self.spi
            .write(&[command(REG_MUX, INCREMENTAL_WRITE), mux])
            .await
            .map_err(Mcp3561Error::Spi)
    }

    /// Read ADCDATA as a signed code
    async fn read_code(&mut self) -> Result<i32, Mcp3561Error<S::Error>> {
        let mut buf = [command(REG_ADCDATA, STATIC_READ), 0, 0, 0];
        self.spi
            .transfer_in_place(&mut buf)
            .await
            .map_err(Mcp3561Error::Spi)?;

        let status = buf[0];
        if status & STATUS_DATA_READY_N != 0 {
            return Err(Mcp3561Error::NoData(status));
        }
        Ok(sign_extend([buf[1], buf[2], buf[3]]))
    }
}

impl<S> Converter for Mcp3561<S>
where
    S: SpiDevice,
{
    type Error = Mcp3561Error<S::Error>;

    async fn set_mode(&mut self, mode: ConverterMode) -> Result<(), Self::Error> {
        let mux = match mode {
            ConverterMode::ThermistorMux => MUX_THERMISTOR,
            ConverterMode::InternalTemperature => MUX_INTERNAL_TEMPERATURE,
        };
        self.write_mux(mux).await?;
        self.mode = mode;
        debug!("MCP3561R mux set to {:#04x}", mux);
        Ok(())
    }

    async fn start_conversion(&mut self) -> Result<(), Self::Error> {
        self.fast_command(CONVERSION_START).await.map(|_| ())
    }

    /// Volts across the thermistor divider, or degrees C for the internal
    /// temperature diode
    async fn read_data(&mut self) -> Result<f32, Self::Error> {
        let code = self.read_code().await?;
        Ok(match self.mode {
            ConverterMode::ThermistorMux => code as f32 * self.vref / FULL_SCALE,
            ConverterMode::InternalTemperature => {
                code as f32 * TEMPERATURE_SLOPE - TEMPERATURE_OFFSET
            }
        })
    }
}

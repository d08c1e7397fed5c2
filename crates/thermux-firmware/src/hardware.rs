//! Hardware initialization for the thermux board
//!
//! Pin map (ESP32-S3):
//!
//! | Signal                       | Pin    | Bus  |
//! |------------------------------|--------|------|
//! | MCP3561R SCK / MOSI / MISO   | 12/11/13 | SPI2 (async) |
//! | MCP3561R CS                  | 10     | SPI2 |
//! | MCP3561R IRQ (data ready)    | 9      |      |
//! | SD / selector SCK/MOSI/MISO  | 40/41/39 | SPI3 (blocking, shared) |
//! | SD card CS                   | 38     | SPI3 |
//! | 74HC595 latch (RCLK)         | 42     | SPI3 |
//! | 74HC595 output enable (OE)   | 21     |      |

use core::cell::RefCell;

use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay, RefCellDevice};
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::peripherals::{
    GPIO9, GPIO10, GPIO11, GPIO12, GPIO13, GPIO21, GPIO38, GPIO39, GPIO40, GPIO41, GPIO42, SPI2,
    SPI3,
};
use esp_hal::spi::Mode;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::{Async, Blocking};
use log::{error, info};
use static_cell::StaticCell;
use thermux_core::{AppError, CalibrationStore, THERMISTOR_CHANNELS};

use crate::mcp3561::Mcp3561;
use crate::sd_memory::{FixedTimeSource, SdCardMemory};
use crate::selector::{SelectorChain, SelectorLine};

/// External reference on the converter's REFIN+ pin
pub const ADC_VREF: f32 = 3.3;

pub type AdcSpi = ExclusiveDevice<Spi<'static, Async>, Output<'static>, embassy_time::Delay>;
pub type SharedSpi = RefCellDevice<'static, Spi<'static, Blocking>, Output<'static>, NoDelay>;
pub type CardMemory = SdCardMemory<SharedSpi, Delay, FixedTimeSource>;
pub type SelectorLines = [SelectorLine<'static, SharedSpi, Output<'static>>; THERMISTOR_CHANNELS];

/// Initialize the converter on SPI2 (10 MHz, mode 0)
pub async fn init_converter(
    spi2: SPI2<'static>,
    sck: GPIO12<'static>,
    mosi: GPIO11<'static>,
    miso: GPIO13<'static>,
    cs: GPIO10<'static>,
) -> Result<Mcp3561<AdcSpi>, AppError> {
    let spi_bus = Spi::new(
        spi2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(10))
            .with_mode(Mode::_0),
    )
    .map_err(|e| {
        error!("SPI2 configuration rejected: {:?}", e);
        AppError::HardwareInit {
            component: "converter SPI bus",
        }
    })?
    .with_sck(sck)
    .with_mosi(mosi)
    .with_miso(miso)
    .into_async();

    let cs = Output::new(cs, Level::High, OutputConfig::default());
    let spi_device = ExclusiveDevice::new(spi_bus, cs, embassy_time::Delay).map_err(|_| {
        AppError::HardwareInit {
            component: "converter chip select",
        }
    })?;

    let mut adc = Mcp3561::new(spi_device, ADC_VREF);
    adc.init().await.map_err(|e| {
        error!("MCP3561R init failed: {}", e);
        AppError::HardwareInit {
            component: "MCP3561R",
        }
    })?;
    Ok(adc)
}

/// The converter's IRQ pin; idles high, falls when a conversion completes
pub fn data_ready_input(pin: GPIO9<'static>) -> Input<'static> {
    Input::new(pin, InputConfig::default().with_pull(Pull::Up))
}

/// Create the shared SPI3 bus.
///
/// 400 kHz keeps the SD card happy during its SPI-mode initialization.
pub fn create_shared_spi_bus(
    spi3: SPI3<'static>,
    sck: GPIO40<'static>,
    mosi: GPIO41<'static>,
    miso: GPIO39<'static>,
) -> Result<&'static RefCell<Spi<'static, Blocking>>, AppError> {
    static SPI3_BUS: StaticCell<RefCell<Spi<'static, Blocking>>> = StaticCell::new();

    let spi_bus = Spi::new(
        spi3,
        SpiConfig::default()
            .with_frequency(Rate::from_khz(400))
            .with_mode(Mode::_0),
    )
    .map_err(|e| {
        error!("SPI3 configuration rejected: {:?}", e);
        AppError::HardwareInit {
            component: "shared SPI bus",
        }
    })?
    .with_sck(sck)
    .with_mosi(mosi)
    .with_miso(miso);

    Ok(SPI3_BUS.init(RefCell::new(spi_bus)))
}

/// Clear the selector chain, enable its outputs and hand out one line per channel
pub fn init_selector_lines(
    bus: &'static RefCell<Spi<'static, Blocking>>,
    latch: GPIO42<'static>,
    output_enable: GPIO21<'static>,
) -> Result<SelectorLines, AppError> {
    static SELECTOR_CHAIN: StaticCell<SelectorChain<SharedSpi, Output<'static>>> =
        StaticCell::new();

    let output_enable = Output::new(output_enable, Level::High, OutputConfig::default());
    let latch = Output::new(latch, Level::High, OutputConfig::default());
    let device = RefCellDevice::new_no_delay(bus, latch).map_err(|_| AppError::HardwareInit {
        component: "selector latch",
    })?;

    let chain: &'static SelectorChain<SharedSpi, Output<'static>> =
        SELECTOR_CHAIN.init(SelectorChain::new(device, output_enable));
    chain.clear_and_enable().map_err(|_| AppError::HardwareInit {
        component: "selector chain",
    })?;

    info!("Selector chain cleared, {} lines ready", THERMISTOR_CHANNELS);
    Ok(chain.lines())
}

/// Mount the SD card and open the calibration record on it
pub fn init_calibration_store(
    bus: &'static RefCell<Spi<'static, Blocking>>,
    cs: GPIO38<'static>,
) -> Result<CalibrationStore<CardMemory, THERMISTOR_CHANNELS>, AppError> {
    let cs = Output::new(cs, Level::High, OutputConfig::default());
    let device = RefCellDevice::new_no_delay(bus, cs).map_err(|_| AppError::HardwareInit {
        component: "SD card chip select",
    })?;

    let sd_card = embedded_sdmmc::SdCard::new(device, Delay::new());
    let memory = SdCardMemory::new(sd_card, FixedTimeSource).map_err(|e| {
        error!("SD card calibration file unavailable: {}", e);
        AppError::HardwareInit {
            component: "SD card",
        }
    })?;

    Ok(CalibrationStore::new(memory)?)
}

#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::Input;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};
use rtt_target::{rtt_init, set_print_channel};

use thermux_core::{
    AcquisitionConfig, AcquisitionController, AppError, ChannelMap, ConversionSync, MuxScanner,
};
use thermux_firmware::console::{CommandQueue, console_task};
use thermux_firmware::hardware;
use thermux_firmware::publisher::LogPublisher;

/// Raised by the converter's IRQ edge, consumed by the scanner
static CONVERSION_READY: ConversionSync = ConversionSync::new();

/// Commands from the RTT console, drained between acquisition cycles
static COMMANDS: CommandQueue = CommandQueue::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Forwards every falling edge of the converter's IRQ pin
#[embassy_executor::task]
async fn conversion_ready_task(mut data_ready: Input<'static>) {
    loop {
        data_ready.wait_for_falling_edge().await;
        CONVERSION_READY.notify();
    }
}

/// Logged once, then the firmware idles; nothing is retried
async fn park(error: AppError) -> ! {
    error!("Start-up failed: {}", error);
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    let channels = rtt_init! {
        up: {
            0: {
                size: 1024,
                name: "Terminal"
            }
        }
        down: {
            0: {
                size: 64,
                name: "Terminal"
            }
        }
    };
    set_print_channel(channels.up.0);
    rtt_target::init_logger_with_level(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let adc = match hardware::init_converter(
        peripherals.SPI2,
        peripherals.GPIO12,
        peripherals.GPIO11,
        peripherals.GPIO13,
        peripherals.GPIO10,
    )
    .await
    {
        Ok(adc) => adc,
        Err(e) => park(e).await,
    };
    let data_ready = hardware::data_ready_input(peripherals.GPIO9);

    let shared_bus = match hardware::create_shared_spi_bus(
        peripherals.SPI3,
        peripherals.GPIO40,
        peripherals.GPIO41,
        peripherals.GPIO39,
    ) {
        Ok(bus) => bus,
        Err(e) => park(e).await,
    };
    let lines =
        match hardware::init_selector_lines(shared_bus, peripherals.GPIO42, peripherals.GPIO21) {
            Ok(lines) => lines,
            Err(e) => park(e).await,
        };
    let store = match hardware::init_calibration_store(shared_bus, peripherals.GPIO38) {
        Ok(store) => store,
        Err(e) => park(e).await,
    };

    match conversion_ready_task(data_ready) {
        Ok(token) => spawner.spawn(token),
        Err(_) => {
            park(AppError::HardwareInit {
                component: "data-ready task",
            })
            .await
        }
    }
    match console_task(channels.down.0, &COMMANDS) {
        Ok(token) => spawner.spawn(token),
        Err(_) => warn!("Console task unavailable, calibration commands disabled"),
    }

    let acquisition = AcquisitionConfig::default();
    let scanner = MuxScanner::new(ChannelMap::new(lines), adc, &CONVERSION_READY, &acquisition);
    let mut controller = AcquisitionController::new(scanner, store, &acquisition);
    let mut publisher = LogPublisher;

    if let Err(e) = controller.start(&mut publisher).await {
        park(e).await;
    }

    loop {
        controller.run_cycle(&mut publisher).await;

        while let Ok(command) = COMMANDS.try_receive() {
            // Failures are logged and published by the controller
            let _ = controller.handle(command, &mut publisher).await;
        }
    }
}

//! Desktop simulator for the thermux thermistor bank.
//!
//! Runs the real `thermux-core` controller against a simulated bank of 32
//! NTC thermistors and a converter that answers every conversion at once.
//! Calibration is kept in a file that plays the part of the EEPROM, so each
//! invocation is one power cycle of the device. Point 1 is not persisted as
//! complete on its own, so a two-point calibration runs inside one session.
//!
//! ```text
//! thermux-simulator run 3                  # three acquisition cycles
//! thermux-simulator session                # commands from stdin, one per line:
//!     calibrate 1 0.0                      #   chamber at 0 C, capture point 1
//!     calibrate 2 100.0                    #   chamber at 100 C, capture point 2
//!     ambient 37                           #   move the chamber
//!     run                                  #   calibrated readings near 37 C
//! thermux-simulator status
//! thermux-simulator clear
//! ```
//!
//! `RUST_LOG` controls the log level (default `info`).

use std::cell::Cell;
use std::convert::Infallible;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::{env, fs, io};

use embassy_futures::block_on;
use embassy_time::Duration;
use embedded_hal::digital::{ErrorType, OutputPin};
use log::{error, info, warn};
use thiserror_no_std::Error;

use thermux_core::{
    AcquisitionConfig, AcquisitionController, AppError, CalibrationError, CalibrationStatus,
    CalibrationStore, Channel, ChannelMap, Command, ConversionSync, Converter, ConverterMode,
    CycleReport, MuxScanner, NvMemory, Publisher, THERMISTOR_CHANNELS,
};

const USAGE: &str = "\
usage: thermux-simulator [options] <action>

actions:
  run [cycles]                    acquisition cycles (default 1)
  calibrate <1|2> <reference C>   capture a calibration point
  clear                           erase the stored calibration
  status                          print the calibration status
  session                         read actions from stdin, plus
                                  'ambient <C>' and 'quit'

options:
  --state <file>            calibration memory file (default thermux-nvm.bin)
  --ambient <C>             chamber temperature (default 25, or the reference when calibrating)
  --passes <n>              scan passes per cycle (default 10)
  --stuck <channel>         1-based channel whose conversion never completes
  --power-cut-after <n>     exit abruptly after n memory writes";

// ---------------------------------------------------------------------------
// Thermistor model
// ---------------------------------------------------------------------------

/// Converter reference, volts
const VREF: f32 = 3.3;
/// Fixed resistor on the supply side of each divider
const SERIES_OHMS: f32 = 10_000.0;
/// NTC resistance at 25 C
const NTC_R25: f32 = 10_000.0;
const NTC_BETA: f32 = 3950.0;
const KELVIN: f32 = 273.15;
/// Peak converter noise, volts
const NOISE_VOLTS: f32 = 0.0005;
/// The converter die runs a little warmer than the chamber
const SELF_HEATING: f32 = 0.4;

/// Voltage across an NTC at `temp_c` in a divider with [`SERIES_OHMS`]
fn divider_voltage(temp_c: f32, r25: f32) -> f32 {
    let kelvin = temp_c + KELVIN;
    let resistance = r25 * (NTC_BETA * (1.0 / kelvin - 1.0 / (25.0 + KELVIN))).exp();
    VREF * resistance / (resistance + SERIES_OHMS)
}

/// Part-to-part spread of R25, fixed per channel, within +/-2 %
fn r25_for(index: usize) -> f32 {
    let step = (index * 7 % 9) as f32 - 4.0;
    NTC_R25 * (1.0 + step * 0.005)
}

/// The thermistors, their selector lines and the chamber they sit in
struct SimulatedBank {
    ambient: Cell<f32>,
    selected: [Cell<bool>; THERMISTOR_CHANNELS],
    stuck: Option<usize>,
    noise_state: Cell<u32>,
}

impl SimulatedBank {
    fn new(ambient: f32, stuck: Option<usize>) -> Self {
        Self {
            ambient: Cell::new(ambient),
            selected: Default::default(),
            stuck,
            noise_state: Cell::new(0x1234_5678),
        }
    }

    fn lines(&self) -> [SimulatedLine<'_>; THERMISTOR_CHANNELS] {
        std::array::from_fn(|index| SimulatedLine { bank: self, index })
    }

    fn selected_channel(&self) -> Option<usize> {
        self.selected.iter().position(Cell::get)
    }

    /// Uniform in `-NOISE_VOLTS..NOISE_VOLTS`
    fn noise(&self) -> f32 {
        let state = self
            .noise_state
            .get()
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        self.noise_state.set(state);
        ((state >> 8) as f32 / (1u32 << 24) as f32 - 0.5) * 2.0 * NOISE_VOLTS
    }
}

struct SimulatedLine<'a> {
    bank: &'a SimulatedBank,
    index: usize,
}

impl ErrorType for SimulatedLine<'_> {
    type Error = Infallible;
}

impl OutputPin for SimulatedLine<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bank.selected[self.index].set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bank.selected[self.index].set(true);
        Ok(())
    }
}

#[derive(Debug)]
enum SimulatedConverterError {
    NoConversion,
}

/// Samples whatever is routed to its input and raises the ready signal at once
struct SimulatedConverter<'a> {
    bank: &'a SimulatedBank,
    sync: &'a ConversionSync,
    mode: ConverterMode,
    latched: Option<f32>,
}

impl Converter for SimulatedConverter<'_> {
    type Error = SimulatedConverterError;

    async fn set_mode(&mut self, mode: ConverterMode) -> Result<(), Self::Error> {
        self.mode = mode;
        Ok(())
    }

    async fn start_conversion(&mut self) -> Result<(), Self::Error> {
        let bank = self.bank;
        self.latched = match self.mode {
            ConverterMode::InternalTemperature => Some(bank.ambient.get() + SELF_HEATING),
            ConverterMode::ThermistorMux => match bank.selected_channel() {
                Some(index) if bank.stuck == Some(index) => None,
                Some(index) => {
                    Some(divider_voltage(bank.ambient.get(), r25_for(index)) + bank.noise())
                }
                // Floating input
                None => Some(bank.noise()),
            },
        };

        if self.latched.is_some() {
            self.sync.notify();
        }
        Ok(())
    }

    async fn read_data(&mut self) -> Result<f32, Self::Error> {
        self.latched
            .take()
            .ok_or(SimulatedConverterError::NoConversion)
    }
}

// ---------------------------------------------------------------------------
// File-backed calibration memory
// ---------------------------------------------------------------------------

/// Same size as the firmware's calibration file on the SD card
const MEMORY_SIZE: usize = 512;

/// Byte-addressed memory persisted to a file on every write
struct FileMemory {
    path: PathBuf,
    bytes: Vec<u8>,
    writes_until_power_cut: Option<usize>,
}

impl FileMemory {
    /// Load `path`, or start erased (`0xFF`) if it does not exist yet
    fn open(path: PathBuf, power_cut_after: Option<usize>) -> io::Result<Self> {
        let mut bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("{} not found, starting with erased memory", path.display());
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        bytes.resize(MEMORY_SIZE, 0xFF);

        Ok(Self {
            path,
            bytes,
            writes_until_power_cut: power_cut_after,
        })
    }

    fn range(address: usize, len: usize) -> io::Result<std::ops::Range<usize>> {
        match address.checked_add(len) {
            Some(end) if end <= MEMORY_SIZE => Ok(address..end),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{len} bytes at {address} is outside the {MEMORY_SIZE}-byte memory"),
            )),
        }
    }
}

impl NvMemory for FileMemory {
    type Error = io::Error;

    fn capacity(&self) -> usize {
        MEMORY_SIZE
    }

    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        let range = Self::range(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error> {
        let range = Self::range(address, data.len())?;
        self.bytes[range].copy_from_slice(data);
        fs::write(&self.path, &self.bytes)?;

        if let Some(remaining) = self.writes_until_power_cut.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                warn!("Simulated power cut after write at address {}", address);
                std::process::exit(3);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Prints reports to stdout, four channels per row
struct ConsolePublisher;

impl<const N: usize> Publisher<N> for ConsolePublisher {
    type Error = Infallible;

    async fn publish_data(&mut self, report: &CycleReport<N>) -> Result<(), Self::Error> {
        let unit = if report.calibrated { "C" } else { "V" };
        for row in report.channels.chunks(4).enumerate() {
            let (row_index, readings) = row;
            let cells: Vec<String> = readings
                .iter()
                .enumerate()
                .map(|(offset, reading)| {
                    let channel = Channel::new(row_index * 4 + offset).to_string();
                    match reading {
                        Ok(value) => format!("{channel:>3} {value:>9.4} {unit}"),
                        Err(fault) => format!("{channel:>3} {:>11}", fault.label()),
                    }
                })
                .collect();
            println!("{}", cells.join("   "));
        }

        match report.internal_temperature {
            Ok(value) => println!("internal {value:.2} C"),
            Err(fault) => println!("internal {}", fault.label()),
        }
        Ok(())
    }

    async fn publish_refs(&mut self, ref_low: f32, ref_high: f32) -> Result<(), Self::Error> {
        println!("calibration references {ref_low:.2} C / {ref_high:.2} C");
        Ok(())
    }

    async fn publish_status(&mut self, status: &CalibrationStatus<N>) -> Result<(), Self::Error> {
        println!(
            "calibrated: {} ({}), references {:.2} C / {:.2} C",
            status.calibrated,
            status.phase.label(),
            status.ref_low,
            status.ref_high
        );
        if !status.degenerate.is_empty() {
            let channels: Vec<String> = status.degenerate.iter().map(ToString::to_string).collect();
            println!("zero calibration span: {}", channels.join(", "));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// One thing to do after boot, from the command line or a session line
#[derive(Debug, PartialEq)]
enum Step {
    Run { cycles: u32 },
    Ambient(f32),
    Command(Command),
    Quit,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        match words.next() {
            None => Err("missing action".to_string()),
            Some("run") => {
                let cycles = match words.next() {
                    Some(count) => count
                        .parse()
                        .map_err(|_| format!("invalid cycle count '{count}'"))?,
                    None => 1,
                };
                Ok(Self::Run { cycles })
            }
            Some("ambient") => {
                let value = words.next();
                Ok(Self::Ambient(parse_value("ambient", value.map(str::to_string))?))
            }
            Some("quit" | "exit") => Ok(Self::Quit),
            Some(_) => line
                .parse::<Command>()
                .map(Self::Command)
                .map_err(|e| e.to_string()),
        }
    }
}

#[derive(Debug, PartialEq)]
struct Options {
    state: PathBuf,
    /// Fixed chamber temperature; when unset, calibrating moves the chamber to the reference
    ambient: Option<f32>,
    passes: Option<u8>,
    stuck: Option<usize>,
    power_cut_after: Option<usize>,
    /// `None` reads a session from stdin
    step: Option<Step>,
}

fn parse_value<T: FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{flag} needs a value"))?;
    value
        .parse()
        .map_err(|_| format!("invalid value '{value}' for {flag}"))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options {
        state: PathBuf::from("thermux-nvm.bin"),
        ambient: None,
        passes: None,
        stuck: None,
        power_cut_after: None,
        step: None,
    };

    let mut words = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--state" => options.state = PathBuf::from(parse_value::<String>("--state", args.next())?),
            "--ambient" => options.ambient = Some(parse_value("--ambient", args.next())?),
            "--passes" => options.passes = Some(parse_value("--passes", args.next())?),
            "--stuck" => {
                let channel: usize = parse_value("--stuck", args.next())?;
                if !(1..=THERMISTOR_CHANNELS).contains(&channel) {
                    return Err(format!("--stuck must be 1..={THERMISTOR_CHANNELS}"));
                }
                options.stuck = Some(channel - 1);
            }
            "--power-cut-after" => {
                let writes: usize = parse_value("--power-cut-after", args.next())?;
                if writes == 0 {
                    return Err("--power-cut-after must be at least 1".to_string());
                }
                options.power_cut_after = Some(writes);
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
            _ => {
                words.push(arg);
                words.extend(args.by_ref());
            }
        }
    }

    match words.first().map(String::as_str) {
        None => return Err("missing action".to_string()),
        Some("session") if words.len() == 1 => {}
        Some(_) => {
            let step = words.join(" ").parse::<Step>()?;
            if matches!(step, Step::Ambient(_) | Step::Quit) {
                return Err(format!("'{}' is only available in a session", words[0]));
            }
            options.step = Some(step);
        }
    }
    Ok(options)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
enum SimulatorError {
    #[error("calibration memory file: {0}")]
    Memory(#[from] io::Error),
    #[error("{0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Calibration(#[from] CalibrationError),
}

type SimulatedController<'a> = AcquisitionController<
    'a,
    SimulatedLine<'a>,
    SimulatedConverter<'a>,
    FileMemory,
    THERMISTOR_CHANNELS,
>;

async fn execute(
    step: Step,
    bank: &SimulatedBank,
    fixed_ambient: Option<f32>,
    controller: &mut SimulatedController<'_>,
    publisher: &mut ConsolePublisher,
) -> Result<(), CalibrationError> {
    match step {
        Step::Run { cycles } => {
            for cycle in 1..=cycles {
                println!(
                    "--- cycle {}/{}, chamber {:.2} C ---",
                    cycle,
                    cycles,
                    bank.ambient.get()
                );
                controller.run_cycle(publisher).await;
            }
            Ok(())
        }
        Step::Ambient(temperature) => {
            info!("Chamber set to {} C", temperature);
            bank.ambient.set(temperature);
            Ok(())
        }
        Step::Command(command) => {
            if let (Command::Calibrate { reference, .. }, None) = (command, fixed_ambient) {
                bank.ambient.set(reference);
            }
            controller.handle(command, publisher).await
        }
        Step::Quit => Ok(()),
    }
}

/// Boot the simulated board, then carry out one step or a whole session.
///
/// Each call is one power cycle: the controller restores whatever the
/// memory file holds and nothing else survives from a previous call.
async fn simulate(options: Options, input: impl BufRead) -> Result<(), SimulatorError> {
    let bank = SimulatedBank::new(options.ambient.unwrap_or(25.0), options.stuck);
    let sync = ConversionSync::new();
    let mut config =
        AcquisitionConfig::default().with_conversion_timeout(Duration::from_millis(20));
    if let Some(passes) = options.passes {
        config = config.with_passes(passes);
    }

    let converter = SimulatedConverter {
        bank: &bank,
        sync: &sync,
        mode: ConverterMode::ThermistorMux,
        latched: None,
    };
    let scanner = MuxScanner::new(ChannelMap::new(bank.lines()), converter, &sync, &config);
    let memory = FileMemory::open(options.state, options.power_cut_after)?;
    let store = CalibrationStore::new(memory).map_err(AppError::from)?;
    let mut controller = AcquisitionController::new(scanner, store, &config);
    let mut publisher = ConsolePublisher;

    controller.start(&mut publisher).await?;

    if let Some(step) = options.step {
        return Ok(execute(step, &bank, options.ambient, &mut controller, &mut publisher).await?);
    }

    info!("Session started, one command per line ('quit' to end)");
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<Step>() {
            Ok(Step::Quit) => break,
            // Failures are logged and published by the controller
            Ok(step) => {
                let _ = execute(step, &bank, options.ambient, &mut controller, &mut publisher).await;
            }
            Err(message) => warn!("Invalid command '{}': {}", line, message),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    info!("Starting thermux simulator");
    match block_on(simulate(options, io::stdin().lock())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

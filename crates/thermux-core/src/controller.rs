//! Acquisition controller
//!
//! Owns the scanner, the calibration store and the calibration engine, and
//! runs them in order:
//!
//! ```text
//! start ──> run_cycle ──> run_cycle ──> ...
//!              │   P passes: all channels, then the internal temperature
//!              │   map through calibration
//!              └─> publish_data
//! ```
//!
//! Commands are handled between cycles with [`AcquisitionController::handle`].
//! Nothing here is shared: the firmware and the simulator each own exactly one
//! controller and drive it from a single task.

use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

use crate::averager::SampleAverager;
use crate::calibration::{CalibrationEngine, CalibrationPoint};
use crate::channels::Channel;
use crate::command::Command;
use crate::config::AcquisitionConfig;
use crate::converter::{Converter, ConverterMode};
use crate::error::{AppError, CalibrationError, ChannelFault};
use crate::report::{CycleReport, Publisher};
use crate::scanner::MuxScanner;
use crate::storage::{CalibrationStore, NvMemory};

pub struct AcquisitionController<'a, P, C, M, const N: usize> {
    scanner: MuxScanner<'a, P, C, N>,
    store: CalibrationStore<M, N>,
    calibration: CalibrationEngine<N>,
    passes: u8,
    cycles: u32,
}

impl<'a, P, C, M, const N: usize> AcquisitionController<'a, P, C, M, N>
where
    P: OutputPin,
    C: Converter,
    M: NvMemory,
{
    pub fn new(
        scanner: MuxScanner<'a, P, C, N>,
        store: CalibrationStore<M, N>,
        config: &AcquisitionConfig,
    ) -> Self {
        Self {
            scanner,
            store,
            calibration: CalibrationEngine::new(),
            passes: config.passes.max(1),
            cycles: 0,
        }
    }

    pub fn calibration(&self) -> &CalibrationEngine<N> {
        &self.calibration
    }

    pub fn store(&self) -> &CalibrationStore<M, N> {
        &self.store
    }

    pub fn scanner_mut(&mut self) -> &mut MuxScanner<'a, P, C, N> {
        &mut self.scanner
    }

    /// Completed cycles since start
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Drive every selector line low and restore the stored calibration.
    ///
    /// When a complete calibration is found its reference temperatures are
    /// announced.
    pub async fn start<B: Publisher<N>>(&mut self, publisher: &mut B) -> Result<(), AppError> {
        self.scanner
            .release_all()
            .map_err(|_| AppError::HardwareInit {
                component: "selector lines",
            })?;
        self.calibration.restore(&mut self.store)?;

        if let Some((ref_low, ref_high)) = self.calibration.references() {
            if let Err(e) = publisher.publish_refs(ref_low, ref_high).await {
                warn!("Failed to publish calibration references: {:?}", e);
            }
        }

        info!(
            "Acquisition started: {} channels, {} passes per cycle",
            N, self.passes
        );
        Ok(())
    }

    /// Run one acquisition cycle and publish its report.
    ///
    /// Channel failures are carried in the report; the cycle itself never
    /// fails.
    pub async fn run_cycle<B: Publisher<N>>(&mut self, publisher: &mut B) -> CycleReport<N> {
        let mut averager = SampleAverager::<N>::new();

        for pass in 0..self.passes {
            debug!("Scan pass {}/{}", pass + 1, self.passes);
            self.scan_thermistors(&mut averager).await;
            self.scan_internal(&mut averager).await;
        }

        let report = self.finish_cycle(&averager);
        for (channel, fault) in report.faults() {
            warn!("{} has no value this cycle: {}", channel, fault.label());
        }
        if let Err(e) = publisher.publish_data(&report).await {
            warn!("Failed to publish cycle {}: {:?}", self.cycles, e);
        }

        self.cycles = self.cycles.wrapping_add(1);
        report
    }

    /// Execute one command and publish the resulting calibration status.
    ///
    /// A successful point 2 also announces the new reference temperatures.
    pub async fn handle<B: Publisher<N>>(
        &mut self,
        command: Command,
        publisher: &mut B,
    ) -> Result<(), CalibrationError> {
        let result = match command {
            Command::Calibrate { point, reference } => {
                let result = self
                    .calibration
                    .calibrate(point, reference, &mut self.scanner, &mut self.store)
                    .await;
                if result.is_ok() && point == CalibrationPoint::High {
                    if let Some((ref_low, ref_high)) = self.calibration.references() {
                        if let Err(e) = publisher.publish_refs(ref_low, ref_high).await {
                            warn!("Failed to publish calibration references: {:?}", e);
                        }
                    }
                }
                result
            }
            Command::ClearCalibration => self.calibration.clear(&mut self.store),
            Command::QueryStatus => Ok(()),
        };

        if let Err(e) = &result {
            warn!("Command {:?} failed: {}", command, e);
        }

        let status = self.calibration.status();
        if let Err(e) = publisher.publish_status(&status).await {
            warn!("Failed to publish calibration status: {:?}", e);
        }
        result
    }

    async fn scan_thermistors(&mut self, averager: &mut SampleAverager<N>) {
        if let Err(e) = self.scanner.select_mode(ConverterMode::ThermistorMux).await {
            let fault = ChannelFault::from(e);
            for index in 0..N {
                averager.reject(Channel::new(index), fault);
            }
            return;
        }

        for index in 0..N {
            let channel = Channel::new(index);
            match self.scanner.scan_channel(channel).await {
                Ok(raw) => averager.update(channel, raw),
                Err(e) => averager.reject(channel, e.into()),
            }
        }
    }

    async fn scan_internal(&mut self, averager: &mut SampleAverager<N>) {
        let result = match self
            .scanner
            .select_mode(ConverterMode::InternalTemperature)
            .await
        {
            Ok(()) => self.scanner.scan_internal().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(raw) => averager.update_internal(raw),
            Err(e) => averager.reject_internal(e.into()),
        }
    }

    fn finish_cycle(&self, averager: &SampleAverager<N>) -> CycleReport<N> {
        let channels = core::array::from_fn(|index| {
            let channel = Channel::new(index);
            let raw = averager.channel(channel).finish()?;
            self.calibration
                .apply(channel, raw)
                .map_err(|_| ChannelFault::CalibrationDegenerate)
        });

        CycleReport {
            channels,
            internal_temperature: averager.internal().finish(),
            calibrated: self.calibration.is_calibrated(),
        }
    }
}

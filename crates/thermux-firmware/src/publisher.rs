//! Publishes cycle results as log lines over RTT

use core::convert::Infallible;

use log::{info, warn};
use thermux_core::{CalibrationStatus, Channel, CycleReport, Publisher};

pub struct LogPublisher;

impl<const N: usize> Publisher<N> for LogPublisher {
    type Error = Infallible;

    async fn publish_data(&mut self, report: &CycleReport<N>) -> Result<(), Self::Error> {
        for (index, reading) in report.channels.iter().enumerate() {
            let channel = Channel::new(index);
            match reading {
                Ok(value) if report.calibrated => {
                    info!("Thermistor {} temperature: {:.2} C", channel, value)
                }
                Ok(value) => info!("Thermistor {} raw: {:.6} V", channel, value),
                Err(fault) => warn!("Thermistor {}: {}", channel, fault.label()),
            }
        }

        match report.internal_temperature {
            Ok(value) => info!("ADC internal temperature: {:.2} C", value),
            Err(fault) => warn!("ADC internal temperature: {}", fault.label()),
        }
        Ok(())
    }

    async fn publish_refs(&mut self, ref_low: f32, ref_high: f32) -> Result<(), Self::Error> {
        info!(
            "Calibration Temperature 1: {:.2} C, Calibration Temperature 2: {:.2} C",
            ref_low, ref_high
        );
        Ok(())
    }

    async fn publish_status(&mut self, status: &CalibrationStatus<N>) -> Result<(), Self::Error> {
        info!(
            "Calibrated? {} ({})",
            status.calibrated,
            status.phase.label()
        );
        for channel in &status.degenerate {
            warn!("Thermistor {} has a zero calibration span", channel);
        }
        Ok(())
    }
}

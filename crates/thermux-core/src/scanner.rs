//! Mux scanner: one conversion per selected channel
//!
//! A scan asserts the channel's selector line, triggers a conversion, waits
//! on the [`ConversionSync`], reads the result and releases the line. Scans
//! are strictly sequential; only one selector line is ever asserted.

use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};

use crate::channels::{Channel, ChannelMap, ScanTarget};
use crate::config::AcquisitionConfig;
use crate::converter::{Converter, ConverterMode};
use crate::error::ScanError;
use crate::sync::ConversionSync;

/// Holds a selector line high and drives it low when dropped.
///
/// Dropping covers early returns and a cancelled scan future; the explicit
/// [`AssertedLine::release`] lets the normal path report a failed release.
/// A line that refuses to go low is recorded in `stuck` so the scanner
/// asserts nothing else until it has been released.
struct AssertedLine<'a, P: OutputPin> {
    line: Option<&'a mut P>,
    channel: Channel,
    stuck: &'a mut Option<Channel>,
}

impl<'a, P: OutputPin> AssertedLine<'a, P> {
    fn assert(
        line: &'a mut P,
        channel: Channel,
        stuck: &'a mut Option<Channel>,
    ) -> Result<Self, ScanError> {
        line.set_high().map_err(|e| {
            error!("Failed to assert selector line for {}: {:?}", channel, e);
            ScanError::SelectLine { channel }
        })?;
        Ok(Self {
            line: Some(line),
            channel,
            stuck,
        })
    }

    fn release(mut self) -> Result<(), ScanError> {
        let channel = self.channel;
        match self.line.take() {
            Some(line) => line.set_low().map_err(|e| {
                error!("Failed to release selector line for {}: {:?}", channel, e);
                *self.stuck = Some(channel);
                ScanError::SelectLine { channel }
            }),
            None => Ok(()),
        }
    }
}

impl<P: OutputPin> Drop for AssertedLine<'_, P> {
    fn drop(&mut self) {
        if let Some(line) = self.line.take() {
            if let Err(e) = line.set_low() {
                error!(
                    "Selector line for {} may be left asserted: {:?}",
                    self.channel, e
                );
                *self.stuck = Some(self.channel);
            }
        }
    }
}

/// Drives the channel map and the converter through the conversion handshake
pub struct MuxScanner<'a, P, C, const N: usize> {
    channels: ChannelMap<P, N>,
    converter: C,
    sync: &'a ConversionSync,
    conversion_timeout: Duration,
    mode_settle: Duration,
    mode: Option<ConverterMode>,
    /// Line left high by a failed release
    stuck: Option<Channel>,
}

impl<'a, P, C, const N: usize> MuxScanner<'a, P, C, N>
where
    P: OutputPin,
    C: Converter,
{
    pub fn new(
        channels: ChannelMap<P, N>,
        converter: C,
        sync: &'a ConversionSync,
        config: &AcquisitionConfig,
    ) -> Self {
        Self {
            channels,
            converter,
            sync,
            conversion_timeout: config.conversion_timeout,
            mode_settle: config.mode_settle,
            mode: None,
            stuck: None,
        }
    }

    pub fn channel_map(&self) -> &ChannelMap<P, N> {
        &self.channels
    }

    pub fn converter_mut(&mut self) -> &mut C {
        &mut self.converter
    }

    /// Drive every selector line low (start-up state).
    pub fn release_all(&mut self) -> Result<(), ScanError> {
        self.channels.release_all().map_err(|channel| {
            error!("Selector line for {} could not be driven low", channel);
            self.stuck = Some(channel);
            ScanError::SelectLine { channel }
        })?;
        self.stuck = None;
        Ok(())
    }

    /// Channel whose selector line could not be driven low, if any
    pub fn stuck_line(&self) -> Option<Channel> {
        self.stuck
    }

    /// Retry releasing a line a previous scan left high
    fn recover_stuck_line(&mut self) -> Result<(), ScanError> {
        let Some(channel) = self.stuck else {
            return Ok(());
        };
        match self.channels.line_mut(channel).set_low() {
            Ok(()) => {
                info!("Selector line for {} released", channel);
                self.stuck = None;
                Ok(())
            }
            Err(_) => Err(ScanError::SelectLine { channel }),
        }
    }

    /// Route the converter input and let it settle.
    pub async fn select_mode(&mut self, mode: ConverterMode) -> Result<(), ScanError> {
        self.converter.set_mode(mode).await.map_err(|e| {
            error!("Converter mode change to {:?} failed: {:?}", mode, e);
            ScanError::ModeSwitch { mode }
        })?;
        self.mode = Some(mode);

        if self.mode_settle > Duration::from_ticks(0) {
            Timer::after(self.mode_settle).await;
        }
        Ok(())
    }

    /// Convert one thermistor channel.
    ///
    /// The converter must already be in [`ConverterMode::ThermistorMux`].
    /// While another line is stuck high the scan is refused with
    /// [`ScanError::SelectLine`] naming the stuck channel.
    pub async fn scan_channel(&mut self, channel: Channel) -> Result<f32, ScanError> {
        if self.mode != Some(ConverterMode::ThermistorMux) {
            warn!("Scanning {} without thermistor mux mode selected", channel);
        }
        self.recover_stuck_line()?;

        let line = AssertedLine::assert(
            self.channels.line_mut(channel),
            channel,
            &mut self.stuck,
        )?;
        let raw = Self::convert(
            &mut self.converter,
            self.sync,
            self.conversion_timeout,
            ScanTarget::Thermistor(channel),
        )
        .await?;
        line.release()?;

        debug!("{} raw {}", channel, raw);
        Ok(raw)
    }

    /// Convert the internal-temperature pseudo-channel.
    ///
    /// No selector line is involved. The converter must already be in
    /// [`ConverterMode::InternalTemperature`].
    pub async fn scan_internal(&mut self) -> Result<f32, ScanError> {
        let raw = Self::convert(
            &mut self.converter,
            self.sync,
            self.conversion_timeout,
            ScanTarget::InternalTemperature,
        )
        .await?;
        debug!("internal temperature raw {}", raw);
        Ok(raw)
    }

    async fn convert(
        converter: &mut C,
        sync: &ConversionSync,
        timeout: Duration,
        target: ScanTarget,
    ) -> Result<f32, ScanError> {
        sync.arm();
        converter.start_conversion().await.map_err(|e| {
            error!("Failed to start conversion on {}: {:?}", target, e);
            ScanError::Converter {
                target,
                operation: "start conversion",
            }
        })?;

        sync.wait_for_conversion(timeout).await.map_err(|_| {
            warn!("No data-ready signal for {} within {} ms", target, timeout.as_millis());
            ScanError::ConversionTimeout { target }
        })?;

        converter.read_data().await.map_err(|e| {
            error!("Failed to read conversion result on {}: {:?}", target, e);
            ScanError::Converter {
                target,
                operation: "read conversion data",
            }
        })
    }
}

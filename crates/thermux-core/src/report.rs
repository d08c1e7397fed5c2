//! What an acquisition cycle hands to the outside world

use core::fmt::Debug;

use crate::calibration::CalibrationPhase;
use crate::channels::Channel;
use crate::error::ChannelFault;

/// Final value of one channel for a cycle
pub type ChannelReading = Result<f32, ChannelFault>;

/// Result of one acquisition cycle.
///
/// Channel values are in physical units when calibrated and raw converter
/// units otherwise. The internal temperature is never mapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport<const N: usize> {
    pub channels: [ChannelReading; N],
    pub internal_temperature: ChannelReading,
    /// Whether `channels` went through the calibration mapping
    pub calibrated: bool,
}

impl<const N: usize> CycleReport<N> {
    pub fn reading(&self, channel: Channel) -> ChannelReading {
        self.channels[channel.index()]
    }

    /// Channels with no value this cycle
    pub fn faults(&self) -> impl Iterator<Item = (Channel, ChannelFault)> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter_map(|(index, reading)| reading.err().map(|fault| (Channel::new(index), fault)))
    }
}

/// Answer to a status query and the tail of every calibration command
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStatus<const N: usize> {
    pub phase: CalibrationPhase,
    pub calibrated: bool,
    pub ref_low: f32,
    pub ref_high: f32,
    /// Channels whose stored raw span is zero
    pub degenerate: heapless::Vec<Channel, N>,
}

/// Outbound interface for cycle results and calibration announcements.
///
/// Message encoding and transport belong to the implementation (log lines,
/// a serial link, a radio). Errors are logged by the controller and never
/// stop acquisition.
pub trait Publisher<const N: usize> {
    type Error: Debug;

    fn publish_data(
        &mut self,
        report: &CycleReport<N>,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Announce the reference temperatures of the active calibration
    fn publish_refs(
        &mut self,
        ref_low: f32,
        ref_high: f32,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn publish_status(
        &mut self,
        status: &CalibrationStatus<N>,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

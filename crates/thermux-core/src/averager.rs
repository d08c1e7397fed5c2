//! Per-channel running update across scan passes
//!
//! Every pass folds the new sample into the running value with
//! `value = (value + raw) / 2`, the first sample of a cycle being taken as-is.
//! This weights recent passes most heavily: after P passes the first sample
//! keeps a weight of `2^-(P-1)`. It is not an arithmetic mean.

use crate::channels::{Channel, MAX_CHANNELS};
use crate::error::ChannelFault;

/// Running value of one channel within one acquisition cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningValue {
    value: f32,
    samples: u8,
    last_fault: Option<ChannelFault>,
}

impl RunningValue {
    pub const fn new() -> Self {
        Self {
            value: 0.0,
            samples: 0,
            last_fault: None,
        }
    }

    /// Fold one valid sample into the running value
    pub fn update(&mut self, raw: f32) {
        self.value = if self.samples == 0 {
            raw
        } else {
            (self.value + raw) / 2.0
        };
        self.samples = self.samples.saturating_add(1);
    }

    /// Record a pass that produced no sample
    pub fn reject(&mut self, fault: ChannelFault) {
        self.last_fault = Some(fault);
    }

    /// Valid samples folded in so far
    pub const fn samples(&self) -> u8 {
        self.samples
    }

    /// Final value of the cycle, or the last fault if no pass succeeded
    pub fn finish(&self) -> Result<f32, ChannelFault> {
        if self.samples > 0 {
            Ok(self.value)
        } else {
            Err(self.last_fault.unwrap_or(ChannelFault::ConversionTimeout))
        }
    }
}

/// Running values of every channel plus the internal-temperature pseudo-channel
#[derive(Debug, Clone, Copy)]
pub struct SampleAverager<const N: usize> {
    channels: [RunningValue; N],
    internal: RunningValue,
}

impl<const N: usize> SampleAverager<N> {
    /// Start a cycle with every running value empty
    pub const fn new() -> Self {
        const { assert!(N <= MAX_CHANNELS, "channel count does not fit a Channel") };
        Self {
            channels: [RunningValue::new(); N],
            internal: RunningValue::new(),
        }
    }

    pub fn update(&mut self, channel: Channel, raw: f32) {
        self.channels[channel.index()].update(raw);
    }

    pub fn reject(&mut self, channel: Channel, fault: ChannelFault) {
        self.channels[channel.index()].reject(fault);
    }

    pub fn update_internal(&mut self, raw: f32) {
        self.internal.update(raw);
    }

    pub fn reject_internal(&mut self, fault: ChannelFault) {
        self.internal.reject(fault);
    }

    pub fn channel(&self, channel: Channel) -> &RunningValue {
        &self.channels[channel.index()]
    }

    pub fn internal(&self) -> &RunningValue {
        &self.internal
    }
}

impl<const N: usize> Default for SampleAverager<N> {
    fn default() -> Self {
        Self::new()
    }
}

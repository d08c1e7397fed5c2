//! Acquisition configuration and compile-time board constants

use embassy_time::Duration;

/// Number of thermistor channels on the reference board (32 MOSFET-switched lines)
pub const THERMISTOR_CHANNELS: usize = 32;

/// Scan passes per acquisition cycle on the reference board
pub const DEFAULT_PASSES: u8 = 10;

/// Upper bound for a single conversion handshake
///
/// A 24-bit conversion at the default oversampling completes in a few
/// milliseconds, so anything past this is treated as a stuck converter.
pub const DEFAULT_CONVERSION_TIMEOUT_MS: u64 = 100;

/// Time the converter needs after a mux/mode register change
pub const DEFAULT_MODE_SETTLE_MS: u64 = 1;

/// Configuration for one acquisition cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Scan passes folded into each channel's running value (P)
    pub passes: u8,
    /// How long to wait for the converter's ready signal
    pub conversion_timeout: Duration,
    /// Delay after switching the converter between thermistor and internal-temperature mode
    pub mode_settle: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            passes: DEFAULT_PASSES,
            conversion_timeout: Duration::from_millis(DEFAULT_CONVERSION_TIMEOUT_MS),
            mode_settle: Duration::from_millis(DEFAULT_MODE_SETTLE_MS),
        }
    }
}

impl AcquisitionConfig {
    /// Fewer passes per cycle, for a faster publish rate at the cost of smoothing
    pub const fn fast() -> Self {
        Self {
            passes: 5,
            conversion_timeout: Duration::from_millis(DEFAULT_CONVERSION_TIMEOUT_MS),
            mode_settle: Duration::from_millis(DEFAULT_MODE_SETTLE_MS),
        }
    }

    /// Override the pass count; zero is raised to one
    pub const fn with_passes(mut self, passes: u8) -> Self {
        self.passes = if passes == 0 { 1 } else { passes };
        self
    }

    pub const fn with_conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = timeout;
        self
    }

    pub const fn with_mode_settle(mut self, settle: Duration) -> Self {
        self.mode_settle = settle;
        self
    }
}

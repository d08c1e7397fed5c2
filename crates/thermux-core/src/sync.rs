//! Conversion synchronizer
//!
//! The converter pulls its data-ready line low when a result is available.
//! The interrupt (or the task awaiting that edge) calls
//! [`ConversionSync::notify`]; the scanner awaits the signal with a bound so a
//! stuck converter surfaces as an error instead of stalling every channel
//! after it.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, with_timeout};

/// Returned when the ready signal does not arrive in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionTimeout;

/// Single-slot "conversion ready" signal shared with the interrupt context
///
/// Const-constructible so firmware can place it in a `static`:
///
/// ```rust,ignore
/// static CONVERSION_READY: ConversionSync = ConversionSync::new();
///
/// // DRDY edge handler
/// CONVERSION_READY.notify();
/// ```
pub struct ConversionSync {
    ready: Signal<CriticalSectionRawMutex, ()>,
}

impl ConversionSync {
    pub const fn new() -> Self {
        Self {
            ready: Signal::new(),
        }
    }

    /// Raise the ready signal. Safe to call from interrupt context.
    pub fn notify(&self) {
        self.ready.signal(());
    }

    /// Drop a ready signal left over from an earlier conversion
    pub fn arm(&self) {
        self.ready.reset();
    }

    /// Whether a ready signal is pending (not consumed)
    pub fn is_pending(&self) -> bool {
        self.ready.signaled()
    }

    /// Wait for the ready signal and consume it.
    pub async fn wait_for_conversion(&self, timeout: Duration) -> Result<(), ConversionTimeout> {
        with_timeout(timeout, self.ready.wait())
            .await
            .map_err(|_| ConversionTimeout)
    }
}

impl Default for ConversionSync {
    fn default() -> Self {
        Self::new()
    }
}

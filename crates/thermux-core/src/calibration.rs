//! Two-point calibration
//!
//! Each channel gets a low and a high raw reading taken at two known
//! reference temperatures shared by the whole bank. Once both points are
//! stored and the flag is committed, raw values map linearly:
//!
//! ```text
//! physical = (raw - raw_low[c]) * (ref_high - ref_low) / (raw_high[c] - raw_low[c]) + ref_low
//! ```
//!
//! ## Phases
//!
//! ```text
//! Uncalibrated --point 1--> CapturingLow --done--> CapturingHigh --point 2--> Calibrated
//!       ^                                                                        |
//!       +------------------------------- clear (from any phase) -----------------+
//! ```
//!
//! Every calibrate command first commits the flag as clear, so a power cut at
//! any point of a capture restarts uncalibrated.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::channels::{Channel, MAX_CHANNELS};
use crate::converter::{Converter, ConverterMode};
use crate::error::{CalibrationError, StoreError};
use crate::report::CalibrationStatus;
use crate::scanner::MuxScanner;
use crate::storage::{CalibrationStore, Field, NvMemory};

/// Which of the two reference points a command captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPoint {
    /// Point 1, the low temperature extreme
    Low,
    /// Point 2, the high temperature extreme
    High,
}

impl TryFrom<u8> for CalibrationPoint {
    type Error = CalibrationError;

    fn try_from(point: u8) -> Result<Self, Self::Error> {
        match point {
            1 => Ok(Self::Low),
            2 => Ok(Self::High),
            other => Err(CalibrationError::InvalidPoint(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Uncalibrated,
    /// Point 1 is being captured
    CapturingLow,
    /// Point 1 is stored; point 2 is pending or being captured
    CapturingHigh,
    Calibrated,
}

impl CalibrationPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uncalibrated => "uncalibrated",
            Self::CapturingLow => "capturing low point",
            Self::CapturingHigh => "capturing high point",
            Self::Calibrated => "calibrated",
        }
    }
}

/// In-memory copy of the calibration record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationState<const N: usize> {
    pub calibrated: bool,
    pub ref_low: f32,
    pub ref_high: f32,
    pub raw_low: [f32; N],
    pub raw_high: [f32; N],
}

impl<const N: usize> CalibrationState<N> {
    /// Uncalibrated, every field zero
    pub const fn new() -> Self {
        const { assert!(N <= MAX_CHANNELS, "channel count does not fit a Channel") };
        Self {
            calibrated: false,
            ref_low: 0.0,
            ref_high: 0.0,
            raw_low: [0.0; N],
            raw_high: [0.0; N],
        }
    }

    /// Map a raw value of `channel` through its two-point line.
    ///
    /// Does not look at `calibrated`; callers gate on it.
    pub fn map(&self, channel: Channel, raw: f32) -> Result<f32, CalibrationError> {
        let index = channel.index();
        let raw_low = self.raw_low[index];
        let span = self.raw_high[index] - raw_low;
        if span == 0.0 {
            return Err(CalibrationError::Degenerate { channel });
        }

        let physical = ((raw - raw_low) * (self.ref_high - self.ref_low)) / span + self.ref_low;
        if !physical.is_finite() {
            return Err(CalibrationError::Degenerate { channel });
        }
        Ok(physical)
    }

    /// Whether `channel` has a zero raw span
    pub fn is_degenerate(&self, channel: Channel) -> bool {
        let index = channel.index();
        self.raw_high[index] == self.raw_low[index]
    }
}

impl<const N: usize> Default for CalibrationState<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Calibration state machine and raw-to-physical mapping
#[derive(Debug)]
pub struct CalibrationEngine<const N: usize> {
    state: CalibrationState<N>,
    phase: CalibrationPhase,
}

impl<const N: usize> CalibrationEngine<N> {
    pub const fn new() -> Self {
        Self {
            state: CalibrationState::new(),
            phase: CalibrationPhase::Uncalibrated,
        }
    }

    pub fn state(&self) -> &CalibrationState<N> {
        &self.state
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn is_calibrated(&self) -> bool {
        self.state.calibrated
    }

    /// Reference temperatures, if a complete calibration is loaded
    pub fn references(&self) -> Option<(f32, f32)> {
        self.state
            .calibrated
            .then_some((self.state.ref_low, self.state.ref_high))
    }

    /// Load the persisted record.
    ///
    /// A record whose flag is set but whose fields fail the sanity check is
    /// ignored and the engine starts uncalibrated. Memory access errors are
    /// returned.
    pub fn restore<M: NvMemory>(
        &mut self,
        store: &mut CalibrationStore<M, N>,
    ) -> Result<(), StoreError> {
        match store.load() {
            Ok(state) => {
                self.state = state;
                self.phase = if state.calibrated {
                    info!(
                        "Calibration restored: ref_low {} C, ref_high {} C",
                        state.ref_low, state.ref_high
                    );
                    CalibrationPhase::Calibrated
                } else {
                    info!("No calibration stored, publishing raw values");
                    CalibrationPhase::Uncalibrated
                };
                Ok(())
            }
            Err(StoreError::Inconsistent { field }) => {
                warn!(
                    "Stored calibration is inconsistent ({}), falling back to raw values",
                    field
                );
                self.state = CalibrationState::new();
                self.phase = CalibrationPhase::Uncalibrated;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Capture one calibration point on every channel.
    ///
    /// Point 1 requires nothing; point 2 requires point 1 to have been
    /// captured (this session, or as part of a restored calibration). Each
    /// channel's raw value is persisted as soon as it is read. The flag is
    /// committed only after the last channel of point 2.
    pub async fn calibrate<P, C, M>(
        &mut self,
        point: CalibrationPoint,
        reference: f32,
        scanner: &mut MuxScanner<'_, P, C, N>,
        store: &mut CalibrationStore<M, N>,
    ) -> Result<(), CalibrationError>
    where
        P: OutputPin,
        C: Converter,
        M: NvMemory,
    {
        if !reference.is_finite() {
            return Err(CalibrationError::InvalidReference);
        }
        if point == CalibrationPoint::High
            && !matches!(
                self.phase,
                CalibrationPhase::CapturingHigh | CalibrationPhase::Calibrated
            )
        {
            warn!("Calibration point 2 requested before point 1");
            return Err(CalibrationError::LowPointMissing);
        }

        info!(
            "Calibration point {} started at {} C",
            match point {
                CalibrationPoint::Low => 1,
                CalibrationPoint::High => 2,
            },
            reference
        );

        let result = self.capture(point, reference, scanner, store).await;
        match (&result, point) {
            (Ok(()), CalibrationPoint::Low) => {
                self.phase = CalibrationPhase::CapturingHigh;
                info!("Calibration point 1 complete");
            }
            (Ok(()), CalibrationPoint::High) => {
                self.phase = CalibrationPhase::Calibrated;
                info!("Calibration complete");
            }
            // A flag that could not be cleared still marks the old record complete
            (Err(e), _) if self.state.calibrated => {
                warn!("Calibration aborted, previous calibration kept: {}", e);
                self.phase = CalibrationPhase::Calibrated;
            }
            (Err(e), CalibrationPoint::Low) => {
                warn!("Calibration point 1 aborted: {}", e);
                self.phase = CalibrationPhase::Uncalibrated;
            }
            (Err(e), CalibrationPoint::High) => {
                warn!("Calibration point 2 aborted: {}", e);
                self.phase = CalibrationPhase::CapturingHigh;
            }
        }
        result
    }

    async fn capture<P, C, M>(
        &mut self,
        point: CalibrationPoint,
        reference: f32,
        scanner: &mut MuxScanner<'_, P, C, N>,
        store: &mut CalibrationStore<M, N>,
    ) -> Result<(), CalibrationError>
    where
        P: OutputPin,
        C: Converter,
        M: NvMemory,
    {
        // The record is about to change; nothing may read it as complete
        store.write_flag(false)?;
        self.state.calibrated = false;

        match point {
            CalibrationPoint::Low => {
                self.phase = CalibrationPhase::CapturingLow;
                store.write_field(Field::RefLow, reference)?;
                self.state.ref_low = reference;
            }
            CalibrationPoint::High => {
                self.phase = CalibrationPhase::CapturingHigh;
                store.write_field(Field::RefHigh, reference)?;
                self.state.ref_high = reference;
            }
        }

        scanner.select_mode(ConverterMode::ThermistorMux).await?;
        for index in 0..N {
            let channel = Channel::new(index);
            let raw = scanner.scan_channel(channel).await?;
            match point {
                CalibrationPoint::Low => {
                    store.write_field(Field::RawLow(channel), raw)?;
                    self.state.raw_low[index] = raw;
                }
                CalibrationPoint::High => {
                    store.write_field(Field::RawHigh(channel), raw)?;
                    self.state.raw_high[index] = raw;
                }
            }
            info!("{} read {} at {} C", channel, raw, reference);
        }

        if point == CalibrationPoint::High {
            for index in 0..N {
                let channel = Channel::new(index);
                if self.state.is_degenerate(channel) {
                    warn!("{} has the same raw value at both points", channel);
                }
            }
            store.write_flag(true)?;
            self.state.calibrated = true;
        }
        Ok(())
    }

    /// Erase the calibration in storage and memory.
    ///
    /// The in-memory state is cleared even if the storage write fails, so the
    /// device never keeps mapping with a record it failed to erase.
    pub fn clear<M: NvMemory>(
        &mut self,
        store: &mut CalibrationStore<M, N>,
    ) -> Result<(), CalibrationError> {
        let result = store.clear();
        self.state = CalibrationState::new();
        self.phase = CalibrationPhase::Uncalibrated;
        match result {
            Ok(()) => {
                info!("Calibration data cleared");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Map a channel's raw value, or pass it through when not calibrated
    pub fn apply(&self, channel: Channel, raw: f32) -> Result<f32, CalibrationError> {
        if self.state.calibrated {
            self.state.map(channel, raw)
        } else {
            Ok(raw)
        }
    }

    /// Snapshot for the status query
    pub fn status(&self) -> CalibrationStatus<N> {
        let mut degenerate = heapless::Vec::new();
        if self.state.calibrated {
            for index in 0..N {
                let channel = Channel::new(index);
                if self.state.is_degenerate(channel) {
                    // Capacity is N, one slot per channel
                    let _ = degenerate.push(channel);
                }
            }
        }

        CalibrationStatus {
            phase: self.phase,
            calibrated: self.state.calibrated,
            ref_low: self.state.ref_low,
            ref_high: self.state.ref_high,
            degenerate,
        }
    }
}

impl<const N: usize> Default for CalibrationEngine<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelMap;
    use crate::storage::RamMemory;
    use crate::sync::ConversionSync;
    use crate::test_support::{RefusingMemory, TestBoard, TestMemory, test_config};
    use core::cell::Cell;
    use embassy_futures::block_on;

    #[test]
    fn test_point_numbers() {
        assert_eq!(CalibrationPoint::try_from(1), Ok(CalibrationPoint::Low));
        assert_eq!(CalibrationPoint::try_from(2), Ok(CalibrationPoint::High));
        assert_eq!(
            CalibrationPoint::try_from(3),
            Err(CalibrationError::InvalidPoint(3))
        );
    }

    #[test]
    fn test_single_channel_maps_midpoint() {
        let board = TestBoard::new();
        let sync = ConversionSync::new();
        let config = test_config(1);
        let mut scanner = MuxScanner::new(
            ChannelMap::new(board.lines::<1>()),
            board.converter(&sync),
            &sync,
            &config,
        );
        let mut store = CalibrationStore::<_, 1>::new(TestMemory::new()).unwrap();
        let mut engine = CalibrationEngine::<1>::new();

        block_on(async {
            board.set_channel(0, &[100.0]);
            engine
                .calibrate(CalibrationPoint::Low, 0.0, &mut scanner, &mut store)
                .await
                .unwrap();
            assert_eq!(engine.phase(), CalibrationPhase::CapturingHigh);
            assert!(!engine.is_calibrated());

            board.set_channel(0, &[200.0]);
            engine
                .calibrate(CalibrationPoint::High, 100.0, &mut scanner, &mut store)
                .await
                .unwrap();
        });

        assert_eq!(engine.phase(), CalibrationPhase::Calibrated);
        assert_eq!(engine.apply(Channel::new(0), 150.0), Ok(50.0));
        assert_eq!(engine.references(), Some((0.0, 100.0)));
    }

    #[test]
    fn test_round_trip_at_both_points_for_every_channel() {
        let board = TestBoard::new();
        let sync = ConversionSync::new();
        let config = test_config(1);
        let mut scanner = MuxScanner::new(
            ChannelMap::new(board.lines::<4>()),
            board.converter(&sync),
            &sync,
            &config,
        );
        let mut store = CalibrationStore::<_, 4>::new(TestMemory::new()).unwrap();
        let mut engine = CalibrationEngine::<4>::new();
        let lows = [101.0, 98.5, 120.25, 87.0];
        let highs = [205.0, 190.0, 260.5, 199.0];

        block_on(async {
            for (index, raw) in lows.iter().enumerate() {
                board.set_channel(index, &[*raw]);
            }
            engine
                .calibrate(CalibrationPoint::Low, -5.0, &mut scanner, &mut store)
                .await
                .unwrap();
            for (index, raw) in highs.iter().enumerate() {
                board.set_channel(index, &[*raw]);
            }
            engine
                .calibrate(CalibrationPoint::High, 95.0, &mut scanner, &mut store)
                .await
                .unwrap();
        });

        for index in 0..4 {
            let channel = Channel::new(index);
            let low = engine.apply(channel, lows[index]).unwrap();
            let high = engine.apply(channel, highs[index]).unwrap();
            assert!((low - -5.0).abs() < 1e-4, "{} low mapped to {}", channel, low);
            assert!((high - 95.0).abs() < 1e-4, "{} high mapped to {}", channel, high);
        }

        // What was persisted matches the state at the moment the flag was set
        assert_eq!(store.load().unwrap(), *engine.state());
    }

    #[test]
    fn test_point_two_without_point_one_rejected() {
        let board = TestBoard::new();
        let sync = ConversionSync::new();
        let config = test_config(1);
        let mut scanner = MuxScanner::new(
            ChannelMap::new(board.lines::<1>()),
            board.converter(&sync),
            &sync,
            &config,
        );
        let mut store = CalibrationStore::<_, 1>::new(TestMemory::new()).unwrap();
        let mut engine = CalibrationEngine::<1>::new();

        let result = block_on(engine.calibrate(
            CalibrationPoint::High,
            100.0,
            &mut scanner,
            &mut store,
        ));
        assert_eq!(result, Err(CalibrationError::LowPointMissing));
        assert_eq!(board.conversions(), 0);
    }

    #[test]
    fn test_non_finite_reference_rejected() {
        let board = TestBoard::new();
        let sync = ConversionSync::new();
        let config = test_config(1);
        let mut scanner = MuxScanner::new(
            ChannelMap::new(board.lines::<1>()),
            board.converter(&sync),
            &sync,
            &config,
        );
        let mut store = CalibrationStore::<_, 1>::new(TestMemory::new()).unwrap();
        let mut engine = CalibrationEngine::<1>::new();

        let result = block_on(engine.calibrate(
            CalibrationPoint::Low,
            f32::NAN,
            &mut scanner,
            &mut store,
        ));
        assert_eq!(result, Err(CalibrationError::InvalidReference));
    }

    #[test]
    fn test_zero_span_reports_degenerate() {
        let mut state = CalibrationState::<2>::new();
        state.calibrated = true;
        state.ref_high = 100.0;
        state.raw_low = [100.0, 50.0];
        state.raw_high = [200.0, 50.0];

        assert_eq!(state.map(Channel::new(0), 150.0), Ok(50.0));
        assert_eq!(
            state.map(Channel::new(1), 50.0),
            Err(CalibrationError::Degenerate {
                channel: Channel::new(1)
            })
        );
    }

    #[test]
    fn test_uncalibrated_passes_raw_through() {
        let engine = CalibrationEngine::<2>::new();
        assert_eq!(engine.apply(Channel::new(1), 1234.5), Ok(1234.5));
    }

    #[test]
    fn test_power_loss_between_points_restarts_uncalibrated() {
        let board = TestBoard::new();
        let sync = ConversionSync::new();
        let config = test_config(1);
        let mut scanner = MuxScanner::new(
            ChannelMap::new(board.lines::<2>()),
            board.converter(&sync),
            &sync,
            &config,
        );
        let mut store = CalibrationStore::<_, 2>::new(TestMemory::new()).unwrap();
        let mut engine = CalibrationEngine::<2>::new();

        board.set_channel(0, &[100.0]);
        board.set_channel(1, &[105.0]);
        block_on(engine.calibrate(CalibrationPoint::Low, 0.0, &mut scanner, &mut store)).unwrap();

        // Power cycle: only what reached the memory survives
        let mut rebooted_store =
            CalibrationStore::<_, 2>::new(RamMemory::from_bytes(store.memory().snapshot())).unwrap();
        assert!(!rebooted_store.load().unwrap().calibrated);

        let mut rebooted = CalibrationEngine::<2>::new();
        rebooted.restore(&mut rebooted_store).unwrap();
        assert_eq!(rebooted.phase(), CalibrationPhase::Uncalibrated);
    }

    #[test]
    fn test_recalibrating_point_one_clears_flag_first() {
        let board = TestBoard::new();
        let sync = ConversionSync::new();
        let config = test_config(1);
        let mut scanner = MuxScanner::new(
            ChannelMap::new(board.lines::<2>()),
            board.converter(&sync),
            &sync,
            &config,
        );
        let mut store = CalibrationStore::<_, 2>::new(TestMemory::new()).unwrap();
        let mut engine = CalibrationEngine::<2>::new();

        block_on(async {
            board.set_channel(0, &[100.0]);
            board.set_channel(1, &[100.0]);
            engine
                .calibrate(CalibrationPoint::Low, 0.0, &mut scanner, &mut store)
                .await
                .unwrap();
            board.set_channel(0, &[200.0]);
            board.set_channel(1, &[200.0]);
            engine
                .calibrate(CalibrationPoint::High, 100.0, &mut scanner, &mut store)
                .await
                .unwrap();
        });
        assert!(store.read_flag().unwrap());

        // Channel 1 gets stuck half way through a new point 1
        board.set_channel(0, &[90.0]);
        board.set_stuck_channel(Some(1));
        let result = block_on(engine.calibrate(CalibrationPoint::Low, 1.0, &mut scanner, &mut store));

        assert!(matches!(result, Err(CalibrationError::Scan(_))));
        assert!(!store.read_flag().unwrap());
        assert!(!engine.is_calibrated());
        assert_eq!(engine.phase(), CalibrationPhase::Uncalibrated);
        assert_eq!(board.asserted_count(), 0);
    }

    #[test]
    fn test_failed_point_two_can_be_retried() {
        let board = TestBoard::new();
        let sync = ConversionSync::new();
        let config = test_config(1);
        let mut scanner = MuxScanner::new(
            ChannelMap::new(board.lines::<1>()),
            board.converter(&sync),
            &sync,
            &config,
        );
        let mut store = CalibrationStore::<_, 1>::new(TestMemory::new()).unwrap();
        let mut engine = CalibrationEngine::<1>::new();

        board.set_channel(0, &[100.0]);
        block_on(engine.calibrate(CalibrationPoint::Low, 0.0, &mut scanner, &mut store)).unwrap();

        board.set_stuck_channel(Some(0));
        let failed = block_on(engine.calibrate(CalibrationPoint::High, 100.0, &mut scanner, &mut store));
        assert!(failed.is_err());
        assert_eq!(engine.phase(), CalibrationPhase::CapturingHigh);
        assert!(!store.read_flag().unwrap());

        board.set_stuck_channel(None);
        board.set_channel(0, &[200.0]);
        block_on(engine.calibrate(CalibrationPoint::High, 100.0, &mut scanner, &mut store)).unwrap();
        assert!(store.read_flag().unwrap());
        assert_eq!(engine.apply(Channel::new(0), 150.0), Ok(50.0));
    }

    #[test]
    fn test_unwritable_flag_keeps_previous_calibration() {
        let board = TestBoard::new();
        let sync = ConversionSync::new();
        let config = test_config(1);
        let mut scanner = MuxScanner::new(
            ChannelMap::new(board.lines::<1>()),
            board.converter(&sync),
            &sync,
            &config,
        );
        let refuse_writes = Cell::new(false);
        let mut store = CalibrationStore::<_, 1>::new(RefusingMemory::new(&refuse_writes)).unwrap();
        let mut engine = CalibrationEngine::<1>::new();

        board.set_channel(0, &[100.0]);
        block_on(engine.calibrate(CalibrationPoint::Low, 0.0, &mut scanner, &mut store)).unwrap();
        board.set_channel(0, &[200.0]);
        block_on(engine.calibrate(CalibrationPoint::High, 100.0, &mut scanner, &mut store)).unwrap();

        refuse_writes.set(true);
        board.set_channel(0, &[90.0]);
        let result = block_on(engine.calibrate(CalibrationPoint::Low, 5.0, &mut scanner, &mut store));

        assert!(matches!(
            result,
            Err(CalibrationError::Store(StoreError::Memory { .. }))
        ));
        assert!(store.read_flag().unwrap());
        assert_eq!(engine.phase(), CalibrationPhase::Calibrated);
        assert!(engine.is_calibrated());
        assert_eq!(engine.apply(Channel::new(0), 150.0), Ok(50.0));

        // Still calibrated, so point 2 alone may be redone
        refuse_writes.set(false);
        board.set_channel(0, &[300.0]);
        block_on(engine.calibrate(CalibrationPoint::High, 200.0, &mut scanner, &mut store)).unwrap();
        assert_eq!(engine.apply(Channel::new(0), 200.0), Ok(100.0));
    }

    #[test]
    fn test_clear_returns_to_uncalibrated() {
        let mut store = CalibrationStore::<_, 2>::new(TestMemory::new()).unwrap();
        store.write_field(Field::RefLow, 0.0).unwrap();
        store.write_field(Field::RefHigh, 100.0).unwrap();
        for index in 0..2 {
            let channel = Channel::new(index);
            store.write_field(Field::RawLow(channel), 1.0).unwrap();
            store.write_field(Field::RawHigh(channel), 5.0).unwrap();
        }
        store.write_flag(true).unwrap();

        let mut engine = CalibrationEngine::<2>::new();
        engine.restore(&mut store).unwrap();
        assert_eq!(engine.phase(), CalibrationPhase::Calibrated);

        engine.clear(&mut store).unwrap();
        assert_eq!(engine.phase(), CalibrationPhase::Uncalibrated);
        assert_eq!(*engine.state(), CalibrationState::new());
        assert_eq!(store.load().unwrap(), CalibrationState::new());
    }

    #[test]
    fn test_inconsistent_record_falls_back_to_raw() {
        let mut store = CalibrationStore::<_, 1>::new(TestMemory::new()).unwrap();
        store.write_field(Field::RefLow, 0.0).unwrap();
        store.write_field(Field::RefHigh, f32::INFINITY).unwrap();
        store.write_field(Field::RawLow(Channel::new(0)), 1.0).unwrap();
        store.write_field(Field::RawHigh(Channel::new(0)), 2.0).unwrap();
        store.write_flag(true).unwrap();

        let mut engine = CalibrationEngine::<1>::new();
        engine.restore(&mut store).unwrap();
        assert_eq!(engine.phase(), CalibrationPhase::Uncalibrated);
        assert_eq!(engine.apply(Channel::new(0), 1.5), Ok(1.5));
    }

    #[test]
    fn test_status_lists_degenerate_channels() {
        let mut store = CalibrationStore::<_, 3>::new(TestMemory::new()).unwrap();
        store.write_field(Field::RefLow, 0.0).unwrap();
        store.write_field(Field::RefHigh, 100.0).unwrap();
        for index in 0..3 {
            let channel = Channel::new(index);
            store.write_field(Field::RawLow(channel), 10.0).unwrap();
            let high = if index == 1 { 10.0 } else { 20.0 };
            store.write_field(Field::RawHigh(channel), high).unwrap();
        }
        store.write_flag(true).unwrap();

        let mut engine = CalibrationEngine::<3>::new();
        engine.restore(&mut store).unwrap();
        let status = engine.status();

        assert!(status.calibrated);
        assert_eq!(status.phase, CalibrationPhase::Calibrated);
        assert_eq!(status.degenerate.as_slice(), &[Channel::new(1)]);
    }
}

//! Scripted selector lines, converter and publisher for unit tests

use core::cell::{Cell, RefCell};

use embassy_time::Duration;
use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};

use crate::config::AcquisitionConfig;
use crate::converter::{Converter, ConverterMode};
use crate::report::{CalibrationStatus, CycleReport, Publisher};
use crate::storage::{NvMemory, RamMemory};
use crate::sync::ConversionSync;

pub const MAX_TEST_CHANNELS: usize = 8;
const MAX_SAMPLES: usize = 16;
const MAX_RECORDS: usize = 16;

/// Large enough for the record of every test board size
pub type TestMemory = RamMemory<128>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRefused;

/// [`TestMemory`] whose writes fail while `refuse_writes` is set
pub struct RefusingMemory<'a> {
    pub inner: TestMemory,
    pub refuse_writes: &'a Cell<bool>,
}

impl<'a> RefusingMemory<'a> {
    pub fn new(refuse_writes: &'a Cell<bool>) -> Self {
        Self {
            inner: TestMemory::new(),
            refuse_writes,
        }
    }
}

impl NvMemory for RefusingMemory<'_> {
    type Error = WriteRefused;

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.read(address, buf).map_err(|_| WriteRefused)
    }

    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error> {
        if self.refuse_writes.get() {
            return Err(WriteRefused);
        }
        self.inner.write(address, data).map_err(|_| WriteRefused)
    }
}

/// Short timeout so stuck-converter tests finish quickly, no settle delay
pub fn test_config(passes: u8) -> AcquisitionConfig {
    AcquisitionConfig::default()
        .with_passes(passes)
        .with_conversion_timeout(Duration::from_millis(5))
        .with_mode_settle(Duration::from_ticks(0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFault;

impl digital::Error for LineFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConverterFault;

/// Repeats the last entry once the script runs out
#[derive(Default)]
struct SampleScript {
    samples: heapless::Vec<f32, MAX_SAMPLES>,
    cursor: usize,
}

impl SampleScript {
    fn set(&mut self, samples: &[f32]) {
        self.samples.clear();
        for sample in samples.iter().take(MAX_SAMPLES) {
            let _ = self.samples.push(*sample);
        }
        self.cursor = 0;
    }

    fn next(&mut self) -> f32 {
        let Some(last) = self.samples.len().checked_sub(1) else {
            return 0.0;
        };
        let sample = self.samples[self.cursor.min(last)];
        self.cursor += 1;
        sample
    }
}

/// Shared state behind the mock lines and converter.
///
/// Everything sits in cells so the lines, the converter and the test body can
/// all hold `&TestBoard` at once.
pub struct TestBoard {
    lines: [Cell<bool>; MAX_TEST_CHANNELS],
    peak_asserted: Cell<usize>,
    conversions: Cell<usize>,
    failing_line: Cell<Option<usize>>,
    unreleasable_line: Cell<Option<usize>>,
    stuck_channel: Cell<Option<usize>>,
    failing_read: Cell<Option<usize>>,
    channels: RefCell<[SampleScript; MAX_TEST_CHANNELS]>,
    internal: RefCell<SampleScript>,
}

impl TestBoard {
    pub fn new() -> Self {
        Self {
            lines: Default::default(),
            peak_asserted: Cell::new(0),
            conversions: Cell::new(0),
            failing_line: Cell::new(None),
            unreleasable_line: Cell::new(None),
            stuck_channel: Cell::new(None),
            failing_read: Cell::new(None),
            channels: RefCell::new(Default::default()),
            internal: RefCell::new(SampleScript::default()),
        }
    }

    pub fn lines<const N: usize>(&self) -> [MockLine<'_>; N] {
        assert!(N <= MAX_TEST_CHANNELS);
        core::array::from_fn(|index| MockLine { board: self, index })
    }

    pub fn converter<'a>(&'a self, sync: &'a ConversionSync) -> MockConverter<'a> {
        MockConverter {
            board: self,
            sync,
            mode: None,
            latched: None,
            source: None,
        }
    }

    /// Values the channel returns on successive conversions
    pub fn set_channel(&self, index: usize, samples: &[f32]) {
        self.channels.borrow_mut()[index].set(samples);
    }

    pub fn set_internal(&self, samples: &[f32]) {
        self.internal.borrow_mut().set(samples);
    }

    /// Never raise the ready signal while this channel is selected
    pub fn set_stuck_channel(&self, index: Option<usize>) {
        self.stuck_channel.set(index);
    }

    /// Fail the data read while this channel is selected
    pub fn set_failing_read(&self, index: Option<usize>) {
        self.failing_read.set(index);
    }

    /// This channel's line refuses to change level
    pub fn set_failing_line(&self, index: Option<usize>) {
        self.failing_line.set(index);
    }

    /// This channel's line goes high but refuses to go low again
    pub fn set_unreleasable_line(&self, index: Option<usize>) {
        self.unreleasable_line.set(index);
    }

    /// Whether the channel's line is currently driven high
    pub fn is_asserted(&self, index: usize) -> bool {
        self.lines[index].get()
    }

    pub fn asserted_count(&self) -> usize {
        self.lines.iter().filter(|line| line.get()).count()
    }

    /// Most lines ever asserted at the same time
    pub fn peak_asserted(&self) -> usize {
        self.peak_asserted.get()
    }

    pub fn conversions(&self) -> usize {
        self.conversions.get()
    }

    fn selected_channel(&self) -> Option<usize> {
        self.lines.iter().position(|line| line.get())
    }
}

pub struct MockLine<'a> {
    board: &'a TestBoard,
    index: usize,
}

impl ErrorType for MockLine<'_> {
    type Error = LineFault;
}

impl OutputPin for MockLine<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let refused = Some(self.index);
        if self.board.failing_line.get() == refused || self.board.unreleasable_line.get() == refused {
            return Err(LineFault);
        }
        self.board.lines[self.index].set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.board.failing_line.get() == Some(self.index) {
            return Err(LineFault);
        }
        self.board.lines[self.index].set(true);
        let asserted = self.board.asserted_count();
        if asserted > self.board.peak_asserted.get() {
            self.board.peak_asserted.set(asserted);
        }
        Ok(())
    }
}

/// Converter that samples whichever channel is selected when a conversion
/// starts and raises the ready signal straight away
pub struct MockConverter<'a> {
    board: &'a TestBoard,
    sync: &'a ConversionSync,
    mode: Option<ConverterMode>,
    latched: Option<f32>,
    source: Option<usize>,
}

impl Converter for MockConverter<'_> {
    type Error = ConverterFault;

    async fn set_mode(&mut self, mode: ConverterMode) -> Result<(), Self::Error> {
        self.mode = Some(mode);
        Ok(())
    }

    async fn start_conversion(&mut self) -> Result<(), Self::Error> {
        let board = self.board;
        board.conversions.set(board.conversions.get() + 1);

        let (source, sample) = match self.mode {
            Some(ConverterMode::InternalTemperature) => (None, board.internal.borrow_mut().next()),
            _ => match board.selected_channel() {
                Some(index) => (Some(index), board.channels.borrow_mut()[index].next()),
                None => (None, 0.0),
            },
        };
        self.source = source;

        if source.is_some() && source == board.stuck_channel.get() {
            self.latched = None;
            return Ok(());
        }
        self.latched = Some(sample);
        self.sync.notify();
        Ok(())
    }

    async fn read_data(&mut self) -> Result<f32, Self::Error> {
        if self.source.is_some() && self.source == self.board.failing_read.get() {
            return Err(ConverterFault);
        }
        self.latched.take().ok_or(ConverterFault)
    }
}

/// Records everything published
pub struct MockPublisher<const N: usize> {
    pub reports: heapless::Vec<CycleReport<N>, MAX_RECORDS>,
    pub refs: heapless::Vec<(f32, f32), MAX_RECORDS>,
    pub statuses: heapless::Vec<CalibrationStatus<N>, MAX_RECORDS>,
    /// Reject every publish
    pub failing: bool,
}

impl<const N: usize> MockPublisher<N> {
    pub fn new() -> Self {
        Self {
            reports: heapless::Vec::new(),
            refs: heapless::Vec::new(),
            statuses: heapless::Vec::new(),
            failing: false,
        }
    }
}

#[derive(Debug)]
pub struct PublishRejected;

impl<const N: usize> Publisher<N> for MockPublisher<N> {
    type Error = PublishRejected;

    async fn publish_data(&mut self, report: &CycleReport<N>) -> Result<(), Self::Error> {
        if self.failing {
            return Err(PublishRejected);
        }
        let _ = self.reports.push(*report);
        Ok(())
    }

    async fn publish_refs(&mut self, ref_low: f32, ref_high: f32) -> Result<(), Self::Error> {
        if self.failing {
            return Err(PublishRejected);
        }
        let _ = self.refs.push((ref_low, ref_high));
        Ok(())
    }

    async fn publish_status(&mut self, status: &CalibrationStatus<N>) -> Result<(), Self::Error> {
        if self.failing {
            return Err(PublishRejected);
        }
        let _ = self.statuses.push(status.clone());
        Ok(())
    }
}

//! Command console on the RTT down channel
//!
//! Lines typed into the RTT terminal (`calibrate 1 0.0`, `clear`, `status`)
//! are parsed into [`Command`]s and queued for the acquisition loop, which
//! drains the queue between cycles.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use log::{info, warn};
use rtt_target::DownChannel;
use thermux_core::Command;

/// Commands waiting for the acquisition loop
pub type CommandQueue = Channel<CriticalSectionRawMutex, Command, 4>;

const LINE_CAPACITY: usize = 64;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accumulates bytes into lines
pub struct LineBuffer {
    line: heapless::Vec<u8, LINE_CAPACITY>,
    overflowed: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            line: heapless::Vec::new(),
            overflowed: false,
        }
    }

    /// Feed one byte; returns the command once a valid line ends with `\n`
    pub fn push(&mut self, byte: u8) -> Option<Command> {
        match byte {
            b'\r' => None,
            b'\n' => {
                let command = self.finish_line();
                self.line.clear();
                self.overflowed = false;
                command
            }
            _ => {
                if self.line.push(byte).is_err() {
                    self.overflowed = true;
                }
                None
            }
        }
    }

    fn finish_line(&self) -> Option<Command> {
        if self.overflowed {
            warn!("Console line longer than {} bytes dropped", LINE_CAPACITY);
            return None;
        }
        let Ok(text) = core::str::from_utf8(&self.line) else {
            warn!("Console line is not UTF-8");
            return None;
        };
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match text.parse::<Command>() {
            Ok(command) => Some(command),
            Err(e) => {
                warn!("Invalid command '{}': {}", text, e);
                None
            }
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll the RTT down channel and queue every parsed command
#[embassy_executor::task]
pub async fn console_task(mut input: DownChannel, commands: &'static CommandQueue) {
    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; 16];

    loop {
        let count = input.read(&mut chunk);
        for &byte in &chunk[..count] {
            if let Some(command) = buffer.push(byte) {
                info!("Queued {:?}", command);
                commands.send(command).await;
            }
        }

        if count == 0 {
            Timer::after(POLL_INTERVAL).await;
        }
    }
}

// src/bridge.rs
//! Coordination between the serial reader, the parser and the publisher

use crate::{
    error::{BridgeError, Result},
    gps::{GpsFix, ParseOutcome, SatLayout, SentenceInterpreter, SentenceKind},
    publish::FixSink,
};
use log::{error, info, warn};
use std::{
    io::{BufRead, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, RwLock,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_serial::SerialPortBuilderExt;

/// Printed in replay mode whenever the receiver time moves
pub const REPLAY_NOTICE: &str = "Test: Publishing msg";

/// Counters collected while replaying a recorded session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub lines: usize,
    pub discarded: usize,
    pub position: usize,
    pub satellites: usize,
    pub pseudorange_noise: usize,
    pub unrecognized: usize,
    pub notices: usize,
}

impl ReplaySummary {
    fn record(&mut self, outcome: &ParseOutcome) {
        self.lines += 1;
        match outcome.kind {
            None => self.discarded += 1,
            Some(SentenceKind::Position) => self.position += 1,
            Some(SentenceKind::Satellites) => self.satellites += 1,
            Some(SentenceKind::PseudorangeNoise) => self.pseudorange_noise += 1,
            Some(SentenceKind::Unrecognized) => self.unrecognized += 1,
        }
    }
}

/// Counters collected by the live line reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub lines: usize,
    pub timeouts: usize,
}

/// Owns the shared fix record and the parser state.
///
/// Every parse-and-mutate and every snapshot for publishing happens under
/// the single `fix` lock, so a published fix is never torn.
pub struct Bridge {
    fix: Arc<RwLock<GpsFix>>,
    interpreter: Arc<Mutex<SentenceInterpreter>>,
    running: Arc<AtomicBool>,
}

impl Bridge {
    /// Create a new bridge
    pub fn new() -> Self {
        Self::with_sat_layout(SatLayout::default())
    }

    pub fn with_sat_layout(sat_layout: SatLayout) -> Self {
        Self {
            fix: Arc::new(RwLock::new(GpsFix::new())),
            interpreter: Arc::new(Mutex::new(SentenceInterpreter::with_sat_layout(sat_layout))),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Clone the bridge (shares the record, parser state and running flag)
    pub fn clone(&self) -> Self {
        Self {
            fix: Arc::clone(&self.fix),
            interpreter: Arc::clone(&self.interpreter),
            running: Arc::clone(&self.running),
        }
    }

    /// Parse one line and apply it to the shared fix
    pub fn ingest_line(&self, line: &str) -> ParseOutcome {
        let mut interpreter = self
            .interpreter
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut fix = self.fix.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        interpreter.process_line(&mut fix, line)
    }

    /// Get a clone of the current fix
    pub fn snapshot(&self) -> GpsFix {
        self.fix
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Feed every line of `reader` into the parser until EOF or shutdown.
    ///
    /// Bytes are decoded lossily, so line noise only costs the line it is on.
    /// When no complete line arrives within `read_timeout` an empty line is
    /// fed instead; bytes already received stay buffered for the next read.
    pub async fn pump_lines<R>(&self, mut reader: R, read_timeout: Duration) -> Result<PumpSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = PumpSummary::default();
        let mut buf = Vec::new();

        while self.is_running() {
            match tokio::time::timeout(read_timeout, reader.read_until(b'\n', &mut buf)).await {
                Err(_elapsed) => {
                    summary.timeouts += 1;
                    self.ingest_line("");
                }
                Ok(Ok(0)) => {
                    if !buf.is_empty() {
                        summary.lines += 1;
                        self.ingest_line(&String::from_utf8_lossy(&buf));
                    }
                    info!("Line source reached end of stream");
                    break;
                }
                Ok(Ok(_)) => {
                    summary.lines += 1;
                    self.ingest_line(&String::from_utf8_lossy(&buf));
                    buf.clear();
                }
                Ok(Err(e)) => {
                    error!("Error reading from line source: {}", e);
                    return Err(BridgeError::Io(e));
                }
            }
        }

        Ok(summary)
    }

    /// Open the receiver's serial port and start reading it in the background
    pub async fn connect_serial(
        &self,
        port: &str,
        baudrate: u32,
        read_timeout: Duration,
    ) -> Result<JoinHandle<Result<PumpSummary>>> {
        info!("Connecting to DG14 on {} at {} baud", port, baudrate);

        let serial = tokio_serial::new(port, baudrate)
            .open_native_async()
            .map_err(|e| BridgeError::Connection(format!("Failed to open serial port {}: {}", port, e)))?;

        info!("Serial port {} open", port);

        let bridge = self.clone();
        Ok(tokio::spawn(async move {
            let result = bridge.pump_lines(BufReader::new(serial), read_timeout).await;
            if result.is_err() {
                warn!("Serial reader stopped, shutting down");
            }
            bridge.stop();
            result
        }))
    }

    /// Publish a snapshot of the fix to `sink` once per `period` until stopped
    pub async fn publish_loop<S: FixSink>(&self, sink: &mut S, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(BridgeError::Config("Publish period must be non-zero".to_string()));
        }

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.is_running() {
            ticker.tick().await;
            if !self.is_running() {
                break;
            }
            let fix = self.snapshot();
            sink.publish(&fix)?;
        }

        sink.finish()
    }

    /// Replay a recorded session through the parser without publishing.
    ///
    /// A notice is written to `notice` each time the receiver time changes.
    /// Lines that are not valid UTF-8 are decoded lossily and end up discarded.
    pub fn replay<R: BufRead, W: Write>(&self, reader: R, mut notice: W) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();

        for line in reader.split(b'\n') {
            let line = line?;
            let outcome = self.ingest_line(&String::from_utf8_lossy(&line));
            summary.record(&outcome);
            if outcome.utc_changed {
                writeln!(notice, "{}", REPLAY_NOTICE)?;
                summary.notices += 1;
            }
        }

        Ok(summary)
    }

    /// Stop reading and publishing
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Check if the bridge is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

/// List available serial ports
pub fn list_serial_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {} - {:?}", port.port_name, port.port_type);
        }
    }

    Ok(())
}

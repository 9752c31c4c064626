use crate::classifier::{classify_line, Event};
use crate::normalize::normalize;
use crate::prelude::{DevicePort, RecordSink, StreamError, StreamResult};
use crate::record::LogRecord;
use crate::session::{SessionKey, SessionTracker, Transition};
use crate::stats::StreamStats;
use chrono::Local;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Loop timing knobs, kept explicit so the wait/backoff contract is
/// testable with short durations.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Wait between polls while the device has nothing buffered.
    pub idle_wait: Duration,
    /// Backoff after a transient device read failure.
    pub error_backoff: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            idle_wait: Duration::from_millis(100),
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// Single-owner read-process-write loop: device bytes in, classified and
/// normalized readings through the session tracker, rows out via the
/// sink. Every per-line error is absorbed and reported; only cancellation
/// ends the loop.
pub struct StreamDriver<D: DevicePort, S: RecordSink> {
    device: D,
    sink: S,
    tracker: SessionTracker,
    stats: StreamStats,
    config: DriverConfig,
    cancel: Arc<AtomicBool>,
}

impl<D: DevicePort, S: RecordSink> StreamDriver<D, S> {
    pub fn new(device: D, sink: S, config: DriverConfig, cancel: Arc<AtomicBool>) -> Self {
        Self {
            device,
            sink,
            tracker: SessionTracker::new(),
            stats: StreamStats::new(),
            config,
            cancel,
        }
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Runs until the cancel flag is raised. Transient read failures are
    /// logged and retried after a fixed backoff, indefinitely; the flag
    /// is checked between iterations so no write is abandoned mid-line.
    pub fn run(&mut self) -> StreamResult<()> {
        info!("waiting for data (cancel to stop)");
        while !self.cancel.load(Ordering::SeqCst) {
            if let Err(err) = self.poll_once() {
                warn!("{}", err);
                thread::sleep(self.config.error_backoff);
            }
        }
        self.stats.log_summary();
        Ok(())
    }

    fn poll_once(&mut self) -> StreamResult<()> {
        if self.device.bytes_available()? == 0 {
            thread::sleep(self.config.idle_wait);
            return Ok(());
        }
        let bytes = match self.device.read_line()? {
            Some(bytes) => bytes,
            None => return Ok(()),
        };
        // Invalid bytes become replacement characters, never a failure.
        let decoded = String::from_utf8_lossy(&bytes);
        let line = decoded.trim();
        if !line.is_empty() {
            self.process_line(line);
        }
        Ok(())
    }

    fn process_line(&mut self, line: &str) {
        self.stats.lines += 1;
        debug!("raw: {}", line);

        match classify_line(line) {
            Event::Ignored => {
                debug!("ignoring gap diagnostic; lost count untouched");
            }
            Event::Malformed { raw, reason } => {
                self.stats.malformed += 1;
                warn!(
                    "{}",
                    StreamError::MalformedLine(format!("{}: {}", reason.as_str(), raw))
                );
            }
            Event::Lost { packet } => match self.tracker.attach_lost(&packet, Local::now()) {
                Ok((session, record)) => self.write(&session, &record),
                Err(err) => {
                    self.stats.lost_without_session += 1;
                    warn!("{}", err);
                }
            },
            Event::Data(raw) => match normalize(raw) {
                Ok(reading) => {
                    let (transition, session, record) =
                        self.tracker.observe(&reading, Local::now());
                    match transition {
                        Transition::Started => info!(
                            "new session at {:.2} m -> {}",
                            session.distance_m,
                            session.file_name()
                        ),
                        Transition::TransientZero => info!(
                            "transient 0.00 reading, staying in the {:.2} m session",
                            session.distance_m
                        ),
                        Transition::Continued => {}
                    }
                    self.write(&session, &record);
                }
                Err(err) => {
                    self.stats.dropped_readings += 1;
                    warn!("{}", err);
                }
            },
        }
    }

    fn write(&mut self, session: &SessionKey, record: &LogRecord) {
        match self.sink.append(session, record) {
            Ok(()) => self.stats.records_written += 1,
            Err(err) => {
                self.stats.write_failures += 1;
                warn!("{}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EventKind;
    use crate::sink::MemorySink;
    use std::collections::VecDeque;

    /// Replays a fixed script of lines, then raises the cancel flag.
    struct ScriptedDevice {
        lines: VecDeque<Result<Vec<u8>, ()>>,
        cancel: Arc<AtomicBool>,
    }

    impl ScriptedDevice {
        fn new(lines: Vec<Result<&[u8], ()>>, cancel: Arc<AtomicBool>) -> Self {
            Self {
                lines: lines
                    .into_iter()
                    .map(|entry| entry.map(|bytes| bytes.to_vec()))
                    .collect(),
                cancel,
            }
        }
    }

    impl DevicePort for ScriptedDevice {
        fn bytes_available(&mut self) -> StreamResult<usize> {
            if self.lines.is_empty() {
                self.cancel.store(true, Ordering::SeqCst);
                Ok(0)
            } else {
                Ok(1)
            }
        }

        fn read_line(&mut self) -> StreamResult<Option<Vec<u8>>> {
            match self.lines.pop_front() {
                Some(Ok(bytes)) => Ok(Some(bytes)),
                Some(Err(())) => Err(StreamError::DeviceRead("scripted failure".to_string())),
                None => Ok(None),
            }
        }

        fn discard_buffered(&mut self) -> StreamResult<()> {
            Ok(())
        }
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn append(&mut self, _: &SessionKey, _: &LogRecord) -> StreamResult<()> {
            Err(StreamError::SinkWrite("disk full".to_string()))
        }
    }

    fn quick_config() -> DriverConfig {
        DriverConfig {
            idle_wait: Duration::from_millis(1),
            error_backoff: Duration::from_millis(1),
        }
    }

    fn run_script(lines: Vec<Result<&[u8], ()>>) -> (StreamStats, Vec<(SessionKey, LogRecord)>) {
        let cancel = Arc::new(AtomicBool::new(false));
        let device = ScriptedDevice::new(lines, cancel.clone());
        let mut driver = StreamDriver::new(device, MemorySink::default(), quick_config(), cancel);
        driver.run().unwrap();
        let stats = *driver.stats();
        (stats, driver.sink.rows)
    }

    #[test]
    fn full_stream_routes_every_line_kind() {
        let (stats, rows) = run_script(vec![
            Ok(b"LOST: Packet 1\r\n"),
            Ok(b"Large gap detected between packet 1 and 4\n"),
            Ok(b"DATA,100,1,10.0,50,2,-80,7.0,52,3.85%\n"),
            Ok(b"LOST: Packet 5\n"),
            Ok(b"DATA,101,2,0.0,51,9,-81,6.8,60,15.0%\n"),
            Ok(b"DATA,102,3,15.0,10,0,-85,5.0,0,0%\n"),
            // Six fields only; would rotate to 99.0 m if it were accepted.
            Ok(b"DATA,103,4,99.0,1,0\n"),
            Ok(b"noise\n"),
            Ok(b"DATA,104,5,15.0,11,0,-85,5.0,61,0%\n"),
        ]);

        assert_eq!(stats.lines, 9);
        assert_eq!(stats.records_written, 5);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.lost_without_session, 1);
        assert_eq!(stats.dropped_readings, 0);

        // LOST before any DATA was dropped; the rest landed in order.
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].1.event, EventKind::Data);
        assert_eq!(rows[1].1.event, EventKind::Lost);
        assert_eq!(rows[1].0, rows[0].0);
        // Transient zero stays in the 10.0 session, lost carried forward.
        assert_eq!(rows[2].1.distance_m, "0.0");
        assert_eq!(rows[2].1.lost, "2");
        assert_eq!(rows[2].0, rows[0].0);
        // 15.0 rotates; TotalPackets "0" was normalized to Received.
        assert_ne!(rows[3].0, rows[0].0);
        assert_eq!(rows[3].0.distance_m, 15.0);
        assert_eq!(rows[3].1.total_packets, "10");
        // The incomplete 99.0 line mutated nothing: 15.0 still continues.
        assert_eq!(rows[4].0, rows[3].0);
    }

    #[test]
    fn unparseable_distance_is_dropped_without_state_change() {
        let (stats, rows) = run_script(vec![
            Ok(b"DATA,100,1,oops,50,2,-80,7.0,52,3.85%\n"),
            Ok(b"DATA,101,2,10.0,50,2,-80,7.0,52,3.85%\n"),
        ]);
        assert_eq!(stats.dropped_readings, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.distance_m, 10.0);
    }

    #[test]
    fn read_failure_backs_off_and_keeps_streaming() {
        let (stats, rows) = run_script(vec![
            Ok(b"DATA,100,1,10.0,50,2,-80,7.0,52,3.85%\n"),
            Err(()),
            Ok(b"DATA,101,2,10.0,51,2,-80,7.0,53,3.77%\n"),
        ]);
        assert_eq!(stats.records_written, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].0, rows[0].0);
    }

    #[test]
    fn invalid_bytes_are_replaced_not_fatal() {
        let (stats, rows) = run_script(vec![Ok(
            b"DATA,100,1,10.0,50,2,-80,7.0,52,3.85%\xff\n" as &[u8]
        )]);
        assert_eq!(stats.records_written, 1);
        assert_eq!(rows[0].1.loss_rate, "3.85%\u{fffd}");
    }

    #[test]
    fn sink_failure_is_counted_and_not_fatal() {
        let cancel = Arc::new(AtomicBool::new(false));
        let device = ScriptedDevice::new(
            vec![
                Ok(b"DATA,100,1,10.0,50,2,-80,7.0,52,3.85%\n"),
                Ok(b"DATA,101,2,10.0,51,2,-80,7.0,53,3.77%\n"),
            ],
            cancel.clone(),
        );
        let mut driver = StreamDriver::new(device, FailingSink, quick_config(), cancel);
        driver.run().unwrap();
        assert_eq!(driver.stats().write_failures, 2);
        assert_eq!(driver.stats().records_written, 0);
    }

    #[test]
    fn cancel_set_up_front_processes_nothing() {
        let cancel = Arc::new(AtomicBool::new(true));
        let device = ScriptedDevice::new(
            vec![Ok(b"DATA,100,1,10.0,50,2,-80,7.0,52,3.85%\n")],
            cancel.clone(),
        );
        let mut driver = StreamDriver::new(device, MemorySink::default(), quick_config(), cancel);
        driver.run().unwrap();
        assert_eq!(driver.stats().lines, 0);
    }
}

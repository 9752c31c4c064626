use crate::normalize::Reading;
use crate::prelude::{StreamError, StreamResult};
use crate::record::{EventKind, LogRecord};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Identity of one measurement session: the distance it was opened at and
/// the wall-clock instant it started. Identities are monotonic; once the
/// tracker rotates to a new one, a prior identity is never reopened even
/// if its distance repeats later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionKey {
    pub distance_m: f64,
    pub started_at: DateTime<Local>,
}

impl SessionKey {
    /// File name encoding the representative distance (2 decimals) and
    /// the session start time.
    pub fn file_name(&self) -> String {
        format!(
            "lora_data_{:.2}m_{}.csv",
            self.distance_m,
            self.started_at.format("%Y-%m-%d_%H-%M-%S")
        )
    }
}

/// Which rule the tracker applied to a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new session identity was opened.
    Started,
    /// The reading continued the currently open session.
    Continued,
    /// A 0.0 distance after a positive reading, treated as sensor noise
    /// and logged into the open session with the lost count carried over.
    TransientZero,
}

/// The currently open session plus the last-known-good values that the
/// transition rules compare against. Existing at all means at least one
/// valid reading has been accepted.
#[derive(Debug)]
struct OpenSession {
    key: SessionKey,
    last_distance: f64,
    last_lost: i64,
}

/// Process-scoped session state, exclusively owned by the driver loop.
///
/// Created empty at stream start; never persisted, so a restart always
/// begins a fresh session on the next valid reading.
#[derive(Debug, Default)]
pub struct SessionTracker {
    open: Option<OpenSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_session(&self) -> Option<&SessionKey> {
        self.open.as_ref().map(|open| &open.key)
    }

    /// Feeds one normalized reading through the transition rules, in
    /// order:
    ///
    /// 1. transient-zero suppression (0.0 after a nonzero distance): log
    ///    into the open session with the last valid lost count, leave
    ///    the last distance untouched;
    /// 2. first valid reading: open a session keyed on (distance, now);
    /// 3. non-increasing distance: continue the open session — a repeat
    ///    or a dip is jitter around the true distance, not a new
    ///    campaign;
    /// 4. strictly increasing distance: the operator moved the
    ///    transmitter further out, rotate to a new session identity.
    ///
    /// Distances are compared with exact `f64` equality: both operands
    /// come from the device's own decimal text, so repeats of a reading
    /// are bit-identical.
    pub fn observe(
        &mut self,
        reading: &Reading,
        now: DateTime<Local>,
    ) -> (Transition, SessionKey, LogRecord) {
        let mut record = Self::record_for(reading, now);

        if let Some(open) = self.open.as_mut() {
            if reading.distance_m == 0.0 && open.last_distance != 0.0 {
                // Sensor noise: distance stays recorded as read, the
                // lost count is carried forward, nothing else moves.
                record.lost = open.last_lost.to_string();
                return (Transition::TransientZero, open.key.clone(), record);
            }

            open.last_lost = parse_lost_count(&reading.lost);

            return if reading.distance_m > open.last_distance {
                open.last_distance = reading.distance_m;
                open.key = SessionKey {
                    distance_m: reading.distance_m,
                    started_at: now,
                };
                (Transition::Started, open.key.clone(), record)
            } else {
                (Transition::Continued, open.key.clone(), record)
            };
        }

        let key = SessionKey {
            distance_m: reading.distance_m,
            started_at: now,
        };
        self.open = Some(OpenSession {
            key: key.clone(),
            last_distance: reading.distance_m,
            last_lost: parse_lost_count(&reading.lost),
        });
        (Transition::Started, key, record)
    }

    /// Associates a lost-packet event with the currently open session.
    /// With no session ever opened the event is dropped, never buffered
    /// for later replay.
    pub fn attach_lost(
        &self,
        packet: &str,
        now: DateTime<Local>,
    ) -> StreamResult<(SessionKey, LogRecord)> {
        match self.current_session() {
            Some(session) => Ok((session.clone(), LogRecord::lost(now, packet))),
            None => Err(StreamError::NoActiveSession(packet.to_string())),
        }
    }

    fn record_for(reading: &Reading, now: DateTime<Local>) -> LogRecord {
        LogRecord {
            timestamp: now,
            event: EventKind::Data,
            message_number: reading.message_number.clone(),
            distance_m: reading.distance.clone(),
            received: reading.received.clone(),
            lost: reading.lost.clone(),
            rssi: reading.rssi.clone(),
            snr: reading.snr.clone(),
            total_packets: reading.total_packets.clone(),
            loss_rate: reading.loss_rate.clone(),
        }
    }
}

/// Best-effort lost-count parse: the device sometimes prints the count
/// with a decimal point, so parse as float and truncate; default 0.
fn parse_lost_count(text: &str) -> i64 {
    text.trim().parse::<f64>().map(|v| v as i64).unwrap_or(0)
}

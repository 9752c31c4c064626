use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Fixed column set of every session file.
pub const CSV_HEADERS: [&str; 10] = [
    "Timestamp",
    "Event",
    "MessageNumber",
    "Distance(m)",
    "Received",
    "Lost",
    "RSSI",
    "SNR",
    "TotalPackets",
    "LossRate",
];

/// Row kind, mirroring the receiver's line vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventKind {
    Data,
    Lost,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Data => "DATA",
            EventKind::Lost => "LOST",
        }
    }
}

/// Normalized, timestamped row ultimately persisted by the sink.
///
/// The timestamp is wall clock at processing time, not device time; all
/// other fields stay opaque text for passthrough fidelity to the device
/// encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub event: EventKind,
    pub message_number: String,
    pub distance_m: String,
    pub received: String,
    pub lost: String,
    pub rssi: String,
    pub snr: String,
    pub total_packets: String,
    pub loss_rate: String,
}

impl LogRecord {
    /// Row for a lost-packet event: the packet number marks which packet
    /// was lost, every measurement column stays empty.
    pub fn lost(timestamp: DateTime<Local>, packet: &str) -> Self {
        Self {
            timestamp,
            event: EventKind::Lost,
            message_number: packet.to_string(),
            distance_m: String::new(),
            received: String::new(),
            lost: String::new(),
            rssi: String::new(),
            snr: String::new(),
            total_packets: String::new(),
            loss_rate: String::new(),
        }
    }

    /// Renders the record as one CSV row matching [`CSV_HEADERS`].
    pub fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.event.as_str(),
            self.message_number,
            self.distance_m,
            self.received,
            self.lost,
            self.rssi,
            self.snr,
            self.total_packets,
            self.loss_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn lost_record_fills_only_message_number() {
        let ts = Local.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let record = LogRecord::lost(ts, "9");
        assert_eq!(record.event, EventKind::Lost);
        assert_eq!(record.message_number, "9");
        assert_eq!(record.to_row(), "2025-03-01 12:00:00,LOST,9,,,,,,,");
    }

    #[test]
    fn row_column_count_matches_header() {
        let ts = Local.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let record = LogRecord::lost(ts, "4");
        assert_eq!(record.to_row().split(',').count(), CSV_HEADERS.len());
    }
}

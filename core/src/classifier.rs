/// Diagnostic prefix excluded from all accounting.
const GAP_SENTINEL: &str = "Large gap detected";

/// Unparsed text fields of one `DATA,` line, in wire order.
///
/// The receiver emits:
/// `DATA,[boardTimestamp],[MessageNumber],[Distance(m)],[Received],[Lost],[RSSI],[SNR],[TotalPackets],[LossRate]`
/// The board timestamp is discarded; rows are stamped at processing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReading {
    pub message_number: String,
    pub distance: String,
    pub received: String,
    pub lost: String,
    pub rssi: String,
    pub snr: String,
    pub total_packets: String,
    pub loss_rate: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// A `DATA,` line with fewer than the required ten fields.
    Incomplete,
    /// Anything that matches no known line format.
    Unrecognized,
}

impl MalformedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MalformedReason::Incomplete => "incomplete",
            MalformedReason::Unrecognized => "unrecognized",
        }
    }
}

/// One classified line. Immutable once produced; only derived records are
/// mutated downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Data(RawReading),
    Lost { packet: String },
    Ignored,
    Malformed { raw: String, reason: MalformedReason },
}

/// Classifies one trimmed line of receiver output. Pure; the driver owns
/// all observational logging of raw and malformed lines.
pub fn classify_line(line: &str) -> Event {
    if line.starts_with(GAP_SENTINEL) {
        return Event::Ignored;
    }

    if line.starts_with("LOST:") {
        // Format "LOST: Packet <number>"; the trailing token is the id.
        return match line.split_whitespace().last() {
            Some(token) if token != "LOST:" => Event::Lost {
                packet: token.to_string(),
            },
            _ => Event::Malformed {
                raw: line.to_string(),
                reason: MalformedReason::Unrecognized,
            },
        };
    }

    if line.starts_with("DATA,") {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 10 {
            return Event::Malformed {
                raw: line.to_string(),
                reason: MalformedReason::Incomplete,
            };
        }
        return Event::Data(RawReading {
            message_number: parts[2].to_string(),
            distance: parts[3].to_string(),
            received: parts[4].to_string(),
            lost: parts[5].to_string(),
            rssi: parts[6].to_string(),
            snr: parts[7].to_string(),
            total_packets: parts[8].to_string(),
            loss_rate: parts[9].trim_end().to_string(),
        });
    }

    Event::Malformed {
        raw: line.to_string(),
        reason: MalformedReason::Unrecognized,
    }
}

use crate::classifier::RawReading;
use crate::prelude::{StreamError, StreamResult};

/// A validated reading: distance parsed, total-packet quirk corrected,
/// everything else carried as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub message_number: String,
    /// Distance exactly as the device printed it; persisted verbatim.
    pub distance: String,
    pub distance_m: f64,
    pub received: String,
    pub lost: String,
    pub rssi: String,
    pub snr: String,
    pub total_packets: String,
    pub loss_rate: String,
}

/// Validates a raw DATA reading.
///
/// An unparseable distance drops the whole event; the caller reports it
/// and keeps streaming. A total-packet count of exactly 0 means the
/// receiver firmware has not learned the total yet, so the received count
/// stands in for it.
pub fn normalize(raw: RawReading) -> StreamResult<Reading> {
    let distance_m: f64 = raw.distance.trim().parse().map_err(|_| {
        StreamError::NumericParse(format!("distance {:?} is not a number", raw.distance))
    })?;

    let total_packets = if raw.total_packets.trim() == "0" {
        raw.received.clone()
    } else {
        raw.total_packets
    };

    Ok(Reading {
        message_number: raw.message_number,
        distance: raw.distance,
        distance_m,
        received: raw.received,
        lost: raw.lost,
        rssi: raw.rssi,
        snr: raw.snr,
        total_packets,
        loss_rate: raw.loss_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(distance: &str, received: &str, total: &str) -> RawReading {
        RawReading {
            message_number: "1".to_string(),
            distance: distance.to_string(),
            received: received.to_string(),
            lost: "0".to_string(),
            rssi: "-80".to_string(),
            snr: "7.0".to_string(),
            total_packets: total.to_string(),
            loss_rate: "0%".to_string(),
        }
    }

    #[test]
    fn parses_distance_as_float() {
        let reading = normalize(raw("12.75", "50", "50")).unwrap();
        assert_eq!(reading.distance_m, 12.75);
        assert_eq!(reading.total_packets, "50");
    }

    #[test]
    fn zero_total_packets_substitutes_received() {
        let reading = normalize(raw("5.0", "37", "0")).unwrap();
        assert_eq!(reading.total_packets, "37");
    }

    #[test]
    fn nonzero_total_packets_passes_through() {
        let reading = normalize(raw("5.0", "37", "40")).unwrap();
        assert_eq!(reading.total_packets, "40");
    }

    #[test]
    fn unparseable_distance_drops_the_event() {
        let err = normalize(raw("n/a", "10", "10")).unwrap_err();
        assert!(matches!(err, StreamError::NumericParse(_)));
    }
}

//! ForeFlight-style telemetry line parsing.
//!
//! Supports two text formats:
//! - **XGPS** - `XGPS<name>,<lon>,<lat>,<alt_m>,<track_deg>,<speed_mps>`
//! - **XATT** - `XATT<name>,<heading_deg>,<pitch_deg>,<roll_deg>`
//!
//! Parsing never fails: anything that is not a well-formed, in-range report
//! comes back as [`TelemetryRecord::Unrecognized`] holding the trimmed text.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::sample::{AttitudeSample, PositionSample, TelemetryRecord, UnrecognizedLine};

const XGPS_PREFIX: &str = "XGPS";
const XATT_PREFIX: &str = "XATT";

/// Name plus five numerics.
const XGPS_MIN_FIELDS: usize = 6;

/// Name plus three numerics.
const XATT_MIN_FIELDS: usize = 4;

/// Parse a raw datagram (auto-detects the line type).
///
/// Invalid UTF-8 sequences are replaced before parsing.
pub fn parse_datagram(data: &[u8], timestamp: Option<DateTime<Utc>>) -> TelemetryRecord {
    parse_line(&String::from_utf8_lossy(data), timestamp)
}

/// Parse a single telemetry line.
///
/// The timestamp defaults to the current UTC time when not supplied.
pub fn parse_line(line: &str, timestamp: Option<DateTime<Utc>>) -> TelemetryRecord {
    let timestamp = timestamp.unwrap_or_else(Utc::now);
    let line = line.trim();

    let parsed = if let Some(body) = line.strip_prefix(XGPS_PREFIX) {
        parse_xgps(body, timestamp)
    } else if let Some(body) = line.strip_prefix(XATT_PREFIX) {
        parse_xatt(body, timestamp)
    } else {
        if !line.is_empty() {
            trace!(line, "Unrecognized telemetry line");
        }
        None
    };

    parsed.unwrap_or_else(|| {
        TelemetryRecord::Unrecognized(UnrecognizedLine::new(line, Some(timestamp)))
    })
}

/// Parse the body of an XGPS line (prefix already stripped).
fn parse_xgps(body: &str, timestamp: DateTime<Utc>) -> Option<TelemetryRecord> {
    let parts: Vec<&str> = body.split(',').collect();
    if parts.len() < XGPS_MIN_FIELDS {
        debug!(fields = parts.len(), "XGPS line too short");
        return None;
    }

    let values = parse_numbers(&parts[1..XGPS_MIN_FIELDS])?;
    match PositionSample::new(
        parts[0].trim(),
        values[0],
        values[1],
        values[2],
        values[3],
        values[4],
        Some(timestamp),
    ) {
        Ok(sample) => Some(TelemetryRecord::Position(sample)),
        Err(e) => {
            debug!(error = %e, "Rejected XGPS sample");
            None
        }
    }
}

/// Parse the body of an XATT line (prefix already stripped).
fn parse_xatt(body: &str, timestamp: DateTime<Utc>) -> Option<TelemetryRecord> {
    let parts: Vec<&str> = body.split(',').collect();
    if parts.len() < XATT_MIN_FIELDS {
        debug!(fields = parts.len(), "XATT line too short");
        return None;
    }

    let values = parse_numbers(&parts[1..XATT_MIN_FIELDS])?;
    match AttitudeSample::new(
        parts[0].trim(),
        values[0],
        values[1],
        values[2],
        Some(timestamp),
    ) {
        Ok(sample) => Some(TelemetryRecord::Attitude(sample)),
        Err(e) => {
            debug!(error = %e, "Rejected XATT sample");
            None
        }
    }
}

fn parse_numbers(fields: &[&str]) -> Option<Vec<f64>> {
    let mut values = Vec::with_capacity(fields.len());
    for field in fields {
        match field.trim().parse::<f64>() {
            Ok(v) => values.push(v),
            Err(_) => {
                debug!(field = %field, "Non-numeric telemetry field");
                return None;
            }
        }
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unrecognized(record: &TelemetryRecord, expected_raw: &str) {
        match record {
            TelemetryRecord::Unrecognized(line) => assert_eq!(line.raw(), expected_raw),
            other => panic!("expected Unrecognized, got {:?}", other),
        }
    }

    // ==================== XGPS tests ====================

    #[test]
    fn test_parse_xgps_zero_position() {
        let before = Utc::now();
        let record = parse_line("XGPSSim,0.0,0.0,0.0,0.0,0.0", None);

        let TelemetryRecord::Position(p) = record else {
            panic!("expected position, got {:?}", record);
        };
        assert_eq!(p.sim_name(), "Sim");
        assert_eq!(p.longitude(), 0.0);
        assert_eq!(p.latitude(), 0.0);
        assert_eq!(p.altitude_msl(), 0.0);
        assert_eq!(p.track(), 0.0);
        assert_eq!(p.ground_speed(), 0.0);
        assert!(p.timestamp() >= before);
        assert!((Utc::now() - p.timestamp()).num_seconds() < 2);
    }

    #[test]
    fn test_parse_xgps_values() {
        let record = parse_line("XGPSAerofly FS 4,-122.5,45.5,3048.0,270.5,54.3\r\n", None);

        let TelemetryRecord::Position(p) = record else {
            panic!("expected position");
        };
        assert_eq!(p.sim_name(), "Aerofly FS 4");
        assert!((p.longitude() - (-122.5)).abs() < 1e-9);
        assert!((p.latitude() - 45.5).abs() < 1e-9);
        assert!((p.altitude_msl() - 3048.0).abs() < 1e-9);
        assert!((p.track() - 270.5).abs() < 1e-9);
        assert!((p.ground_speed() - 54.3).abs() < 1e-9);
    }

    #[test]
    fn test_parse_xgps_ignores_extra_fields() {
        let record = parse_line("XGPSSim,1.0,2.0,3.0,4.0,5.0,6.0,7.0", None);
        assert!(matches!(record, TelemetryRecord::Position(_)));
    }

    #[test]
    fn test_parse_xgps_too_short() {
        let record = parse_line("XGPSSim,1,2", None);
        assert_unrecognized(&record, "XGPSSim,1,2");
    }

    #[test]
    fn test_parse_xgps_non_numeric() {
        let record = parse_line("XGPSSim,east,2,3,4,5", None);
        assert_unrecognized(&record, "XGPSSim,east,2,3,4,5");
    }

    #[test]
    fn test_parse_xgps_out_of_range_is_unrecognized() {
        assert_unrecognized(
            &parse_line("XGPSSim,190.0,0,0,0,0", None),
            "XGPSSim,190.0,0,0,0,0",
        );
        assert_unrecognized(&parse_line("XGPSSim,0,-91,0,0,0", None), "XGPSSim,0,-91,0,0,0");
        assert_unrecognized(&parse_line("XGPSSim,0,0,0,400,0", None), "XGPSSim,0,0,0,400,0");
        assert_unrecognized(&parse_line("XGPSSim,0,0,0,0,-3", None), "XGPSSim,0,0,0,0,-3");
    }

    // ==================== XATT tests ====================

    #[test]
    fn test_parse_xatt() {
        let record = parse_line("XATTSim,180.5,15.3,-5.7", None);

        let TelemetryRecord::Attitude(a) = record else {
            panic!("expected attitude");
        };
        assert_eq!(a.sim_name(), "Sim");
        assert!((a.heading() - 180.5).abs() < 1e-9);
        assert!((a.pitch() - 15.3).abs() < 1e-9);
        assert!((a.roll() - (-5.7)).abs() < 1e-9);
    }

    #[test]
    fn test_parse_xatt_too_short() {
        assert_unrecognized(&parse_line("XATTSim,45.5,5.2", None), "XATTSim,45.5,5.2");
    }

    #[test]
    fn test_parse_xatt_out_of_range() {
        assert_unrecognized(&parse_line("XATTSim,0,95,0", None), "XATTSim,0,95,0");
    }

    // ==================== General tests ====================

    #[test]
    fn test_parse_invalid_and_empty() {
        assert_unrecognized(&parse_line("INVALID", None), "INVALID");
        assert_unrecognized(&parse_line("", None), "");
        assert_unrecognized(&parse_line("   \n", None), "");
    }

    #[test]
    fn test_parse_uses_supplied_timestamp() {
        let ts = Utc::now() - chrono::Duration::seconds(30);
        let record = parse_line("XATTSim,1,2,3", Some(ts));
        assert_eq!(record.timestamp(), ts);

        let record = parse_line("garbage", Some(ts));
        assert_eq!(record.timestamp(), ts);
    }

    #[test]
    fn test_parse_datagram_lossy_decoding() {
        let record = parse_datagram(b"XATTSim,1,2,3", None);
        assert!(matches!(record, TelemetryRecord::Attitude(_)));

        let record = parse_datagram(b"\xff\xfeXGPS", None);
        assert!(matches!(record, TelemetryRecord::Unrecognized(_)));
    }
}

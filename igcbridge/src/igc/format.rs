//! IGC record encoding.
//!
//! Produces the text lines of an IGC flight log:
//!
//! - `A` - manufacturer and logger id
//! - `H` - header fields (date, pilot, glider, datum, recorder type)
//! - `I` - fix extension declaration (`FXA` and `ENL`)
//! - `B` - one position fix
//! - `L` - free-text comments
//!
//! All functions are pure; file handling lives in the writer.

use chrono::{DateTime, Local, NaiveDate};

use crate::telemetry::PositionSample;

/// IGC manufacturer code for simulator-generated logs.
pub const MANUFACTURER_CODE: &str = "XAF";

/// Logger id used in the `A` record.
pub const LOGGER_ID: &str = "SIM";

/// File extension for flight logs.
pub const IGC_EXTENSION: &str = "igc";

/// Synthetic fix clock origin (12:00:00).
pub const CLOCK_ORIGIN_SECS: u32 = 12 * 3600;

const SECONDS_PER_DAY: u32 = 24 * 3600;

/// Fix accuracy written to the header and to every `FXA` extension (meters).
pub const FIX_ACCURACY_M: u32 = 50;

/// Engine noise level written to every `ENL` extension.
pub const ENGINE_NOISE_LEVEL: u32 = 0;

/// I record: two extensions, FXA in bytes 36-38 and ENL in bytes 39-41.
pub const EXTENSIONS_RECORD: &str = "I023638FXA3941ENL";

/// Values written into the header block of a new log.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightHeader {
    /// UTC date of the flight.
    pub date: NaiveDate,
    pub pilot: String,
    pub glider_type: String,
    pub glider_id: String,
    pub competition_class: Option<String>,
    pub recorder_type: String,
    pub gps_receiver: String,
    pub firmware_version: String,
    pub hardware_version: String,
}

impl FlightHeader {
    pub fn new(
        date: NaiveDate,
        pilot: impl Into<String>,
        glider_type: impl Into<String>,
        glider_id: impl Into<String>,
    ) -> Self {
        Self {
            date,
            pilot: pilot.into(),
            glider_type: glider_type.into(),
            glider_id: glider_id.into(),
            competition_class: None,
            recorder_type: "Aerofly FS4 Simulator".to_string(),
            gps_receiver: "SIMULATOR".to_string(),
            firmware_version: "1.0".to_string(),
            hardware_version: "1.0".to_string(),
        }
    }

    pub fn with_competition_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        self.competition_class = (!class.trim().is_empty()).then_some(class);
        self
    }
}

/// `A` record identifying the recorder.
pub fn a_record() -> String {
    format!("A{}{}", MANUFACTURER_CODE, LOGGER_ID)
}

/// All header lines (`A`, `H`, `I` and provenance `L` records), in file order.
pub fn header_lines(header: &FlightHeader) -> Vec<String> {
    let mut lines = vec![
        a_record(),
        format!("HFDTEDATE:{}", header.date.format("%d%m%y")),
        format!("HFFXA{:03}", FIX_ACCURACY_M),
        format!("HFPLTPILOTINCHARGE:{}", sanitize(&header.pilot)),
        format!("HFGTYGLIDERTYPE:{}", sanitize(&header.glider_type)),
        format!("HFGIDGLIDERID:{}", sanitize(&header.glider_id)),
        "HFDTMGPSDATUM:WGS-1984".to_string(),
        format!("HFRFWFIRMWAREVERSION:{}", sanitize(&header.firmware_version)),
        format!("HFRHWHARDWAREVERSION:{}", sanitize(&header.hardware_version)),
        format!("HFFTYFRTYPE:{}", sanitize(&header.recorder_type)),
        format!("HFGPSRECEIVER:{}", sanitize(&header.gps_receiver)),
    ];
    if let Some(class) = &header.competition_class {
        lines.push(format!("HFCCLCOMPETITIONCLASS:{}", sanitize(class)));
    }
    lines.push(EXTENSIONS_RECORD.to_string());
    lines.push(comment("GEN", "Generated by igcbridge"));
    lines.push(comment(
        "SIM",
        &format!("Flight recorded in {}", sanitize(&header.recorder_type)),
    ));
    lines
}

/// `L` comment record with a three-letter source code.
pub fn comment(code: &str, text: &str) -> String {
    format!("L{} {}", code, sanitize(text))
}

/// Closing comment written when a recording stops.
pub fn end_comment(end_time: DateTime<chrono::Utc>) -> String {
    comment(
        "END",
        &format!("Recording ended at {}", end_time.format("%H:%M:%S")),
    )
}

/// Time of day for the `n`th fix of a session: 12:00:00 plus `n` seconds,
/// wrapping at midnight.
pub fn synthetic_time_of_day(fix_seconds: u64) -> u32 {
    ((CLOCK_ORIGIN_SECS as u64 + fix_seconds) % SECONDS_PER_DAY as u64) as u32
}

/// `HHMMSS` for a number of seconds since midnight.
pub fn format_time(seconds_of_day: u32) -> String {
    let s = seconds_of_day % SECONDS_PER_DAY;
    format!("{:02}{:02}{:02}", s / 3600, (s / 60) % 60, s % 60)
}

/// Latitude as `DDMMmmmN` / `DDMMmmmS`.
pub fn format_latitude(latitude: f64) -> String {
    let hemisphere = if latitude < 0.0 { 'S' } else { 'N' };
    let (degrees, milliminutes) = split_degrees(latitude);
    format!("{:02}{:05}{}", degrees, milliminutes, hemisphere)
}

/// Longitude as `DDDMMmmmE` / `DDDMMmmmW`.
pub fn format_longitude(longitude: f64) -> String {
    let hemisphere = if longitude < 0.0 { 'W' } else { 'E' };
    let (degrees, milliminutes) = split_degrees(longitude);
    format!("{:03}{:05}{}", degrees, milliminutes, hemisphere)
}

/// Whole degrees and thousandths of minutes, rounding once on the total so
/// that 59.9995' carries into the next degree.
fn split_degrees(value: f64) -> (u64, u64) {
    let total = (value.abs() * 60_000.0).round() as u64;
    (total / 60_000, total % 60_000)
}

/// Five-character altitude field in whole meters (truncated).
pub fn format_altitude(altitude: f64) -> String {
    let meters = altitude.trunc() as i64;
    if meters < 0 {
        format!("-{:04}", (-meters).min(9999))
    } else {
        format!("{:05}", meters.min(99_999))
    }
}

/// `B` record for one fix.
///
/// Pressure altitude and GPS altitude are both the MSL altitude; the fix is
/// always marked valid (`A`).
pub fn b_record(seconds_of_day: u32, position: &PositionSample) -> String {
    let altitude = format_altitude(position.altitude_msl());
    format!(
        "B{}{}{}A{}{}{:03}{:03}",
        format_time(seconds_of_day),
        format_latitude(position.latitude()),
        format_longitude(position.longitude()),
        altitude,
        altitude,
        FIX_ACCURACY_M,
        ENGINE_NOISE_LEVEL,
    )
}

/// `<prefix>_<YYYYMMDD>_<HHMMSS>.igc`, with `_<n>` before the extension for
/// collision attempts after the first.
pub fn log_filename(prefix: &str, time: &DateTime<Local>, attempt: u32) -> String {
    let stem = format!("{}_{}", prefix, time.format("%Y%m%d_%H%M%S"));
    if attempt == 0 {
        format!("{}.{}", stem, IGC_EXTENSION)
    } else {
        format!("{}_{}.{}", stem, attempt, IGC_EXTENSION)
    }
}

/// IGC lines are CRLF-terminated ASCII; keep header values on one line.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

//! Typed telemetry samples.
//!
//! Every decoded datagram becomes one of the variants of [`TelemetryRecord`]:
//!
//! - [`PositionSample`] - an `XGPS` fix (position, altitude, track, speed)
//! - [`AttitudeSample`] - an `XATT` reading (heading, pitch, roll)
//! - [`UnrecognizedLine`] - anything else, kept verbatim
//!
//! Samples are validated on construction and immutable afterwards, so holding
//! a `PositionSample` is proof that its values are within range.
//!
//! Records convert to and from a structured payload ([`serde_json::Value`])
//! so they can travel inside events without losing precision.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Payload tag for position records.
pub const TYPE_POSITION: &str = "XGPS";

/// Payload tag for attitude records.
pub const TYPE_ATTITUDE: &str = "XATT";

/// Payload tag for unrecognized lines.
pub const TYPE_UNRECOGNIZED: &str = "UNKNOWN";

/// A sample value violated its allowed range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },
}

fn check_finite(field: &'static str, value: f64) -> Result<f64, SampleError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SampleError::NotFinite { field, value })
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, SampleError> {
    let value = check_finite(field, value)?;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(SampleError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// A GPS fix reported by the simulator (`XGPS` line).
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    sim_name: String,
    longitude: f64,
    latitude: f64,
    altitude_msl: f64,
    track: f64,
    ground_speed: f64,
    timestamp: DateTime<Utc>,
}

impl PositionSample {
    /// Build a validated position sample.
    ///
    /// A missing timestamp is replaced with the current UTC time.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError`] if longitude is outside [-180, 180], latitude
    /// outside [-90, 90], track outside [0, 360], ground speed is negative,
    /// or any value is not finite.
    pub fn new(
        sim_name: impl Into<String>,
        longitude: f64,
        latitude: f64,
        altitude_msl: f64,
        track: f64,
        ground_speed: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self, SampleError> {
        let longitude = check_range("longitude", longitude, -180.0, 180.0)?;
        let latitude = check_range("latitude", latitude, -90.0, 90.0)?;
        let altitude_msl = check_finite("altitude", altitude_msl)?;
        let track = check_range("track", track, 0.0, 360.0)?;
        let ground_speed = check_finite("ground speed", ground_speed)?;
        if ground_speed < 0.0 {
            return Err(SampleError::Negative {
                field: "ground speed",
                value: ground_speed,
            });
        }

        Ok(Self {
            sim_name: sim_name.into(),
            longitude,
            latitude,
            altitude_msl,
            track,
            ground_speed,
            timestamp: timestamp.unwrap_or_else(Utc::now),
        })
    }

    pub fn sim_name(&self) -> &str {
        &self.sim_name
    }

    /// Longitude in degrees, east positive.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Latitude in degrees, north positive.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Altitude above mean sea level in meters.
    pub fn altitude_msl(&self) -> f64 {
        self.altitude_msl
    }

    /// Ground track in degrees true.
    pub fn track(&self) -> f64 {
        self.track
    }

    /// Ground speed in meters per second.
    pub fn ground_speed(&self) -> f64 {
        self.ground_speed
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl std::fmt::Display for PositionSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.5}, {:.5} @ {:.0}m, trk {:.0}°, {:.1}m/s",
            self.latitude, self.longitude, self.altitude_msl, self.track, self.ground_speed
        )
    }
}

/// An attitude reading reported by the simulator (`XATT` line).
#[derive(Debug, Clone, PartialEq)]
pub struct AttitudeSample {
    sim_name: String,
    heading: f64,
    pitch: f64,
    roll: f64,
    timestamp: DateTime<Utc>,
}

impl AttitudeSample {
    /// Build a validated attitude sample.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError`] if heading is outside [0, 360], pitch outside
    /// [-90, 90], roll outside [-180, 180], or any value is not finite.
    pub fn new(
        sim_name: impl Into<String>,
        heading: f64,
        pitch: f64,
        roll: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self, SampleError> {
        Ok(Self {
            sim_name: sim_name.into(),
            heading: check_range("heading", heading, 0.0, 360.0)?,
            pitch: check_range("pitch", pitch, -90.0, 90.0)?,
            roll: check_range("roll", roll, -180.0, 180.0)?,
            timestamp: timestamp.unwrap_or_else(Utc::now),
        })
    }

    pub fn sim_name(&self) -> &str {
        &self.sim_name
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn roll(&self) -> f64 {
        self.roll
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl std::fmt::Display for AttitudeSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hdg {:.0}°, pitch {:.1}°, roll {:.1}°",
            self.heading, self.pitch, self.roll
        )
    }
}

/// A line that is not a well-formed position or attitude report.
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognizedLine {
    raw: String,
    timestamp: DateTime<Utc>,
}

impl UnrecognizedLine {
    pub fn new(raw: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            raw: raw.into(),
            timestamp: timestamp.unwrap_or_else(Utc::now),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One decoded telemetry line.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRecord {
    Position(PositionSample),
    Attitude(AttitudeSample),
    Unrecognized(UnrecognizedLine),
}

impl TelemetryRecord {
    /// Payload type tag (`XGPS`, `XATT` or `UNKNOWN`).
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Position(_) => TYPE_POSITION,
            Self::Attitude(_) => TYPE_ATTITUDE,
            Self::Unrecognized(_) => TYPE_UNRECOGNIZED,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Position(p) => p.timestamp(),
            Self::Attitude(a) => a.timestamp(),
            Self::Unrecognized(u) => u.timestamp(),
        }
    }

    /// Convert to the structured payload carried by `DataReceived` events.
    pub fn to_value(&self) -> Value {
        let timestamp = self.timestamp().to_rfc3339();
        match self {
            Self::Position(p) => json!({
                "type": TYPE_POSITION,
                "sim_name": p.sim_name,
                "longitude": p.longitude,
                "latitude": p.latitude,
                "alt_msl_meters": p.altitude_msl,
                "track_deg": p.track,
                "ground_speed_mps": p.ground_speed,
                "timestamp": timestamp,
            }),
            Self::Attitude(a) => json!({
                "type": TYPE_ATTITUDE,
                "sim_name": a.sim_name,
                "heading_deg": a.heading,
                "pitch_deg": a.pitch,
                "roll_deg": a.roll,
                "timestamp": timestamp,
            }),
            Self::Unrecognized(u) => json!({
                "type": TYPE_UNRECOGNIZED,
                "raw_line": u.raw,
                "timestamp": timestamp,
            }),
        }
    }

    /// Rebuild a record from its structured payload.
    ///
    /// Missing numeric fields read as `0.0` and a missing or malformed
    /// timestamp is replaced with "now". A payload without a known type tag
    /// becomes [`TelemetryRecord::Unrecognized`].
    ///
    /// # Errors
    ///
    /// Returns [`SampleError`] when the payload values fail validation.
    pub fn from_value(value: &Value) -> Result<Self, SampleError> {
        let timestamp = value
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let sim_name = value
            .get("sim_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let number = |key: &str| value.get(key).and_then(Value::as_f64).unwrap_or(0.0);

        match value.get("type").and_then(Value::as_str) {
            Some(TYPE_POSITION) => PositionSample::new(
                sim_name,
                number("longitude"),
                number("latitude"),
                number("alt_msl_meters"),
                number("track_deg"),
                number("ground_speed_mps"),
                timestamp,
            )
            .map(Self::Position),
            Some(TYPE_ATTITUDE) => AttitudeSample::new(
                sim_name,
                number("heading_deg"),
                number("pitch_deg"),
                number("roll_deg"),
                timestamp,
            )
            .map(Self::Attitude),
            _ => {
                let raw = value
                    .get("raw_line")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(Self::Unrecognized(UnrecognizedLine::new(raw, timestamp)))
            }
        }
    }
}

//! Connection state tracked by the telemetry listener.
//!
//! - [`ListenerState`] - lifecycle of the listener
//! - [`ConnectionState`] - mutable cache updated on every datagram
//! - [`ConnectionStatus`] - serialisable snapshot for consumers

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::sample::{AttitudeSample, PositionSample, TelemetryRecord};

/// Listener lifecycle.
///
/// `Failed` lasts while a failed start attempt reports its error, then the
/// listener returns to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Latest telemetry seen by the listener.
#[derive(Debug, Default, Clone)]
pub struct ConnectionState {
    last_receive: Option<Instant>,
    last_receive_time: Option<DateTime<Utc>>,
    latest_position: Option<PositionSample>,
    latest_attitude: Option<AttitudeSample>,
    datagrams_received: u64,
}

impl ConnectionState {
    /// Record one received datagram and its parsed record.
    pub fn observe(&mut self, record: &TelemetryRecord, received_at: Instant) {
        self.last_receive = Some(received_at);
        self.last_receive_time = Some(record.timestamp());
        self.datagrams_received += 1;
        match record {
            TelemetryRecord::Position(p) => self.latest_position = Some(p.clone()),
            TelemetryRecord::Attitude(a) => self.latest_attitude = Some(a.clone()),
            TelemetryRecord::Unrecognized(_) => {}
        }
    }

    /// Whether a datagram arrived within `timeout` of `now`.
    pub fn has_connection(&self, now: Instant, timeout: Duration) -> bool {
        self.last_receive
            .is_some_and(|t| now.saturating_duration_since(t) < timeout)
    }

    pub fn last_receive(&self) -> Option<Instant> {
        self.last_receive
    }

    pub fn latest_position(&self) -> Option<&PositionSample> {
        self.latest_position.as_ref()
    }

    pub fn latest_attitude(&self) -> Option<&AttitudeSample> {
        self.latest_attitude.as_ref()
    }

    pub fn datagrams_received(&self) -> u64 {
        self.datagrams_received
    }
}

/// Position summary included in status snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters MSL.
    pub altitude: f64,
    /// Meters per second.
    pub speed: f64,
    pub track: f64,
}

impl From<&PositionSample> for PositionSummary {
    fn from(p: &PositionSample) -> Self {
        Self {
            latitude: p.latitude(),
            longitude: p.longitude(),
            altitude: p.altitude_msl(),
            speed: p.ground_speed(),
            track: p.track(),
        }
    }
}

/// Attitude summary included in status snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttitudeSummary {
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl From<&AttitudeSample> for AttitudeSummary {
    fn from(a: &AttitudeSample) -> Self {
        Self {
            heading: a.heading(),
            pitch: a.pitch(),
            roll: a.roll(),
        }
    }
}

/// Snapshot of the listener for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub running: bool,
    pub state: ListenerState,
    pub port: u16,
    pub has_connection: bool,
    pub last_data_seconds_ago: Option<f64>,
    pub last_data_time: Option<DateTime<Utc>>,
    pub datagrams_received: u64,
    pub latest_position: Option<PositionSummary>,
    pub latest_attitude: Option<AttitudeSummary>,
}

impl ConnectionStatus {
    pub(crate) fn from_state(
        state: &ConnectionState,
        lifecycle: ListenerState,
        port: u16,
        timeout: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            running: lifecycle == ListenerState::Running,
            state: lifecycle,
            port,
            has_connection: state.has_connection(now, timeout),
            last_data_seconds_ago: state
                .last_receive
                .map(|t| now.saturating_duration_since(t).as_secs_f64()),
            last_data_time: state.last_receive_time,
            datagrams_received: state.datagrams_received,
            latest_position: state.latest_position.as_ref().map(PositionSummary::from),
            latest_attitude: state.latest_attitude.as_ref().map(AttitudeSummary::from),
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let link = if self.has_connection {
            "receiving"
        } else {
            "no data"
        };
        write!(f, "UDP {} on port {} ({})", self.state, self.port, link)?;
        if let Some(p) = &self.latest_position {
            write!(
                f,
                ", last fix {:.5}, {:.5} @ {:.0}m",
                p.latitude, p.longitude, p.altitude
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::parse_line;

    #[test]
    fn test_connection_timeout() {
        let mut state = ConnectionState::default();
        let start = Instant::now();
        assert!(!state.has_connection(start, Duration::from_secs(5)));

        state.observe(&parse_line("INVALID", None), start);
        assert!(state.has_connection(start + Duration::from_secs(4), Duration::from_secs(5)));
        assert!(!state.has_connection(start + Duration::from_secs(5), Duration::from_secs(5)));
    }

    #[test]
    fn test_observe_updates_cache_by_kind() {
        let mut state = ConnectionState::default();
        let now = Instant::now();

        state.observe(&parse_line("XGPSSim,8.5,47.3,1200,90,30", None), now);
        state.observe(&parse_line("XATTSim,91,2,-3", None), now);
        state.observe(&parse_line("noise", None), now);

        assert_eq!(state.datagrams_received(), 3);
        assert_eq!(state.latest_position().map(|p| p.latitude()), Some(47.3));
        assert_eq!(state.latest_attitude().map(|a| a.heading()), Some(91.0));
    }

    #[test]
    fn test_status_snapshot() {
        let mut state = ConnectionState::default();
        state.observe(&parse_line("XGPSSim,8.5,47.3,1200,90,30", None), Instant::now());

        let status =
            ConnectionStatus::from_state(&state, ListenerState::Running, 49002, Duration::from_secs(5));
        assert!(status.running);
        assert!(status.has_connection);
        assert_eq!(status.latest_position.as_ref().map(|p| p.altitude), Some(1200.0));
        assert!(status.latest_attitude.is_none());
        assert!(status.to_string().contains("port 49002"));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["latest_position"]["speed"], 30.0);
    }
}

//! IGC log writer.
//!
//! Owns at most one [`RecordingSession`] at a time behind a single async
//! mutex. Starting a session creates a new, uniquely named file and writes the
//! header block; each accepted fix appends one `B` record and flushes; stopping
//! writes the closing comment and closes the file. A session that ends without
//! fixes leaves no file behind.
//!
//! Fix times come from a synthetic clock starting at 12:00:00 and advancing
//! one second per fix, independent of wall-clock time.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, trace, warn};

use super::format::{
    b_record, end_comment, header_lines, log_filename, synthetic_time_of_day, FlightHeader,
};
use crate::events::{EventBus, EventKind, SOURCE_WRITER};
use crate::telemetry::{AttitudeSample, PositionSample};

/// Default file name prefix.
pub const DEFAULT_FILE_PREFIX: &str = "AEROFLY";

/// Publish `PositionAdded` once per this many fixes.
pub const DEFAULT_POSITION_EVENT_INTERVAL: u32 = 10;

/// Upper bound on `_<n>` suffixes tried for one timestamp.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Default directory for flight logs (`~/Documents/AeroflyIGC`).
pub fn default_output_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Documents")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("AeroflyIGC")
}

/// Errors raised by the IGC writer.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// A session is already open.
    #[error("Already recording to {}", path.display())]
    AlreadyRecording { path: PathBuf },

    /// No session is open.
    #[error("Not recording")]
    NotRecording,

    /// The output directory could not be created.
    #[error("Failed to create output directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading or writing the log file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writer configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Directory new logs are created in.
    pub output_dir: PathBuf,

    /// File name prefix (`<prefix>_<YYYYMMDD>_<HHMMSS>.igc`).
    pub file_prefix: String,

    /// Publish `PositionAdded` every this many fixes (0 disables).
    pub position_event_interval: u32,

    /// Recorder type written to the `HFFTYFRTYPE` header.
    pub recorder_type: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            position_event_interval: DEFAULT_POSITION_EVENT_INTERVAL,
            recorder_type: "Aerofly FS4 Simulator".to_string(),
        }
    }
}

/// Pilot and aircraft details for the header block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingMetadata {
    pub pilot_name: String,
    pub glider_type: String,
    pub glider_id: String,
    pub competition_class: Option<String>,
}

impl Default for RecordingMetadata {
    fn default() -> Self {
        Self {
            pilot_name: "Simulator Pilot".to_string(),
            glider_type: "Aerofly FS4".to_string(),
            glider_id: "SIM".to_string(),
            competition_class: None,
        }
    }
}

impl RecordingMetadata {
    /// Fill empty fields from `defaults`.
    pub fn or_defaults(self, defaults: &RecordingMetadata) -> Self {
        fn pick(value: String, fallback: &str) -> String {
            if value.trim().is_empty() {
                fallback.to_string()
            } else {
                value
            }
        }
        Self {
            pilot_name: pick(self.pilot_name, &defaults.pilot_name),
            glider_type: pick(self.glider_type, &defaults.glider_type),
            glider_id: pick(self.glider_id, &defaults.glider_id),
            competition_class: self
                .competition_class
                .filter(|c| !c.trim().is_empty())
                .or_else(|| defaults.competition_class.clone()),
        }
    }
}

/// An open recording.
#[derive(Debug)]
struct RecordingSession {
    path: PathBuf,
    metadata: RecordingMetadata,
    file: File,
    start_time: DateTime<Utc>,
    started_at: Instant,
    fix_count: u32,
    fix_seconds: u64,
}

/// Result of a completed recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    /// The file written, or `None` when the session had no fixes and the
    /// file was removed.
    pub path: Option<PathBuf>,
    pub fix_count: u32,
    /// Wall-clock duration of the session.
    pub duration: Duration,
}

/// Snapshot of the writer for status displays.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordingStatus {
    pub recording: bool,
    pub fix_count: u32,
    pub filename: Option<String>,
    pub pilot_name: Option<String>,
    pub glider_type: Option<String>,
    pub glider_id: Option<String>,
    pub duration_seconds: Option<f64>,
    pub duration_formatted: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.recording {
            return write!(f, "Not recording");
        }
        write!(
            f,
            "Recording {} ({} fixes, {})",
            self.filename.as_deref().unwrap_or("?"),
            self.fix_count,
            self.duration_formatted.as_deref().unwrap_or("00:00:00")
        )
    }
}

/// Format a duration as `HH:MM:SS`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Writes IGC flight logs, one session at a time.
pub struct IgcWriter {
    config: WriterConfig,
    bus: Arc<EventBus>,
    session: tokio::sync::Mutex<Option<RecordingSession>>,
}

impl IgcWriter {
    pub fn new(config: WriterConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            session: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Open a new log file and write its header.
    ///
    /// # Errors
    ///
    /// - [`WriterError::AlreadyRecording`] if a session is open (it is left
    ///   untouched)
    /// - [`WriterError::CreateDirectory`] / [`WriterError::Io`] if the file
    ///   cannot be created or the header cannot be written; any partial file
    ///   is removed and `ErrorOccurred` is published
    pub async fn start_recording(&self, metadata: RecordingMetadata) -> Result<PathBuf, WriterError> {
        let mut guard = self.session.lock().await;
        if let Some(open) = guard.as_ref() {
            warn!(path = %open.path.display(), "Recording already in progress");
            return Err(WriterError::AlreadyRecording {
                path: open.path.clone(),
            });
        }

        let session = match self.open_session(metadata).await {
            Ok(session) => session,
            Err(e) => {
                drop(guard);
                error!(error = %e, "Failed to start recording");
                self.publish_error(format!("Failed to start recording: {}", e));
                return Err(e);
            }
        };

        let path = session.path.clone();
        let payload = json!({
            "filename": path.display().to_string(),
            "pilot_name": session.metadata.pilot_name,
            "glider_type": session.metadata.glider_type,
            "glider_id": session.metadata.glider_id,
            "start_time": session.start_time.to_rfc3339(),
        });
        *guard = Some(session);
        drop(guard);

        info!(path = %path.display(), "Recording started");
        self.bus
            .emit(EventKind::RecordingStarted, SOURCE_WRITER, payload);
        Ok(path)
    }

    async fn open_session(&self, metadata: RecordingMetadata) -> Result<RecordingSession, WriterError> {
        let dir = &self.config.output_dir;
        fs::create_dir_all(dir)
            .await
            .map_err(|source| WriterError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;

        let start_time = Utc::now();
        let (path, mut file) = self.create_unique_file(&start_time.with_timezone(&Local)).await?;

        let mut header = FlightHeader::new(
            start_time.date_naive(),
            metadata.pilot_name.as_str(),
            metadata.glider_type.as_str(),
            metadata.glider_id.as_str(),
        );
        if let Some(class) = &metadata.competition_class {
            header = header.with_competition_class(class.as_str());
        }
        header.recorder_type = self.config.recorder_type.clone();

        let mut text = String::new();
        for line in header_lines(&header) {
            text.push_str(&line);
            text.push_str("\r\n");
        }

        if let Err(source) = write_and_flush(&mut file, &text).await {
            drop(file);
            remove_partial(&path).await;
            return Err(WriterError::Io { path, source });
        }

        debug!(path = %path.display(), "IGC header written");
        Ok(RecordingSession {
            path,
            metadata,
            file,
            start_time,
            started_at: Instant::now(),
            fix_count: 0,
            fix_seconds: 0,
        })
    }

    /// Exclusively create the first free `<prefix>_<date>_<time>[_n].igc`.
    async fn create_unique_file(&self, now: &DateTime<Local>) -> Result<(PathBuf, File), WriterError> {
        let mut last_path = self.config.output_dir.clone();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self
                .config
                .output_dir
                .join(log_filename(&self.config.file_prefix, now, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "Log file name taken, trying next suffix");
                    last_path = path;
                }
                Err(source) => return Err(WriterError::Io { path, source }),
            }
        }
        Err(WriterError::Io {
            path: last_path,
            source: io::Error::new(io::ErrorKind::AlreadyExists, "no free log file name"),
        })
    }

    /// Append one fix to the open session.
    ///
    /// Returns the new fix count.
    ///
    /// # Errors
    ///
    /// - [`WriterError::NotRecording`] if no session is open
    /// - [`WriterError::Io`] if the write fails; the session stays open and
    ///   `ErrorOccurred` is published
    pub async fn add_position(
        &self,
        position: &PositionSample,
        attitude: Option<&AttitudeSample>,
    ) -> Result<u32, WriterError> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Err(WriterError::NotRecording);
        };

        session.fix_seconds += 1;
        let line = b_record(synthetic_time_of_day(session.fix_seconds), position);
        if let Err(source) = write_and_flush(&mut session.file, &format!("{}\r\n", line)).await {
            let path = session.path.clone();
            drop(guard);
            error!(path = %path.display(), error = %source, "Failed to write fix");
            self.publish_error(format!("Error adding position: {}", source));
            return Err(WriterError::Io { path, source });
        }

        session.fix_count += 1;
        let fix_count = session.fix_count;
        drop(guard);

        trace!(
            fix_count,
            lat = position.latitude(),
            lon = position.longitude(),
            heading = attitude.map(AttitudeSample::heading),
            "Fix written"
        );

        let every = self.config.position_event_interval;
        if every > 0 && fix_count % every == 0 {
            self.bus.emit(
                EventKind::PositionAdded,
                SOURCE_WRITER,
                json!({
                    "fix_count": fix_count,
                    "position": {
                        "lat": position.latitude(),
                        "lon": position.longitude(),
                        "alt": position.altitude_msl().trunc() as i64,
                    },
                }),
            );
        }

        Ok(fix_count)
    }

    /// Close the open session.
    ///
    /// A session with no fixes has its file removed and the summary carries
    /// no path. The writer is idle afterwards in every case, including when
    /// closing the file fails.
    pub async fn stop_recording(&self) -> Result<RecordingSummary, WriterError> {
        let mut guard = self.session.lock().await;
        let Some(mut session) = guard.take() else {
            warn!("Stop requested but not recording");
            return Err(WriterError::NotRecording);
        };

        let end_time = Utc::now();
        let duration = session.started_at.elapsed();
        let close_result = finish_file(&mut session.file, end_time).await;
        let RecordingSession {
            path,
            fix_count,
            file,
            ..
        } = session;
        drop(file);

        if fix_count == 0 {
            remove_partial(&path).await;
            drop(guard);
            info!(path = %path.display(), "Recording stopped without fixes, file removed");
            self.bus.emit(
                EventKind::RecordingStopped,
                SOURCE_WRITER,
                json!({
                    "filename": Value::Null,
                    "fix_count": 0,
                    "message": "No positions recorded, file deleted",
                }),
            );
            return Ok(RecordingSummary {
                path: None,
                fix_count: 0,
                duration,
            });
        }

        drop(guard);

        if let Err(source) = close_result {
            error!(path = %path.display(), error = %source, "Failed to close log file");
            self.publish_error(format!("Error stopping recording: {}", source));
            return Err(WriterError::Io { path, source });
        }

        info!(
            path = %path.display(),
            fix_count,
            duration_secs = duration.as_secs(),
            "Recording stopped"
        );
        self.bus.emit(
            EventKind::RecordingStopped,
            SOURCE_WRITER,
            json!({
                "filename": path.display().to_string(),
                "fix_count": fix_count,
                "duration_seconds": duration.as_secs_f64(),
                "end_time": end_time.to_rfc3339(),
            }),
        );

        Ok(RecordingSummary {
            path: Some(path),
            fix_count,
            duration,
        })
    }

    pub async fn is_recording(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Snapshot for status displays.
    pub async fn status(&self) -> RecordingStatus {
        let guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return RecordingStatus::default();
        };
        let elapsed = session.started_at.elapsed();
        RecordingStatus {
            recording: true,
            fix_count: session.fix_count,
            filename: Some(session.path.display().to_string()),
            pilot_name: Some(session.metadata.pilot_name.clone()),
            glider_type: Some(session.metadata.glider_type.clone()),
            glider_id: Some(session.metadata.glider_id.clone()),
            duration_seconds: Some(elapsed.as_secs_f64()),
            duration_formatted: Some(format_duration(elapsed)),
            start_time: Some(session.start_time),
        }
    }

    fn publish_error(&self, message: String) {
        self.bus.emit(
            EventKind::ErrorOccurred,
            SOURCE_WRITER,
            json!({ "error": message }),
        );
    }
}

async fn write_and_flush(file: &mut File, text: &str) -> io::Result<()> {
    file.write_all(text.as_bytes()).await?;
    file.flush().await
}

async fn finish_file(file: &mut File, end_time: DateTime<Utc>) -> io::Result<()> {
    write_and_flush(file, &format!("{}\r\n", end_comment(end_time))).await?;
    file.sync_all().await
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove log file");
    }
}

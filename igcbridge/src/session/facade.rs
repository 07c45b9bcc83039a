//! Session facade implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::error::SessionError;
use crate::events::{EventBus, EventKind, Handler, SOURCE_SESSION};
use crate::igc::{IgcWriter, RecordingMetadata, RecordingSummary};
use crate::recorder::{FlightRecorder, RecorderStatus};
use crate::telemetry::{ConnectionStatus, TelemetryListener};

/// Settings that can be changed while a session runs.
///
/// `None` leaves a setting unchanged.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub recording_interval: Option<Duration>,
    pub pilot_name: Option<String>,
    pub glider_type: Option<String>,
    pub glider_id: Option<String>,
    pub competition_class: Option<String>,
}

/// Combined status of every component.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub running: bool,
    pub connection: ConnectionStatus,
    pub recorder: RecorderStatus,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Session:    {}", if self.running { "running" } else { "stopped" })?;
        writeln!(f, "Connection: {}", self.connection)?;
        write!(f, "Recording:  {}", self.recorder.writer)?;
        if self.recorder.queue_size > 0 {
            write!(f, " [{} queued]", self.recorder.queue_size)?;
        }
        Ok(())
    }
}

/// High-level entry point wiring listener, recorder and writer together.
///
/// Owns the event bus; every component publishes on the same instance.
pub struct Session {
    bus: Arc<EventBus>,
    listener: TelemetryListener,
    recorder: FlightRecorder,
    default_metadata: RwLock<RecordingMetadata>,
    /// Handlers registered by `start()`; `Some` while running.
    handlers: tokio::sync::Mutex<Option<Vec<(EventKind, Handler)>>>,
    /// Shutdown signal for the current run; replaced by `stop()`.
    shutdown: Mutex<CancellationToken>,
}

impl Session {
    /// Create a session with its own event bus.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_bus(config, Arc::new(EventBus::new()))
    }

    /// Create a session publishing on an existing bus.
    pub fn with_bus(config: SessionConfig, bus: Arc<EventBus>) -> Self {
        let writer = Arc::new(IgcWriter::new(config.writer().clone(), Arc::clone(&bus)));
        let listener = TelemetryListener::new(config.listener().clone(), Arc::clone(&bus));
        let recorder = FlightRecorder::new(config.recorder().clone(), Arc::clone(&bus), writer);
        Self {
            bus,
            listener,
            recorder,
            default_metadata: RwLock::new(config.default_metadata().clone()),
            handlers: tokio::sync::Mutex::new(None),
            shutdown: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn listener(&self) -> &TelemetryListener {
        &self.listener
    }

    pub fn recorder(&self) -> &FlightRecorder {
        &self.recorder
    }

    pub async fn is_running(&self) -> bool {
        self.handlers.lock().await.is_some()
    }

    /// Start the listener, then the recorder.
    ///
    /// If the recorder cannot start, the listener is stopped again so a
    /// failed start leaves nothing running.
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut handlers = self.handlers.lock().await;
        if handlers.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        self.listener.start().await?;

        if let Err(e) = self.recorder.start().await {
            error!(error = %e, "Failed to start recorder, stopping listener");
            self.listener.stop().await;
            return Err(e.into());
        }

        *handlers = Some(self.subscribe_handlers());
        info!(
            addr = ?self.listener.local_addr(),
            "Session started"
        );
        Ok(())
    }

    /// Stop the recorder (closing any open recording), then the listener.
    ///
    /// A fresh shutdown token is installed so the session can be started
    /// again.
    pub async fn stop(&self) {
        let Some(handlers) = self.handlers.lock().await.take() else {
            return;
        };

        self.recorder.stop().await;
        self.listener.stop().await;

        for (kind, handler) in &handlers {
            self.bus.unsubscribe(*kind, handler);
        }
        *self.shutdown.lock() = CancellationToken::new();
        info!("Session stopped");
    }

    /// Begin a recording. Empty metadata fields fall back to the configured
    /// defaults; `None` uses the defaults entirely.
    pub async fn start_recording(
        &self,
        metadata: Option<RecordingMetadata>,
    ) -> Result<PathBuf, SessionError> {
        let handlers = self.handlers.lock().await;
        if handlers.is_none() {
            warn!("Cannot start recording: session not running");
            return Err(SessionError::NotRunning);
        }

        let defaults = self.default_metadata.read().clone();
        let metadata = metadata.map_or_else(|| defaults.clone(), |m| m.or_defaults(&defaults));
        Ok(self.recorder.start_recording(metadata).await?)
    }

    /// End the current recording.
    pub async fn stop_recording(&self) -> Result<RecordingSummary, SessionError> {
        let handlers = self.handlers.lock().await;
        if handlers.is_none() {
            warn!("Cannot stop recording: session not running");
            return Err(SessionError::NotRunning);
        }
        Ok(self.recorder.stop_recording().await?)
    }

    /// Snapshot of every component.
    pub async fn status(&self) -> SessionStatus {
        SessionStatus {
            running: self.is_running().await,
            connection: self.listener.connection_status(),
            recorder: self.recorder.status().await,
        }
    }

    /// Cancel the current [`shutdown_token`](Self::shutdown_token) and
    /// publish `ShutdownRequested`.
    ///
    /// A request made before `start()` is kept: the next run starts with
    /// its token already cancelled.
    pub fn request_shutdown(&self) {
        self.shutdown_token().cancel();
        self.bus
            .emit(EventKind::ShutdownRequested, SOURCE_SESSION, json!({}));
    }

    /// Token cancelled when shutdown is requested during the current run.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.lock().clone()
    }

    /// Apply runtime settings and publish `SettingsChanged`.
    pub fn update_settings(&self, update: SettingsUpdate) {
        let mut changed = Map::new();

        if let Some(interval) = update.recording_interval {
            self.recorder.set_recording_interval(interval);
            changed.insert(
                "recording_interval".to_string(),
                json!(interval.as_secs_f64()),
            );
        }

        {
            let mut defaults = self.default_metadata.write();
            if let Some(name) = update.pilot_name {
                changed.insert("default_pilot_name".to_string(), json!(name));
                defaults.pilot_name = name;
            }
            if let Some(glider_type) = update.glider_type {
                changed.insert("default_glider_type".to_string(), json!(glider_type));
                defaults.glider_type = glider_type;
            }
            if let Some(glider_id) = update.glider_id {
                changed.insert("default_glider_id".to_string(), json!(glider_id));
                defaults.glider_id = glider_id;
            }
            if let Some(class) = update.competition_class {
                changed.insert("competition_class".to_string(), json!(class));
                defaults.competition_class = (!class.trim().is_empty()).then_some(class);
            }
        }

        if !changed.is_empty() {
            info!(settings = ?changed.keys().collect::<Vec<_>>(), "Settings changed");
            self.bus.emit(
                EventKind::SettingsChanged,
                SOURCE_SESSION,
                Value::Object(changed),
            );
        }
    }

    pub fn default_metadata(&self) -> RecordingMetadata {
        self.default_metadata.read().clone()
    }

    fn subscribe_handlers(&self) -> Vec<(EventKind, Handler)> {
        let on_error = Handler::sync(|event| {
            let message = event
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            if event.is_critical_error() {
                error!(source = event.source(), error = message, "Pipeline error");
            } else {
                warn!(source = event.source(), error = message, "Error reported");
            }
            Ok(())
        });

        let token = self.shutdown_token();
        let on_shutdown = Handler::sync(move |event| {
            info!(source = event.source(), "Shutdown requested");
            token.cancel();
            Ok(())
        });

        let handlers = vec![
            (EventKind::ErrorOccurred, on_error),
            (EventKind::ShutdownRequested, on_shutdown),
        ];
        for (kind, handler) in &handlers {
            self.bus.subscribe(*kind, handler.clone());
        }
        handlers
    }
}

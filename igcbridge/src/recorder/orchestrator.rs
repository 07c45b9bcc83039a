//! Flight recorder orchestration.
//!
//! Wires the event bus to the IGC writer:
//!
//! ```text
//! DataReceived ──► handler (inline) ──► RateLimiter ──► RecordingQueue
//!                     │                                     │
//!                     ▼                                     ▼
//!               latest samples                      consumer task ──► IgcWriter
//! ```
//!
//! The handler runs synchronously on the publishing task so fixes enter the
//! queue in arrival order. The consumer is the only task that writes fixes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::queue::{
    recording_queue, QueueMessage, QueueReceiver, QueuedFix, RateLimiter, RecordingQueue,
    DEFAULT_RECORDING_INTERVAL,
};
use crate::events::{EventBus, EventKind, Handler, HandlerError};
use crate::igc::{IgcWriter, RecordingMetadata, RecordingStatus, RecordingSummary, WriterError};
use crate::telemetry::{
    AttitudeSample, AttitudeSummary, PositionSample, PositionSummary, TelemetryRecord,
};

/// Recorder configuration.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Minimum spacing between recorded fixes.
    pub recording_interval: Duration,

    /// Pause after each written fix so the consumer yields to other tasks.
    pub consumer_yield: Duration,

    /// How long `stop()` waits for the consumer to catch up before draining
    /// the rest inline. `stop_recording()` always waits for the full queue.
    pub flush_timeout: Duration,

    /// How long `stop()` waits for the consumer task to exit.
    pub shutdown_timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            recording_interval: DEFAULT_RECORDING_INTERVAL,
            consumer_yield: Duration::from_millis(10),
            flush_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// Recorder errors.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Recorder is not running")]
    NotRunning,

    #[error("Recorder is already running")]
    AlreadyRunning,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error(transparent)]
    Writer(#[from] WriterError),
}

/// Snapshot of the recorder for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct RecorderStatus {
    pub running: bool,
    pub recording: bool,
    pub queue_size: usize,
    pub recording_interval_secs: f64,
    pub writer: RecordingStatus,
    pub latest_position: Option<PositionSummary>,
    pub latest_attitude: Option<AttitudeSummary>,
}

/// State shared between the recorder and its event handler.
#[derive(Debug)]
struct SharedState {
    recording: AtomicBool,
    limiter: Mutex<RateLimiter>,
    latest_position: RwLock<Option<PositionSample>>,
    latest_attitude: RwLock<Option<AttitudeSample>>,
}

impl SharedState {
    /// Update the sample cache and enqueue admitted positions.
    fn on_record(&self, record: TelemetryRecord, queue: &RecordingQueue, now: Instant) {
        match record {
            TelemetryRecord::Position(position) => {
                *self.latest_position.write() = Some(position.clone());
                if self.recording.load(Ordering::SeqCst) && self.limiter.lock().admit(now) {
                    let attitude = self.latest_attitude.read().clone();
                    if !queue.push(QueuedFix { position, attitude }) {
                        warn!("Recording queue closed, dropping fix");
                    }
                }
            }
            TelemetryRecord::Attitude(attitude) => {
                *self.latest_attitude.write() = Some(attitude);
            }
            TelemetryRecord::Unrecognized(_) => {}
        }
    }
}

/// A running consumer and the handler feeding it.
struct ConsumerTask {
    cancel: CancellationToken,
    handle: JoinHandle<QueueReceiver>,
    handler: Handler,
    queue: RecordingQueue,
}

/// Turns `DataReceived` events into IGC fixes at a fixed cadence.
pub struct FlightRecorder {
    config: RecorderConfig,
    bus: Arc<EventBus>,
    writer: Arc<IgcWriter>,
    shared: Arc<SharedState>,
    task: tokio::sync::Mutex<Option<ConsumerTask>>,
}

impl FlightRecorder {
    pub fn new(config: RecorderConfig, bus: Arc<EventBus>, writer: Arc<IgcWriter>) -> Self {
        let shared = Arc::new(SharedState {
            recording: AtomicBool::new(false),
            limiter: Mutex::new(RateLimiter::new(config.recording_interval)),
            latest_position: RwLock::new(None),
            latest_attitude: RwLock::new(None),
        });
        Self {
            config,
            bus,
            writer,
            shared,
            task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn writer(&self) -> &Arc<IgcWriter> {
        &self.writer
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::SeqCst)
    }

    pub fn recording_interval(&self) -> Duration {
        self.shared.limiter.lock().interval()
    }

    /// Change the recording cadence; takes effect with the next sample.
    pub fn set_recording_interval(&self, interval: Duration) {
        self.shared.limiter.lock().set_interval(interval);
        info!(interval_secs = interval.as_secs_f64(), "Recording interval changed");
    }

    pub fn latest_position(&self) -> Option<PositionSample> {
        self.shared.latest_position.read().clone()
    }

    pub fn latest_attitude(&self) -> Option<AttitudeSample> {
        self.shared.latest_attitude.read().clone()
    }

    /// Subscribe to telemetry and spawn the queue consumer.
    pub async fn start(&self) -> Result<(), RecorderError> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!("Flight recorder already running");
            return Err(RecorderError::AlreadyRunning);
        }

        let (queue, receiver) = recording_queue();
        let handler = data_handler(Arc::clone(&self.shared), queue.clone());
        self.bus.subscribe(EventKind::DataReceived, handler.clone());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(consume(
            receiver,
            Arc::clone(&self.writer),
            cancel.clone(),
            self.config.consumer_yield,
        ));

        *task = Some(ConsumerTask {
            cancel,
            handle,
            handler,
            queue,
        });

        info!(
            interval_secs = self.recording_interval().as_secs_f64(),
            "Flight recorder started"
        );
        Ok(())
    }

    /// Open a new IGC session and begin admitting fixes.
    pub async fn start_recording(
        &self,
        metadata: RecordingMetadata,
    ) -> Result<PathBuf, RecorderError> {
        let task = self.task.lock().await;
        if task.is_none() {
            warn!("Cannot start recording: recorder not running");
            return Err(RecorderError::NotRunning);
        }
        if self.is_recording() {
            warn!("Cannot start recording: already recording");
            return Err(RecorderError::AlreadyRecording);
        }

        self.shared.limiter.lock().reset();
        let path = self.writer.start_recording(metadata).await?;
        self.shared.recording.store(true, Ordering::SeqCst);
        Ok(path)
    }

    /// Stop admitting fixes, write everything queued, and close the session.
    pub async fn stop_recording(&self) -> Result<RecordingSummary, RecorderError> {
        let task = self.task.lock().await;
        let Some(task) = task.as_ref() else {
            warn!("Cannot stop recording: recorder not running");
            return Err(RecorderError::NotRunning);
        };
        if !self.shared.recording.swap(false, Ordering::SeqCst) {
            warn!("Cannot stop recording: not recording");
            return Err(RecorderError::NotRecording);
        }

        self.flush(&task.queue, None).await;
        Ok(self.writer.stop_recording().await?)
    }

    /// Stop the consumer, write any leftover fixes, and close an open session.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            debug!("Flight recorder not running");
            return;
        };

        self.shared.recording.store(false, Ordering::SeqCst);
        self.flush(&task.queue, Some(self.config.flush_timeout)).await;

        task.cancel.cancel();
        let mut handle = task.handle;
        let receiver = match tokio::time::timeout(self.config.shutdown_timeout, &mut handle).await {
            Ok(Ok(receiver)) => Some(receiver),
            Ok(Err(e)) => {
                warn!(error = %e, "Recording consumer ended abnormally");
                None
            }
            Err(_) => {
                warn!("Recording consumer did not stop in time, aborting");
                handle.abort();
                None
            }
        };

        if let Some(mut receiver) = receiver {
            let mut drained = 0usize;
            while let Some(message) = receiver.try_recv() {
                match message {
                    QueueMessage::Fix(fix) => {
                        write_fix(&self.writer, fix).await;
                        drained += 1;
                    }
                    QueueMessage::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            if drained > 0 {
                debug!(drained, "Wrote queued fixes during shutdown");
            }
        }

        self.bus.unsubscribe(EventKind::DataReceived, &task.handler);

        if self.writer.is_recording().await {
            match self.writer.stop_recording().await {
                Ok(summary) => info!(
                    fix_count = summary.fix_count,
                    "Recording closed during shutdown"
                ),
                Err(e) => warn!(error = %e, "Failed to close recording during shutdown"),
            }
        }

        info!("Flight recorder stopped");
    }

    /// Snapshot for status displays.
    pub async fn status(&self) -> RecorderStatus {
        let (running, queue_size) = {
            let task = self.task.lock().await;
            (
                task.is_some(),
                task.as_ref().map_or(0, |t| t.queue.depth()),
            )
        };
        RecorderStatus {
            running,
            recording: self.is_recording(),
            queue_size,
            recording_interval_secs: self.recording_interval().as_secs_f64(),
            writer: self.writer.status().await,
            latest_position: self.shared.latest_position.read().as_ref().map(PositionSummary::from),
            latest_attitude: self.shared.latest_attitude.read().as_ref().map(AttitudeSummary::from),
        }
    }

    /// Wait until every fix queued so far has been handed to the writer.
    ///
    /// With no limit this returns once the consumer acknowledges the barrier
    /// or exits, whichever comes first.
    async fn flush(&self, queue: &RecordingQueue, limit: Option<Duration>) {
        let Some(ack) = queue.flush() else {
            return;
        };
        let acked = match limit {
            Some(limit) => match tokio::time::timeout(limit, ack).await {
                Ok(acked) => acked,
                Err(_) => {
                    warn!(
                        pending = queue.depth(),
                        "Timed out waiting for queued fixes to be written"
                    );
                    return;
                }
            },
            None => ack.await,
        };
        if acked.is_err() {
            debug!("Recording consumer exited before flush");
        }
    }
}

/// Build the inline `DataReceived` handler.
fn data_handler(shared: Arc<SharedState>, queue: RecordingQueue) -> Handler {
    Handler::sync(move |event| {
        let data = event
            .get("data")
            .ok_or_else(|| HandlerError::new("DataReceived event without data"))?;
        let record =
            TelemetryRecord::from_value(data).map_err(|e| HandlerError::new(e.to_string()))?;
        shared.on_record(record, &queue, Instant::now());
        Ok(())
    })
}

/// Queue consumer. Returns the receiver so leftovers can be drained.
async fn consume(
    mut receiver: QueueReceiver,
    writer: Arc<IgcWriter>,
    cancel: CancellationToken,
    yield_interval: Duration,
) -> QueueReceiver {
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = receiver.recv() => message,
        };

        match message {
            Some(QueueMessage::Fix(fix)) => {
                write_fix(&writer, fix).await;
                if !yield_interval.is_zero() {
                    tokio::time::sleep(yield_interval).await;
                }
            }
            Some(QueueMessage::Flush(ack)) => {
                let _ = ack.send(());
            }
            None => break,
        }
    }
    receiver
}

async fn write_fix(writer: &IgcWriter, fix: QueuedFix) {
    match writer.add_position(&fix.position, fix.attitude.as_ref()).await {
        Ok(_) => {}
        Err(WriterError::NotRecording) => debug!("No open session, dropping fix"),
        Err(e) => warn!(error = %e, "Failed to record fix"),
    }
}

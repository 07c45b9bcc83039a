//! Recording queue and rate limiter.
//!
//! Telemetry can arrive at any rate; fixes are recorded at a fixed cadence.
//! The [`RateLimiter`] decides which positions are admitted, and the
//! [`RecordingQueue`] carries admitted fixes, in order, to the single
//! consumer task that writes them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};

use crate::telemetry::{AttitudeSample, PositionSample};

/// Default recording interval.
pub const DEFAULT_RECORDING_INTERVAL: Duration = Duration::from_secs(1);

/// Admits at most one sample per interval, measured on the arrival clock.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_admitted: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_admitted: None,
        }
    }

    /// Admit a sample arriving at `now`.
    ///
    /// The first sample after construction or [`reset`](Self::reset) is
    /// always admitted; later ones only once `interval` has passed since the
    /// last admission.
    pub fn admit(&mut self, now: Instant) -> bool {
        let admitted = match self.last_admitted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if admitted {
            self.last_admitted = Some(now);
        }
        admitted
    }

    /// Forget the last admission (start of a new session).
    pub fn reset(&mut self) {
        self.last_admitted = None;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDING_INTERVAL)
    }
}

/// A position admitted for recording, with the attitude current at the time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedFix {
    pub position: PositionSample,
    pub attitude: Option<AttitudeSample>,
}

/// Messages carried to the consumer.
#[derive(Debug)]
pub enum QueueMessage {
    Fix(QueuedFix),
    /// Acknowledged once every message queued before it has been handled.
    Flush(oneshot::Sender<()>),
}

/// Producer side of the recording queue.
///
/// Unbounded: pushing never blocks the telemetry path.
#[derive(Debug, Clone)]
pub struct RecordingQueue {
    tx: mpsc::UnboundedSender<QueueMessage>,
    depth: Arc<AtomicUsize>,
}

/// Consumer side of the recording queue.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<QueueMessage>,
    depth: Arc<AtomicUsize>,
}

/// Create a connected queue pair.
pub fn recording_queue() -> (RecordingQueue, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        RecordingQueue {
            tx,
            depth: Arc::clone(&depth),
        },
        QueueReceiver { rx, depth },
    )
}

impl RecordingQueue {
    /// Enqueue a fix. Returns `false` if the consumer is gone.
    pub fn push(&self, fix: QueuedFix) -> bool {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(QueueMessage::Fix(fix)).is_ok() {
            true
        } else {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    /// Enqueue a flush barrier.
    ///
    /// The returned receiver completes once everything queued before the
    /// barrier has been handled. `None` if the consumer is gone.
    pub fn flush(&self) -> Option<oneshot::Receiver<()>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx.send(QueueMessage::Flush(ack_tx)).ok()?;
        Some(ack_rx)
    }

    /// Number of fixes waiting to be written.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl QueueReceiver {
    /// Wait for the next message. `None` once every producer is dropped.
    pub async fn recv(&mut self) -> Option<QueueMessage> {
        let message = self.rx.recv().await;
        self.account(&message);
        message
    }

    /// Take the next message without waiting.
    pub fn try_recv(&mut self) -> Option<QueueMessage> {
        let message = self.rx.try_recv().ok();
        self.account(&message);
        message
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    fn account(&self, message: &Option<QueueMessage>) {
        if let Some(QueueMessage::Fix(_)) = message {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

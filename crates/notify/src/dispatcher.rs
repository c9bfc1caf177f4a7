//! Bounded fire-and-forget alert dispatch.
//!
//! `submit` hands a job to a bounded queue without waiting. A worker task
//! drains the queue and spawns one delivery task per job, holding a
//! semaphore permit so at most `max_in_flight` deliveries run at once.
//! When the queue is full the job is dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use fallwatch_common::config::NotifyConfig;
use fallwatch_common::error::{FallwatchError, FallwatchResult};

use crate::sink::NotificationSink;

/// Text of the alert message for a fall at `timestamp`.
pub fn alert_message(timestamp: &str) -> String {
    format!("ALERT! Fall detected at {timestamp}!")
}

/// Caption of the evidence photo for a fall at `timestamp`.
pub fn photo_caption(timestamp: &str) -> String {
    format!("Fall detected at {timestamp}")
}

/// One alert to deliver to every sink.
#[derive(Debug, Clone)]
pub struct AlertJob {
    pub message: String,
    /// JPEG evidence and its caption. `None` sends the text only.
    pub photo: Option<(Vec<u8>, String)>,
}

impl AlertJob {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            photo: None,
        }
    }

    pub fn with_photo(mut self, jpeg: Vec<u8>, caption: impl Into<String>) -> Self {
        self.photo = Some((jpeg, caption.into()));
        self
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Jobs accepted into the queue.
    pub submitted: u64,
    /// Jobs every sink accepted.
    pub delivered: u64,
    /// Jobs at least one sink failed.
    pub failed: u64,
    /// Jobs rejected because the queue was full or closed.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

type Sinks = Arc<Vec<Arc<dyn NotificationSink>>>;

/// Decouples alert delivery from the frame loop.
pub struct AlertDispatcher {
    tx: mpsc::Sender<AlertJob>,
    worker: JoinHandle<()>,
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
    counters: Arc<Counters>,
}

impl AlertDispatcher {
    /// Start the dispatcher. Must be called from within a Tokio runtime.
    pub fn spawn(sinks: Vec<Arc<dyn NotificationSink>>, config: &NotifyConfig) -> Self {
        let max_in_flight = config.max_in_flight.max(1);
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let semaphore = Arc::new(Semaphore::new(max_in_flight));
        let counters = Arc::new(Counters::default());

        let worker = tokio::spawn(run_worker(
            rx,
            Arc::new(sinks),
            semaphore.clone(),
            counters.clone(),
        ));

        Self {
            tx,
            worker,
            semaphore,
            max_in_flight,
            counters,
        }
    }

    /// Queue a job without waiting. A rejected job is counted as dropped.
    pub fn submit(&self, job: AlertJob) -> FallwatchResult<()> {
        let reason = match self.tx.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(TrySendError::Full(_)) => "alert queue full",
            Err(TrySendError::Closed(_)) => "alert dispatcher stopped",
        };
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        Err(FallwatchError::dispatch(reason))
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Stop accepting jobs and wait for queued and in-flight deliveries.
    pub async fn shutdown(self) -> DispatchStats {
        let Self {
            tx,
            worker,
            semaphore,
            max_in_flight,
            counters,
        } = self;

        drop(tx);
        if let Err(e) = worker.await {
            error!(error = %e, "Alert worker ended abnormally");
        }
        // Every delivery task holds one permit until it finishes.
        if let Ok(permits) = semaphore.acquire_many(max_in_flight as u32).await {
            drop(permits);
        }
        counters.snapshot()
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("max_in_flight", &self.max_in_flight)
            .field("stats", &self.stats())
            .finish()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<AlertJob>,
    sinks: Sinks,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
) {
    while let Some(job) = rx.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let sinks = sinks.clone();
        let counters = counters.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if deliver(&sinks, &job).await {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        });
    }
    debug!("Alert worker stopped");
}

/// Send `job` to every sink, message and photo concurrently.
/// Returns whether every send succeeded.
async fn deliver(sinks: &[Arc<dyn NotificationSink>], job: &AlertJob) -> bool {
    let mut all_ok = true;
    for sink in sinks {
        let message = sink.send_message(&job.message);
        let (message_result, photo_result) = match &job.photo {
            Some((jpeg, caption)) => {
                let (m, p) = tokio::join!(message, sink.send_photo(jpeg, caption));
                (m, Some(p))
            }
            None => (message.await, None),
        };

        if let Err(e) = message_result {
            warn!(sink = sink.name(), error = %e, "Failed to send alert message");
            all_ok = false;
        }
        if let Some(Err(e)) = photo_result {
            warn!(sink = sink.name(), error = %e, "Failed to send evidence photo");
            all_ok = false;
        }
    }
    all_ok
}

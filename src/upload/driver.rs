use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{FileHandle, IntakeRejection, MediaType, Transition, UploadId, UploadManager, UploadRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub document_id: Option<String>,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadFailure {
    /// The server no longer accepts the session token.
    #[error("session expired or was rejected")]
    Unauthorized,
    #[error("{0}")]
    Rejected(String),
}

/// Carries one admitted file to the server.
pub trait UploadTransport: Clone + Send + Sync + 'static {
    fn send(
        &self,
        file: FileHandle,
        media_type: MediaType,
    ) -> impl Future<Output = Result<UploadReceipt, UploadFailure>> + Send;
}

/// Simulated progress while a transfer is in flight.
///
/// The ticker never reaches 100 on its own; only a finished transfer does.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSchedule {
    pub interval: Duration,
    pub increment: u8,
    pub ceiling: u8,
}

impl Default for ProgressSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            increment: 10,
            ceiling: 90,
        }
    }
}

#[derive(Debug)]
enum UploadEvent {
    Tick(UploadId),
    Finished(UploadId, Result<UploadReceipt, UploadFailure>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadUpdate {
    pub id: UploadId,
    pub transition: Transition,
}

struct Tasks {
    ticker: JoinHandle<()>,
    transfer: JoinHandle<()>,
}

impl Tasks {
    fn abort(&self) {
        self.ticker.abort();
        self.transfer.abort();
    }
}

/// Runs tickers and transfers for every admitted file and feeds their events
/// into the single [`UploadManager`] it owns.
pub struct UploadDriver<T> {
    transport: T,
    schedule: ProgressSchedule,
    manager: UploadManager,
    tasks: HashMap<UploadId, Tasks>,
    events_tx: mpsc::UnboundedSender<UploadEvent>,
    events_rx: mpsc::UnboundedReceiver<UploadEvent>,
    session_rejected: bool,
}

impl<T: UploadTransport> UploadDriver<T> {
    pub fn new(transport: T, schedule: ProgressSchedule) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            schedule,
            manager: UploadManager::new(),
            tasks: HashMap::new(),
            events_tx,
            events_rx,
            session_rejected: false,
        }
    }

    pub fn manager(&self) -> &UploadManager {
        &self.manager
    }

    /// Set once any transfer came back unauthorized.
    pub fn session_rejected(&self) -> bool {
        self.session_rejected
    }

    /// Admits the file and starts its ticker and transfer. Must be called from
    /// inside a Tokio runtime.
    pub fn admit(&mut self, file: FileHandle) -> Result<UploadId, IntakeRejection> {
        let id = self.manager.admit(file)?;
        let Some(record) = self.manager.get(id) else {
            return Ok(id);
        };

        info!(
            id = %id,
            file = %record.file.name,
            size_bytes = record.file.size_bytes,
            "upload admitted"
        );

        let ticker = spawn_ticker(id, self.schedule.interval, self.events_tx.clone());
        let transfer = spawn_transfer(
            id,
            record.file.clone(),
            record.media_type,
            self.transport.clone(),
            self.events_tx.clone(),
        );
        self.tasks.insert(id, Tasks { ticker, transfer });

        Ok(id)
    }

    /// Drops the record and cancels anything still scheduled for it.
    pub fn remove(&mut self, id: UploadId) -> Option<UploadRecord> {
        if let Some(tasks) = self.tasks.remove(&id) {
            tasks.abort();
        }

        let removed = self.manager.remove(id);
        if removed.is_some() {
            info!(id = %id, "upload removed");
        }
        removed
    }

    pub fn clear(&mut self) -> Vec<UploadRecord> {
        for (_, tasks) in self.tasks.drain() {
            tasks.abort();
        }
        self.manager.clear()
    }

    /// Waits for the next event that changed a record. Returns `None` once no
    /// record is still uploading, or as soon as the session was rejected.
    pub async fn next_update(&mut self) -> Option<UploadUpdate> {
        while self.manager.has_pending() && !self.session_rejected {
            let event = self.events_rx.recv().await?;
            let update = self.apply(event);
            if update.transition != Transition::Ignored {
                return Some(update);
            }
        }

        None
    }

    pub async fn run_until_settled(&mut self, mut observe: impl FnMut(&UploadUpdate, &UploadManager)) {
        while let Some(update) = self.next_update().await {
            observe(&update, &self.manager);
        }
    }

    fn apply(&mut self, event: UploadEvent) -> UploadUpdate {
        match event {
            UploadEvent::Tick(id) => {
                let transition =
                    self.manager
                        .step(id, self.schedule.increment, self.schedule.ceiling);
                UploadUpdate { id, transition }
            }
            UploadEvent::Finished(id, outcome) => {
                if let Some(tasks) = self.tasks.remove(&id) {
                    tasks.ticker.abort();
                }

                let transition = match outcome {
                    Ok(receipt) => self.manager.complete(id, Some(receipt)),
                    Err(failure) => {
                        if failure == UploadFailure::Unauthorized {
                            self.session_rejected = true;
                        }
                        warn!(id = %id, reason = %failure, "upload failed");
                        self.manager.fail(id, failure.to_string())
                    }
                };
                if transition == Transition::Ignored {
                    debug!(id = %id, "late transfer result ignored");
                }
                UploadUpdate { id, transition }
            }
        }
    }
}

fn spawn_ticker(
    id: UploadId,
    period: Duration,
    events: mpsc::UnboundedSender<UploadEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            if events.send(UploadEvent::Tick(id)).is_err() {
                break;
            }
        }
    })
}

fn spawn_transfer<T: UploadTransport>(
    id: UploadId,
    file: FileHandle,
    media_type: MediaType,
    transport: T,
    events: mpsc::UnboundedSender<UploadEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = transport.send(file, media_type).await;
        let _ = events.send(UploadEvent::Finished(id, outcome));
    })
}

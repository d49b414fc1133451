use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::BatchId;
use crate::api::Result;
use crate::api::TransferError;
use crate::api::UploadBatch;
use crate::api::UploadContext;
use crate::api::UploadId;
use crate::api::UploadJob;
use crate::api::UploadMetadata;
use crate::api::UploadTransport;
use crate::processor;
use crate::processor::ProcessorRegistry;
use crate::processor::UploadProcessor;
use crate::progress::ProgressReporter;
use crate::progress::ProgressTracker;

/// Uniform lifecycle events reported for every transfer, whichever transport
/// performs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Submitted {
        batch: BatchId,
        ids: Vec<UploadId>,
    },
    Processing {
        id: UploadId,
    },
    Processed {
        id: UploadId,
    },
    Sending {
        id: UploadId,
    },
    Progress {
        id: UploadId,
        percent: u8,
    },
    ProgressAll {
        percent: u8,
    },
    Succeeded {
        id: UploadId,
        upload: UploadMetadata,
    },
    Failed {
        id: UploadId,
        error: TransferError,
    },
    Cancelled {
        id: UploadId,
    },
    BatchComplete {
        batch: BatchId,
    },
}

impl TransportEvent {
    /// True for the single event that ends a task.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }

    pub fn task_id(&self) -> Option<UploadId> {
        match self {
            Self::Processing { id }
            | Self::Processed { id }
            | Self::Sending { id }
            | Self::Progress { id, .. }
            | Self::Succeeded { id, .. }
            | Self::Failed { id, .. }
            | Self::Cancelled { id } => Some(*id),
            Self::Submitted { .. } | Self::ProgressAll { .. } | Self::BatchComplete { .. } => None,
        }
    }
}

/// Runs transfers as background tasks and hands their events back to the
/// owning thread through `poll`/`next_event`.
pub struct TransportDriver {
    transport: Arc<dyn UploadTransport>,
    processors: ProcessorRegistry,
    event_tx: UnboundedSender<TransportEvent>,
    event_rx: UnboundedReceiver<TransportEvent>,
    inflight: HashMap<UploadId, CancellationToken>,
    progress: Arc<Mutex<ProgressTracker>>,
}

impl TransportDriver {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            transport,
            processors: ProcessorRegistry::default(),
            event_tx: tx,
            event_rx: rx,
            inflight: HashMap::new(),
            progress: Arc::new(Mutex::new(ProgressTracker::default())),
        }
    }

    pub fn with_processors(mut self, processors: ProcessorRegistry) -> Self {
        self.processors = processors;
        self
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Number of transfers whose terminal event has not been observed yet.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Start every job of `batch`. Must be called from within a tokio runtime.
    pub fn submit(&mut self, batch: UploadBatch) {
        let ids = batch.ids();
        let UploadBatch {
            id: batch_id,
            jobs,
            context,
        } = batch;
        let _ = self.event_tx.send(TransportEvent::Submitted {
            batch: batch_id,
            ids,
        });
        if jobs.is_empty() {
            let _ = self
                .event_tx
                .send(TransportEvent::BatchComplete { batch: batch_id });
            return;
        }

        let processors = if self.transport.runs_processors() {
            self.processors.snapshot()
        } else {
            Vec::new()
        };
        let remaining = Arc::new(AtomicUsize::new(jobs.len()));
        debug!(
            "upload.driver.submit batch={batch_id} files={} transport={}",
            jobs.len(),
            self.transport.name()
        );

        for job in jobs {
            let cancel = CancellationToken::new();
            self.inflight.insert(job.id, cancel.clone());
            let transport = Arc::clone(&self.transport);
            let tx = self.event_tx.clone();
            let tracker = Arc::clone(&self.progress);
            let processors = processors.clone();
            let remaining = Arc::clone(&remaining);
            tokio::spawn(async move {
                let id = job.id;
                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => TransportEvent::Cancelled { id },
                    result = run_job(transport.as_ref(), &processors, job, context, &tx, &tracker) => {
                        match result {
                            Ok(upload) => TransportEvent::Succeeded { id, upload },
                            Err(error) => TransportEvent::Failed { id, error },
                        }
                    }
                };
                if let Ok(mut guard) = tracker.lock() {
                    guard.finish(id);
                }
                let _ = tx.send(outcome);
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let _ = tx.send(TransportEvent::BatchComplete { batch: batch_id });
                }
            });
        }
    }

    /// Abort the transfer for `id`. Returns false when it already finished.
    pub fn abort(&mut self, id: UploadId) -> bool {
        match self.inflight.get(&id) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn abort_all(&mut self) {
        for cancel in self.inflight.values() {
            cancel.cancel();
        }
    }

    /// Drain the events that are already available without waiting.
    pub fn poll(&mut self) -> Vec<TransportEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            self.observe(&event);
            out.push(event);
        }
        out
    }

    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        let event = self.event_rx.recv().await?;
        self.observe(&event);
        Some(event)
    }

    fn observe(&mut self, event: &TransportEvent) {
        if event.is_terminal()
            && let Some(id) = event.task_id()
        {
            self.inflight.remove(&id);
        }
    }
}

async fn run_job(
    transport: &dyn UploadTransport,
    processors: &[Arc<dyn UploadProcessor>],
    job: UploadJob,
    context: UploadContext,
    tx: &UnboundedSender<TransportEvent>,
    tracker: &Arc<Mutex<ProgressTracker>>,
) -> Result<UploadMetadata> {
    let UploadJob { id, mut file } = job;
    if !processors.is_empty() {
        let _ = tx.send(TransportEvent::Processing { id });
        let processed = processor::run_chain(processors, file).await;
        let _ = tx.send(TransportEvent::Processed { id });
        file = processed?;
    }

    let _ = tx.send(TransportEvent::Sending { id });
    debug!(
        "upload.driver.send id={id} file={} bytes={}",
        file.name, file.size
    );
    let reporter = ProgressReporter::new(id, Arc::clone(tracker), tx.clone());
    transport.transfer(&file, context, reporter).await
}

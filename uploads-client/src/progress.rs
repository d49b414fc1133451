use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

use crate::api::UploadId;
use crate::driver::TransportEvent;

/// Bytes sent so far for every transfer the driver has in flight.
#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    transfers: HashMap<UploadId, (u64, u64)>,
}

impl ProgressTracker {
    /// Record a sample for `id` and return the combined percentage across all
    /// tracked transfers.
    pub(crate) fn update(&mut self, id: UploadId, loaded: u64, total: u64) -> u8 {
        self.transfers.insert(id, (loaded.min(total), total));
        self.combined()
    }

    pub(crate) fn finish(&mut self, id: UploadId) {
        self.transfers.remove(&id);
    }

    fn combined(&self) -> u8 {
        let (loaded, total) = self
            .transfers
            .values()
            .fold((0u64, 0u64), |(l, t), (loaded, total)| {
                (l.saturating_add(*loaded), t.saturating_add(*total))
            });
        percent_of(loaded, total)
    }
}

pub(crate) fn percent_of(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(loaded) * 100) / u128::from(total);
    pct.min(100) as u8
}

/// Handed to a transport for one transfer. Each sample updates the shared
/// tracker under its lock and emits a per-task and an aggregate event.
#[derive(Clone)]
pub struct ProgressReporter {
    id: UploadId,
    tracker: Option<Arc<Mutex<ProgressTracker>>>,
    tx: Option<UnboundedSender<TransportEvent>>,
}

impl ProgressReporter {
    pub(crate) fn new(
        id: UploadId,
        tracker: Arc<Mutex<ProgressTracker>>,
        tx: UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            id,
            tracker: Some(tracker),
            tx: Some(tx),
        }
    }

    /// A reporter that drops every sample. Handy when calling a transport directly.
    pub fn detached(id: UploadId) -> Self {
        Self {
            id,
            tracker: None,
            tx: None,
        }
    }

    pub fn report(&self, loaded: u64, total: u64) {
        let Some(tx) = &self.tx else {
            return;
        };
        let combined = match &self.tracker {
            Some(tracker) => match tracker.lock() {
                Ok(mut guard) => guard.update(self.id, loaded, total),
                Err(_) => return,
            },
            None => percent_of(loaded, total),
        };
        let _ = tx.send(TransportEvent::Progress {
            id: self.id,
            percent: percent_of(loaded, total),
        });
        let _ = tx.send(TransportEvent::ProgressAll { percent: combined });
    }
}

#[cfg(feature = "online")]
const BODY_CHUNK_BYTES: usize = 64 * 1024;

/// Stream `data` as a request body, reporting progress as reqwest pulls chunks.
#[cfg(feature = "online")]
pub(crate) fn body_with_progress(data: bytes::Bytes, progress: ProgressReporter) -> reqwest::Body {
    let total = data.len() as u64;
    progress.report(0, total);
    let chunks: Vec<bytes::Bytes> = (0..data.len())
        .step_by(BODY_CHUNK_BYTES)
        .map(|start| data.slice(start..(start + BODY_CHUNK_BYTES).min(data.len())))
        .collect();
    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress.report(sent, total);
        Ok::<_, std::io::Error>(chunk)
    }));
    reqwest::Body::wrap_stream(stream)
}

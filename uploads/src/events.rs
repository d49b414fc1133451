use composer_uploads_client::UploadId;
use composer_uploads_client::UploadMetadata;
use tokio::sync::broadcast;
use tracing::trace;

const BUS_CAPACITY: usize = 128;

/// Lifecycle signals announced to the rest of the composer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComposerEvent {
    UploadStarted { id: UploadId, file: String },
    UploadProcessing { id: UploadId },
    UploadProgress { percent: u8 },
    UploadCompleted { id: UploadId, upload: UploadMetadata },
    UploadFailed { id: UploadId },
    UploadCancelled { id: UploadId },
}

impl ComposerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UploadStarted { .. } => "upload:started",
            Self::UploadProcessing { .. } => "upload:processing",
            Self::UploadProgress { .. } => "upload:progress",
            Self::UploadCompleted { .. } => "upload:completed",
            Self::UploadFailed { .. } => "upload:failed",
            Self::UploadCancelled { .. } => "upload:cancelled",
        }
    }
}

/// Signals from the document surface the coordinator listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentEvent {
    /// `document:resized`
    Resized,
    /// `document:retyped`
    Retyped,
}

/// Fan-out of `ComposerEvent`s. Slow subscribers lose the oldest events.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<ComposerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }
}

impl EventBus {
    pub fn subscribe(&self) -> broadcast::Receiver<ComposerEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ComposerEvent) {
        trace!("upload.bus.emit event={}", event.name());
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

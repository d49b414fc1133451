use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::api::Result;
use crate::api::TransferError;
use crate::api::UploadContext;
use crate::api::UploadFile;
use crate::api::UploadMetadata;
use crate::api::UploadTransport;
use crate::progress::ProgressReporter;

/// Scripted outcome for files with a given name.
#[derive(Clone, Debug)]
pub enum MockBehavior {
    Succeed,
    Fail(TransferError),
    /// Succeed after sleeping.
    Delay(Duration),
    /// Never finish; only an abort ends the transfer.
    Hang,
}

/// In-memory transport for tests and offline runs. Files succeed unless a
/// behavior was scripted for their name.
#[derive(Clone, Default)]
pub struct MockTransport {
    behaviors: Arc<Mutex<HashMap<String, MockBehavior>>>,
    transferred: Arc<Mutex<Vec<String>>>,
    next_upload: Arc<AtomicU64>,
    runs_processors: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(self, filename: impl Into<String>, behavior: MockBehavior) -> Self {
        if let Ok(mut guard) = self.behaviors.lock() {
            guard.insert(filename.into(), behavior);
        }
        self
    }

    /// Behave like the form transport and run pre-submit processors.
    pub fn with_processing(mut self) -> Self {
        self.runs_processors = true;
        self
    }

    /// Names of the files that reached `transfer`, in call order.
    pub fn transferred(&self) -> Vec<String> {
        self.transferred
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn behavior_for(&self, name: &str) -> MockBehavior {
        self.behaviors
            .lock()
            .ok()
            .and_then(|guard| guard.get(name).cloned())
            .unwrap_or(MockBehavior::Succeed)
    }

    fn metadata_for(&self, file: &UploadFile) -> UploadMetadata {
        let n = self.next_upload.fetch_add(1, Ordering::Relaxed) + 1;
        let ext = file.extension();
        let suffix = ext.as_deref().map(|e| format!(".{e}")).unwrap_or_default();
        let is_image = file.mime_type.starts_with("image/");
        UploadMetadata {
            id: Some(n),
            url: format!("/uploads/default/original/1X/mock{n}{suffix}"),
            short_url: Some(format!("upload://mock{n}{suffix}")),
            original_filename: file.name.clone(),
            filesize: file.size,
            width: is_image.then_some(640),
            height: is_image.then_some(480),
            thumbnail_width: is_image.then_some(640),
            thumbnail_height: is_image.then_some(480),
            extension: ext,
        }
    }
}

#[async_trait::async_trait]
impl UploadTransport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn runs_processors(&self) -> bool {
        self.runs_processors
    }

    async fn transfer(
        &self,
        file: &UploadFile,
        _context: UploadContext,
        progress: ProgressReporter,
    ) -> Result<UploadMetadata> {
        if let Ok(mut guard) = self.transferred.lock() {
            guard.push(file.name.clone());
        }
        progress.report(0, file.size);
        match self.behavior_for(&file.name) {
            MockBehavior::Succeed => {}
            MockBehavior::Fail(err) => return Err(err),
            MockBehavior::Delay(delay) => tokio::time::sleep(delay).await,
            MockBehavior::Hang => std::future::pending::<()>().await,
        }
        progress.report(file.size, file.size);
        Ok(self.metadata_for(file))
    }
}

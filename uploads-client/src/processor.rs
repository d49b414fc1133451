//! Pre-submit processing (client-side resize, metadata stripping, ...).
//!
//! Processors run in registration order on every file of a batch before the
//! transport sends it. All of them must succeed for the transfer to start.

use std::sync::Arc;
use std::sync::RwLock;

use crate::api::TransferError;
use crate::api::UploadFile;

#[async_trait::async_trait]
pub trait UploadProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Return the file to send in place of `file`.
    async fn process(&self, file: UploadFile) -> Result<UploadFile, String>;
}

/// Shared handle to the ordered list of processors. Clones see the same list,
/// so processors registered after the driver was built still apply.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: Arc<RwLock<Vec<Arc<dyn UploadProcessor>>>>,
}

impl ProcessorRegistry {
    pub fn register(&self, processor: Arc<dyn UploadProcessor>) {
        if let Ok(mut guard) = self.processors.write() {
            guard.push(processor);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.processors.write() {
            guard.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.processors.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn UploadProcessor>> {
        self.processors
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("len", &self.len())
            .finish()
    }
}

pub(crate) async fn run_chain(
    processors: &[Arc<dyn UploadProcessor>],
    mut file: UploadFile,
) -> Result<UploadFile, TransferError> {
    for processor in processors {
        file = processor.process(file).await.map_err(|reason| {
            TransferError::Processing(format!("{}: {reason}", processor.name()))
        })?;
    }
    Ok(file)
}

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use crate::progress::ProgressReporter;

pub type Result<T> = std::result::Result<T, TransferError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("http error: {0}")]
    Http(String),
    /// The endpoint answered with a non-success status. `message` carries the
    /// first server-provided error when the body had one.
    #[error("upload rejected with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("processing failed: {0}")]
    Processing(String),
    #[error("upload aborted")]
    Aborted,
    #[error("uploads are not available: {0}")]
    Unavailable(String),
}

impl TransferError {
    /// Message supplied by the server, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Stable identifier assigned to each upload task by the coordinator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub u64);

impl UploadId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct BatchId(pub u64);

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the user handed the file to the composer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UploadSource {
    #[default]
    Picker,
    Drop,
    Paste,
}

/// A file chosen by the user. Immutable once handed to the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub data: Bytes,
    pub source: UploadSource,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            data,
            source: UploadSource::Picker,
        }
    }

    pub fn with_source(mut self, source: UploadSource) -> Self {
        self.source = source;
        self
    }

    /// Lowercased extension without the dot, if the name has one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Extra form fields sent along with a submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadContext {
    pub for_private_message: bool,
    pub pasted: bool,
}

/// Upload record returned by the server once the bytes are stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    #[serde(default)]
    pub id: Option<u64>,
    pub url: String,
    #[serde(default)]
    pub short_url: Option<String>,
    pub original_filename: String,
    #[serde(default)]
    pub filesize: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub thumbnail_width: Option<u32>,
    #[serde(default)]
    pub thumbnail_height: Option<u32>,
    #[serde(default)]
    pub extension: Option<String>,
}

impl UploadMetadata {
    /// `short_url` when the server minted one, the plain url otherwise.
    pub fn link(&self) -> &str {
        self.short_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.url)
    }
}

/// One file of a dispatched batch.
#[derive(Clone, Debug)]
pub struct UploadJob {
    pub id: UploadId,
    pub file: UploadFile,
}

#[derive(Clone, Debug)]
pub struct UploadBatch {
    pub id: BatchId,
    pub jobs: Vec<UploadJob>,
    pub context: UploadContext,
}

impl UploadBatch {
    pub fn ids(&self) -> Vec<UploadId> {
        self.jobs.iter().map(|job| job.id).collect()
    }
}

/// Moves one file's bytes to storage. Implementations must be cancel-safe:
/// the driver drops the future to abort an in-flight transfer.
#[async_trait::async_trait]
pub trait UploadTransport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the registered pre-submit processors run before this transport sends.
    fn runs_processors(&self) -> bool {
        false
    }

    async fn transfer(
        &self,
        file: &UploadFile,
        context: UploadContext,
        progress: ProgressReporter,
    ) -> Result<UploadMetadata>;
}

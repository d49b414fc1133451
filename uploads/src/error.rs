use std::sync::Arc;
use std::sync::Mutex;

use composer_uploads_client::TransferError;
use tracing::warn;

use crate::config::UploadPolicy;
use crate::markdown::human_size;

/// Every way an upload can end without its markup landing in the document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// Refused by the gate before any task existed.
    #[error("{file} rejected: {message}")]
    ValidationRejected { file: String, message: String },
    #[error("upload of {file} failed: {source}")]
    TransferFailed {
        file: String,
        #[source]
        source: TransferError,
    },
    #[error("upload of {file} was cancelled")]
    UserCancelled { file: String },
    #[error("{count} files submitted but at most {max} may be uploaded at once")]
    BatchTooLarge { count: usize, max: usize },
    #[error("could not find a unique placeholder for {file}")]
    NamingCollisionExhausted { file: String },
}

impl UploadError {
    /// The one message shown to the user for this error.
    pub fn user_message(&self, policy: &UploadPolicy) -> String {
        match self {
            Self::ValidationRejected { message, .. } => message.clone(),
            Self::BatchTooLarge { max, .. } => {
                format!("Sorry, you can only upload {max} files at a time.")
            }
            Self::TransferFailed { source, .. } => {
                if let Some(message) = source.server_message() {
                    return message.to_string();
                }
                if source.status() == Some(413) {
                    let max_kb = policy.max_image_size_kb.max(policy.max_attachment_size_kb);
                    return format!(
                        "Sorry, the file you are trying to upload is too big (maximum size is {}).",
                        human_size(max_kb.saturating_mul(1024))
                    );
                }
                "Sorry, there was an error uploading that file. Please try again.".to_string()
            }
            Self::UserCancelled { file } => format!("Upload of {file} cancelled."),
            Self::NamingCollisionExhausted { file } => {
                format!("Sorry, {file} could not be added to the post. Please try again.")
            }
        }
    }
}

/// Renders user-visible failure messages.
pub trait ErrorReporter: Send {
    fn display(&self, error: &UploadError, policy: &UploadPolicy);
}

/// Reports through `tracing`; the default when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn display(&self, error: &UploadError, policy: &UploadPolicy) {
        warn!(
            "upload.error.display error={error} message={}",
            error.user_message(policy)
        );
    }
}

/// Keeps every displayed message. Clones share the same list.
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ErrorReporter for CollectingReporter {
    fn display(&self, error: &UploadError, policy: &UploadPolicy) {
        if let Ok(mut guard) = self.messages.lock() {
            guard.push(error.user_message(policy));
        }
    }
}

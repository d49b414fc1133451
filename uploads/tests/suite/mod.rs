mod plugins;

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use composer_uploads::CollectingReporter;
use composer_uploads::DocumentBuffer;
use composer_uploads::MockTransport;
use composer_uploads::TaskOutcome;
use composer_uploads::TextBuffer;
use composer_uploads::UploadConfig;
use composer_uploads::UploadCoordinator;
use composer_uploads::UploadFile;

pub(crate) struct Harness {
    pub coordinator: UploadCoordinator,
    pub transport: MockTransport,
    pub reporter: CollectingReporter,
}

pub(crate) fn harness(transport: MockTransport) -> Harness {
    harness_with(transport, UploadConfig::default(), Box::new(TextBuffer::new()))
}

pub(crate) fn harness_with(
    transport: MockTransport,
    config: UploadConfig,
    document: Box<dyn DocumentBuffer>,
) -> Harness {
    let reporter = CollectingReporter::new();
    let coordinator = UploadCoordinator::new(document, Arc::new(transport.clone()), &config)
        .with_reporter(reporter.clone());
    Harness {
        coordinator,
        transport,
        reporter,
    }
}

pub(crate) fn png(name: &str) -> UploadFile {
    UploadFile::new(name, "image/png", vec![7u8; 64])
}

pub(crate) fn text(coordinator: &UploadCoordinator) -> String {
    coordinator.document().text().into_owned()
}

pub(crate) async fn settle(coordinator: &mut UploadCoordinator) -> Vec<TaskOutcome> {
    tokio::time::timeout(Duration::from_secs(5), coordinator.run_until_idle())
        .await
        .expect("uploads did not settle")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum DocOp {
    Insert(String),
    Replace { old: String, found: bool },
}

/// Text buffer that records every edit the coordinator issues.
#[derive(Clone, Default)]
pub(crate) struct RecordingBuffer {
    inner: TextBuffer,
    ops: Arc<Mutex<Vec<DocOp>>>,
}

impl RecordingBuffer {
    pub fn ops_handle(&self) -> Arc<Mutex<Vec<DocOp>>> {
        Arc::clone(&self.ops)
    }
}

impl DocumentBuffer for RecordingBuffer {
    fn text(&self) -> Cow<'_, str> {
        self.inner.text()
    }

    fn cursor_on_empty_line(&self) -> bool {
        self.inner.cursor_on_empty_line()
    }

    fn insert_text_at_cursor(&mut self, text: &str) {
        self.ops.lock().unwrap().push(DocOp::Insert(text.to_string()));
        self.inner.insert_text_at_cursor(text);
    }

    fn replace_text(&mut self, old: &str, new: &str) -> bool {
        let found = self.inner.replace_text(old, new);
        self.ops.lock().unwrap().push(DocOp::Replace {
            old: old.to_string(),
            found,
        });
        found
    }
}

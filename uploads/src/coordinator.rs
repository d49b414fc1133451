use std::collections::HashMap;
use std::sync::Arc;

use composer_uploads_client::BatchId;
use composer_uploads_client::TransferError;
use composer_uploads_client::TransportDriver;
use composer_uploads_client::TransportEvent;
use composer_uploads_client::UploadBatch;
use composer_uploads_client::UploadContext;
use composer_uploads_client::UploadFile;
use composer_uploads_client::UploadId;
use composer_uploads_client::UploadJob;
use composer_uploads_client::UploadMetadata;
use composer_uploads_client::UploadSource;
use composer_uploads_client::UploadTransport;
use tokio::sync::broadcast;
use tracing::debug;
use tracing::warn;

use crate::config::UploadConfig;
use crate::config::UploadPolicy;
use crate::document::DocumentBuffer;
use crate::error::ErrorReporter;
use crate::error::TracingReporter;
use crate::error::UploadError;
use crate::events::ComposerEvent;
use crate::events::DocumentEvent;
use crate::events::EventBus;
use crate::features::Feature;
use crate::gate::GateOptions;
use crate::gate::PolicyGate;
use crate::gate::UploadGate;
use crate::markdown::UploadMarkdownPipeline;
use crate::markdown::human_size;
use crate::placeholder::PlaceholderNamer;
use crate::placeholder::ReservedPlaceholder;
use crate::registry::UploadRegistries;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Sending,
    Succeeded,
    Failed,
    Cancelled,
}

/// One file between "placeholder inserted" and "placeholder resolved".
#[derive(Clone, Debug)]
pub struct UploadTask {
    pub id: UploadId,
    pub file: UploadFile,
    pub placeholder: ReservedPlaceholder,
    pub state: TaskState,
    /// Last percentage reported for this task alone. Never decreases.
    pub progress: u8,
    pub processing: bool,
    pub cancel_requested: bool,
    /// Only sole-file batches expose cancellation to the UI.
    pub cancellable: bool,
}

/// Terminal result of one task, returned as events are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskOutcome {
    pub id: UploadId,
    pub state: TaskState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStatus {
    pub active_count: usize,
    pub progress: u8,
    pub is_uploading: bool,
    pub is_processing: bool,
    pub is_cancellable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was chosen.
    Empty,
    BatchTooLarge { count: usize, max: usize },
    /// A registered extension handler took the file.
    Handled { file: String },
    /// Every file was refused by the gate or could not be named.
    Rejected { rejected: Vec<String> },
    Dispatched {
        batch: BatchId,
        ids: Vec<UploadId>,
        rejected: Vec<String>,
    },
}

/// Owns the in-flight uploads of one document and keeps the document's
/// placeholders in step with what the transport reports.
///
/// All state changes happen through `&mut self` on the caller's task; the
/// transport driver only ever talks back through its event channel.
pub struct UploadCoordinator {
    document: Box<dyn DocumentBuffer>,
    driver: TransportDriver,
    policy: UploadPolicy,
    namer: PlaceholderNamer,
    gate: Box<dyn UploadGate>,
    reporter: Box<dyn ErrorReporter>,
    registries: UploadRegistries,
    bus: EventBus,
    options: GateOptions,
    tasks: HashMap<UploadId, UploadTask>,
    next_task: u64,
    next_batch: u64,
    progress: u8,
    short_urls: HashMap<String, UploadMetadata>,
    scroll_map_stale: bool,
}

impl UploadCoordinator {
    pub fn new(
        document: Box<dyn DocumentBuffer>,
        transport: Arc<dyn UploadTransport>,
        config: &UploadConfig,
    ) -> Self {
        let registries = UploadRegistries::default();
        let mut driver = TransportDriver::new(transport);
        if config.features.enabled(Feature::UploadProcessors) {
            driver = driver.with_processors(registries.processors.clone());
        }
        Self {
            document,
            driver,
            policy: config.policy.clone(),
            namer: PlaceholderNamer::new(&config.labels),
            gate: Box::new(PolicyGate),
            reporter: Box::new(TracingReporter),
            registries,
            bus: EventBus::default(),
            options: GateOptions::default(),
            tasks: HashMap::new(),
            next_task: 0,
            next_batch: 0,
            progress: 0,
            short_urls: HashMap::new(),
            scroll_map_stale: true,
        }
    }

    pub fn with_gate(mut self, gate: impl UploadGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn with_reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn with_options(mut self, options: GateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn document(&self) -> &dyn DocumentBuffer {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> &mut dyn DocumentBuffer {
        self.document.as_mut()
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn registries_mut(&mut self) -> &mut UploadRegistries {
        &mut self.registries
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ComposerEvent> {
        self.bus.subscribe()
    }

    pub fn transport_name(&self) -> &'static str {
        self.driver.transport_name()
    }

    pub fn task(&self, id: UploadId) -> Option<&UploadTask> {
        self.tasks.get(&id)
    }

    pub fn status(&self) -> UploadStatus {
        let active_count = self.tasks.len();
        UploadStatus {
            active_count,
            progress: self.progress,
            is_uploading: active_count > 0,
            is_processing: self.tasks.values().any(|task| task.processing),
            is_cancellable: self
                .tasks
                .values()
                .any(|task| task.cancellable && !task.cancel_requested),
        }
    }

    /// Entry point for a user action that hands over files. Must be called
    /// from within a tokio runtime.
    pub fn on_files_chosen(&mut self, files: Vec<UploadFile>) -> SubmitOutcome {
        if files.is_empty() {
            return SubmitOutcome::Empty;
        }

        let max = self.policy.simultaneous_uploads;
        if max > 0 && files.len() > max {
            let err = UploadError::BatchTooLarge {
                count: files.len(),
                max,
            };
            debug!("upload.batch.rejected count={} max={max}", files.len());
            self.reporter.display(&err, &self.policy);
            return SubmitOutcome::BatchTooLarge {
                count: files.len(),
                max,
            };
        }

        if let [file] = files.as_slice()
            && let Some(handler) = self.registries.handlers.find(file)
            && !handler(file, self.document.as_mut())
        {
            debug!("upload.handler.claimed file={}", file.name);
            return SubmitOutcome::Handled {
                file: file.name.clone(),
            };
        }

        let decision = self.gate.validate(files, &self.policy, &self.options);
        let mut rejected: Vec<String> = decision.rejected.iter().map(|r| r.file.clone()).collect();
        if let Some(message) = decision.user_message.or_else(|| {
            decision
                .rejected
                .first()
                .map(|r| r.reason.clone())
        }) {
            let file = rejected.first().cloned().unwrap_or_default();
            self.reporter.display(
                &UploadError::ValidationRejected { file, message },
                &self.policy,
            );
        }

        let context = UploadContext {
            for_private_message: self.options.for_private_message,
            pasted: decision
                .admitted
                .iter()
                .any(|file| file.source == UploadSource::Paste),
        };
        let single = decision.admitted.len() == 1;
        let mut jobs = Vec::with_capacity(decision.admitted.len());
        for file in decision.admitted {
            match self.start_task(file, single) {
                Ok(job) => jobs.push(job),
                Err((name, err)) => {
                    self.reporter.display(&err, &self.policy);
                    rejected.push(name);
                }
            }
        }

        if jobs.is_empty() {
            return SubmitOutcome::Rejected { rejected };
        }

        self.next_batch += 1;
        let batch = BatchId(self.next_batch);
        let ids: Vec<UploadId> = jobs.iter().map(|job| job.id).collect();
        self.driver.submit(UploadBatch {
            id: batch,
            jobs,
            context,
        });
        for id in &ids {
            if let Some(task) = self.tasks.get_mut(id) {
                task.state = TaskState::Sending;
            }
        }
        SubmitOutcome::Dispatched {
            batch,
            ids,
            rejected,
        }
    }

    /// Reserve a placeholder, put it in the document and register the task.
    fn start_task(
        &mut self,
        file: UploadFile,
        single: bool,
    ) -> Result<UploadJob, (String, UploadError)> {
        let reserved = {
            let text = self.document.text();
            self.namer
                .reserve(&file.name, &text, self.document.cursor_on_empty_line())
        };
        let placeholder = match reserved {
            Ok(placeholder) => placeholder,
            Err(err) => {
                warn!("upload.placeholder.exhausted file={}", file.name);
                return Err((file.name, err));
            }
        };

        self.document.insert_text_at_cursor(&placeholder.inserted_text);
        self.next_task += 1;
        let id = UploadId::new(self.next_task);
        debug!(
            "upload.task.started id={id} file={} placeholder={}",
            file.name, placeholder.label
        );
        let task = UploadTask {
            id,
            file: file.clone(),
            placeholder,
            state: TaskState::Pending,
            progress: 0,
            processing: false,
            cancel_requested: false,
            cancellable: single,
        };
        self.bus.emit(ComposerEvent::UploadStarted {
            id,
            file: file.name.clone(),
        });
        self.tasks.insert(id, task);
        Ok(UploadJob { id, file })
    }

    /// Apply one transport event. Returns the outcome when it ended a task.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<TaskOutcome> {
        match event {
            TransportEvent::Submitted { batch, ids } => {
                debug!("upload.batch.submitted batch={batch} files={}", ids.len());
                None
            }
            TransportEvent::Processing { id } => {
                self.on_processing(id, true);
                None
            }
            TransportEvent::Processed { id } => {
                self.on_processing(id, false);
                None
            }
            TransportEvent::Sending { id } => {
                self.on_send(id);
                None
            }
            TransportEvent::Progress { id, percent } => {
                if let Some(task) = self.tasks.get_mut(&id) {
                    task.progress = task.progress.max(percent);
                }
                None
            }
            TransportEvent::ProgressAll { percent } => {
                self.on_progress(percent);
                None
            }
            TransportEvent::Succeeded { id, upload } => self.on_success(id, upload),
            TransportEvent::Failed { id, error } => self.on_failure(id, error),
            TransportEvent::Cancelled { id } => self.on_cancelled(id),
            TransportEvent::BatchComplete { batch } => {
                debug!("upload.batch.complete batch={batch}");
                None
            }
        }
    }

    fn on_processing(&mut self, id: UploadId, processing: bool) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        task.processing = processing;
        if processing {
            self.bus.emit(ComposerEvent::UploadProcessing { id });
        }
    }

    fn on_send(&mut self, id: UploadId) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.processing = false;
            debug!("upload.task.sending id={id} file={}", task.file.name);
        }
    }

    /// Aggregate progress across every in-flight task; last writer wins.
    pub fn on_progress(&mut self, percent: u8) {
        if self.tasks.is_empty() {
            return;
        }
        self.progress = percent.min(100);
        self.bus.emit(ComposerEvent::UploadProgress {
            percent: self.progress,
        });
    }

    pub fn on_success(&mut self, id: UploadId, upload: UploadMetadata) -> Option<TaskOutcome> {
        let mut task = self.take_task(id, "success")?;
        if task.cancel_requested {
            debug!("upload.task.success_after_cancel id={id}");
            self.rollback(&task);
            task.state = TaskState::Cancelled;
            self.bus.emit(ComposerEvent::UploadCancelled { id });
            return Some(self.finish(task));
        }

        let size = if upload.filesize > 0 {
            upload.filesize
        } else {
            task.file.size
        };
        let label = self.namer.finalize(&task.placeholder, &human_size(size));
        let markdown = UploadMarkdownPipeline::new(&self.registries.resolvers).resolve(&upload);
        if self.document.replace_text(&task.placeholder.token, &markdown) {
            debug!("upload.task.completed id={id} upload={label}");
        } else {
            warn!("upload.placeholder.missing id={id} upload={label}");
        }

        if let Some(short_url) = upload.short_url.as_ref().filter(|s| !s.is_empty()) {
            self.short_urls.insert(short_url.clone(), upload.clone());
        }
        task.state = TaskState::Succeeded;
        self.bus.emit(ComposerEvent::UploadCompleted { id, upload });
        Some(self.finish(task))
    }

    pub fn on_failure(&mut self, id: UploadId, error: TransferError) -> Option<TaskOutcome> {
        let mut task = self.take_task(id, "failure")?;
        self.rollback(&task);
        if task.cancel_requested {
            debug!("upload.task.cancelled id={id} reason={error}");
            task.state = TaskState::Cancelled;
            self.bus.emit(ComposerEvent::UploadCancelled { id });
        } else {
            warn!("upload.task.failed id={id} file={} error={error}", task.file.name);
            let err = UploadError::TransferFailed {
                file: task.file.name.clone(),
                source: error,
            };
            self.reporter.display(&err, &self.policy);
            task.state = TaskState::Failed;
            self.bus.emit(ComposerEvent::UploadFailed { id });
        }
        Some(self.finish(task))
    }

    /// The driver only reports a cancellation for transfers it was asked to
    /// abort, so this is always silent.
    pub fn on_cancelled(&mut self, id: UploadId) -> Option<TaskOutcome> {
        let mut task = self.take_task(id, "cancelled")?;
        let err = UploadError::UserCancelled {
            file: task.file.name.clone(),
        };
        debug!("upload.task.cancelled id={id} reason={err}");
        self.rollback(&task);
        task.state = TaskState::Cancelled;
        self.bus.emit(ComposerEvent::UploadCancelled { id });
        Some(self.finish(task))
    }

    /// Mark `id` cancelled, then abort its transfer. False when the task has
    /// already reached a terminal state.
    pub fn cancel(&mut self, id: UploadId) -> bool {
        let Some(task) = self.tasks.get_mut(&id) else {
            return false;
        };
        if task.state != TaskState::Sending {
            return false;
        }
        task.cancel_requested = true;
        debug!("upload.task.cancel_requested id={id}");
        self.driver.abort(id);
        true
    }

    pub fn cancel_all(&mut self) {
        for task in self.tasks.values_mut() {
            task.cancel_requested = true;
        }
        self.driver.abort_all();
    }

    /// Apply every event that is already available. Never blocks.
    pub fn poll(&mut self) -> Vec<TaskOutcome> {
        self.driver
            .poll()
            .into_iter()
            .filter_map(|event| self.handle_event(event))
            .collect()
    }

    /// Wait for and apply the next event. False when the driver has gone away.
    pub async fn next_event(&mut self) -> bool {
        match self.driver.next_event().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply events until no task is active.
    pub async fn run_until_idle(&mut self) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::new();
        while !self.tasks.is_empty() {
            let Some(event) = self.driver.next_event().await else {
                break;
            };
            outcomes.extend(self.handle_event(event));
        }
        outcomes.extend(self.poll());
        outcomes
    }

    pub fn lookup_short_url(&self, short_url: &str) -> Option<&UploadMetadata> {
        self.short_urls.get(short_url)
    }

    pub fn on_document_event(&mut self, event: DocumentEvent) {
        debug!("upload.document.event event={event:?}");
        self.scroll_map_stale = true;
    }

    /// Whether the preview scroll map needs rebuilding; clears the flag.
    pub fn take_scroll_map_rebuild(&mut self) -> bool {
        std::mem::take(&mut self.scroll_map_stale)
    }

    /// Removing the task is the single point where the active count drops,
    /// so a duplicate or late callback finds nothing and is ignored.
    fn take_task(&mut self, id: UploadId, event: &str) -> Option<UploadTask> {
        let task = self.tasks.remove(&id);
        if task.is_none() {
            warn!("upload.callback.ignored id={id} event={event}");
        }
        task
    }

    /// Remove the placeholder and its trailing line break. A leading break
    /// stays, since a later placeholder may now sit on that line.
    fn rollback(&mut self, task: &UploadTask) {
        let token = &task.placeholder.token;
        let removed = self.document.replace_text(&format!("{token}\n"), "")
            || self.document.replace_text(token, "");
        if !removed {
            warn!(
                "upload.placeholder.missing id={} placeholder={}",
                task.id, task.placeholder.label
            );
        }
    }

    fn finish(&mut self, task: UploadTask) -> TaskOutcome {
        if self.tasks.is_empty() {
            self.progress = 0;
            debug!("upload.idle");
        }
        TaskOutcome {
            id: task.id,
            state: task.state,
        }
    }
}

impl std::fmt::Debug for UploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("transport", &self.driver.transport_name())
            .field("tasks", &self.tasks.len())
            .field("progress", &self.progress)
            .field("registries", &self.registries)
            .finish()
    }
}

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use composer_uploads::MockBehavior;
use composer_uploads::MockTransport;
use composer_uploads::SubmitOutcome;
use composer_uploads::TextBuffer;
use composer_uploads::UploadConfig;
use composer_uploads::UploadFile;
use composer_uploads::UploadProcessor;
use composer_uploads::features::Feature;
use pretty_assertions::assert_eq;

use super::harness;
use super::harness_with;
use super::png;
use super::settle;
use super::text;

struct Rename(&'static str);

#[async_trait::async_trait]
impl UploadProcessor for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    async fn process(&self, mut file: UploadFile) -> Result<UploadFile, String> {
        file.name = format!("{}{}", self.0, file.name);
        Ok(file)
    }
}

struct Refuse;

#[async_trait::async_trait]
impl UploadProcessor for Refuse {
    fn name(&self) -> &str {
        "refuse"
    }

    async fn process(&self, _file: UploadFile) -> Result<UploadFile, String> {
        Err("image could not be resized".to_string())
    }
}

#[tokio::test]
async fn vetoing_handler_owns_a_single_file() {
    let mut h = harness(MockTransport::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    h.coordinator
        .registries_mut()
        .handlers
        .register(["gpx"], move |file, doc| {
            seen.fetch_add(1, Ordering::SeqCst);
            doc.insert_text_at_cursor(&format!("[map of {}]", file.name));
            false
        });

    let outcome = h.coordinator.on_files_chosen(vec![UploadFile::new(
        "Route.GPX",
        "application/gpx+xml",
        vec![1u8; 8],
    )]);
    assert_eq!(
        outcome,
        SubmitOutcome::Handled {
            file: "Route.GPX".to_string()
        }
    );
    assert_eq!(text(&h.coordinator), "[map of Route.GPX]");
    assert_eq!(h.coordinator.status().active_count, 0);
    assert!(h.transport.transferred().is_empty());

    // With more than one file handlers are not consulted.
    h.coordinator.on_files_chosen(vec![
        UploadFile::new("a.gpx", "application/gpx+xml", vec![1u8; 8]),
        png("b.png"),
    ]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    settle(&mut h.coordinator).await;
}

#[tokio::test]
async fn handler_returning_true_keeps_default_path() {
    let mut h = harness(MockTransport::new());
    h.coordinator
        .registries_mut()
        .handlers
        .register([".png"], |_, _| true);

    let outcome = h.coordinator.on_files_chosen(vec![png("a.png")]);
    assert_matches!(outcome, SubmitOutcome::Dispatched { .. });
    settle(&mut h.coordinator).await;
    assert_eq!(h.transport.transferred(), vec!["a.png".to_string()]);
}

#[tokio::test]
async fn resolvers_override_default_markup() {
    let mut h = harness(MockTransport::new());
    let resolvers = &mut h.coordinator.registries_mut().resolvers;
    resolvers.register(|upload, _| Some(format!("<img src=\"{}\">", upload.url)));
    resolvers.register(|_, markdown| Some(format!("{markdown}!")));

    h.coordinator.on_files_chosen(vec![png("a.png")]);
    settle(&mut h.coordinator).await;
    assert_eq!(
        text(&h.coordinator),
        "<img src=\"/uploads/default/original/1X/mock1.png\">!\n"
    );

    h.coordinator.registries_mut().clear();
    h.coordinator.on_files_chosen(vec![png("b.png")]);
    settle(&mut h.coordinator).await;
    assert!(text(&h.coordinator).ends_with("![b|640x480](upload://mock2.png)\n"));
}

#[tokio::test]
async fn processors_run_before_sending() {
    let mut h = harness(MockTransport::new().with_processing());
    h.coordinator
        .registries_mut()
        .processors
        .register(Arc::new(Rename("resized-")));
    let mut rx = h.coordinator.subscribe();

    h.coordinator.on_files_chosen(vec![png("a.png")]);
    settle(&mut h.coordinator).await;

    assert_eq!(h.transport.transferred(), vec!["resized-a.png".to_string()]);
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    assert!(names.contains(&"upload:processing"));
    assert!(!h.coordinator.status().is_processing);
}

#[tokio::test]
async fn processor_failure_fails_the_task() {
    let mut h = harness(MockTransport::new().with_processing());
    h.coordinator
        .registries_mut()
        .processors
        .register(Arc::new(Refuse));

    h.coordinator.on_files_chosen(vec![png("a.png")]);
    settle(&mut h.coordinator).await;

    assert_eq!(text(&h.coordinator), "");
    assert!(h.transport.transferred().is_empty());
    assert_eq!(h.reporter.messages().len(), 1);
}

#[tokio::test]
async fn processors_can_be_switched_off() {
    let mut config = UploadConfig::default();
    config.features.disable(Feature::UploadProcessors);
    let mut h = harness_with(
        MockTransport::new().with_processing(),
        config,
        Box::new(TextBuffer::new()),
    );
    h.coordinator
        .registries_mut()
        .processors
        .register(Arc::new(Rename("resized-")));

    h.coordinator.on_files_chosen(vec![png("a.png")]);
    settle(&mut h.coordinator).await;
    assert_eq!(h.transport.transferred(), vec!["a.png".to_string()]);
}

#[tokio::test]
async fn registries_are_per_coordinator() {
    let mut first = harness(MockTransport::new().with_processing());
    first
        .coordinator
        .registries_mut()
        .processors
        .register(Arc::new(Rename("x-")));
    first
        .coordinator
        .registries_mut()
        .resolvers
        .register(|_, _| Some("custom".to_string()));

    let mut second = harness(
        MockTransport::new()
            .with_processing()
            .with_behavior("a.png", MockBehavior::Succeed),
    );
    second.coordinator.on_files_chosen(vec![png("a.png")]);
    settle(&mut second.coordinator).await;
    assert_eq!(second.transport.transferred(), vec!["a.png".to_string()]);
    assert_eq!(text(&second.coordinator), "![a|640x480](upload://mock1.png)\n");
}

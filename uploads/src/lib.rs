//! Upload lifecycle for the composer: placeholders in, markup out.
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
mod coordinator;
mod document;
mod error;
mod events;
pub mod features;
mod gate;
mod markdown;
mod placeholder;
mod registry;
mod transport;

pub use config::ConfigError;
pub use config::Labels;
pub use config::TransportConfig;
pub use config::UploadConfig;
pub use config::UploadPolicy;
pub use coordinator::SubmitOutcome;
pub use coordinator::TaskOutcome;
pub use coordinator::TaskState;
pub use coordinator::UploadCoordinator;
pub use coordinator::UploadStatus;
pub use coordinator::UploadTask;
pub use document::DocumentBuffer;
pub use document::TextBuffer;
pub use error::CollectingReporter;
pub use error::ErrorReporter;
pub use error::TracingReporter;
pub use error::UploadError;
pub use events::ComposerEvent;
pub use events::DocumentEvent;
pub use events::EventBus;
pub use gate::GateDecision;
pub use gate::GateOptions;
pub use gate::PolicyGate;
pub use gate::Rejection;
pub use gate::UploadGate;
pub use markdown::MediaKind;
pub use markdown::UploadMarkdownPipeline;
pub use markdown::default_markdown;
pub use markdown::human_size;
pub use placeholder::PlaceholderNamer;
pub use placeholder::ReservedPlaceholder;
pub use registry::HandlerRegistry;
pub use registry::MarkdownResolver;
pub use registry::ResolverRegistry;
pub use registry::UploadHandler;
pub use registry::UploadRegistries;
pub use transport::MODE_ENV_VAR;
pub use transport::TransportMode;
pub use transport::build_transport;

// Transport-side types callers need to drive a coordinator.
pub use composer_uploads_client::MockBehavior;
pub use composer_uploads_client::MockTransport;
pub use composer_uploads_client::TransferError;
pub use composer_uploads_client::TransportEvent;
pub use composer_uploads_client::UploadFile;
pub use composer_uploads_client::UploadId;
pub use composer_uploads_client::UploadMetadata;
pub use composer_uploads_client::UploadProcessor;
pub use composer_uploads_client::UploadSource;

#![deny(clippy::unwrap_used, clippy::expect_used)]

mod api;
mod driver;
mod processor;
mod progress;

#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(feature = "online")]
mod direct;
#[cfg(feature = "online")]
mod http;
#[cfg(feature = "online")]
mod multipart;

pub use api::BatchId;
pub use api::Result;
pub use api::TransferError;
pub use api::UploadBatch;
pub use api::UploadContext;
pub use api::UploadFile;
pub use api::UploadId;
pub use api::UploadJob;
pub use api::UploadMetadata;
pub use api::UploadSource;
pub use api::UploadTransport;
pub use driver::TransportDriver;
pub use driver::TransportEvent;
pub use processor::ProcessorRegistry;
pub use processor::UploadProcessor;
pub use progress::ProgressReporter;

#[cfg(feature = "mock")]
pub use mock::MockBehavior;
#[cfg(feature = "mock")]
pub use mock::MockTransport;

#[cfg(feature = "online")]
pub use direct::DirectClient;
#[cfg(feature = "online")]
pub use http::HttpConfig;
#[cfg(feature = "online")]
pub use multipart::MultipartClient;

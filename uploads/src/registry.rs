//! Plugin registries owned by a coordinator. Each coordinator gets its own
//! set, so tests and separate composers never see each other's plugins.

use composer_uploads_client::ProcessorRegistry;
use composer_uploads_client::UploadFile;
use composer_uploads_client::UploadMetadata;

use crate::document::DocumentBuffer;

/// Claims a single dropped file. Returning `false` means the handler took
/// care of it and the default upload path is skipped.
pub type UploadHandler = Box<dyn Fn(&UploadFile, &mut dyn DocumentBuffer) -> bool + Send + Sync>;

/// Gets the upload and the markup so far; `Some` non-empty replaces it.
pub type MarkdownResolver = Box<dyn Fn(&UploadMetadata, &str) -> Option<String> + Send + Sync>;

struct HandlerEntry {
    extensions: Vec<String>,
    handler: UploadHandler,
}

#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<HandlerEntry>,
}

impl HandlerRegistry {
    /// Register `handler` for `extensions` (with or without the leading dot,
    /// any case).
    pub fn register<I, S, F>(&mut self, extensions: I, handler: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&UploadFile, &mut dyn DocumentBuffer) -> bool + Send + Sync + 'static,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self.entries.push(HandlerEntry {
            extensions,
            handler: Box::new(handler),
        });
    }

    /// First handler registered for the file's extension.
    pub fn find(&self, file: &UploadFile) -> Option<&UploadHandler> {
        let ext = file.extension()?;
        self.entries
            .iter()
            .find(|entry| entry.extensions.contains(&ext))
            .map(|entry| &entry.handler)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: Vec<MarkdownResolver>,
}

impl ResolverRegistry {
    pub fn register<F>(&mut self, resolver: F)
    where
        F: Fn(&UploadMetadata, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.resolvers.push(Box::new(resolver));
    }

    pub fn clear(&mut self) {
        self.resolvers.clear();
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &MarkdownResolver> {
        self.resolvers.iter()
    }
}

/// Extension handlers, markdown resolvers and pre-submit processors.
#[derive(Default)]
pub struct UploadRegistries {
    pub handlers: HandlerRegistry,
    pub resolvers: ResolverRegistry,
    /// Shared with the transport driver; registering here takes effect for the
    /// next dispatched batch.
    pub processors: ProcessorRegistry,
}

impl UploadRegistries {
    pub fn clear(&mut self) {
        self.handlers.clear();
        self.resolvers.clear();
        self.processors.clear();
    }
}

impl std::fmt::Debug for UploadRegistries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRegistries")
            .field("handlers", &self.handlers.len())
            .field("resolvers", &self.resolvers.len())
            .field("processors", &self.processors.len())
            .finish()
    }
}

use composer_uploads_client::UploadMetadata;

use crate::registry::ResolverRegistry;

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "ico", "heic", "heif", "webp", "avif", "bmp",
];
const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "webm", "m4v", "3gp", "ogv", "avi", "mpeg"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "m4a", "wav", "aac", "flac"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Attachment,
}

impl MediaKind {
    /// Classify by extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Audio
        } else {
            Self::Attachment
        }
    }

    pub fn from_filename(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Self::from_extension(ext),
            _ => Self::Attachment,
        }
    }

    fn of(upload: &UploadMetadata) -> Self {
        match upload.extension.as_deref() {
            Some(ext) if !ext.is_empty() => Self::from_extension(ext),
            _ => Self::from_filename(&upload.original_filename),
        }
    }
}

/// `1536` -> `"1.5 KB"`, `4194304` -> `"4 MB"`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes == 1 {
        return "1 Byte".to_string();
    }
    if bytes < 1024 {
        return format!("{bytes} Bytes");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 10.0).round() / 10.0;
    let label = UNITS[unit];
    if rounded.fract() == 0.0 {
        format!("{rounded:.0} {label}")
    } else {
        format!("{rounded:.1} {label}")
    }
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Markup used when no resolver overrides it.
pub fn default_markdown(upload: &UploadMetadata) -> String {
    let link = upload.link();
    let name = &upload.original_filename;
    match MediaKind::of(upload) {
        MediaKind::Image => {
            let alt = strip_extension(name);
            let width = upload.thumbnail_width.or(upload.width);
            let height = upload.thumbnail_height.or(upload.height);
            match (width, height) {
                (Some(w), Some(h)) => format!("![{alt}|{w}x{h}]({link})"),
                _ => format!("![{alt}]({link})"),
            }
        }
        MediaKind::Video => format!("![{name}|video]({link})"),
        MediaKind::Audio => format!("![{name}|audio]({link})"),
        MediaKind::Attachment => {
            let size = human_size(upload.filesize);
            format!("[{name}|attachment]({link}) ({size})")
        }
    }
}

/// Turns finished uploads into document markup.
pub struct UploadMarkdownPipeline<'a> {
    resolvers: &'a ResolverRegistry,
}

impl<'a> UploadMarkdownPipeline<'a> {
    pub fn new(resolvers: &'a ResolverRegistry) -> Self {
        Self { resolvers }
    }

    /// Default markup folded through the resolvers in registration order. A
    /// resolver returning `None` or an empty string leaves the accumulator alone.
    pub fn resolve(&self, upload: &UploadMetadata) -> String {
        self.resolvers
            .iter()
            .fold(default_markdown(upload), |markdown, resolver| {
                match resolver(upload, &markdown) {
                    Some(next) if !next.is_empty() => next,
                    _ => markdown,
                }
            })
    }
}

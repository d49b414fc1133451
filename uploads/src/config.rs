use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::features::Features;
use crate::features::FeaturesToml;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse upload config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Site settings that decide which files may be uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    /// Largest batch accepted in one action. 0 disables the limit.
    pub simultaneous_uploads: usize,
    /// Lowercased extensions without the dot. `*` authorizes everything.
    pub authorized_extensions: Vec<String>,
    pub max_image_size_kb: u64,
    pub max_attachment_size_kb: u64,
    pub allow_attachments: bool,
    pub allow_staff_to_upload_any_file_in_pm: bool,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            simultaneous_uploads: 5,
            authorized_extensions: ["jpg", "jpeg", "png", "gif", "pdf"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            max_image_size_kb: 4096,
            max_attachment_size_kb: 4096,
            allow_attachments: true,
            allow_staff_to_upload_any_file_in_pm: true,
        }
    }
}

impl UploadPolicy {
    pub fn authorizes_any_extension(&self) -> bool {
        self.authorized_extensions.iter().any(|ext| ext.trim() == "*")
    }

    pub fn authorizes_extension(&self, ext: &str) -> bool {
        self.authorizes_any_extension()
            || self
                .authorized_extensions
                .iter()
                .any(|allowed| allowed.trim().trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Comma separated list used in rejection messages.
    pub fn extensions_label(&self) -> String {
        self.authorized_extensions.join(", ")
    }
}

/// Endpoints and identity for the network transports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub upload_endpoint: String,
    pub presign_endpoint: String,
    pub complete_endpoint: String,
    pub client_id: Option<String>,
    pub csrf_token: Option<String>,
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            upload_endpoint: "http://localhost:3000/uploads.json".to_string(),
            presign_endpoint: "http://localhost:3000/uploads/generate-presigned".to_string(),
            complete_endpoint: "http://localhost:3000/uploads/complete-external-upload"
                .to_string(),
            client_id: None,
            csrf_token: None,
            user_agent: None,
        }
    }
}

/// User-facing words used inside placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub uploading: String,
    pub clipboard: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            uploading: "Uploading".to_string(),
            clipboard: "clipboard".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct UploadConfigToml {
    policy: UploadPolicy,
    transport: TransportConfig,
    features: FeaturesToml,
    labels: Labels,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadConfig {
    pub policy: UploadPolicy,
    pub transport: TransportConfig,
    pub features: Features,
    pub labels: Labels,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            policy: UploadPolicy::default(),
            transport: TransportConfig::default(),
            features: Features::with_defaults(),
            labels: Labels::default(),
        }
    }
}

impl UploadConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: UploadConfigToml = toml::from_str(contents)?;
        let mut features = Features::with_defaults();
        features.apply_map(&raw.features.entries);
        Ok(Self {
            policy: raw.policy,
            transport: raw.transport,
            features,
            labels: raw.labels,
        })
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents).inspect_err(|err| {
                tracing::error!("Failed to parse {}: {err}", path.display());
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::info!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

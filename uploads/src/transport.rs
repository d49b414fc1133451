use std::str::FromStr;
use std::sync::Arc;

use composer_uploads_client::DirectClient;
use composer_uploads_client::HttpConfig;
use composer_uploads_client::MockTransport;
use composer_uploads_client::MultipartClient;
use composer_uploads_client::UploadTransport;

use crate::config::TransportConfig;
use crate::config::UploadConfig;
use crate::features::Feature;

/// Environment switch that forces the scripted transport.
pub const MODE_ENV_VAR: &str = "COMPOSER_UPLOADS_MODE";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportMode {
    Mock,
    Multipart,
    Direct,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "multipart" => Ok(Self::Multipart),
            "direct" => Ok(Self::Direct),
            other => Err(format!(
                "unknown transport mode `{other}` (expected mock, multipart or direct)"
            )),
        }
    }
}

impl TransportMode {
    /// Mode implied by the configured features alone.
    pub fn from_config(config: &UploadConfig) -> Self {
        if config.features.enabled(Feature::DirectUploads) {
            Self::Direct
        } else {
            Self::Multipart
        }
    }

    /// `env_mode` is the value of `COMPOSER_UPLOADS_MODE`; only `mock`
    /// overrides the configuration.
    pub fn select(config: &UploadConfig, env_mode: Option<&str>) -> Self {
        match env_mode {
            Some(mode) if mode.eq_ignore_ascii_case("mock") => Self::Mock,
            _ => Self::from_config(config),
        }
    }
}

fn http_config(config: &TransportConfig) -> HttpConfig {
    HttpConfig {
        client_id: config.client_id.clone(),
        csrf_token: config.csrf_token.clone(),
        user_agent: config.user_agent.clone(),
    }
}

/// Build the transport once; the coordinator never learns which one it got.
pub fn build_transport(
    mode: TransportMode,
    config: &TransportConfig,
) -> anyhow::Result<Arc<dyn UploadTransport>> {
    let transport: Arc<dyn UploadTransport> = match mode {
        TransportMode::Mock => Arc::new(MockTransport::new().with_processing()),
        TransportMode::Multipart => Arc::new(
            MultipartClient::new(config.upload_endpoint.clone())?.with_config(http_config(config)),
        ),
        TransportMode::Direct => Arc::new(
            DirectClient::new(
                config.presign_endpoint.clone(),
                config.complete_endpoint.clone(),
            )?
            .with_config(http_config(config)),
        ),
    };
    tracing::debug!("upload.transport.selected mode={mode:?} name={}", transport.name());
    Ok(transport)
}

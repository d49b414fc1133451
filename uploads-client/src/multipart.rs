use reqwest::multipart::Form;
use reqwest::multipart::Part;
use tracing::debug;
use url::Url;

use crate::api::Result;
use crate::api::TransferError;
use crate::api::UploadContext;
use crate::api::UploadFile;
use crate::api::UploadMetadata;
use crate::api::UploadTransport;
use crate::http::HttpConfig;
use crate::http::HttpSession;
use crate::http::read_upload;
use crate::progress::ProgressReporter;
use crate::progress::body_with_progress;

const FILE_FIELD: &str = "files[]";

/// Posts files as `multipart/form-data` straight to the upload endpoint.
#[derive(Clone)]
pub struct MultipartClient {
    endpoint: String,
    session: HttpSession,
}

impl MultipartClient {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            session: HttpSession::new(HttpConfig::default())?,
        })
    }

    pub fn with_config(mut self, config: HttpConfig) -> Self {
        *self.session.config_mut() = config;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.session.config_mut().client_id = Some(client_id.into());
        self
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.session.config_mut().csrf_token = Some(token.into());
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.session.config_mut().user_agent = Some(ua.into());
        self
    }

    fn endpoint_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| TransferError::Unavailable(format!("invalid upload endpoint: {e}")))?;
        if let Some(client_id) = self.session.client_id() {
            url.query_pairs_mut().append_pair("client_id", client_id);
        }
        Ok(url)
    }
}

fn build_form(file: &UploadFile, context: UploadContext, progress: ProgressReporter) -> Result<Form> {
    let body = body_with_progress(file.data.clone(), progress);
    let part = Part::stream_with_length(body, file.size)
        .file_name(file.name.clone())
        .mime_str(&file.mime_type)
        .map_err(|e| TransferError::Http(format!("invalid mime type {}: {e}", file.mime_type)))?;
    let mut form = Form::new().text("type", "composer");
    if context.for_private_message {
        form = form.text("for_private_message", "true");
    }
    if context.pasted {
        form = form.text("pasted", "true");
    }
    Ok(form.part(FILE_FIELD, part))
}

#[async_trait::async_trait]
impl UploadTransport for MultipartClient {
    fn name(&self) -> &'static str {
        "multipart"
    }

    fn runs_processors(&self) -> bool {
        true
    }

    async fn transfer(
        &self,
        file: &UploadFile,
        context: UploadContext,
        progress: ProgressReporter,
    ) -> Result<UploadMetadata> {
        let url = self.endpoint_url()?;
        let form = build_form(file, context, progress)?;
        debug!("upload.multipart.post file={} url={url}", file.name);
        let resp = self
            .session
            .apply_default_headers(self.session.client.post(url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransferError::Http(format!("upload request failed: {e}")))?;
        read_upload(resp, "upload").await
    }
}

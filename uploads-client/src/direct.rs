use std::collections::HashMap;

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::api::Result;
use crate::api::TransferError;
use crate::api::UploadContext;
use crate::api::UploadFile;
use crate::api::UploadMetadata;
use crate::api::UploadTransport;
use crate::http::HttpConfig;
use crate::http::HttpSession;
use crate::http::read_upload;
use crate::http::status_error;
use crate::progress::ProgressReporter;
use crate::progress::body_with_progress;

/// Sends bytes straight to object storage using a short-lived authorization
/// minted per file by the presign endpoint, then registers the stored object
/// through the completion endpoint.
#[derive(Clone)]
pub struct DirectClient {
    presign_endpoint: String,
    complete_endpoint: String,
    session: HttpSession,
}

#[derive(Serialize)]
struct PresignRequest<'a> {
    filename: &'a str,
    content_type: &'a str,
    file_size: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    for_private_message: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pasted: bool,
}

/// Authorization returned by the presign endpoint.
#[derive(Debug, Deserialize)]
struct PresignedUpload {
    #[serde(default = "default_method")]
    method: String,
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    unique_identifier: String,
}

fn default_method() -> String {
    "PUT".to_string()
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    unique_identifier: &'a str,
}

impl DirectClient {
    pub fn new(
        presign_endpoint: impl Into<String>,
        complete_endpoint: impl Into<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            presign_endpoint: presign_endpoint.into(),
            complete_endpoint: complete_endpoint.into(),
            session: HttpSession::new(HttpConfig::default())?,
        })
    }

    pub fn with_config(mut self, config: HttpConfig) -> Self {
        *self.session.config_mut() = config;
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

    async fn presign(&self, file: &UploadFile, context: UploadContext) -> Result<PresignedUpload> {
        let body = PresignRequest {
            filename: &file.name,
            content_type: &file.mime_type,
            file_size: file.size,
            for_private_message: context.for_private_message,
            pasted: context.pasted,
        };
        let resp = self
            .session
            .apply_default_headers(self.session.client.post(&self.presign_endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransferError::Http(format!("presign request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        resp.json()
            .await
            .map_err(|e| TransferError::Decode(format!("decode presign response: {e}")))
    }

    async fn store(
        &self,
        file: &UploadFile,
        presigned: &PresignedUpload,
        progress: ProgressReporter,
    ) -> Result<()> {
        let method = Method::from_bytes(presigned.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| TransferError::Decode(format!("unsupported method {}", presigned.method)))?;
        let mut req = self.session.client.request(method, &presigned.url);
        for (name, value) in &presigned.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !presigned
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
        {
            req = req.header(CONTENT_TYPE, file.mime_type.as_str());
        }
        let resp = req
            .header(reqwest::header::CONTENT_LENGTH, file.size)
            .body(body_with_progress(file.data.clone(), progress))
            .send()
            .await
            .map_err(|e| TransferError::Http(format!("storage upload failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        Ok(())
    }

    async fn complete(&self, unique_identifier: &str) -> Result<UploadMetadata> {
        let resp = self
            .session
            .apply_default_headers(self.session.client.post(&self.complete_endpoint))
            .json(&CompleteRequest { unique_identifier })
            .send()
            .await
            .map_err(|e| TransferError::Http(format!("complete request failed: {e}")))?;
        read_upload(resp, "complete").await
    }
}

#[async_trait::async_trait]
impl UploadTransport for DirectClient {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn transfer(
        &self,
        file: &UploadFile,
        context: UploadContext,
        progress: ProgressReporter,
    ) -> Result<UploadMetadata> {
        let presigned = self.presign(file, context).await?;
        debug!(
            "upload.direct.presigned file={} method={} id={}",
            file.name, presigned.method, presigned.unique_identifier
        );
        self.store(file, &presigned, progress).await?;
        self.complete(&presigned.unique_identifier).await
    }
}

use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::header::ACCEPT;
use reqwest::header::USER_AGENT;
use serde::Deserialize;

use crate::api::Result;
use crate::api::TransferError;
use crate::api::UploadMetadata;

const CSRF_HEADER: &str = "X-CSRF-Token";
const MAX_ERROR_BODY: usize = 512;

/// Credentials and identity shared by the transports that talk to the forum
/// endpoints.
#[derive(Clone, Debug, Default)]
pub struct HttpConfig {
    pub client_id: Option<String>,
    pub csrf_token: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub(crate) struct HttpSession {
    pub(crate) client: reqwest::Client,
    config: HttpConfig,
}

impl HttpSession {
    pub(crate) fn new(config: HttpConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }

    pub(crate) fn config_mut(&mut self) -> &mut HttpConfig {
        &mut self.config
    }

    pub(crate) fn client_id(&self) -> Option<&str> {
        self.config.client_id.as_deref()
    }

    /// Headers for requests to our own endpoints. Never used for the storage
    /// host, which must not see the session token.
    pub(crate) fn apply_default_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut b = builder.header(ACCEPT, "application/json");
        if let Some(token) = &self.config.csrf_token {
            b = b.header(CSRF_HEADER, token);
        }
        if let Some(ua) = &self.config.user_agent {
            b = b.header(USER_AGENT, ua.clone());
        }
        b
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Decode an upload record, or turn a non-success response into a
/// `TransferError::Status` carrying the server's first error message.
pub(crate) async fn read_upload(resp: Response, what: &str) -> Result<UploadMetadata> {
    if !resp.status().is_success() {
        return Err(status_error(resp).await);
    }
    resp.json::<UploadMetadata>()
        .await
        .map_err(|e| TransferError::Decode(format!("decode {what} response: {e}")))
}

pub(crate) async fn status_error(resp: Response) -> TransferError {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    TransferError::Status {
        status,
        message: error_message_from_body(&text),
    }
}

pub(crate) fn error_message_from_body(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(first) = parsed.errors.into_iter().find(|e| !e.trim().is_empty())
    {
        return first;
    }
    let trimmed = body.trim();
    if trimmed.starts_with('<') {
        // Storage hosts answer with XML or HTML pages; not useful to users.
        return String::new();
    }
    let mut end = trimmed.len().min(MAX_ERROR_BODY);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

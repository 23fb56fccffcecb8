use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::{
    error::ApiError,
    protocol::{
        HttpMethod, SitesNewRequest, SitesNewResponse, WpcomClientCredentials, WpcomRequest,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum SiteApiError {
    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The endpoint answered with a structured `{error, message}` body.
    #[error("api error {0}")]
    Api(ApiError),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait SiteApi: Send + Sync {
    async fn sites_new(&self, request: SitesNewRequest)
        -> Result<SitesNewResponse, SiteApiError>;
}

pub struct WpcomClient {
    http: Client,
    api_base: Url,
    credentials: Option<WpcomClientCredentials>,
}

impl WpcomClient {
    pub fn new(api_base: &str) -> Result<Self, SiteApiError> {
        Self::with_timeout(api_base, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(api_base: &str, timeout: Duration) -> Result<Self, SiteApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: normalize_base(api_base)?,
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, credentials: Option<WpcomClientCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub async fn request(&self, request: &WpcomRequest) -> Result<serde_json::Value, SiteApiError> {
        let url = self.api_base.join(&request.versioned_path())?;
        debug!(method = ?request.method, %url, "sending api request");

        let mut builder = match request.method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self.http.post(url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await?;
        let status = res.status();
        let body = res.bytes().await?;
        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }
        Err(error_from_body(status, &body))
    }
}

#[async_trait]
impl SiteApi for WpcomClient {
    async fn sites_new(
        &self,
        request: SitesNewRequest,
    ) -> Result<SitesNewResponse, SiteApiError> {
        let request = request.with_credentials(self.credentials.as_ref());
        let value = self
            .request(&WpcomRequest::post(
                "/sites/new",
                serde_json::to_value(&request)?,
            ))
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn normalize_base(api_base: &str) -> Result<Url, url::ParseError> {
    let trimmed = api_base.trim();
    if trimmed.ends_with('/') {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("{trimmed}/"))
    }
}

/// Only a 4xx `{error, message}` body is a verdict on the request itself.
fn error_from_body(status: StatusCode, body: &[u8]) -> SiteApiError {
    match serde_json::from_slice::<ApiError>(body) {
        Ok(api_error) if status.is_client_error() => SiteApiError::Api(api_error),
        _ => SiteApiError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

#[cfg(test)]
#[path = "tests/wpcom_tests.rs"]
mod tests;

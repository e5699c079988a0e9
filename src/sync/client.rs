//! HTTP transport for the sync coordinator.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::ReadingsApi;
use crate::auth::PIN_HEADER;
use crate::db::Reading;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport and protocol errors from the readings API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("server returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Server health summary.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthView {
    pub status: String,
    #[serde(rename = "authEnabled")]
    pub auth_enabled: bool,
}

/// reqwest-backed readings API client.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for the given server. A bare host:port gets an
    /// http scheme prepended.
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let base = base_url.into();
        let base = if base.starts_with("http://") || base.starts_with("https://") {
            base
        } else {
            format!("http://{}", base)
        };

        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            base_url: base.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Check server health. Never requires a pin.
    pub async fn fetch_health(&self) -> Result<HealthView, FetchError> {
        let resp = self.request("/health", None).send().await?;
        let resp = check_status(resp)?;
        Ok(resp.json().await?)
    }

    fn request(&self, path: &str, pin: Option<&str>) -> reqwest::RequestBuilder {
        let mut req = self.http.get(format!("{}{}", self.base_url, path));
        if let Some(pin) = pin {
            req = req.header(PIN_HEADER, pin);
        }
        req
    }
}

impl ReadingsApi for ApiClient {
    async fn fetch_latest(&self, pin: Option<&str>) -> Result<Option<Reading>, FetchError> {
        let resp = self.request("/readings/latest", pin).send().await?;
        let resp = check_status(resp)?;
        let value: serde_json::Value = resp.json().await?;

        // An empty store answers `{}`; any real reading carries an id.
        if value.get("id").is_none() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn fetch_window(&self, pin: Option<&str>, hours: f64) -> Result<Vec<Reading>, FetchError> {
        let resp = self
            .request("/readings/window", pin)
            .query(&[("hours", hours)])
            .send()
            .await?;
        let resp = check_status(resp)?;
        Ok(resp.json().await?)
    }
}

fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else if status == reqwest::StatusCode::UNAUTHORIZED {
        Err(FetchError::Unauthorized)
    } else {
        Err(FetchError::Status(status.as_u16()))
    }
}

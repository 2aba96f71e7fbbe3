//! Authorization gate.
//!
//! Forwards the caller's credential to the external authority and turns the
//! answer into a verdict. A refusal carries the authority's own status and
//! body so the gateway can relay them untouched; failing to get an answer at
//! all is an error, never a refusal.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, HOST};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

/// Path of the authority's check endpoint, relative to its base URL.
pub const AUTHORIZE_PATH: &str = "/api/authorize/";

/// Default timeout for the authority call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AuthError {
    /// Timeout, refused connection, or a response that could not be read.
    #[error("Authorization authority unreachable: {0}")]
    AuthorityUnreachable(String),
    #[error("Invalid authority URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// The authority's refusal, relayed verbatim.
#[derive(Debug, Clone)]
pub struct DenyPayload {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum AuthVerdict {
    Allow,
    Deny(DenyPayload),
}

impl AuthVerdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, AuthVerdict::Allow)
    }
}

/// Settings for reaching the authority.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub base_url: Url,
    /// Identifying `Host` sent with each check.
    pub host_header: Option<String>,
    pub timeout: Duration,
}

impl AuthConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            host_header: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Gate in front of the engine. No retries; that belongs to the transport.
pub struct AuthorizationGate {
    client: Client,
    authorize_url: Url,
    host_header: Option<HeaderValue>,
}

impl AuthorizationGate {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let authorize_url = config.base_url.join(AUTHORIZE_PATH)?;
        let host_header = config
            .host_header
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            authorize_url,
            host_header,
        })
    }

    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    /// Headers for the outbound check, built only from the inbound credential.
    ///
    /// The credential is forwarded byte-for-byte; without one, no
    /// `Authorization` header is sent and the authority decides.
    pub fn outbound_headers(&self, credential: Option<&HeaderValue>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(host) = &self.host_header {
            headers.insert(HOST, host.clone());
        }
        if let Some(credential) = credential {
            headers.insert(AUTHORIZATION, credential.clone());
        }
        headers
    }

    /// Ask the authority whether `credential` may use the engine.
    pub async fn authorize(&self, credential: Option<&HeaderValue>) -> Result<AuthVerdict, AuthError> {
        let response = self
            .client
            .get(self.authorize_url.clone())
            .headers(self.outbound_headers(credential))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Authority request to {} failed: {}", self.authorize_url, e);
                AuthError::AuthorityUnreachable(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("Authority allowed request ({})", status);
            return Ok(AuthVerdict::Allow);
        }

        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::AuthorityUnreachable(format!("unreadable response: {}", e)))?
            .to_vec();

        tracing::info!("Authority denied request ({})", status);
        Ok(AuthVerdict::Deny(DenyPayload {
            status,
            content_type,
            body,
        }))
    }
}

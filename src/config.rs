//! Configuration for the gateway.
//!
//! Every setting is a CLI flag with an environment variable fallback, so the
//! service runs from plain environment (plus an optional `.env`) in
//! production and from flags locally.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::auth::AuthConfig;
use crate::engine::{EngineConfig, StartupPolicy, DEFAULT_MAX_QUEUE};
use crate::ocr::{LanguageSet, LanguageSetError};

/// Default authorization authority.
pub const DEFAULT_AUTHORITY_URL: &str = "https://rononbd.up.railway.app";

/// Default listener port.
pub const DEFAULT_PORT: u16 = 3001;

/// Default upload limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default CORS origins.
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost,https://rononbd.com,https://www.rononbd.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid OCR languages: {0}")]
    Languages(#[from] LanguageSetError),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Raw gateway settings as given on the command line or in the environment.
#[derive(Debug, Clone, clap::Args)]
pub struct GatewayArgs {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Base URL of the authorization authority
    #[arg(long, env = "AUTHORITY_URL", default_value = DEFAULT_AUTHORITY_URL)]
    pub authority_url: String,

    /// Host header sent to the authority to identify this gateway
    #[arg(long, env = "AUTHORITY_HOST_HEADER")]
    pub authority_host_header: Option<String>,

    /// Timeout for the authority call, in seconds
    #[arg(long, env = "AUTHORITY_TIMEOUT_SECS", default_value_t = 10)]
    pub authority_timeout_secs: u64,

    /// Public URL, used only in startup logs (default: http://localhost:<port>)
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    /// OCR languages, comma or plus separated
    #[arg(long, env = "OCR_LANGUAGES", default_value = "eng,ben")]
    pub languages: String,

    /// When to load the OCR engine
    #[arg(long, env = "OCR_STARTUP", value_enum, default_value_t = StartupPolicy::Eager)]
    pub startup: StartupPolicy,

    /// Jobs allowed to wait for the engine (0 = unlimited)
    #[arg(long, env = "OCR_MAX_QUEUE", default_value_t = DEFAULT_MAX_QUEUE)]
    pub max_queue: usize,

    /// Tesseract binary
    #[arg(long, env = "TESSERACT_BIN", default_value = "tesseract")]
    pub tesseract_bin: PathBuf,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Allowed CORS origins, comma separated ("*" allows any origin)
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',', default_value = DEFAULT_CORS_ORIGINS)]
    pub cors_origins: Vec<String>,
}

/// HTTP surface settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origins: DEFAULT_CORS_ORIGINS.split(',').map(str::to_string).collect(),
        }
    }
}

/// Validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub public_url: String,
    pub auth: AuthConfig,
    pub engine: EngineConfig,
    pub tesseract_bin: PathBuf,
    pub http: HttpConfig,
}

impl GatewayArgs {
    /// Validate into `Settings`.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let base_url = Url::parse(&self.authority_url).map_err(|source| ConfigError::InvalidUrl {
            name: "AUTHORITY_URL",
            source,
        })?;
        if self.authority_timeout_secs == 0 {
            return Err(ConfigError::Zero("AUTHORITY_TIMEOUT_SECS"));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Zero("MAX_UPLOAD_BYTES"));
        }
        let languages: LanguageSet = self.languages.parse()?;

        let public_url = self
            .public_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", self.port));

        let cors_origins = self
            .cors_origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Settings {
            host: self.host,
            port: self.port,
            public_url,
            auth: AuthConfig {
                base_url,
                host_header: self.authority_host_header.filter(|h| !h.trim().is_empty()),
                timeout: Duration::from_secs(self.authority_timeout_secs),
            },
            engine: EngineConfig {
                languages,
                policy: self.startup,
                max_queue: self.max_queue,
            },
            tesseract_bin: self.tesseract_bin,
            http: HttpConfig {
                max_upload_bytes: self.max_upload_bytes,
                cors_origins,
            },
        })
    }
}

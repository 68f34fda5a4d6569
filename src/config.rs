//! Completion client configuration.
//!
//! Everything the client needs is carried in a [`ClientConfig`] value handed
//! over at construction: credential, endpoint, mode registry, time budgets and
//! identification headers.

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::registry::ModeRegistry;

/// Environment variable holding the bearer credential.
pub const API_KEY_ENV: &str = "MODECHAT_API_KEY";

/// Environment variable overriding the endpoint.
pub const ENDPOINT_ENV: &str = "MODECHAT_ENDPOINT";

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Token cap sent with every request.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Time budget of a blocking exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time budget of a streaming exchange, applied to connecting and to each idle gap.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_REFERER: &str = "modechat";
const DEFAULT_TITLE: &str = "modechat";

const PLACEHOLDER_KEYS: &[&str] = &["your_openrouter_api_key_here", "your_api_key_here"];

/// Rejects empty and placeholder credentials.
pub fn validate_api_key(api_key: &str) -> Result<()> {
    let trimmed = api_key.trim();
    if trimmed.is_empty() {
        return Err(Error::authentication(format!(
            "no API key configured; set {API_KEY_ENV}"
        )));
    }
    if PLACEHOLDER_KEYS
        .iter()
        .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
        || trimmed.starts_with('<')
    {
        return Err(Error::authentication(format!(
            "{API_KEY_ENV} still holds a placeholder value"
        )));
    }
    Ok(())
}

/// Parses an endpoint, accepting only http and https URLs.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::validation(
            format!("unsupported endpoint scheme {scheme:?}"),
            Some("endpoint".to_string()),
        )),
    }
}

/// Configuration of a completion client.
#[derive(Clone)]
pub struct ClientConfig {
    api_key: String,
    /// Chat completions endpoint.
    pub endpoint: Url,
    /// Mode registry consulted for system prompts.
    pub modes: ModeRegistry,
    /// Blocking exchange budget.
    pub timeout: Duration,
    /// Streaming connect and idle budget.
    pub stream_timeout: Duration,
    /// `max_tokens` sent with every request.
    pub max_tokens: u32,
    /// Value of the `HTTP-Referer` identification header.
    pub referer: String,
    /// Value of the `X-Title` identification header.
    pub title: String,
}

impl ClientConfig {
    /// Creates a configuration for `api_key` with every other setting at its default.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        validate_api_key(&api_key)?;
        Ok(Self {
            api_key: api_key.trim().to_string(),
            endpoint: parse_endpoint(DEFAULT_ENDPOINT)?,
            modes: ModeRegistry::builtin(),
            timeout: DEFAULT_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        })
    }

    /// Reads the credential and optional endpoint override from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var(API_KEY_ENV).unwrap_or_default();
        let config = Self::new(api_key)?;
        match env::var(ENDPOINT_ENV) {
            Ok(endpoint) if !endpoint.trim().is_empty() => config.with_endpoint(&endpoint),
            _ => Ok(config),
        }
    }

    /// The bearer credential.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = parse_endpoint(endpoint)?;
        Ok(self)
    }

    pub fn with_modes(mut self, modes: ModeRegistry) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_timeouts(mut self, timeout: Duration, stream_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.stream_timeout = stream_timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_identity(
        mut self,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint.as_str())
            .field("modes", &self.modes.names().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("stream_timeout", &self.stream_timeout)
            .field("max_tokens", &self.max_tokens)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .finish()
    }
}

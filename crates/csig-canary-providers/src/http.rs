// crates/csig-canary-providers/src/http.rs
// ============================================================================
// Module: HTTP Collection Transport
// Description: Async GET transport for settings metadata, records, and chains.
// Purpose: Fetch remote collection state with strict limits.
// Dependencies: csig-canary-core, reqwest, serde
// ============================================================================

//! ## Overview
//! The HTTP transport issues bounded GET requests and returns the raw status
//! and body. Two clients are kept: one follows up to `max_redirects`
//! redirects (metadata), the other never follows (records and chains) so a
//! redirect surfaces as a 3xx status the orchestrator rejects. Status policy
//! lives in the orchestrator; this layer only enforces scheme, host, and size
//! restrictions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use csig_canary_core::CollectionTransport;
use csig_canary_core::FetchRequest;
use csig_canary_core::FetchResponse;
use csig_canary_core::TransportError;
use reqwest::Client;
use reqwest::Response;
use reqwest::Url;
use reqwest::redirect::Policy;
use serde::Deserialize;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP transport.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` URLs.
/// - `max_response_bytes` is a hard upper bound on response bodies.
/// - If `allowed_hosts` is set, only listed hosts are permitted.
/// - URLs with embedded credentials are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Allow cleartext HTTP (needed for the `local` environment).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Redirect hops followed by requests that allow redirects.
    pub max_redirects: usize,
    /// Optional host allowlist.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: 5_000,
            max_response_bytes: 8 * 1024 * 1024,
            max_redirects: 5,
            allowed_hosts: None,
            user_agent: concat!("csig-canary/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Collection transport backed by `reqwest`.
pub struct HttpTransport {
    /// Transport configuration, including limits and policy.
    config: HttpTransportConfig,
    /// Client that follows redirects.
    following: Client,
    /// Client that never follows redirects.
    direct: Client,
}

impl HttpTransport {
    /// Creates a transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when an HTTP client cannot be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let following = build_http_client(&config, Policy::limited(config.max_redirects))?;
        let direct = build_http_client(&config, Policy::none())?;
        Ok(Self {
            config,
            following,
            direct,
        })
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

#[async_trait]
impl CollectionTransport for HttpTransport {
    async fn get(&self, request: FetchRequest) -> Result<FetchResponse, TransportError> {
        let url = parse_url(&request.url, &self.config)?;
        let client = if request.follow_redirects { &self.following } else { &self.direct };
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|err| classify_request_error(&request.url, &err, self.config.timeout_ms))?;
        let status = response.status().as_u16();
        let body = read_response_limited(response, &request.url, &self.config).await?;
        Ok(FetchResponse {
            status,
            body,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an HTTP client with the given redirect policy.
fn build_http_client(config: &HttpTransportConfig, policy: Policy) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .user_agent(config.user_agent.clone())
        .redirect(policy)
        .build()
        .map_err(|err| TransportError::Request {
            url: String::new(),
            reason: format!("http client build failed: {err}"),
        })
}

/// Parses a URL and validates scheme, credential, and allowlist policy.
fn parse_url(raw: &str, config: &HttpTransportConfig) -> Result<Url, TransportError> {
    let invalid = |reason: &str| TransportError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw).map_err(|err| invalid(&err.to_string()))?;
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        _ => return Err(invalid("unsupported url scheme")),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("url credentials are not allowed"));
    }
    if let Some(allowlist) = &config.allowed_hosts {
        let host = normalize_host_label(url.host_str().ok_or_else(|| invalid("url host required"))?);
        if !allowlist.iter().any(|entry| normalize_host_label(entry) == host) {
            return Err(invalid("url host not allowed"));
        }
    }
    Ok(url)
}

/// Normalizes host labels for allowlist comparisons.
fn normalize_host_label(host: &str) -> String {
    let trimmed = host.trim_end_matches('.');
    let trimmed =
        trimmed.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(trimmed);
    trimmed.to_ascii_lowercase()
}

/// Maps a `reqwest` send failure to a transport error.
fn classify_request_error(url: &str, err: &reqwest::Error, timeout_ms: u64) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout {
            url: url.to_string(),
            timeout_ms,
        };
    }
    let reason = if err.is_redirect() {
        "too many redirects".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    TransportError::Request {
        url: url.to_string(),
        reason,
    }
}

/// Reads the response body while enforcing a byte limit.
async fn read_response_limited(
    mut response: Response,
    url: &str,
    config: &HttpTransportConfig,
) -> Result<Vec<u8>, TransportError> {
    let too_large = || TransportError::TooLarge {
        url: url.to_string(),
        limit: config.max_response_bytes,
    };
    let max_bytes_u64 = u64::try_from(config.max_response_bytes).map_err(|_| too_large())?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(too_large());
    }
    let mut buf = Vec::new();
    loop {
        let chunk = response
            .chunk()
            .await
            .map_err(|err| classify_request_error(url, &err, config.timeout_ms))?;
        let Some(chunk) = chunk else {
            break;
        };
        if buf.len().saturating_add(chunk.len()) > config.max_response_bytes {
            return Err(too_large());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

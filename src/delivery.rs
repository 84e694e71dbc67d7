//! Alert delivery to a cluster of Alertmanager endpoints.
//!
//! Targets are redundant members of one cluster, so delivery is sequential
//! fallback rather than fan-out: the alerts go to the first target that
//! accepts them, and the rest are never contacted.
//!
//! ```text
//! targets: [A, B, C]
//!
//!   POST A/api/v1/alerts ── 503 ──> record failure, next
//!   POST B/api/v1/alerts ── 200 ──> done (A's failure is dropped)
//!   C is never tried
//! ```
//!
//! If every target fails, [`DeliveryError::Exhausted`] carries one entry
//! per target in the order they were tried.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};

use crate::alert::Alert;
use crate::build_info::BuildInfo;

/// Path appended to every target URL.
pub const ALERT_API_PATH: &str = "/api/v1/alerts";

/// TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// TCP keepalive interval.
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);
/// How long an idle pooled connection is kept.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(90);
/// Maximum idle connections kept in the pool.
pub const MAX_IDLE_CONNECTIONS: usize = 100;

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors that can occur while delivering alerts.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The target list was empty after trimming.
    #[error("No alertmanager targets to deliver to")]
    NoTargets,

    /// The alerts could not be encoded as JSON.
    #[error("Failed to encode alerts: {0}")]
    Encode(#[from] serde_json::Error),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Every target was tried and none accepted the alerts.
    #[error("All alertmanager targets failed:\n{}", join_failures(.0))]
    Exhausted(Vec<TargetFailure>),
}

impl DeliveryError {
    /// Per-target failures, in the order the targets were tried.
    pub fn failures(&self) -> &[TargetFailure] {
        match self {
            DeliveryError::Exhausted(failures) => failures,
            _ => &[],
        }
    }
}

fn join_failures(failures: &[TargetFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    /// The trimmed target URL that was tried.
    pub target: String,
    pub reason: FailureReason,
}

/// Why a target rejected or never received the alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Connection, TLS or timeout error; no HTTP response.
    Transport(String),
    /// The target answered with a non-2xx status.
    Status { code: u16, body: String },
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FailureReason::Transport(error) => {
                write!(f, "{}: Error when sending alerts: {}", self.target, error)
            }
            FailureReason::Status { code, body } => write!(
                f,
                "{}: Error when sending alerts (code: {}): {}",
                self.target, code, body
            ),
        }
    }
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Target that accepted the alerts.
    pub target: String,
    /// Number of targets tried, including the successful one.
    pub attempts: usize,
    pub alert_count: usize,
}

/// Response to a POST, with the body already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that produced no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends a JSON payload to a URL.
///
/// Implementations must fully consume the response body before returning,
/// on success and failure alike, so connections are released before the
/// next target is tried.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &[u8])
    -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T: AlertTransport + ?Sized> AlertTransport for &T {
    async fn post_json(
        &self,
        url: &str,
        body: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        (**self).post_json(url, body).await
    }
}

/// Whether outbound TLS certificates are verified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsPolicy {
    #[default]
    Verify,
    /// Accept any certificate. Not recommended.
    AcceptInvalidCerts,
}

impl TlsPolicy {
    pub fn from_skip_insecure(skip_insecure: bool) -> Self {
        if skip_insecure {
            TlsPolicy::AcceptInvalidCerts
        } else {
            TlsPolicy::Verify
        }
    }
}

/// [`AlertTransport`] over HTTP(S) with a pooled `reqwest` client.
///
/// Proxies are taken from the environment (`HTTP_PROXY`, `HTTPS_PROXY`,
/// `NO_PROXY`).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds the client with the fixed transport timeouts.
    pub fn new(tls: TlsPolicy, build_info: BuildInfo) -> DeliveryResult<Self> {
        Self::with_proxy_mode(tls, build_info, true)
    }

    /// Like [`HttpTransport::new`], but ignores proxy environment variables.
    pub fn direct(tls: TlsPolicy, build_info: BuildInfo) -> DeliveryResult<Self> {
        Self::with_proxy_mode(tls, build_info, false)
    }

    /// reqwest has no separate TLS handshake timeout; the handshake runs
    /// inside [`CONNECT_TIMEOUT`]. Requests never send `Expect: 100-continue`,
    /// so there is no continue timeout either.
    fn with_proxy_mode(
        tls: TlsPolicy,
        build_info: BuildInfo,
        env_proxy: bool,
    ) -> DeliveryResult<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(build_info.user_agent())
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS);

        if !env_proxy {
            builder = builder.no_proxy();
        }
        if tls == TlsPolicy::AcceptInvalidCerts {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl AlertTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| TransportError(error_chain(&e)))?;

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => format!("<failed to read response body: {}>", error_chain(&e)),
        };

        Ok(TransportResponse { status, body })
    }
}

/// Formats an error with all of its sources, outermost first.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Full alerts URL for a target.
///
/// Surrounding whitespace and trailing slashes on the target are dropped.
pub fn alerts_url(target: &str) -> String {
    format!("{}{}", target.trim().trim_end_matches('/'), ALERT_API_PATH)
}

/// Delivers alerts to the first target that accepts them.
pub struct Deliverer<T> {
    transport: T,
}

impl<T: AlertTransport> Deliverer<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Sends all alerts as one JSON array, trying targets in order.
    ///
    /// Stops at the first 2xx response. Failures before that are logged and
    /// then discarded.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::NoTargets`] if no non-blank target was given
    /// - [`DeliveryError::Encode`] if the alerts can't be serialized
    /// - [`DeliveryError::Exhausted`] if every target failed
    pub async fn deliver<S: AsRef<str>>(
        &self,
        alerts: &[Alert],
        targets: &[S],
    ) -> DeliveryResult<Delivered> {
        let targets: Vec<&str> = targets
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .collect();
        if targets.is_empty() {
            return Err(DeliveryError::NoTargets);
        }

        let payload = serde_json::to_vec(alerts)?;
        let mut failures = Vec::new();

        for (attempt, target) in targets.iter().enumerate() {
            let url = alerts_url(target);
            debug!("Sending {} alerts to {}", alerts.len(), url);

            let reason = match self.transport.post_json(&url, &payload).await {
                Ok(response) if response.is_success() => {
                    info!(
                        "Delivered {} alerts to {} (status {})",
                        alerts.len(),
                        target,
                        response.status
                    );
                    return Ok(Delivered {
                        target: target.to_string(),
                        attempts: attempt + 1,
                        alert_count: alerts.len(),
                    });
                }
                Ok(response) => FailureReason::Status {
                    code: response.status,
                    body: response.body,
                },
                Err(e) => FailureReason::Transport(e.0),
            };

            let failure = TargetFailure {
                target: target.to_string(),
                reason,
            };
            warn!("{}", failure);
            failures.push(failure);
        }

        Err(DeliveryError::Exhausted(failures))
    }
}

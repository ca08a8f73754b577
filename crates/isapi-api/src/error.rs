use std::time::Duration;

use thiserror::Error;

use crate::normalize::Presentation;

/// Top-level error type for the `isapi-api` crate.
///
/// Covers every failure mode of a device conversation: request
/// configuration, auth negotiation, transport, HTTP status and XML
/// decoding. The CLI maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// The caller built an unusable request (e.g. no HTTP method).
    #[error("Invalid request configuration: {0}")]
    Configuration(String),

    // ── Authentication ──────────────────────────────────────────────
    /// Neither Basic nor Digest was accepted. Carries the final attempt's
    /// HTTP response so the device's own complaint is visible.
    #[error("Authentication failed (HTTP {status}) at {url}")]
    Authentication {
        status: u16,
        url: String,
        body: String,
    },

    /// The device sent a `WWW-Authenticate: Digest` header we can't use.
    #[error("Unusable digest challenge: {0}")]
    DigestChallenge(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No response headers arrived within the configured timeout.
    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The blocking facade could not start its runtime.
    #[error("Failed to start blocking runtime: {0}")]
    Runtime(#[source] std::io::Error),

    // ── HTTP ────────────────────────────────────────────────────────
    /// Non-2xx status on a regular request.
    #[error("HTTP {status} from {url}: {}", preview(.body))]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// Malformed or unexpected XML, with the offending payload attached.
    #[error("Failed to present response as {mode}: {message}")]
    Parse {
        message: String,
        raw: String,
        mode: Presentation,
    },
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the device rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Http { status: 401, .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status == 503,
            _ => false,
        }
    }

    /// Returns `true` if the device does not know the addressed resource.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

fn preview(body: &str) -> &str {
    let body = body.trim();
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

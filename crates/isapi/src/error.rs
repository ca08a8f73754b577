//! CLI error types with miette diagnostics.
//!
//! Maps `isapi_api::Error` and `ConfigError` variants into user-facing
//! errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use isapi_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(isapi::connection_failed),
        help(
            "Check that the device is powered and reachable.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: isapi_api::Error,
    },

    #[error("TLS setup failed: {reason}")]
    #[diagnostic(
        code(isapi::tls_error),
        help(
            "Devices usually ship self-signed certificates.\n\
             Use --insecure (-k) to accept them, or configure ca_cert in your profile."
        )
    )]
    Tls { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed (HTTP {status}) at {url}")]
    #[diagnostic(
        code(isapi::auth_failed),
        help(
            "The device rejected both Basic and Digest credentials.\n\
             Check --login / --password, or run: isapi config set-password"
        )
    )]
    AuthFailed { status: u16, url: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(isapi::no_credentials),
        help(
            "Pass --password, set ISAPI_PASSWORD, or store one with:\n\
             isapi config set-password --profile {profile}"
        )
    )]
    NoCredentials { profile: String },

    // ── Device responses ─────────────────────────────────────────────
    #[error("Resource not found: {url}")]
    #[diagnostic(
        code(isapi::not_found),
        help("Check the path; it is joined below the prefix (default: ISAPI).")
    )]
    NotFound { url: String },

    #[error("Device refused the request (HTTP 403) at {url}")]
    #[diagnostic(
        code(isapi::forbidden),
        help("The account lacks permission for this resource.")
    )]
    Forbidden { url: String },

    #[error("HTTP {status} from {url}")]
    #[diagnostic(code(isapi::http), help("{body}"))]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Could not decode the device response: {message}")]
    #[diagnostic(code(isapi::parse), help("Use --output xml to see the payload unmodified."))]
    Parse { message: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(isapi::timeout),
        help("Increase the timeout with --timeout or check device responsiveness.")
    )]
    Timeout { seconds: f64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(isapi::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(isapi::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(isapi::no_config),
        help(
            "Pass --host (or set ISAPI_HOST), or add a profile to:\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(isapi::config))]
    Config(Box<ConfigError>),

    // ── Library / IO ─────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(isapi::client))]
    Client(Box<isapi_api::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render output: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Tls { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Forbidden { .. } => exit_code::PERMISSION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            Self::Http { .. }
            | Self::Parse { .. }
            | Self::Config(_)
            | Self::Client(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<isapi_api::Error> for CliError {
    fn from(err: isapi_api::Error) -> Self {
        use isapi_api::Error as E;

        if let E::Transport(ref e) = err {
            if e.is_connect() {
                let url = e.url().map_or_else(String::new, ToString::to_string);
                return Self::ConnectionFailed { url, source: err };
            }
        }

        match err {
            E::Authentication { status, url, .. } => Self::AuthFailed { status, url },
            E::Http { status: 404, url, .. } => Self::NotFound { url },
            E::Http { status: 403, url, .. } => Self::Forbidden { url },
            E::Http { status, url, body } => Self::Http { status, url, body },
            E::Timeout { timeout } => Self::Timeout {
                seconds: timeout.as_secs_f64(),
            },
            E::Tls(reason) => Self::Tls { reason },
            E::Parse { message, .. } => Self::Parse { message },
            E::Configuration(reason) => Self::Validation {
                field: "request".into(),
                reason,
            },
            other => Self::Client(Box::new(other)),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn library_errors_map_to_exit_codes() {
        let not_found: CliError = isapi_api::Error::Http {
            status: 404,
            url: "http://cam/ISAPI/Nope".into(),
            body: String::new(),
        }
        .into();
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);

        let auth: CliError = isapi_api::Error::Authentication {
            status: 401,
            url: "http://cam/ISAPI/System/status".into(),
            body: String::new(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let timeout: CliError = isapi_api::Error::Timeout {
            timeout: Duration::from_secs(3),
        }
        .into();
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let missing: CliError = isapi_api::Error::Configuration("method is required".into()).into();
        assert_eq!(missing.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn config_errors_map_to_exit_codes() {
        let err: CliError = ConfigError::NoCredentials {
            profile: "cam".into(),
        }
        .into();
        assert!(matches!(err, CliError::NoCredentials { ref profile } if profile == "cam"));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}

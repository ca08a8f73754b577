// ISAPI device client
//
// Owns the HTTP client, base URL, credentials, prefix and the negotiated
// auth state. Cheap to clone; clones share auth state. Paths are built with
// `PathHandle`s obtained from `root()`, `segment()` or `at()`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::auth::{AuthState, Credentials};
use crate::error::Error;
use crate::path::PathHandle;
use crate::transport::{TlsMode, TransportConfig};

/// Root segment prepended to every resource path.
pub const DEFAULT_PREFIX: &str = "ISAPI";

/// Resolve `prefix/segments...` against `host` with standard URL-join
/// semantics.
pub fn resolve_locator(host: &Url, prefix: &str, segments: &[String]) -> Result<Url, Error> {
    let relative = std::iter::once(prefix)
        .chain(segments.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("/");
    Ok(host.join(&relative)?)
}

/// Async client for one device.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    http: reqwest::Client,
    host: Url,
    prefix: String,
    credentials: Credentials,
    timeout: Duration,
    pub(crate) auth: AuthState,
}

impl Client {
    pub fn builder(host: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(host)
    }

    /// Client with default transport settings.
    pub fn new(
        host: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::builder(host).credentials(login, password).build()
    }

    pub fn host(&self) -> &Url {
        &self.inner.host
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Default timeout for requests that don't set their own.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    /// Handle for the prefix itself.
    pub fn root(&self) -> PathHandle {
        PathHandle::new(self.clone(), Vec::new())
    }

    /// Handle for `prefix/name`.
    pub fn segment(&self, name: impl Into<String>) -> PathHandle {
        self.root().segment(name)
    }

    /// Handle for a slash-separated path under the prefix, e.g.
    /// `"System/deviceInfo"`.
    pub fn at(&self, path: &str) -> PathHandle {
        path.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root(), |handle, s| handle.segment(s))
    }

    pub(crate) fn locator(&self, segments: &[String]) -> Result<Url, Error> {
        resolve_locator(&self.inner.host, &self.inner.prefix, segments)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.inner.host.as_str())
            .field("prefix", &self.inner.prefix)
            .field("login", &self.inner.credentials.login)
            .field("timeout", &self.inner.timeout)
            .field("auth_scheme", &self.auth_scheme())
            .finish_non_exhaustive()
    }
}

// ── ClientBuilder ────────────────────────────────────────────────────

/// Builder for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    host: String,
    credentials: Option<Credentials>,
    prefix: String,
    transport: TransportConfig,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            credentials: None,
            prefix: DEFAULT_PREFIX.to_owned(),
            transport: TransportConfig::default(),
            http: None,
        }
    }

    pub fn credentials(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(login, password));
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = timeout;
        self
    }

    pub fn tls(mut self, tls: TlsMode) -> Self {
        self.transport.tls = tls;
        self
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Use a preconfigured HTTP client instead of building one from the
    /// transport config. The default timeout still applies per request.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<Client, Error> {
        let host = parse_host(&self.host)?;
        let credentials = self
            .credentials
            .ok_or_else(|| Error::Configuration("login and password are required".into()))?;
        let http = match self.http {
            Some(http) => http,
            None => self.transport.build_client()?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http,
                host,
                prefix: self.prefix,
                credentials,
                timeout: self.transport.timeout,
                auth: AuthState::default(),
            }),
        })
    }
}

/// Accept bare hosts (`192.168.1.64`) as `http://` URLs.
fn parse_host(host: &str) -> Result<Url, Error> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::Configuration("host is required".into()));
    }
    if host.contains("://") {
        Ok(Url::parse(host)?)
    } else {
        Ok(Url::parse(&format!("http://{host}"))?)
    }
}

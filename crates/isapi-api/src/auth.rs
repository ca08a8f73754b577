// Auth scheme negotiation
//
// Devices accept either Basic or Digest. The first request of a client
// probes `{prefix}/System/status` with Basic; a 401 switches to Digest using
// the challenge from that same response. The working scheme is remembered
// for the lifetime of the client (until `reset_auth`).

use std::sync::{Mutex, PoisonError, RwLock};

use reqwest::{Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::client::Client;
use crate::digest::{DigestChallenge, DigestSession};
use crate::dispatch::Outgoing;
use crate::error::Error;
use crate::options::TransportParams;

/// Well-known path used for scheme detection, relative to the prefix.
pub const PROBE_SEGMENTS: [&str; 2] = ["System", "status"];

/// HTTP authentication scheme accepted by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
}

/// Login and password for a device.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Per-client negotiation state.
#[derive(Debug, Default)]
pub(crate) struct AuthState {
    scheme: RwLock<Option<AuthScheme>>,
    /// Held for the duration of a negotiation so only one probe runs.
    gate: tokio::sync::Mutex<()>,
    digest: Mutex<DigestSession>,
}

impl Client {
    /// The negotiated scheme, or `None` before the first request.
    pub fn auth_scheme(&self) -> Option<AuthScheme> {
        *self
            .inner
            .auth
            .scheme
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget the negotiated scheme and digest challenge. The next request
    /// probes the device again (e.g. after a credential change).
    pub fn reset_auth(&self) {
        *self
            .inner
            .auth
            .scheme
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.digest_session().clear();
        debug!("auth state reset");
    }

    /// Resolve the auth scheme, probing the device at most once.
    ///
    /// Concurrent callers wait on the same negotiation and all observe its
    /// outcome.
    pub async fn ensure_authenticated(&self) -> Result<AuthScheme, Error> {
        if let Some(scheme) = self.auth_scheme() {
            return Ok(scheme);
        }

        let _gate = self.inner.auth.gate.lock().await;
        if let Some(scheme) = self.auth_scheme() {
            return Ok(scheme);
        }

        let scheme = self.negotiate().await?;
        *self
            .inner
            .auth
            .scheme
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(scheme);
        info!(?scheme, host = %self.host(), "auth scheme negotiated");
        Ok(scheme)
    }

    async fn negotiate(&self) -> Result<AuthScheme, Error> {
        let segments: Vec<String> = PROBE_SEGMENTS.iter().map(|s| (*s).to_owned()).collect();
        let mut probe = Outgoing::new(Method::GET, self.locator(&segments)?, TransportParams::default());
        probe.timeout = Some(self.timeout());

        debug!(url = %probe.url, "probing auth scheme with Basic");
        let response = self.send_basic(&probe).await?;
        if response.status().is_success() {
            return Ok(AuthScheme::Basic);
        }
        if response.status() != StatusCode::UNAUTHORIZED {
            return Err(probe_failure(response).await);
        }

        let Some(challenge) = DigestChallenge::from_headers(response.headers())? else {
            debug!("Basic rejected and no Digest challenge offered");
            return Err(probe_failure(response).await);
        };
        self.digest_session().update(challenge);

        debug!(url = %probe.url, "Basic rejected, retrying probe with Digest");
        let response = self.digest_request(&probe)?.send().await?;
        if response.status().is_success() {
            Ok(AuthScheme::Digest)
        } else {
            Err(probe_failure(response).await)
        }
    }

    /// Send a request with the negotiated scheme, negotiating first if
    /// needed.
    pub(crate) async fn send_authorized(&self, outgoing: &Outgoing) -> Result<Response, Error> {
        match self.ensure_authenticated().await? {
            AuthScheme::Basic => self.send_basic(outgoing).await,
            AuthScheme::Digest => self.send_digest(outgoing).await,
        }
    }

    async fn send_basic(&self, outgoing: &Outgoing) -> Result<Response, Error> {
        let credentials = self.credentials();
        let response = outgoing
            .request(self.http())
            .basic_auth(&credentials.login, Some(credentials.password.expose_secret()))
            .send()
            .await?;
        Ok(response)
    }

    /// Digest-signed send. A 401 flagged `stale` is answered once more with
    /// the new nonce; any other 401 is returned as is.
    async fn send_digest(&self, outgoing: &Outgoing) -> Result<Response, Error> {
        let response = self.digest_request(outgoing)?.send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        match DigestChallenge::from_headers(response.headers())? {
            Some(challenge) if challenge.stale => {
                debug!("digest nonce stale, retrying once");
                self.digest_session().update(challenge);
                Ok(self.digest_request(outgoing)?.send().await?)
            }
            Some(challenge) => {
                self.digest_session().update(challenge);
                Ok(response)
            }
            None => Ok(response),
        }
    }

    fn digest_request(&self, outgoing: &Outgoing) -> Result<reqwest::RequestBuilder, Error> {
        let credentials = self.credentials();
        let authorization = self.digest_session().authorization(
            &credentials.login,
            credentials.password.expose_secret(),
            outgoing.method.as_str(),
            &outgoing.url,
        )?;
        Ok(outgoing
            .request(self.http())
            .header(reqwest::header::AUTHORIZATION, authorization))
    }

    fn digest_session(&self) -> std::sync::MutexGuard<'_, DigestSession> {
        self.inner
            .auth
            .digest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Failed probe: 401/403 means the credentials were refused, anything else
/// is an ordinary HTTP failure.
async fn probe_failure(response: Response) -> Error {
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        Error::Authentication {
            status: status.as_u16(),
            url,
            body,
        }
    } else {
        Error::Http {
            status: status.as_u16(),
            url,
            body,
        }
    }
}

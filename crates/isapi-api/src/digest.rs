// HTTP Digest access authentication (RFC 7616 / RFC 2617).
//
// Devices that reject Basic answer with a `WWW-Authenticate: Digest ...`
// challenge. The session keeps the latest challenge plus a nonce counter so
// every request can be signed without another round trip; a 401 simply
// refreshes the challenge.

use std::fmt::Write as _;

use md5::Md5;
use reqwest::header::{HeaderMap, HeaderValue, WWW_AUTHENTICATE};
use sha2::{Digest as _, Sha256};
use tracing::trace;
use url::Url;

use crate::error::Error;

// ── Algorithm ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
}

impl Algorithm {
    fn parse(value: &str) -> Result<Self, Error> {
        match value.to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "MD5-SESS" => Ok(Self::Md5Sess),
            "SHA-256" => Ok(Self::Sha256),
            "SHA-256-SESS" => Ok(Self::Sha256Sess),
            other => Err(Error::DigestChallenge(format!(
                "unsupported algorithm '{other}'"
            ))),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
            Self::Sha256 => "SHA-256",
            Self::Sha256Sess => "SHA-256-sess",
        }
    }

    fn is_session(self) -> bool {
        matches!(self, Self::Md5Sess | Self::Sha256Sess)
    }

    fn hash(self, data: &str) -> String {
        match self {
            Self::Md5 | Self::Md5Sess => hex(&Md5::digest(data.as_bytes())),
            Self::Sha256 | Self::Sha256Sess => hex(&Sha256::digest(data.as_bytes())),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

// ── Challenge ────────────────────────────────────────────────────────

/// A parsed `WWW-Authenticate: Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: Algorithm,
    /// `true` when the server offered `qop=auth`; `false` means the legacy
    /// RFC 2069 computation without a nonce counter.
    pub qop_auth: bool,
    pub stale: bool,
}

impl DigestChallenge {
    /// Find and parse the Digest challenge among a response's headers.
    ///
    /// Returns `Ok(None)` when the response offers no Digest challenge.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, Error> {
        headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| {
                value
                    .get(..6)
                    .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
            })
            .map(Self::parse)
            .transpose()
    }

    /// Parse a header value of the form `Digest realm="...", nonce="..."`.
    pub fn parse(header: &str) -> Result<Self, Error> {
        let header = header.trim();
        let params = match header.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("digest") => rest,
            _ => return Err(Error::DigestChallenge(format!("not a digest challenge: {header}"))),
        };

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut algorithm = Algorithm::default();
        let mut qop = None;
        let mut stale = false;

        for (key, value) in auth_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "algorithm" => algorithm = Algorithm::parse(&value)?,
                "qop" => qop = Some(value),
                "stale" => stale = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        let qop_auth = match qop {
            None => false,
            Some(offered) => {
                if offered.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")) {
                    true
                } else {
                    return Err(Error::DigestChallenge(format!(
                        "unsupported qop '{offered}'"
                    )));
                }
            }
        };

        Ok(Self {
            realm: realm.ok_or_else(|| Error::DigestChallenge("missing realm".into()))?,
            nonce: nonce.ok_or_else(|| Error::DigestChallenge("missing nonce".into()))?,
            opaque,
            algorithm,
            qop_auth,
            stale,
        })
    }
}

/// Split `key=value, key="quoted, value"` pairs.
fn auth_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        let key = key.trim().to_owned();
        if key.is_empty() {
            break;
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => value.extend(chars.next()),
                    '"' => break,
                    c => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value = value.trim_end().to_owned();
        }
        params.push((key, value));
    }

    params
}

// ── Response computation ─────────────────────────────────────────────

/// Inputs for one signed request.
pub struct Signing<'a> {
    pub login: &'a str,
    pub password: &'a str,
    pub method: &'a str,
    pub uri: &'a str,
    pub nonce_count: u32,
    pub cnonce: &'a str,
}

/// The `response=` value for a request.
pub fn compute_response(challenge: &DigestChallenge, signing: &Signing<'_>) -> String {
    let algorithm = challenge.algorithm;
    let mut ha1 = algorithm.hash(&format!(
        "{}:{}:{}",
        signing.login, challenge.realm, signing.password
    ));
    if algorithm.is_session() {
        ha1 = algorithm.hash(&format!("{ha1}:{}:{}", challenge.nonce, signing.cnonce));
    }
    let ha2 = algorithm.hash(&format!("{}:{}", signing.method, signing.uri));

    if challenge.qop_auth {
        algorithm.hash(&format!(
            "{ha1}:{}:{:08x}:{}:auth:{ha2}",
            challenge.nonce, signing.nonce_count, signing.cnonce
        ))
    } else {
        algorithm.hash(&format!("{ha1}:{}:{ha2}", challenge.nonce))
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Current challenge and nonce counter shared by every request of a client.
#[derive(Debug, Default)]
pub struct DigestSession {
    challenge: Option<DigestChallenge>,
    nonce_count: u32,
}

impl DigestSession {
    /// Replace the challenge. The nonce counter restarts on a new nonce.
    pub fn update(&mut self, challenge: DigestChallenge) {
        let same_nonce = self
            .challenge
            .as_ref()
            .is_some_and(|current| current.nonce == challenge.nonce);
        if !same_nonce {
            self.nonce_count = 0;
        }
        trace!(
            realm = %challenge.realm,
            algorithm = challenge.algorithm.as_str(),
            stale = challenge.stale,
            "digest challenge updated"
        );
        self.challenge = Some(challenge);
    }

    pub fn clear(&mut self) {
        self.challenge = None;
        self.nonce_count = 0;
    }

    /// Build the `Authorization` header for one request.
    pub fn authorization(
        &mut self,
        login: &str,
        password: &str,
        method: &str,
        url: &Url,
    ) -> Result<HeaderValue, Error> {
        let challenge = self
            .challenge
            .as_ref()
            .ok_or_else(|| Error::DigestChallenge("no challenge received yet".into()))?;

        self.nonce_count = self.nonce_count.wrapping_add(1);
        let uri = &url[url::Position::BeforePath..];
        let cnonce = uuid::Uuid::new_v4().simple().to_string();
        let response = compute_response(
            challenge,
            &Signing {
                login,
                password,
                method,
                uri,
                nonce_count: self.nonce_count,
                cnonce: &cnonce,
            },
        );

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", algorithm={}, response=\"{response}\"",
            quote(login),
            quote(&challenge.realm),
            quote(&challenge.nonce),
            challenge.algorithm.as_str(),
        );
        if let Some(opaque) = &challenge.opaque {
            let _ = write!(header, ", opaque=\"{}\"", quote(opaque));
        }
        if challenge.qop_auth {
            let _ = write!(header, ", qop=auth, nc={:08x}, cnonce=\"{cnonce}\"", self.nonce_count);
        }

        HeaderValue::from_str(&header)
            .map_err(|e| Error::DigestChallenge(format!("unrepresentable authorization header: {e}")))
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Tests ────────────────────────────────────────────────────────────

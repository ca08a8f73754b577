//! Immutable path builder.
//!
//! A [`PathHandle`] is a client reference plus a list of path segments.
//! Every [`segment`](PathHandle::segment) or [`index`](PathHandle::index)
//! call returns a new handle; nothing is sent until the chain ends in
//! [`invoke`](PathHandle::invoke) or one of the verb shortcuts.
//!
//! ```rust,ignore
//! let client = Client::new("http://192.168.1.64", "admin", "password")?;
//! let info = client.segment("System").segment("deviceInfo").get().await?;
//!
//! let channel = client.at("Streaming/channels").index(101);
//! let picture = channel.segment("picture").opaque().await?.collect_bytes().await?;
//! ```

use std::fmt;

use bytes::Bytes;
use reqwest::Method;
use url::Url;

use crate::client::Client;
use crate::dispatch::Reply;
use crate::error::Error;
use crate::normalize::{Normalized, Presentation};
use crate::options::{RequestOptions, ReturnType};
use crate::stream::{EventStream, OpaqueStream};

/// A resource path under a client's prefix.
#[derive(Clone)]
pub struct PathHandle {
    client: Client,
    segments: Vec<String>,
}

impl PathHandle {
    pub(crate) fn new(client: Client, segments: Vec<String>) -> Self {
        Self { client, segments }
    }

    /// New handle with `name` appended. The segment is not validated.
    #[must_use]
    pub fn segment(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self::new(self.client.clone(), segments)
    }

    /// New handle with `value` rendered and appended (e.g. a channel id).
    #[must_use]
    pub fn index(&self, value: impl fmt::Display) -> Self {
        self.segment(value.to_string())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// `prefix/s1/.../sn`, as joined onto the host.
    pub fn path(&self) -> String {
        std::iter::once(self.client.prefix())
            .chain(self.segments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Absolute locator for this path.
    pub fn url(&self) -> Result<Url, Error> {
        self.client.locator(&self.segments)
    }

    /// Issue the request described by `options`.
    ///
    /// Fails with [`Error::Configuration`] when `options.method` is unset.
    pub async fn invoke(&self, options: RequestOptions) -> Result<Reply, Error> {
        self.client.dispatch(&self.segments, options).await
    }

    // ── Verb shortcuts ───────────────────────────────────────────────

    /// Buffered GET, normalized to a mapping.
    pub async fn get(&self) -> Result<Normalized, Error> {
        self.buffered(RequestOptions::get()).await
    }

    /// Buffered GET, returned as the raw payload text.
    pub async fn get_text(&self) -> Result<String, Error> {
        match self.buffered(RequestOptions::get().present(Presentation::Text)).await? {
            Normalized::Text(text) => Ok(text),
            other => Ok(other.into_value().to_string()),
        }
    }

    pub async fn put(&self, body: impl Into<Bytes>) -> Result<Normalized, Error> {
        self.buffered(RequestOptions::new(Method::PUT).body(body)).await
    }

    pub async fn post(&self, body: impl Into<Bytes>) -> Result<Normalized, Error> {
        self.buffered(RequestOptions::new(Method::POST).body(body)).await
    }

    pub async fn delete(&self) -> Result<Normalized, Error> {
        self.buffered(RequestOptions::new(Method::DELETE)).await
    }

    /// GET as an unbounded event stream.
    pub async fn stream(&self) -> Result<EventStream, Error> {
        self.invoke(RequestOptions::get().return_type(ReturnType::Stream))
            .await?
            .into_events()
            .ok_or_else(|| unexpected_reply("an event stream"))
    }

    /// GET as raw body chunks.
    pub async fn opaque(&self) -> Result<OpaqueStream, Error> {
        self.invoke(RequestOptions::get().return_type(ReturnType::OpaqueData))
            .await?
            .into_opaque()
            .ok_or_else(|| unexpected_reply("an opaque stream"))
    }

    async fn buffered(&self, options: RequestOptions) -> Result<Normalized, Error> {
        self.invoke(options.return_type(ReturnType::Buffered))
            .await?
            .into_body()
            .ok_or_else(|| unexpected_reply("a buffered body"))
    }
}

fn unexpected_reply(expected: &str) -> Error {
    Error::Configuration(format!("dispatcher did not return {expected}"))
}

/// Structural equality: same device, prefix and segments.
impl PartialEq for PathHandle {
    fn eq(&self, other: &Self) -> bool {
        self.client.host() == other.client.host()
            && self.client.prefix() == other.client.prefix()
            && self.segments == other.segments
    }
}

impl Eq for PathHandle {}

impl fmt::Debug for PathHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathHandle")
            .field("host", &self.client.host().as_str())
            .field("path", &self.path())
            .finish()
    }
}

impl fmt::Display for PathHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn client() -> Client {
        Client::new("http://192.168.1.64", "admin", "12345").unwrap()
    }

    #[test]
    fn chaining_accumulates_segments() {
        let client = client();
        let handle = client.segment("Streaming").segment("channels").index(101).segment("picture");
        assert_eq!(handle.path(), "ISAPI/Streaming/channels/101/picture");
        assert_eq!(
            handle.url().unwrap().as_str(),
            "http://192.168.1.64/ISAPI/Streaming/channels/101/picture"
        );
        assert_eq!(client.root().path(), "ISAPI");
    }

    #[test]
    fn handles_are_never_mutated() {
        let client = client();
        let system = client.segment("System");
        let info = system.segment("deviceInfo");
        let status = system.segment("status");
        assert_eq!(system.segments(), ["System"]);
        assert_eq!(info.path(), "ISAPI/System/deviceInfo");
        assert_eq!(status.path(), "ISAPI/System/status");
    }

    #[test]
    fn equal_prefixes_from_different_chains_are_equal() {
        let client = client();
        let a = client.segment("Event").segment("triggers");
        let b = client.at("Event").segment("triggers");
        let c = client.clone().segment("Event").index("triggers");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_ne!(a, client.segment("Event"));
    }

    #[test]
    fn arbitrary_segments_are_accepted() {
        let handle = client().segment("not a resource").index(-1);
        assert_eq!(handle.segments(), ["not a resource", "-1"]);
        assert_eq!(handle.to_string(), "ISAPI/not a resource/-1");
    }

    #[test]
    fn invoke_without_method_is_a_configuration_error() {
        let handle = client().segment("System").segment("deviceInfo");
        for return_type in [ReturnType::Buffered, ReturnType::Stream, ReturnType::OpaqueData] {
            for present in [Presentation::Dict, Presentation::Text] {
                let options = RequestOptions::default()
                    .present(present)
                    .return_type(return_type)
                    .query("format", "json")
                    .body("<x/>");
                let err = tokio_test::block_on(handle.invoke(options)).unwrap_err();
                assert!(
                    matches!(err, Error::Configuration(ref msg) if msg == "method is required"),
                    "unexpected error: {err}"
                );
            }
        }
    }
}

// isapi-api: Async and blocking client for ISAPI camera/DVR devices

pub mod blocking;
pub mod client;
pub mod error;
pub mod normalize;
pub mod options;
pub mod path;
pub mod splitter;
pub mod stream;
pub mod transport;

mod auth;
mod digest;
mod dispatch;

pub use auth::{AuthScheme, Credentials};
pub use client::{Client, ClientBuilder, DEFAULT_PREFIX, resolve_locator};
pub use dispatch::Reply;
pub use error::Error;
pub use normalize::{Normalized, Presentation, RawResponse, normalize, xml_to_value};
pub use options::{RequestOptions, ReturnType, TransportParams};
pub use path::PathHandle;
pub use reqwest::Method;
pub use stream::{EventStream, OpaqueStream};
pub use transport::{TlsMode, TransportConfig};

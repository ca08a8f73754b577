//! Response normalization.
//!
//! Device payloads are XML. Callers pick a [`Presentation`]: either the
//! payload verbatim, or a JSON-compatible mapping with the following shape:
//!
//! - the document root is the single top-level key,
//! - attributes become `@name` keys (namespace declarations included, e.g.
//!   `@xmlns`),
//! - element text becomes the value under the tag name,
//! - text next to attributes or child elements lands under `#text`,
//! - repeated sibling elements collapse into an array in document order,
//! - empty elements become `null`.
//!
//! ```rust,ignore
//! let doc = normalize(
//!     RawResponse::Text(r#"<DeviceInfo version="1.0"><deviceName>cam</deviceName></DeviceInfo>"#.into()),
//!     Presentation::Dict,
//! )?;
//! assert_eq!(doc.into_value()["DeviceInfo"]["@version"], "1.0");
//! ```

use std::fmt;
use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::error::Error;

const TEXT_KEY: &str = "#text";

// ── Presentation ─────────────────────────────────────────────────────

/// Caller-selected output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presentation {
    /// Structured mapping (`serde_json::Value`).
    #[default]
    Dict,
    /// The payload text as received.
    Text,
}

impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dict => "dict",
            Self::Text => "text",
        })
    }
}

impl FromStr for Presentation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dict" => Ok(Self::Dict),
            "text" => Ok(Self::Text),
            other => Err(Error::Configuration(format!(
                "unknown presentation '{other}', expected 'dict' or 'text'"
            ))),
        }
    }
}

// ── Input / output ───────────────────────────────────────────────────

/// What the dispatcher hands to [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// A single buffered response body.
    Text(String),
    /// Event documents collected from a multipart stream, in arrival order.
    Fragments(Vec<String>),
}

/// A normalized response.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// One parsed XML document.
    Document(Value),
    /// One parsed document per streamed fragment, in arrival order.
    Documents(Vec<Value>),
    /// Raw text (single body, or concatenated fragments).
    Text(String),
}

impl Normalized {
    pub fn as_document(&self) -> Option<&Value> {
        match self {
            Self::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Collapse into a single JSON value. Documents become an array and
    /// text becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            Self::Document(v) => v,
            Self::Documents(vs) => Value::Array(vs),
            Self::Text(t) => Value::String(t),
        }
    }
}

/// Convert a raw response into the requested presentation.
pub fn normalize(raw: RawResponse, mode: Presentation) -> Result<Normalized, Error> {
    match (raw, mode) {
        (RawResponse::Text(text), Presentation::Text) => Ok(Normalized::Text(text)),
        (RawResponse::Fragments(parts), Presentation::Text) => Ok(Normalized::Text(parts.concat())),
        (RawResponse::Text(text), Presentation::Dict) => {
            parse_document(&text, mode).map(Normalized::Document)
        }
        (RawResponse::Fragments(parts), Presentation::Dict) => parts
            .iter()
            .map(|part| parse_document(part, mode))
            .collect::<Result<Vec<_>, _>>()
            .map(Normalized::Documents),
    }
}

fn parse_document(xml: &str, mode: Presentation) -> Result<Value, Error> {
    xml_to_value(xml).map_err(|message| Error::Parse {
        message,
        raw: xml.to_owned(),
        mode,
    })
}

// ── XML → mapping ────────────────────────────────────────────────────

/// An element whose end tag has not been seen yet.
struct OpenElement {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl OpenElement {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| format!("element name is not UTF-8: {e}"))?
            .to_owned();

        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| format!("bad attribute on <{name}>: {e}"))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| format!("attribute name on <{name}> is not UTF-8: {e}"))?;
            let value = attr
                .unescape_value()
                .map_err(|e| format!("bad attribute value on <{name}>: {e}"))?;
            fields.insert(format!("@{key}"), Value::String(value.into_owned()));
        }

        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let Self {
            name,
            mut fields,
            text,
        } = self;
        let text = text.trim();

        let value = if fields.is_empty() {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_owned())
            }
        } else {
            if !text.is_empty() {
                fields.insert(TEXT_KEY.to_owned(), Value::String(text.to_owned()));
            }
            Value::Object(fields)
        };

        (name, value)
    }
}

/// Insert a child, turning repeated keys into an array.
fn push_child(fields: &mut Map<String, Value>, key: String, value: Value) {
    match fields.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(key, value);
        }
    }
}

/// Parse one XML document into the mapping described in the module docs.
///
/// Errors are plain messages; [`normalize`] wraps them with the raw
/// payload.
pub fn xml_to_value(xml: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("{e} (at byte {})", reader.buffer_position()))?;

        match event {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err("junk after document element".into());
                }
                stack.push(OpenElement::open(&start)?);
            }
            Event::Empty(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err("junk after document element".into());
                }
                let element = OpenElement::open(&start)?;
                attach(&mut stack, &mut root, element.close())?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "closing tag without an open element".to_owned())?;
                attach(&mut stack, &mut root, element.close())?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| e.to_string())?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err("text outside the document element".into()),
                }
            }
            Event::CData(cdata) => {
                let bytes = cdata.into_inner();
                let text = std::str::from_utf8(&bytes).map_err(|e| e.to_string())?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(text),
                    None => return Err("CDATA outside the document element".into()),
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }

    let (name, value) = root.ok_or_else(|| "no element found".to_owned())?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

fn attach(
    stack: &mut [OpenElement],
    root: &mut Option<(String, Value)>,
    (name, value): (String, Value),
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => push_child(&mut parent.fields, name, value),
        None if root.is_some() => return Err("junk after document element".into()),
        None => *root = Some((name, value)),
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────

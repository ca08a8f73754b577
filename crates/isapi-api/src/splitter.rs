//! Incremental splitting of streamed event bodies into XML documents.
//!
//! Event endpoints such as `Event/notification/alertStream` keep the
//! response open and push one XML document per event, usually framed as
//! `multipart/mixed`. Network reads do not line up with documents, so the
//! splitter buffers bytes and hands out only complete documents, carrying
//! any residue into the next read.
//!
//! Two framings are supported:
//!
//! - [`Framing::Boundary`]: split on the literal delimiter (e.g.
//!   `--boundary`), drop each part's headers up to the first blank line and
//!   keep the remainder as the document. A part is complete when the next
//!   delimiter arrives, or earlier when its `Content-Length` is satisfied.
//! - [`Framing::TagBalanced`]: ignore framing altogether, remember the tag
//!   name of the first element in the buffer and complete the document once
//!   its matching end tag has been seen.

use tracing::{debug, trace};

use crate::error::Error;
use crate::normalize::Presentation;

/// Delimiter used by devices that don't announce one.
pub const DEFAULT_BOUNDARY: &str = "--boundary";

const HEADER_END: &[u8] = b"\r\n\r\n";

// ── Framing ──────────────────────────────────────────────────────────

/// How documents are delimited inside a streamed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Framing {
    /// Literal delimiter token, including its leading `--`.
    Boundary(String),
    /// Complete a document when the first element's end tag appears.
    TagBalanced,
}

impl Default for Framing {
    fn default() -> Self {
        Self::Boundary(DEFAULT_BOUNDARY.to_owned())
    }
}

impl Framing {
    /// Framing for a `boundary=` parameter value (the delimiter is the
    /// value prefixed with `--`).
    pub fn boundary(param: &str) -> Self {
        Self::Boundary(format!("--{}", param.trim().trim_matches('"')))
    }

    /// Pick a framing from the response `Content-Type`.
    ///
    /// `multipart/*` uses its `boundary` parameter (or [`DEFAULT_BOUNDARY`]);
    /// anything else, including a missing header, falls back to tag
    /// balancing since no delimiter can be trusted.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Self::TagBalanced;
        };

        let mut params = content_type.split(';');
        let mime = params.next().unwrap_or_default().trim();
        if !mime.to_ascii_lowercase().starts_with("multipart/") {
            return Self::TagBalanced;
        }

        params
            .filter_map(|param| param.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
            .map_or_else(Self::default, |(_, value)| Self::boundary(value))
    }
}

// ── EventSplitter ────────────────────────────────────────────────────

/// Push-style decoder: feed network chunks in, take complete documents out.
#[derive(Debug)]
pub struct EventSplitter {
    framing: Framing,
    pending: Vec<u8>,
    ready: Vec<String>,
    /// Tag-balanced progress on the document currently being received.
    element: Option<OpenElement>,
}

#[derive(Debug)]
struct OpenElement {
    start: usize,
    name: Vec<u8>,
    depth: usize,
    /// Resume scanning here; everything before has been accounted for.
    cursor: usize,
}

enum Progress {
    Complete { start: usize, end: usize },
    Pending(OpenElement),
}

impl EventSplitter {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            pending: Vec::new(),
            ready: Vec::new(),
            element: None,
        }
    }

    pub fn framing(&self) -> &Framing {
        &self.framing
    }

    /// Bytes received but not yet part of a completed document.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Take the next chunk of data and return the documents it completed,
    /// in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Result<std::vec::Drain<'_, String>, Error> {
        self.pending.extend_from_slice(chunk);
        match self.framing.clone() {
            Framing::Boundary(delimiter) => self.split_parts(delimiter.as_bytes())?,
            Framing::TagBalanced => self.split_elements()?,
        }
        trace!(
            buffered = self.pending.len(),
            completed = self.ready.len(),
            "splitter consumed chunk"
        );
        Ok(self.ready.drain(..))
    }

    /// Complete the stream.
    ///
    /// With boundary framing the trailing part is a document even without a
    /// closing delimiter. An unfinished tag-balanced document is dropped.
    pub fn finish(self) -> Result<Option<String>, Error> {
        match self.framing {
            Framing::Boundary(_) => part_body(&self.pending),
            Framing::TagBalanced => {
                if !self.pending.trim_ascii().is_empty() {
                    debug!(
                        bytes = self.pending.len(),
                        "stream ended inside an event, dropping residue"
                    );
                }
                Ok(None)
            }
        }
    }

    // ── Boundary framing ─────────────────────────────────────────────

    fn split_parts(&mut self, delimiter: &[u8]) -> Result<(), Error> {
        loop {
            let consumed: Vec<u8> = if let Some(at) = find(&self.pending, delimiter) {
                self.pending.drain(..at + delimiter.len()).take(at).collect()
            } else if let Some(end) = length_complete(&self.pending) {
                self.pending.drain(..end).collect()
            } else {
                return Ok(());
            };

            if let Some(body) = part_body(&consumed)? {
                self.ready.push(body);
            }
        }
    }

    // ── Tag-balanced framing ─────────────────────────────────────────

    fn split_elements(&mut self) -> Result<(), Error> {
        loop {
            let element = match self.element.take() {
                Some(element) => element,
                None => match open_element(&self.pending) {
                    Some(element) => element,
                    None => return Ok(()),
                },
            };

            match scan_element(&self.pending, element) {
                Progress::Complete { start, end } => {
                    let document: Vec<u8> = self.pending.drain(..end).skip(start).collect();
                    self.ready.push(into_string(document)?);
                }
                Progress::Pending(element) => {
                    self.element = Some(element);
                    return Ok(());
                }
            }
        }
    }
}

// ── Part helpers ─────────────────────────────────────────────────────

/// Extract the document from one multipart part (headers, blank line, body).
fn part_body(part: &[u8]) -> Result<Option<String>, Error> {
    let body = match find(part, HEADER_END) {
        Some(at) if is_header_block(&part[..at]) => &part[at + HEADER_END.len()..],
        // A bare document without part headers. A blank line inside it is
        // part of the document.
        _ if part.trim_ascii_start().starts_with(b"<") => part,
        // Preamble, the closing `--` or inter-part whitespace.
        _ => return Ok(None),
    };

    let body = body.trim_ascii();
    if body.is_empty() {
        return Ok(None);
    }
    into_string(body.to_vec()).map(Some)
}

/// True when every non-blank line reads as a `Name: value` header.
fn is_header_block(block: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(block) else {
        return false;
    };
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .all(|line| {
            line.split_once(':').is_some_and(|(name, _)| {
                !name.is_empty()
                    && name
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            })
        })
}

/// If the buffered part declares a `Content-Length` and all of its body has
/// arrived, return the number of bytes the part occupies.
fn length_complete(buf: &[u8]) -> Option<usize> {
    let header_end = find(buf, HEADER_END)?;
    if !is_header_block(&buf[..header_end]) {
        return None;
    }
    let headers = std::str::from_utf8(&buf[..header_end]).ok()?;
    let length = headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse::<usize>().ok()
        } else {
            None
        }
    })?;

    let end = header_end + HEADER_END.len() + length;
    (buf.len() >= end).then_some(end)
}

// ── Element helpers ──────────────────────────────────────────────────

/// Locate the first element start tag whose name is fully buffered.
fn open_element(buf: &[u8]) -> Option<OpenElement> {
    let mut from = 0;
    while let Some(rel) = buf[from..].iter().position(|&b| b == b'<') {
        let at = from + rel;
        let first = *buf.get(at + 1)?;
        if is_name_start(first) {
            let len = buf[at + 1..].iter().position(|&b| is_name_end(b))?;
            trace!(
                tag = %String::from_utf8_lossy(&buf[at + 1..at + 1 + len]),
                "tracking event element"
            );
            return Some(OpenElement {
                start: at,
                name: buf[at + 1..at + 1 + len].to_vec(),
                depth: 0,
                cursor: at,
            });
        }
        // Declarations, comments and stray end tags before the document.
        from = at + 1;
    }
    None
}

/// Continue scanning for the end tag that balances `element`.
fn scan_element(buf: &[u8], mut element: OpenElement) -> Progress {
    let len = element.name.len();
    let mut pos = element.cursor;

    while let Some(rel) = buf[pos..].iter().position(|&b| b == b'<') {
        let at = pos + rel;
        element.cursor = at;

        let closing = buf.get(at + 1) == Some(&b'/');
        let name_at = if closing { at + 2 } else { at + 1 };
        let Some(&after_name) = buf.get(name_at + len) else {
            return Progress::Pending(element);
        };
        if buf[name_at..name_at + len] != element.name[..] || !is_name_end(after_name) {
            pos = at + 1;
            continue;
        }

        let Some(gt) = buf[name_at + len..]
            .iter()
            .position(|&b| b == b'>')
            .map(|i| name_at + len + i)
        else {
            return Progress::Pending(element);
        };

        if closing {
            element.depth = element.depth.saturating_sub(1);
            if element.depth == 0 {
                return Progress::Complete {
                    start: element.start,
                    end: gt + 1,
                };
            }
        } else if buf[gt - 1] == b'/' {
            if element.depth == 0 {
                return Progress::Complete {
                    start: element.start,
                    end: gt + 1,
                };
            }
        } else {
            element.depth += 1;
        }
        pos = gt + 1;
    }

    element.cursor = buf.len();
    Progress::Pending(element)
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || !b.is_ascii()
}

fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn into_string(bytes: Vec<u8>) -> Result<String, Error> {
    String::from_utf8(bytes).map_err(|e| Error::Parse {
        message: format!("event is not valid UTF-8: {e}"),
        raw: String::from_utf8_lossy(e.as_bytes()).into_owned(),
        mode: Presentation::Text,
    })
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn alert(id: u32) -> String {
        format!(
            "<EventNotificationAlert version=\"2.0\"><channelID>{id}</channelID>\
             <eventType>VMD</eventType></EventNotificationAlert>"
        )
    }

    fn part(xml: &str) -> String {
        format!("--boundary\r\nContent-Type: application/xml; charset=\"UTF-8\"\r\n\r\n{xml}\r\n")
    }

    fn part_with_length(xml: &str) -> String {
        format!(
            "--boundary\r\nContent-Type: application/xml\r\nContent-Length: {}\r\n\r\n{xml}\r\n",
            xml.len()
        )
    }

    fn push_all(splitter: &mut EventSplitter, chunk: &[u8]) -> Vec<String> {
        splitter.push(chunk).unwrap().collect()
    }

    // ── Boundary framing ─────────────────────────────────────────────

    #[test]
    fn partial_third_event_completes_on_next_read() {
        let third = alert(3);
        let (head, tail) = third.split_at(third.len() / 2);

        let mut first_read = part(&alert(1));
        first_read.push_str(&part(&alert(2)));
        first_read.push_str("--boundary\r\nContent-Type: application/xml\r\n\r\n");
        first_read.push_str(head);
        let second_read = format!("{tail}\r\n--boundary--\r\n");

        let mut splitter = EventSplitter::new(Framing::default());
        let events = push_all(&mut splitter, first_read.as_bytes());
        assert_eq!(events, vec![alert(1), alert(2)]);

        let events = push_all(&mut splitter, second_read.as_bytes());
        assert_eq!(events, vec![alert(3)]);

        assert_eq!(splitter.finish().unwrap(), None);
    }

    #[test]
    fn content_length_completes_without_next_delimiter() {
        let body = format!("{}{}", part_with_length(&alert(1)), part_with_length(&alert(2)));
        let mut splitter = EventSplitter::new(Framing::default());
        let events = push_all(&mut splitter, body.as_bytes());
        assert_eq!(events, vec![alert(1), alert(2)]);
        assert!(splitter.buffered() <= "\r\n".len());
    }

    #[test]
    fn byte_by_byte_delivery_preserves_order() {
        let body: String = (1..=4).map(|i| part(&alert(i))).collect::<String>() + "--boundary--\r\n";
        let mut splitter = EventSplitter::new(Framing::default());
        let mut events = Vec::new();
        for byte in body.as_bytes() {
            events.extend(push_all(&mut splitter, std::slice::from_ref(byte)));
        }
        events.extend(splitter.finish().unwrap());
        assert_eq!(events, (1..=4).map(alert).collect::<Vec<_>>());
    }

    #[test]
    fn trailing_part_is_flushed_on_finish() {
        let mut splitter = EventSplitter::new(Framing::default());
        assert!(push_all(&mut splitter, part(&alert(7)).as_bytes()).is_empty());
        assert_eq!(splitter.finish().unwrap(), Some(alert(7)));
    }

    #[test]
    fn custom_boundary_token() {
        let body = format!(
            "--MIME_boundary\r\nContent-Type: application/xml\r\n\r\n{}\r\n--MIME_boundary\r\n",
            alert(1)
        );
        let mut splitter = EventSplitter::new(Framing::boundary("MIME_boundary"));
        assert_eq!(push_all(&mut splitter, body.as_bytes()), vec![alert(1)]);
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let mut body = b"--boundary\r\nContent-Type: application/xml\r\n\r\n<a>".to_vec();
        body.extend_from_slice(&[0xff, 0xfe]);
        body.extend_from_slice(b"</a>\r\n--boundary");
        let mut splitter = EventSplitter::new(Framing::default());
        assert!(matches!(splitter.push(&body), Err(Error::Parse { .. })));
    }

    #[test]
    fn headerless_part_keeps_internal_blank_line() {
        let doc = "<EventNotificationAlert>\r\n\r\n<channelID>1</channelID></EventNotificationAlert>";
        let body = format!(
            "--boundary\r\n{doc}\r\n--boundary\r\nContent-Type: application/xml\r\n\r\n{}\r\n--boundary--\r\n",
            alert(2)
        );
        let mut splitter = EventSplitter::new(Framing::default());
        assert_eq!(push_all(&mut splitter, body.as_bytes()), vec![doc.to_owned(), alert(2)]);
    }

    #[test]
    fn header_block_detection() {
        assert!(is_header_block(b"\r\nContent-Type: application/xml\r\nContent-Length: 12"));
        assert!(!is_header_block(b"\r\n<EventNotificationAlert>"));
        assert!(!is_header_block(b"<a xmlns:x=\"urn:x\">"));
    }

    // ── Tag-balanced framing ─────────────────────────────────────────

    #[test]
    fn tag_balanced_skips_headers_and_carries_residue() {
        let mut splitter = EventSplitter::new(Framing::TagBalanced);
        let first = format!("{}{}", part(&alert(1)), &part(&alert(2))[..40]);
        assert_eq!(push_all(&mut splitter, first.as_bytes()), vec![alert(1)]);

        let rest = format!("{}{}", &part(&alert(2))[40..], part(&alert(3)));
        assert_eq!(push_all(&mut splitter, rest.as_bytes()), vec![alert(2), alert(3)]);
    }

    #[test]
    fn tag_balanced_handles_nested_same_name_and_split_end_tag() {
        let doc = "<?xml version=\"1.0\"?><Item><Item>inner</Item><ItemList/></Item>";
        let mut splitter = EventSplitter::new(Framing::TagBalanced);
        let (a, b) = doc.split_at(doc.len() - 4);
        assert!(push_all(&mut splitter, a.as_bytes()).is_empty());
        assert_eq!(
            push_all(&mut splitter, b.as_bytes()),
            vec!["<Item><Item>inner</Item><ItemList/></Item>".to_owned()]
        );
    }

    #[test]
    fn tag_balanced_self_closing_root() {
        let mut splitter = EventSplitter::new(Framing::TagBalanced);
        let events = push_all(&mut splitter, b"\r\n\r\n<heartbeat time=\"1\"/>\r\n\r\n<a>1</a>");
        assert_eq!(events, vec!["<heartbeat time=\"1\"/>".to_owned(), "<a>1</a>".to_owned()]);
    }

    #[test]
    fn tag_balanced_byte_by_byte() {
        let body: String = (1..=3).map(|i| part(&alert(i))).collect();
        let mut splitter = EventSplitter::new(Framing::TagBalanced);
        let mut events = Vec::new();
        for byte in body.as_bytes() {
            events.extend(push_all(&mut splitter, std::slice::from_ref(byte)));
        }
        assert_eq!(events, (1..=3).map(alert).collect::<Vec<_>>());
        assert_eq!(splitter.finish().unwrap(), None);
    }

    #[test]
    fn tag_balanced_drops_unfinished_document_on_finish() {
        let mut splitter = EventSplitter::new(Framing::TagBalanced);
        assert!(push_all(&mut splitter, b"<a><b>half").is_empty());
        assert_eq!(splitter.finish().unwrap(), None);
    }

    // ── Framing selection ────────────────────────────────────────────

    #[test]
    fn framing_from_content_type() {
        assert_eq!(
            Framing::from_content_type(Some("multipart/mixed; boundary=boundary")),
            Framing::Boundary("--boundary".into())
        );
        assert_eq!(
            Framing::from_content_type(Some("multipart/mixed; Boundary=\"MIME_boundary\"")),
            Framing::Boundary("--MIME_boundary".into())
        );
        assert_eq!(
            Framing::from_content_type(Some("multipart/mixed")),
            Framing::default()
        );
        assert_eq!(
            Framing::from_content_type(Some("application/xml; charset=UTF-8")),
            Framing::TagBalanced
        );
        assert_eq!(Framing::from_content_type(None), Framing::TagBalanced);
    }
}

use crate::parser::{get_str, ResponseHead, ResponseParser};
use encoding_rs::{Encoding, UTF_8};
use flate2::read::GzDecoder;
use http::{HeaderMap, StatusCode, Version};
use std::borrow::Cow;
use std::io::Read;

/// A complete, framed HTTP response.
///
/// Built from a finished [`ResponseParser`]; immutable afterwards. The raw
/// body bytes are always available; `text()` and `json()` are derived
/// lazily and degrade to `None` on decode trouble instead of failing the
/// whole response.
///
/// [`ResponseParser`]: struct.ResponseParser.html
#[derive(Debug)]
pub struct Response {
    version: Version,
    status: StatusCode,
    reason: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    /// Build a response from a parser that reached `Complete`.
    pub(crate) fn from_parser(parser: ResponseParser) -> Option<Response> {
        let (head, body) = parser.into_message()?;
        let ResponseHead {
            version,
            status,
            reason,
            headers,
        } = head;
        Some(Response {
            version,
            status,
            reason,
            headers,
            body,
        })
    }

    /// The HTTP version from the status line.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The reason phrase from the status line, possibly empty.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The response headers, case-insensitively keyed.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes as framed off the wire, before any decoding.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Case-insensitive single-header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        get_str(&self.headers, name)
    }

    /// The body as text.
    ///
    /// Gzip-decompressed first when `Content-Encoding` names gzip, then
    /// decoded by the charset named in `Content-Type` (default UTF-8, and
    /// UTF-8 again when the named charset fails). `None` only when gzip
    /// decompression fails; the raw bytes stay available via `body()`.
    pub fn text(&self) -> Option<String> {
        let raw = self.decompressed()?;

        let encoding = self
            .charset()
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);

        let (text, _, had_errors) = encoding.decode(&raw);
        if had_errors && encoding != UTF_8 {
            return Some(String::from_utf8_lossy(&raw).into_owned());
        }
        Some(text.into_owned())
    }

    /// The body parsed as JSON.
    ///
    /// Attempted only when `Content-Type` contains `json`; any decode
    /// failure yields `None`.
    pub fn json(&self) -> Option<serde_json::Value> {
        let content_type = self.header("content-type")?;
        if !content_type.to_ascii_lowercase().contains("json") {
            return None;
        }
        serde_json::from_str(&self.text()?).ok()
    }

    /// Whether this is a 3xx response a session should try to follow.
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    /// The `Location` header, when present.
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// Body bytes after `Content-Encoding` is undone. `None` when gzip
    /// decompression fails.
    fn decompressed(&self) -> Option<Cow<[u8]>> {
        let encoding = self.header("content-encoding").unwrap_or("");
        if !encoding.to_ascii_lowercase().contains("gzip") {
            return Some(Cow::Borrowed(&self.body));
        }

        let mut out = vec![];
        match GzDecoder::new(&self.body[..]).read_to_end(&mut out) {
            Ok(_) => Some(Cow::Owned(out)),
            Err(e) => {
                debug!("gzip decode failed: {}", e);
                None
            }
        }
    }

    /// The charset label from `Content-Type`, when one is named.
    fn charset(&self) -> Option<&str> {
        let content_type = self.header("content-type")?;
        for part in content_type.split(';') {
            let part = part.trim();
            if part.to_ascii_lowercase().starts_with("charset=") {
                return Some(part["charset=".len()..].trim_matches('"'));
            }
        }
        None
    }
}

//! Streaming HTTP/1.1 message parsing.
//!
//! The parsers here are push-based: bytes arrive in arbitrary-sized
//! increments (down to one byte at a time) and the parser advances a state
//! machine `AwaitingHeaders -> framing -> Complete`. Framing is picked from
//! the headers once the full head is seen: chunked transfer encoding, an
//! explicit content-length, no body at all, or (responses only) reading
//! until the peer closes.

use crate::chunked::ChunkedDecoder;
use crate::Error;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Version};
use std::str::FromStr;

/// Cap on the header section. A head that grows past this is not a sane
/// HTTP/1.1 message.
const MAX_HEAD_SIZE: usize = 64 * 1024;

const END_OF_HEADER: &[u8] = b"\r\n\r\n";

/// How the body of the message being parsed is delimited.
enum Framing {
    /// Body runs for exactly `limit` bytes.
    Length { limit: u64, got: u64 },
    /// Body is a sequence of chunked transfer encoding records.
    Chunked(ChunkedDecoder),
    /// Body runs until the peer closes the connection (responses only).
    ReadToEnd,
    /// No body expected.
    NoBody,
}

impl Framing {
    /// Pick the framing from parsed headers.
    ///
    /// Precedence per RFC 7230 section 3.3.3: chunked transfer encoding
    /// overrides content-length; `no_body` (HEAD response, 1xx/204/304)
    /// overrides the body being present at all. Without any delimiter a
    /// response body is close-delimited while a request has no body.
    fn from_headers(headers: &HeaderMap, no_body: bool, is_response: bool) -> Self {
        if no_body {
            return Framing::NoBody;
        }
        if is_chunked(headers) {
            return Framing::Chunked(ChunkedDecoder::new());
        }
        if let Some(limit) = get_as::<u64>(headers, "content-length") {
            return if limit == 0 {
                Framing::NoBody
            } else {
                Framing::Length { limit, got: 0 }
            };
        }
        if is_response {
            Framing::ReadToEnd
        } else {
            Framing::NoBody
        }
    }

    fn is_no_body(&self) -> bool {
        matches!(self, Framing::NoBody)
    }
}

/// Status line and headers of a parsed response.
#[derive(Debug)]
pub struct ResponseHead {
    /// HTTP version from the status line.
    pub version: Version,
    /// Status code.
    pub status: StatusCode,
    /// Reason phrase, possibly empty.
    pub reason: String,
    /// Headers, case-insensitively keyed.
    pub headers: HeaderMap,
}

/// Incremental parser turning an arbitrarily-chunked byte stream into one
/// complete HTTP/1.1 response.
///
/// Owned exclusively by its [`Connection`]; fed by whatever increments the
/// transport delivers. Once [`is_complete`] returns true no further bytes
/// are consumed.
///
/// [`Connection`]: struct.Connection.html
/// [`is_complete`]: #method.is_complete
pub struct ResponseParser {
    head_buf: Vec<u8>,
    /// Progress matching the CRLFCRLF head/body delimiter across feeds.
    delim: usize,
    head: Option<ResponseHead>,
    framing: Framing,
    body: Vec<u8>,
    complete: bool,
    /// The response answers a HEAD request and carries no body regardless
    /// of content-length.
    head_request: bool,
}

impl ResponseParser {
    /// A parser for the response to a bodied-response method like GET.
    pub fn new() -> Self {
        ResponseParser::for_method(&Method::GET)
    }

    /// A parser for the response to `method`. HEAD responses carry no body.
    pub fn for_method(method: &Method) -> Self {
        ResponseParser {
            head_buf: vec![],
            delim: 0,
            head: None,
            framing: Framing::NoBody,
            body: vec![],
            complete: false,
            head_request: *method == Method::HEAD,
        }
    }

    /// Whether the message is fully framed. Terminal.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The parsed status line and headers, once the head is through.
    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    /// Body bytes decoded so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Feed the next increment from the transport. Returns how many bytes
    /// were consumed; anything past the end of a complete message stays
    /// unconsumed.
    pub fn feed(&mut self, src: &[u8]) -> Result<usize, Error> {
        let mut pos = 0;

        if self.head.is_none() {
            pos = self.feed_head(src)?;
            if self.head.is_none() {
                return Ok(pos);
            }
        }

        if self.complete {
            return Ok(pos);
        }

        pos += self.feed_body(&src[pos..])?;
        Ok(pos)
    }

    /// Signal transport end-of-stream.
    ///
    /// In close-delimited framing this terminates the body; anywhere else
    /// before `Complete` the message is truncated and must not be treated
    /// as a valid response.
    pub fn feed_eof(&mut self) -> Result<(), Error> {
        if self.complete {
            return Ok(());
        }
        if self.head.is_some() {
            if let Framing::ReadToEnd = self.framing {
                trace!("eof ends close-delimited body: {} bytes", self.body.len());
                self.complete = true;
                return Ok(());
            }
        }
        Err(Error::PrematureClose)
    }

    /// Take the parsed message apart. `None` until the parser is complete.
    pub fn into_message(self) -> Option<(ResponseHead, Vec<u8>)> {
        if !self.complete {
            return None;
        }
        let head = self.head?;
        Some((head, self.body))
    }

    /// Accumulate head bytes until CRLFCRLF, then parse the status line and
    /// headers and pick the body framing.
    fn feed_head(&mut self, src: &[u8]) -> Result<usize, Error> {
        let mut pos = 0;

        while pos < src.len() {
            let b = src[pos];
            pos += 1;

            if self.head_buf.len() == MAX_HEAD_SIZE {
                return Err(Error::MalformedHeader("header section too large".into()));
            }
            self.head_buf.push(b);

            if b == END_OF_HEADER[self.delim] {
                self.delim += 1;
            } else {
                self.delim = if b == b'\r' { 1 } else { 0 };
            }

            if self.delim == END_OF_HEADER.len() {
                let head = parse_response_head(&self.head_buf)?;
                trace!("response head: {:?} {:?}", head.version, head.status);

                let no_body = self.head_request
                    || head.status.is_informational()
                    || head.status == StatusCode::NO_CONTENT
                    || head.status == StatusCode::NOT_MODIFIED;

                self.framing = Framing::from_headers(&head.headers, no_body, true);
                self.complete = self.framing.is_no_body();
                self.head = Some(head);
                self.head_buf = vec![];
                break;
            }
        }

        Ok(pos)
    }

    fn feed_body(&mut self, src: &[u8]) -> Result<usize, Error> {
        let pos = match &mut self.framing {
            Framing::Length { limit, got } => {
                let take = (src.len() as u64).min(*limit - *got) as usize;
                self.body.extend_from_slice(&src[..take]);
                *got += take as u64;
                if got == limit {
                    self.complete = true;
                }
                take
            }

            Framing::Chunked(dec) => {
                let used = dec.feed(src, &mut self.body)?;
                if dec.is_end() {
                    self.complete = true;
                }
                used
            }

            Framing::ReadToEnd => {
                self.body.extend_from_slice(src);
                src.len()
            }

            Framing::NoBody => 0,
        };

        Ok(pos)
    }
}

impl std::fmt::Debug for ResponseParser {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ResponseParser {{ head: {}, body: {}, complete: {} }}",
            self.head.is_some(),
            self.body.len(),
            self.complete
        )
    }
}

/// Request line and headers of a parsed request (server side).
#[derive(Debug)]
pub struct RequestHead {
    /// Request method.
    pub method: Method,
    /// Request target as sent: path plus optional query.
    pub target: String,
    /// HTTP version.
    pub version: Version,
    /// Headers, case-insensitively keyed.
    pub headers: HeaderMap,
}

/// Incremental parser for one HTTP/1.1 request, used by the server side.
///
/// Same discipline as [`ResponseParser`], except a request without an
/// explicit body delimiter has no body rather than being close-delimited.
///
/// [`ResponseParser`]: struct.ResponseParser.html
pub struct RequestParser {
    head_buf: Vec<u8>,
    delim: usize,
    head: Option<RequestHead>,
    framing: Framing,
    body: Vec<u8>,
    complete: bool,
    any_bytes: bool,
}

impl RequestParser {
    /// A parser for one incoming request.
    pub fn new() -> Self {
        RequestParser {
            head_buf: vec![],
            delim: 0,
            head: None,
            framing: Framing::NoBody,
            body: vec![],
            complete: false,
            any_bytes: false,
        }
    }

    /// Whether the message is fully framed. Terminal.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True when no bytes at all have arrived, so an EOF is a clean
    /// no-request close rather than a truncated message.
    pub fn is_empty(&self) -> bool {
        !self.any_bytes
    }

    /// Feed the next increment from the transport.
    pub fn feed(&mut self, src: &[u8]) -> Result<usize, Error> {
        if !src.is_empty() {
            self.any_bytes = true;
        }

        let mut pos = 0;

        if self.head.is_none() {
            pos = self.feed_head(src)?;
            if self.head.is_none() {
                return Ok(pos);
            }
        }

        if self.complete {
            return Ok(pos);
        }

        let used = match &mut self.framing {
            Framing::Length { limit, got } => {
                let take = ((src.len() - pos) as u64).min(*limit - *got) as usize;
                self.body.extend_from_slice(&src[pos..pos + take]);
                *got += take as u64;
                if got == limit {
                    self.complete = true;
                }
                take
            }
            Framing::Chunked(dec) => {
                let used = dec.feed(&src[pos..], &mut self.body)?;
                if dec.is_end() {
                    self.complete = true;
                }
                used
            }
            // requests are never close-delimited.
            Framing::ReadToEnd | Framing::NoBody => 0,
        };

        Ok(pos + used)
    }

    /// Signal transport end-of-stream; before `Complete` the request is
    /// truncated.
    pub fn feed_eof(&mut self) -> Result<(), Error> {
        if self.complete {
            return Ok(());
        }
        Err(Error::PrematureClose)
    }

    /// Take the parsed message apart. `None` until complete.
    pub fn into_message(self) -> Option<(RequestHead, Vec<u8>)> {
        if !self.complete {
            return None;
        }
        let head = self.head?;
        Some((head, self.body))
    }

    fn feed_head(&mut self, src: &[u8]) -> Result<usize, Error> {
        let mut pos = 0;

        while pos < src.len() {
            let b = src[pos];
            pos += 1;

            if self.head_buf.len() == MAX_HEAD_SIZE {
                return Err(Error::MalformedHeader("header section too large".into()));
            }
            self.head_buf.push(b);

            if b == END_OF_HEADER[self.delim] {
                self.delim += 1;
            } else {
                self.delim = if b == b'\r' { 1 } else { 0 };
            }

            if self.delim == END_OF_HEADER.len() {
                let head = parse_request_head(&self.head_buf)?;
                trace!("request head: {} {}", head.method, head.target);

                self.framing = Framing::from_headers(&head.headers, false, false);
                self.complete = self.framing.is_no_body();
                self.head = Some(head);
                self.head_buf = vec![];
                break;
            }
        }

        Ok(pos)
    }
}

impl std::fmt::Debug for RequestParser {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "RequestParser {{ head: {}, body: {}, complete: {} }}",
            self.head.is_some(),
            self.body.len(),
            self.complete
        )
    }
}

/// Parse a complete response head with httparse.
fn parse_response_head(buf: &[u8]) -> Result<ResponseHead, Error> {
    let mut headers = [httparse::EMPTY_HEADER; 128];
    let mut parser = httparse::Response::new(&mut headers);

    let status = parser.parse(buf)?;
    if status.is_partial() {
        // invariant: the caller hands over a buffer ending in CRLFCRLF.
        return Err(Error::MalformedHeader("truncated response head".into()));
    }

    let code = parser
        .code
        .ok_or_else(|| Error::MalformedHeader("missing status code".into()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|_| Error::MalformedHeader(format!("bad status code: {}", code)))?;

    Ok(ResponseHead {
        version: version_of(parser.version)?,
        status,
        reason: parser.reason.unwrap_or("").to_string(),
        headers: collect_headers(parser.headers),
    })
}

/// Parse a complete request head with httparse.
fn parse_request_head(buf: &[u8]) -> Result<RequestHead, Error> {
    let mut headers = [httparse::EMPTY_HEADER; 128];
    let mut parser = httparse::Request::new(&mut headers);

    let status = parser.parse(buf)?;
    if status.is_partial() {
        return Err(Error::MalformedHeader("truncated request head".into()));
    }

    let method = parser
        .method
        .and_then(|m| Method::from_str(m).ok())
        .ok_or_else(|| Error::MalformedHeader("missing method".into()))?;
    let target = parser
        .path
        .ok_or_else(|| Error::MalformedHeader("missing request target".into()))?;

    Ok(RequestHead {
        method,
        target: target.to_string(),
        version: version_of(parser.version)?,
        headers: collect_headers(parser.headers),
    })
}

/// Collect httparse headers into a HeaderMap, dropping bad names/values.
fn collect_headers(parsed: &[httparse::Header]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for head in parsed {
        let name = HeaderName::from_bytes(head.name.as_bytes());
        let value = HeaderValue::from_bytes(head.value);
        match (name, value) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            (Err(e), _) => {
                debug!("Dropping bad header name: {}", e);
            }
            (Ok(name), Err(e)) => {
                debug!("Dropping bad header value ({}): {}", name, e);
            }
        }
    }
    map
}

fn version_of(v: Option<u8>) -> Result<Version, Error> {
    match v {
        Some(0) => Ok(Version::HTTP_10),
        Some(1) => Ok(Version::HTTP_11),
        _ => Err(Error::MalformedHeader(format!("bad http version: {:?}", v))),
    }
}

pub(crate) fn is_chunked(headers: &HeaderMap) -> bool {
    // https://tools.ietf.org/html/rfc2616#section-4.4
    //
    // If a Transfer-Encoding header field is present and has any value
    // other than "identity", then the transfer-length is defined by use
    // of the "chunked" transfer-coding.
    headers
        .get("transfer-encoding")
        .and_then(|h| h.to_str().ok())
        .map(|h| !h.contains("identity"))
        .unwrap_or(false)
}

pub(crate) fn get_str<'a>(headers: &'a HeaderMap, key: &str) -> Option<&'a str> {
    headers.get(key).and_then(|v| v.to_str().ok())
}

pub(crate) fn get_as<T: FromStr>(headers: &HeaderMap, key: &str) -> Option<T> {
    get_str(headers, key).and_then(|v| v.parse().ok())
}

use std::fmt;
use std::io;

/// Possible errors from this crate.
#[derive(Debug)]
pub enum Error {
    /// The URL could not be parsed into scheme/host/port/path. Not retriable.
    MalformedUrl(String),
    /// DNS, TCP or TLS failure while opening the transport. The caller may retry.
    Connect(io::Error),
    /// A wrapped std::io::Error from the underlying transport (socket).
    Io(io::Error),
    /// HTTP/1.1 parse errors from the `httparse` crate.
    Http11Parser(httparse::Error),
    /// Http errors from the `http` crate.
    Http(http::Error),
    /// The header section was malformed or too large to be a sane HTTP/1.1 head.
    MalformedHeader(String),
    /// A chunked transfer encoding record had a bad size line or delimiter.
    MalformedChunk(String),
    /// The peer closed the connection before the message framing completed.
    ///
    /// This distinguishes a short body from a valid empty one; the partial
    /// message is never surfaced as a `Response`.
    PrematureClose,
    /// The redirect chain exceeded the depth limit.
    TooManyRedirects(usize),
    /// The session (or connection) is closed and cannot issue more requests.
    Closed,
    /// A user/usage problem such as a body on a method that takes none.
    User(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedUrl(v) => write!(f, "malformed url: {}", v),
            Error::Connect(v) => write!(f, "connect: {}", v),
            Error::Io(v) => fmt::Display::fmt(v, f),
            Error::Http11Parser(v) => write!(f, "http11 parser: {}", v),
            Error::Http(v) => write!(f, "http api: {}", v),
            Error::MalformedHeader(v) => write!(f, "malformed header: {}", v),
            Error::MalformedChunk(v) => write!(f, "malformed chunk: {}", v),
            Error::PrematureClose => write!(f, "connection closed before message complete"),
            Error::TooManyRedirects(n) => write!(f, "too many redirects: {}", n),
            Error::Closed => write!(f, "session is closed"),
            Error::User(v) => write!(f, "{}", v),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<httparse::Error> for Error {
    fn from(e: httparse::Error) -> Self {
        Error::Http11Parser(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

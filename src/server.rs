//! A minimal HTTP/1.1 server side.
//!
//! One accepted connection serves exactly one request: the request is
//! parsed with the same streaming machinery as the client side, dispatched
//! through a [`Router`], and the returned [`Response`] is written back
//! before the connection closes. Route misses yield a fixed 404.
//!
//! [`Router`]: struct.Router.html
//! [`Response`]: struct.Response.html

use crate::parser::{get_str, RequestHead, RequestParser};
use crate::url::parse_query;
use crate::{AsyncRead, AsyncWrite, Error};
use chrono::Utc;
use futures_util::io::{AsyncReadExt, AsyncWriteExt};
use http::{HeaderMap, Method, StatusCode, Version};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

const READ_BUF_SIZE: usize = 16_384;

/// A parsed incoming request, handed to route handlers.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    fn from_parts(head: RequestHead, body: Vec<u8>) -> Self {
        let (path, query_str) = match head.target.find('?') {
            Some(i) => (&head.target[..i], &head.target[i + 1..]),
            None => (head.target.as_str(), ""),
        };

        Request {
            method: head.method,
            path: path.to_string(),
            query: parse_query(query_str),
            version: head.version,
            headers: head.headers,
            body,
        }
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path without its query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Ordered query parameters.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// A single query parameter by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The request headers, case-insensitively keyed.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive single-header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        get_str(&self.headers, name)
    }

    /// Raw request body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, decoded lossily as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The body parsed as JSON, only when `Content-Type` contains `json`.
    pub fn json(&self) -> Option<serde_json::Value> {
        let content_type = self.header("content-type")?;
        if !content_type.to_ascii_lowercase().contains("json") {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

/// A response a route handler hands back to the server.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    /// An empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Response {
            status,
            headers: HeaderMap::new(),
            body: vec![],
        }
    }

    /// A text response. Sets `Content-Type: text/plain; charset=utf-8`.
    pub fn with_text(status: StatusCode, text: &str) -> Self {
        let mut res = Response::new(status);
        res.headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        res.body = text.as_bytes().to_vec();
        res
    }

    /// A JSON response. Sets `Content-Type: application/json`.
    pub fn with_json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut res = Response::new(status);
        res.headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json; charset=utf-8"),
        );
        res.body = value.to_string().into_bytes();
        res
    }

    /// A raw body response with an explicit content type.
    pub fn with_body(status: StatusCode, content_type: &str, body: Vec<u8>) -> Self {
        let mut res = Response::new(status);
        if let Ok(v) = http::HeaderValue::from_str(content_type) {
            res.headers.insert(http::header::CONTENT_TYPE, v);
        }
        res.body = body;
        res
    }

    /// Add or replace a header. Builder style.
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(v) = http::HeaderValue::from_str(value) {
            self.headers.insert(name, v);
        }
        self
    }

    /// The fixed response for unmatched routes.
    pub fn not_found() -> Self {
        Response::with_text(StatusCode::NOT_FOUND, "Not Found")
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

type Handler = Box<dyn Fn(Request) -> Response + Send + Sync>;

/// Static route table: exact match on (method, path).
///
/// The dispatcher invokes exactly one handler per accepted connection;
/// unmatched method+path pairs get [`Response::not_found`].
///
/// [`Response::not_found`]: struct.Response.html#method.not_found
#[derive(Default)]
pub struct Router {
    routes: HashMap<(Method, String), Handler>,
}

impl Router {
    /// An empty route table.
    pub fn new() -> Self {
        Router {
            routes: HashMap::new(),
        }
    }

    /// Register a handler for (method, path). Path matching is exact and
    /// ignores the query string.
    pub fn add_route<F>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.routes
            .insert((method, path.to_string()), Box::new(handler));
    }

    fn dispatch(&self, req: Request) -> Response {
        let key = (req.method.clone(), req.path.clone());
        match self.routes.get(&key) {
            Some(handler) => handler(req),
            None => {
                debug!("no route for {} {}", key.0, key.1);
                Response::not_found()
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Router {{ routes: {} }}", self.routes.len())
    }
}

/// Serve exactly one request on an accepted transport.
///
/// Reads and parses the request, dispatches it through the router, writes
/// the response and closes. An EOF before any byte arrives is a clean
/// no-request close.
pub async fn serve_connection<S>(mut io: S, router: &Router) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut parser = RequestParser::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];

    while !parser.is_complete() {
        let amount = io.read(&mut buf).await?;
        if amount == 0 {
            if parser.is_empty() {
                return Ok(());
            }
            parser.feed_eof()?;
        } else {
            parser.feed(&buf[..amount])?;
        }
    }

    let (head, body) = match parser.into_message() {
        Some(v) => v,
        None => return Err(Error::PrematureClose),
    };

    let request = Request::from_parts(head, body);
    debug!("dispatch: {} {}", request.method, request.path);

    let response = router.dispatch(request);
    let bytes = write_http11_res(&response)?;

    io.write_all(&bytes).await?;
    io.flush().await?;
    io.close().await?;

    Ok(())
}

/// Write an http/1.1 response to a byte buffer.
///
/// Explicit headers win over the defaults (`Server`, `Date`,
/// `Connection: close`); `Content-Length` always reflects the body.
#[allow(clippy::write_with_newline)]
fn write_http11_res(res: &Response) -> Result<Vec<u8>, Error> {
    let mut merged = HeaderMap::new();

    merged.insert(
        http::header::SERVER,
        http::HeaderValue::from_static(concat!("loquat/", env!("CARGO_PKG_VERSION"))),
    );
    let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    merged.insert(
        http::header::DATE,
        http::HeaderValue::from_str(&date).map_err(http::Error::from)?,
    );
    merged.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("close"),
    );

    for (name, value) in &res.headers {
        merged.insert(name.clone(), value.clone());
    }

    merged.insert(
        http::header::CONTENT_LENGTH,
        http::HeaderValue::from(res.body.len() as u64),
    );

    let mut w: Vec<u8> = Vec::with_capacity(256 + res.body.len());

    write!(
        w,
        "HTTP/1.1 {} {}\r\n",
        res.status.as_u16(),
        res.status.canonical_reason().unwrap_or("Unknown")
    )?;

    for (name, value) in &merged {
        write!(w, "{}: ", name)?;
        std::io::Write::write_all(&mut w, value.as_bytes())?;
        write!(w, "\r\n")?;
    }
    write!(w, "\r\n")?;

    debug!("write_http11_res: {:?}", String::from_utf8_lossy(&w));

    std::io::Write::write_all(&mut w, &res.body)?;

    Ok(w)
}

#[cfg(test)]
mod test {
    use super::*;

    fn request(target: &str, method: Method) -> Request {
        let mut p = RequestParser::new();
        let wire = format!("{} {} HTTP/1.1\r\nHost: h\r\n\r\n", method, target);
        p.feed(wire.as_bytes()).unwrap();
        let (head, body) = p.into_message().unwrap();
        Request::from_parts(head, body)
    }

    #[test]
    fn query_split_from_path() {
        let req = request("/items?a=1&b=2", Method::GET);
        assert_eq!(req.path(), "/items");
        assert_eq!(req.query_param("a"), Some("1"));
        assert_eq!(req.query_param("b"), Some("2"));
        assert_eq!(req.query_param("c"), None);
    }

    #[test]
    fn dispatch_matches_method_and_path() {
        let mut router = Router::new();
        router.add_route(Method::GET, "/hello", |_req| {
            Response::with_text(StatusCode::OK, "hi")
        });

        let res = router.dispatch(request("/hello", Method::GET));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), b"hi");

        // query string does not affect matching.
        let res = router.dispatch(request("/hello?x=1", Method::GET));
        assert_eq!(res.status(), StatusCode::OK);

        let res = router.dispatch(request("/hello", Method::POST));
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = router.dispatch(request("/other", Method::GET));
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn response_serialization() {
        let res = Response::with_text(StatusCode::OK, "hello").header("x-extra", "1");
        let wire = write_http11_res(&res).unwrap();
        let s = String::from_utf8(wire).unwrap();

        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("content-length: 5\r\n"));
        assert!(s.contains("connection: close\r\n"));
        assert!(s.contains("x-extra: 1\r\n"));
        assert!(s.contains("server: loquat/"));
        assert!(s.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn json_response_round_trips() {
        let value = serde_json::json!({"ok": true});
        let res = Response::with_json(StatusCode::CREATED, &value);
        assert_eq!(res.status(), StatusCode::CREATED);
        let parsed: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(parsed, value);
    }
}

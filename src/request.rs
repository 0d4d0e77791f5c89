use crate::cookie::CookieJar;
use crate::url::Url;
use crate::Error;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use std::io::Write;

/// Headers sent on every request unless the caller overrides them.
///
/// `Connection: close` because one connection serves exactly one exchange.
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    ("connection", "close"),
    ("user-agent", concat!("loquat/", env!("CARGO_PKG_VERSION"))),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", "en-US,en;q=0.8"),
];

/// Write a complete http/1.1 request to a byte buffer.
///
/// Caller headers are merged over the default set, then `Host` is taken
/// from the URL (port elided when it is the scheme's default), a single
/// `Cookie` header is added when the jar has matching entries, and
/// `Content-Length` is set when a body is present. Request bodies are
/// never chunked.
#[allow(clippy::write_with_newline)]
pub(crate) fn write_http11_req(
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    body: Option<&[u8]>,
    jar: &CookieJar,
) -> Result<Vec<u8>, Error> {
    let mut merged = HeaderMap::new();

    for (name, value) in DEFAULT_HEADERS {
        merged.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    for (name, value) in headers {
        merged.insert(name.clone(), value.clone());
    }

    merged.insert(
        http::header::HOST,
        HeaderValue::from_str(&url.host_header()).map_err(http::Error::from)?,
    );

    if let Some(cookie) = jar.cookie_header(url.host(), url.path()) {
        merged.insert(
            http::header::COOKIE,
            HeaderValue::from_str(&cookie).map_err(http::Error::from)?,
        );
    }

    if let Some(body) = body {
        merged.insert(
            http::header::CONTENT_LENGTH,
            HeaderValue::from(body.len() as u64),
        );
    }

    let mut w: Vec<u8> = Vec::with_capacity(512 + body.map(|b| b.len()).unwrap_or(0));

    write!(w, "{} {} HTTP/1.1\r\n", method, url.request_target())?;

    for (name, value) in &merged {
        write!(w, "{}: ", name)?;
        w.write_all(value.as_bytes())?;
        write!(w, "\r\n")?;
    }
    write!(w, "\r\n")?;

    debug!("write_http11_req: {:?}", String::from_utf8_lossy(&w));

    if let Some(body) = body {
        w.write_all(body)?;
    }

    Ok(w)
}

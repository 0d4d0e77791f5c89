use crate::Error;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;

/// Characters percent-encoded in query parameter values. Unreserved
/// characters (RFC 3986 section 2.3) pass through.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A parsed and normalized URL.
///
/// Missing parts are filled with defaults: scheme `http`, port 80/443 by
/// scheme, path `/`. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    scheme: String,
    host: String,
    port: u16,
    path: String,
    query: Vec<(String, String)>,
}

impl Url {
    /// Parse a URL string.
    ///
    /// Accepts both full URLs (`http://host:port/path?query`) and
    /// scheme-less forms (`host:port/path`), defaulting the scheme to http.
    pub fn parse(input: &str) -> Result<Url, Error> {
        Url::parse_with_params(input, &[])
    }

    /// Parse a URL string and append/override query parameters.
    ///
    /// Parameters already in the URL's query string are kept verbatim;
    /// caller-supplied values are percent-encoded and override any existing
    /// parameter with the same key.
    pub fn parse_with_params(input: &str, params: &[(&str, &str)]) -> Result<Url, Error> {
        let input = input.trim();

        // fragments are not sent on the wire.
        let input = input.split('#').next().unwrap_or(input);

        let (scheme, rest) = match input.find("://") {
            Some(i) => (&input[..i], &input[i + 3..]),
            None => ("http", input),
        };

        if scheme != "http" && scheme != "https" {
            return Err(Error::MalformedUrl(format!("unsupported scheme: {}", scheme)));
        }

        // authority runs until the first '/' or '?'.
        let authority_end = rest.find(|c| c == '/' || c == '?').unwrap_or_else(|| rest.len());
        let authority = &rest[..authority_end];
        let rest = &rest[authority_end..];

        if authority.is_empty() {
            return Err(Error::MalformedUrl(format!("no host in: {}", input)));
        }

        let (host, port) = match authority.rfind(':') {
            Some(i) => {
                let port = authority[i + 1..]
                    .parse::<u16>()
                    .map_err(|_| Error::MalformedUrl(format!("bad port in: {}", authority)))?;
                (&authority[..i], port)
            }
            None => (authority, default_port(scheme)),
        };

        if host.is_empty() {
            return Err(Error::MalformedUrl(format!("no host in: {}", input)));
        }

        let (path, query_str) = match rest.find('?') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };

        let path = if path.is_empty() { "/" } else { path };

        let mut query = parse_query(query_str);

        for (k, v) in params {
            let enc = utf8_percent_encode(v, QUERY_VALUE).to_string();
            set_param(&mut query, k, enc);
        }

        Ok(Url {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
            path: path.to_string(),
            query,
        })
    }

    /// The URL scheme, `http` or `https`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port, defaulted by scheme when the URL names none.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The path, `/` when the URL names none.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The ordered query parameters.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Whether the scheme calls for a TLS transport.
    pub fn is_tls(&self) -> bool {
        self.scheme == "https"
    }

    /// The request target for the start line: path plus serialized query.
    pub fn request_target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let q: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", self.path, q.join("&"))
    }

    /// The `Host` header value: host, with `:port` only when the port is
    /// not the scheme's default.
    pub fn host_header(&self) -> String {
        if self.port == default_port(&self.scheme) {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Resolve a redirect `Location` against this URL.
    ///
    /// Absolute URLs are used as-is. A location beginning with `/` is joined
    /// onto this URL's scheme, host and port. Anything else is malformed.
    pub fn join(&self, location: &str) -> Result<Url, Error> {
        if location.contains("://") {
            return Url::parse(location);
        }

        if !location.starts_with('/') {
            return Err(Error::MalformedUrl(format!(
                "cannot resolve location: {}",
                location
            )));
        }

        let (path, query_str) = match location.find('?') {
            Some(i) => (&location[..i], &location[i + 1..]),
            None => (location, ""),
        };

        Ok(Url {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
            path: path.to_string(),
            query: parse_query(query_str),
        })
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host_header(), self.request_target())
    }
}

fn default_port(scheme: &str) -> u16 {
    if scheme == "https" {
        443
    } else {
        80
    }
}

/// Parse a query string into ordered key/value pairs. Later duplicates
/// override earlier ones.
pub(crate) fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = vec![];
    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        let (k, v) = match part.find('=') {
            Some(i) => (&part[..i], &part[i + 1..]),
            None => (part, ""),
        };
        set_param(&mut out, k, v.to_string());
    }
    out
}

fn set_param(query: &mut Vec<(String, String)>, key: &str, value: String) {
    if let Some(slot) = query.iter_mut().find(|(k, _)| k == key) {
        slot.1 = value;
    } else {
        query.push((key.to_string(), value));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_defaults() {
        let u = Url::parse("http://example.test").unwrap();
        assert_eq!(u.scheme(), "http");
        assert_eq!(u.host(), "example.test");
        assert_eq!(u.port(), 80);
        assert_eq!(u.path(), "/");
        assert!(u.query().is_empty());
    }

    #[test]
    fn parse_without_scheme() {
        let u = Url::parse("example.test:8080/x").unwrap();
        assert_eq!(u.scheme(), "http");
        assert_eq!(u.port(), 8080);
        assert_eq!(u.path(), "/x");
    }

    #[test]
    fn parse_https_default_port() {
        let u = Url::parse("https://example.test/a/b?x=1").unwrap();
        assert_eq!(u.port(), 443);
        assert!(u.is_tls());
        assert_eq!(u.request_target(), "/a/b?x=1");
    }

    #[test]
    fn params_append_and_override() {
        let u = Url::parse_with_params("http://h/p?a=1&b=2", &[("b", "x y"), ("c", "3")]).unwrap();
        assert_eq!(u.request_target(), "/p?a=1&b=x%20y&c=3");
    }

    #[test]
    fn host_header_elides_default_port() {
        let u = Url::parse("http://h:80/").unwrap();
        assert_eq!(u.host_header(), "h");
        let u = Url::parse("http://h:8080/").unwrap();
        assert_eq!(u.host_header(), "h:8080");
    }

    #[test]
    fn malformed() {
        assert!(Url::parse("http://").is_err());
        assert!(Url::parse("ftp://example.test/").is_err());
        assert!(Url::parse("http://h:notaport/").is_err());
    }

    #[test]
    fn join_relative_preserves_port() {
        let u = Url::parse("http://h.example:8080/old").unwrap();
        let j = u.join("/new").unwrap();
        assert_eq!(j.to_string(), "http://h.example:8080/new");
    }

    #[test]
    fn join_absolute_used_as_is() {
        let u = Url::parse("http://h.example:8080/old").unwrap();
        let j = u.join("http://other.example/x").unwrap();
        assert_eq!(j.host(), "other.example");
        assert_eq!(j.port(), 80);
        assert_eq!(j.path(), "/x");
    }

    #[test]
    fn join_rejects_bare_relative() {
        let u = Url::parse("http://h/").unwrap();
        assert!(u.join("new").is_err());
    }
}

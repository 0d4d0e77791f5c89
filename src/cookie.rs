use chrono::DateTime;
use http::header::SET_COOKIE;
use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A single cookie received via `Set-Cookie`.
///
/// The (name, host) pair is the cookie's identity within a [`CookieJar`]; a
/// later entry with the same identity replaces the earlier one.
///
/// [`CookieJar`]: struct.CookieJar.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// The host the cookie was received from.
    pub host: String,
    /// Path scope. Defaults to `/`.
    pub path: String,
    /// Absolute expiry, from `Max-Age` or `Expires`. `None` means a session
    /// cookie that never expires within this jar's lifetime.
    pub expires: Option<SystemTime>,
}

impl Cookie {
    fn is_expired(&self, now: SystemTime) -> bool {
        match self.expires {
            Some(at) => at <= now,
            None => false,
        }
    }

    /// Whether this cookie applies to a request for `path` on `host`.
    fn matches(&self, host: &str, path: &str) -> bool {
        self.host == host && (self.path == "/" || path.starts_with(&self.path))
    }
}

/// Session-scoped store of received cookies.
///
/// Entries are kept in insertion order. The jar is independent of any
/// transport; the [`Session`] feeds it response headers and reads it back
/// when building requests.
///
/// [`Session`]: struct.Session.html
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    entries: Vec<Cookie>,
}

impl CookieJar {
    /// An empty jar.
    pub fn new() -> Self {
        CookieJar { entries: vec![] }
    }

    /// Store every `Set-Cookie` header from a response received from `host`.
    ///
    /// Expired entries are pruned before insertion. An entry with the same
    /// (name, host) as an existing one replaces it in place.
    pub fn save(&mut self, host: &str, headers: &HeaderMap) {
        let now = SystemTime::now();
        self.prune(now);

        for value in headers.get_all(SET_COOKIE) {
            let value = match value.to_str() {
                Ok(v) => v,
                Err(_) => continue,
            };
            if let Some(cookie) = parse_set_cookie(host, value, now) {
                debug!("jar save: {}={} host={} path={}", cookie.name, cookie.value, cookie.host, cookie.path);
                self.insert(cookie);
            }
        }
    }

    /// All unexpired entries for `host` whose path is `/` or a prefix of
    /// `path`, in insertion order.
    pub fn matching(&self, host: &str, path: &str) -> Vec<&Cookie> {
        let now = SystemTime::now();
        self.entries
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(host, path))
            .collect()
    }

    /// The `Cookie` header value for a request, or `None` when nothing
    /// matches: `k1=v1; k2=v2`.
    pub fn cookie_header(&self, host: &str, path: &str) -> Option<String> {
        let found = self.matching(host, path);
        if found.is_empty() {
            return None;
        }
        let parts: Vec<String> = found
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(parts.join("; "))
    }

    /// Drop entries whose expiry has passed.
    pub fn prune(&mut self, now: SystemTime) {
        self.entries.retain(|c| !c.is_expired(now));
    }

    /// Number of stored entries, including expired ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the jar holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, cookie: Cookie) {
        if let Some(slot) = self
            .entries
            .iter_mut()
            .find(|c| c.name == cookie.name && c.host == cookie.host)
        {
            *slot = cookie;
        } else {
            self.entries.push(cookie);
        }
    }
}

/// Parse one `Set-Cookie` value: `key=value; Attr=val; Flag`.
///
/// The first pair is the cookie identity, the rest are attributes with
/// case-insensitive keys. `Max-Age` wins over `Expires` when both appear.
fn parse_set_cookie(host: &str, value: &str, now: SystemTime) -> Option<Cookie> {
    let mut parts = value.split(';');

    let first = parts.next()?.trim();
    let eq = first.find('=')?;
    let name = first[..eq].trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name: name.to_string(),
        value: first[eq + 1..].trim().to_string(),
        host: host.to_string(),
        path: "/".to_string(),
        expires: None,
    };

    let mut max_age = None;

    for part in parts {
        let part = part.trim();
        let (key, val) = match part.find('=') {
            Some(i) => (&part[..i], part[i + 1..].trim()),
            // flags such as Secure or HttpOnly carry no value.
            None => (part, ""),
        };

        match key.to_ascii_lowercase().as_str() {
            "path" => {
                if !val.is_empty() {
                    cookie.path = val.to_string();
                }
            }
            "expires" => {
                if let Ok(dt) = DateTime::parse_from_rfc2822(val) {
                    cookie.expires = Some(dt.into());
                }
            }
            "max-age" => {
                if let Ok(secs) = val.parse::<i64>() {
                    max_age = Some(secs);
                }
            }
            _ => {}
        }
    }

    if let Some(secs) = max_age {
        cookie.expires = if secs <= 0 {
            Some(UNIX_EPOCH)
        } else {
            Some(now + Duration::from_secs(secs as u64))
        };
    }

    Some(cookie)
}

#[cfg(test)]
mod test {
    use super::*;
    use http::header::HeaderValue;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for v in values {
            h.append(SET_COOKIE, HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn save_and_match() {
        let mut jar = CookieJar::new();
        jar.save("example.test", &headers(&["sid=abc; Path=/"]));

        assert_eq!(
            jar.cookie_header("example.test", "/anything"),
            Some("sid=abc".to_string())
        );
        assert_eq!(jar.cookie_header("other.test", "/"), None);
    }

    #[test]
    fn path_scoping() {
        let mut jar = CookieJar::new();
        jar.save("h", &headers(&["a=1; Path=/api"]));

        assert_eq!(jar.matching("h", "/api/items").len(), 1);
        assert!(jar.matching("h", "/other").is_empty());
    }

    #[test]
    fn max_age_zero_expires_immediately() {
        let mut jar = CookieJar::new();
        jar.save("h", &headers(&["a=1; Path=/; Max-Age=0"]));

        assert!(jar.matching("h", "/").is_empty());

        // the next save prunes it entirely.
        jar.save("h", &headers(&[]));
        assert!(jar.is_empty());
    }

    #[test]
    fn max_age_wins_over_expires() {
        let mut jar = CookieJar::new();
        jar.save(
            "h",
            &headers(&["a=1; Expires=Wed, 01 Jan 1975 00:00:00 GMT; Max-Age=3600"]),
        );
        assert_eq!(jar.matching("h", "/").len(), 1);
    }

    #[test]
    fn expires_http_date() {
        let mut jar = CookieJar::new();
        jar.save("h", &headers(&["old=1; Expires=Sun, 06 Nov 1994 08:49:37 GMT"]));
        assert!(jar.matching("h", "/").is_empty());

        jar.save("h", &headers(&["new=1; Expires=Fri, 01 Jan 2100 00:00:00 GMT"]));
        assert_eq!(jar.matching("h", "/").len(), 1);
    }

    #[test]
    fn same_key_host_replaces() {
        let mut jar = CookieJar::new();
        jar.save("h", &headers(&["a=1"]));
        jar.save("h", &headers(&["a=2"]));
        jar.save("other", &headers(&["a=3"]));

        assert_eq!(jar.len(), 2);
        assert_eq!(jar.cookie_header("h", "/"), Some("a=2".to_string()));
    }

    #[test]
    fn multiple_cookies_joined() {
        let mut jar = CookieJar::new();
        jar.save("h", &headers(&["a=1", "b=2; HttpOnly; Secure"]));

        assert_eq!(jar.cookie_header("h", "/"), Some("a=1; b=2".to_string()));
    }

    #[test]
    fn garbage_ignored() {
        let mut jar = CookieJar::new();
        jar.save("h", &headers(&["novalue", "=bare", ""]));
        assert!(jar.is_empty());
    }
}

use crate::connect::{Connection, Connector};
use crate::cookie::CookieJar;
use crate::request::write_http11_req;
use crate::response::Response;
use crate::url::Url;
use crate::Error;
use futures_channel::oneshot;
use futures_util::future::{self, Either};
use futures_util::pin_mut;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, REFERER};
use http::{HeaderMap, Method};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Redirect chain depth limit. Guards against redirect loops.
const MAX_REDIRECTS: usize = 16;

/// A request body.
#[derive(Debug, Clone)]
pub enum Body {
    /// Raw bytes, sent as-is.
    Bytes(Vec<u8>),
    /// A JSON value; serialized, and `Content-Type: application/json` is
    /// set unless the caller supplied one.
    Json(serde_json::Value),
}

/// Issues requests and maintains cross-request state.
///
/// The session owns the [`CookieJar`] and tracks every open connection so
/// that [`close`] can tear them all down. All methods take `&self`: wrap
/// the session in an `Arc` to issue many concurrent requests, each running
/// as its own task with its own connection and parser.
///
/// No timeout is applied to connecting, writing or reading — waits are
/// unbounded unless the caller wraps the returned future.
///
/// [`CookieJar`]: struct.CookieJar.html
/// [`close`]: #method.close
pub struct Session<C: Connector> {
    connector: C,
    jar: Mutex<CookieJar>,
    /// Abort handles for in-flight requests, keyed by request id.
    open: Mutex<HashMap<u64, oneshot::Sender<()>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<C: Connector> Session<C> {
    /// A new session with an empty cookie jar.
    pub fn new(connector: C) -> Self {
        Session {
            connector,
            jar: Mutex::new(CookieJar::new()),
            open: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Perform a GET request.
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<Response, Error> {
        self.request(Method::GET, url, params, headers, None).await
    }

    /// Perform a POST request with a body.
    pub async fn post(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: Body,
    ) -> Result<Response, Error> {
        self.request(Method::POST, url, params, headers, Some(body))
            .await
    }

    /// Perform a HEAD request. The response never carries a body.
    pub async fn head(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<Response, Error> {
        self.request(Method::HEAD, url, params, headers, None).await
    }

    /// Perform a request, following redirects, and return the final
    /// response.
    ///
    /// One logical request end-to-end: resolve the URL, build the wire
    /// request (consulting the cookie jar), connect, drive the exchange,
    /// merge `Set-Cookie` headers back into the jar, and follow 3xx
    /// `Location` responses with method GET, setting `Referer` to the
    /// prior URL unless the caller supplied one. A missing or unresolvable
    /// `Location` degrades to returning the 3xx response itself.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: Option<Body>,
    ) -> Result<Response, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let mut hdrs = HeaderMap::new();
        for (k, v) in headers {
            let name = HeaderName::from_bytes(k.as_bytes()).map_err(http::Error::from)?;
            let value = HeaderValue::from_str(v).map_err(http::Error::from)?;
            hdrs.append(name, value);
        }
        let caller_referer = hdrs.contains_key(REFERER);

        let mut body = match body {
            Some(Body::Bytes(b)) => Some(b),
            Some(Body::Json(v)) => {
                if !hdrs.contains_key(CONTENT_TYPE) {
                    hdrs.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("application/json; charset=utf-8"),
                    );
                }
                let bytes = serde_json::to_vec(&v)
                    .map_err(|e| Error::User(format!("json body: {}", e)))?;
                Some(bytes)
            }
            None => None,
        };

        let mut method = method;
        let mut url = Url::parse_with_params(url, params)?;

        for _ in 0..MAX_REDIRECTS {
            let res = self
                .one_request(&method, &url, &hdrs, body.as_deref())
                .await?;

            self.jar.lock().unwrap().save(url.host(), res.headers());

            if !res.is_redirect() {
                return Ok(res);
            }

            let next = match res.location().map(|loc| url.join(loc)) {
                Some(Ok(next)) => next,
                // degrade to the pre-redirect response.
                Some(Err(_)) | None => return Ok(res),
            };

            debug!("redirect {} -> {}", url, next);

            if !caller_referer {
                hdrs.insert(
                    REFERER,
                    HeaderValue::from_str(&url.to_string()).map_err(http::Error::from)?,
                );
            }

            url = next;
            method = Method::GET;
            body = None;
        }

        Err(Error::TooManyRedirects(MAX_REDIRECTS))
    }

    /// Tear the session down: abort every in-flight request, close its
    /// connection, and refuse further requests. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut open = self.open.lock().unwrap();
        debug!("session close: aborting {} connections", open.len());
        for (_, tx) in open.drain() {
            tx.send(()).ok();
        }
    }

    /// Whether [`close`] has been called.
    ///
    /// [`close`]: #method.close
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Direct access to the cookie jar. The guard must not be held across
    /// an await.
    pub fn cookies(&self) -> MutexGuard<'_, CookieJar> {
        self.jar.lock().unwrap()
    }

    /// One request/response exchange against a single connection, raced
    /// against the session's abort signal.
    async fn one_request(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<Response, Error> {
        let req = {
            let jar = self.jar.lock().unwrap();
            write_http11_req(method, url, headers, body, &jar)?
        };

        let io = self
            .connector
            .connect(url.host(), url.port(), url.is_tls())
            .await
            .map_err(Error::Connect)?;

        let mut conn = Connection::new(io, method);
        conn.send_request(req);

        let (abort_tx, abort_rx) = oneshot::channel();
        let id = self.register(abort_tx)?;

        let out = {
            let drive = conn.drive();
            pin_mut!(drive);

            match future::select(drive, abort_rx).await {
                Either::Left((res, _)) => res,
                Either::Right((_, _unfinished)) => Err(Error::Closed),
            }
        };

        self.unregister(id);
        conn.close();
        out
    }

    fn register(&self, tx: oneshot::Sender<()>) -> Result<u64, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.open.lock().unwrap().insert(id, tx);

        // close() may have drained the map between the check and the
        // insert; don't leave a live connection behind a closed session.
        if self.is_closed() {
            self.unregister(id);
            return Err(Error::Closed);
        }
        Ok(id)
    }

    fn unregister(&self, id: u64) {
        self.open.lock().unwrap().remove(&id);
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: Connector> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Session {{ open: {}, cookies: {}, closed: {} }}",
            self.open.lock().map(|o| o.len()).unwrap_or(0),
            self.jar.lock().map(|j| j.len()).unwrap_or(0),
            self.is_closed()
        )
    }
}

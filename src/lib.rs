#![warn(missing_docs, missing_debug_implementations)]
#![warn(clippy::all)]

//! An asynchronous HTTP/1.1 client (and matching minimal server) that does
//! its own request framing, response streaming and session state.
//!
//! The crate sits directly on raw byte-stream transports: it serializes
//! requests, incrementally parses responses out of arbitrarily-chunked
//! reads, delimits bodies by `Content-Length`, chunked transfer encoding
//! or connection close, and maintains cross-request state — cookies and
//! redirect following — in a [`Session`].
//!
//! # Transports
//!
//! Which async runtime to use, TCP and TLS are handled outside this
//! library. A [`Connector`] supplied by the caller opens transports; the
//! crate only asks for a TLS-capable one when the scheme is https. The
//! crate never spawns tasks: each request is an ordinary future, many of
//! which can be in flight on one session concurrently, each exclusively
//! owning its connection and parser.
//!
//! # In scope
//!
//! * `Content-Length` and `Transfer-Encoding: chunked` body delineation,
//!   including close-delimited HTTP/1.0-style bodies.
//! * Cookie storage with expiry and path scoping, replayed on matching
//!   requests.
//! * Redirect following with `Referer` propagation.
//! * `Content-Type` charsets, gzip `Content-Encoding`, JSON bodies.
//!
//! # Out of scope
//!
//! * HTTP/2 and HTTP/3.
//! * TLS itself — an https transport is the [`Connector`]'s business.
//! * Connection reuse: one connection serves exactly one exchange.
//!
//! [`Session`]: struct.Session.html
//! [`Connector`]: trait.Connector.html

#[macro_use]
extern crate log;

mod chunked;
mod connect;
mod cookie;
mod error;
mod request;
mod response;
mod session;
mod url;

#[doc(hidden)]
pub mod parser;

pub mod server;

pub(crate) use futures_io::{AsyncRead, AsyncWrite};

pub use connect::{Connection, Connector};
pub use cookie::{Cookie, CookieJar};
pub use error::Error;
pub use response::Response;
pub use session::{Body, Session};
pub use url::Url;

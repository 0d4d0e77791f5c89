use crate::parser::ResponseParser;
use crate::response::Response;
use crate::Error;
use crate::{AsyncRead, AsyncWrite};
use futures_util::future::poll_fn;
use futures_util::ready;
use http::Method;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Size of buffer reading response bytes into.
const READ_BUF_SIZE: usize = 16_384;

/// Opens byte-stream transports for the session.
///
/// DNS, TCP and TLS live behind this trait; the crate itself never touches
/// a socket API. The `tls` flag is derived from the URL scheme and the
/// implementation decides what transport capability that maps to.
/// Failures surface as [`Error::Connect`].
///
/// [`Error::Connect`]: enum.Error.html#variant.Connect
pub trait Connector {
    /// The transport produced: any async byte stream.
    type Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// Future resolving to a connected transport.
    type Future: Future<Output = io::Result<Self::Transport>> + Send;

    /// Open a transport to (host, port), with TLS when asked for.
    fn connect(&self, host: &str, port: u16, tls: bool) -> Self::Future;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Transport open, request bytes queued but not fully written.
    Writing,
    /// Request written, reading response bytes into the parser.
    Reading,
    /// Transport released. Terminal.
    Closed,
}

/// One connection serving exactly one request/response exchange.
///
/// Owns the transport and the [`ResponseParser`] exclusively. Driving it
/// writes the queued request and feeds everything the transport delivers
/// to the parser until the message completes; the transport is then
/// dropped — there is no keep-alive reuse.
///
/// [`ResponseParser`]: struct.ResponseParser.html
pub struct Connection<S> {
    io: Option<S>,
    state: State,
    to_write: Vec<u8>,
    parser: ResponseParser,
    recv_buf: Vec<u8>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a freshly connected transport. `method` matters for framing:
    /// a HEAD response carries no body.
    pub fn new(io: S, method: &Method) -> Self {
        Connection {
            io: Some(io),
            state: State::Writing,
            to_write: vec![],
            parser: ResponseParser::for_method(method),
            recv_buf: vec![0; READ_BUF_SIZE],
        }
    }

    /// Queue serialized request bytes for writing.
    pub fn send_request(&mut self, bytes: Vec<u8>) {
        self.to_write = bytes;
    }

    /// Drive the exchange to completion and return the response.
    ///
    /// Waits are unbounded; dropping the returned future closes the
    /// transport, which is the cancellation path.
    pub async fn drive(&mut self) -> Result<Response, Error> {
        poll_fn(|cx| self.poll_drive(cx)).await?;

        let parser = std::mem::replace(&mut self.parser, ResponseParser::new());
        Response::from_parser(parser).ok_or(Error::PrematureClose)
    }

    /// Release the transport. Idempotent.
    pub fn close(&mut self) {
        if self.state != State::Closed {
            trace!("connection close");
        }
        self.io = None;
        self.state = State::Closed;
    }

    fn poll_drive(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        loop {
            match self.state {
                State::Writing => {
                    let io = match &mut self.io {
                        Some(io) => io,
                        None => return Err(Error::Closed).into(),
                    };

                    while !self.to_write.is_empty() {
                        let amount = ready!(Pin::new(&mut *io).poll_write(cx, &self.to_write))?;
                        trace!("wrote: {}", amount);
                        if amount == 0 {
                            return Err(Error::Io(io::Error::new(
                                io::ErrorKind::WriteZero,
                                "transport accepted no bytes",
                            )))
                            .into();
                        }
                        self.to_write = self.to_write.split_off(amount);
                    }

                    ready!(Pin::new(&mut *io).poll_flush(cx))?;
                    self.state = State::Reading;
                }

                State::Reading => {
                    let io = match &mut self.io {
                        Some(io) => io,
                        None => return Err(Error::Closed).into(),
                    };

                    let amount = ready!(Pin::new(&mut *io).poll_read(cx, &mut self.recv_buf))?;
                    trace!("read: {}", amount);

                    if amount == 0 {
                        // end-of-stream either terminates a close-delimited
                        // body or truncates the message.
                        self.parser.feed_eof()?;
                    } else {
                        self.parser.feed(&self.recv_buf[..amount])?;
                    }

                    if self.parser.is_complete() {
                        self.close();
                        return Ok(()).into();
                    }
                }

                State::Closed => return Err(Error::Closed).into(),
            }
        }
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Connection {{ state: {:?}, to_write: {}, parser: {:?} }}",
            self.state,
            self.to_write.len(),
            self.parser
        )
    }
}

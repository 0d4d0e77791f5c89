#![allow(dead_code)]

use async_std::net::TcpStream;
use futures_util::io::AsyncReadExt;
use loquat::Connector;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Once;

/// Plain-TCP connector for tests. TLS is not available here; an https URL
/// fails with a connect error.
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpStream;
    type Future = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

    fn connect(&self, host: &str, port: u16, tls: bool) -> Self::Future {
        let addr = format!("{}:{}", host, port);
        Box::pin(async move {
            if tls {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "tls transport not available in tests",
                ));
            }
            TcpStream::connect(addr).await
        })
    }
}

/// Read from the socket until the request head delimiter is seen, and
/// return everything read so far as a string.
pub async fn read_head(io: &mut TcpStream) -> String {
    let mut buf = vec![];
    let mut one = [0u8; 1];
    loop {
        let amount = io.read(&mut one).await.expect("read_head");
        if amount == 0 {
            break;
        }
        buf.push(one[0]);
        if buf.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8(buf).expect("head is utf8")
}

pub fn setup_logger() {
    static START: Once = Once::new();
    START.call_once(|| {
        let test_log = std::env::var("TEST_LOG")
            .map(|x| x != "0" && x.to_lowercase() != "false")
            .unwrap_or(false);
        let level = if test_log {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        };
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Warn)
            .filter_module("loquat", level)
            .target(env_logger::Target::Stdout)
            .init();
    });
}

mod common;

use async_std::net::TcpListener;
use async_std::task;
use common::{read_head, setup_logger, TcpConnector};
use futures_util::io::AsyncWriteExt;
use loquat::{Error, Session};

#[async_std::test]
async fn malformed_url_is_rejected() {
    setup_logger();

    let session = Session::new(TcpConnector);
    let err = session.get("http://", &[], &[]).await.unwrap_err();
    assert!(matches!(err, Error::MalformedUrl(_)));

    let err = session.get("ftp://host/x", &[], &[]).await.unwrap_err();
    assert!(matches!(err, Error::MalformedUrl(_)));
}

#[async_std::test]
async fn connect_failure_is_surfaced() {
    setup_logger();

    // bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = Session::new(TcpConnector);
    let err = session
        .get(&format!("http://{}/", addr), &[], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Connect(_)));
}

#[async_std::test]
async fn truncated_body_is_premature_close() {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = task::spawn(async move {
        let (mut io, _) = listener.accept().await.unwrap();
        read_head(&mut io).await;
        // promise 10 bytes, deliver 3, close.
        io.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc")
            .await
            .unwrap();
        io.flush().await.unwrap();
    });

    let session = Session::new(TcpConnector);
    let err = session
        .get(&format!("http://{}/", addr), &[], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::PrematureClose));

    server.await;
}

#[async_std::test]
async fn bad_chunk_size_is_malformed_chunk() {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = task::spawn(async move {
        let (mut io, _) = listener.accept().await.unwrap();
        read_head(&mut io).await;
        io.write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n")
            .await
            .unwrap();
        io.flush().await.unwrap();
    });

    let session = Session::new(TcpConnector);
    let err = session
        .get(&format!("http://{}/", addr), &[], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedChunk(_)));

    server.await;
}

#[async_std::test]
async fn garbage_status_line_is_parse_error() {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = task::spawn(async move {
        let (mut io, _) = listener.accept().await.unwrap();
        read_head(&mut io).await;
        io.write_all(b"NOT HTTP AT ALL\r\n\r\n").await.unwrap();
        io.flush().await.unwrap();
    });

    let session = Session::new(TcpConnector);
    let err = session
        .get(&format!("http://{}/", addr), &[], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Http11Parser(_)));

    server.await;
}

mod common;

use async_std::net::TcpListener;
use async_std::task;
use common::{read_head, setup_logger, TcpConnector};
use futures_util::io::AsyncWriteExt;
use loquat::Session;

#[async_std::test]
async fn get_content_length_body() {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = task::spawn(async move {
        let (mut io, _) = listener.accept().await.unwrap();
        let head = read_head(&mut io).await;
        assert!(head.starts_with("GET /path HTTP/1.1\r\n"));
        assert!(head.to_lowercase().contains(&format!("host: {}\r\n", addr)));
        assert!(head.to_lowercase().contains("connection: close\r\n"));
        io.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
            .await
            .unwrap();
    });

    let session = Session::new(TcpConnector);
    let res = session
        .get(&format!("http://{}/path", addr), &[], &[])
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().as_deref(), Some("hello"));

    server.await;
}

#[async_std::test]
async fn get_chunked_body_in_pieces() {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = task::spawn(async move {
        let (mut io, _) = listener.accept().await.unwrap();
        read_head(&mut io).await;
        // dribble the response so the client sees partial deliveries.
        for piece in &[
            &b"HTTP/1.1 200 OK\r\nTransfer-Enc"[..],
            &b"oding: chunked\r\n\r\n5\r\nhel"[..],
            &b"lo\r\n6\r\n world\r\n0\r"[..],
            &b"\n\r\n"[..],
        ] {
            io.write_all(piece).await.unwrap();
            io.flush().await.unwrap();
        }
    });

    let session = Session::new(TcpConnector);
    let res = session
        .get(&format!("http://{}/", addr), &[], &[])
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().as_deref(), Some("hello world"));

    server.await;
}

#[async_std::test]
async fn get_close_delimited_body() {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = task::spawn(async move {
        let (mut io, _) = listener.accept().await.unwrap();
        read_head(&mut io).await;
        // no Content-Length, no chunked: the close ends the body.
        io.write_all(b"HTTP/1.1 200 OK\r\n\r\nuntil close")
            .await
            .unwrap();
        io.flush().await.unwrap();
    });

    let session = Session::new(TcpConnector);
    let res = session
        .get(&format!("http://{}/", addr), &[], &[])
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().as_deref(), Some("until close"));

    server.await;
}

#[async_std::test]
async fn query_params_are_encoded_and_appended() {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = task::spawn(async move {
        let (mut io, _) = listener.accept().await.unwrap();
        let head = read_head(&mut io).await;
        assert!(head.starts_with("GET /search?q=a%20b&page=2 HTTP/1.1\r\n"));
        io.write_all(b"HTTP/1.1 204 No Content\r\n\r\n").await.unwrap();
    });

    let session = Session::new(TcpConnector);
    let res = session
        .get(
            &format!("http://{}/search", addr),
            &[("q", "a b"), ("page", "2")],
            &[],
        )
        .await
        .unwrap();

    assert_eq!(res.status(), 204);
    assert!(res.body().is_empty());

    server.await;
}

#[async_std::test]
async fn head_ignores_content_length() {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = task::spawn(async move {
        let (mut io, _) = listener.accept().await.unwrap();
        let head = read_head(&mut io).await;
        assert!(head.starts_with("HEAD / HTTP/1.1\r\n"));
        // a HEAD response advertises the length but carries no body.
        io.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n")
            .await
            .unwrap();
    });

    let session = Session::new(TcpConnector);
    let res = session
        .head(&format!("http://{}/", addr), &[], &[])
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.header("content-length"), Some("5"));
    assert!(res.body().is_empty());

    server.await;
}

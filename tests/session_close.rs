mod common;

use async_std::net::TcpListener;
use async_std::task;
use common::{read_head, setup_logger, TcpConnector};
use loquat::{Error, Session};
use std::sync::Arc;
use std::time::Duration;

#[async_std::test]
async fn close_aborts_in_flight_request() {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // a server that accepts, reads the request and never answers.
    let server = task::spawn(async move {
        let (mut io, _) = listener.accept().await.unwrap();
        read_head(&mut io).await;
        task::sleep(Duration::from_secs(10)).await;
        drop(io);
    });

    let session = Arc::new(Session::new(TcpConnector));

    let in_flight = {
        let session = session.clone();
        task::spawn(async move { session.get(&format!("http://{}/", addr), &[], &[]).await })
    };

    // give the request time to get past connect and into the read.
    task::sleep(Duration::from_millis(200)).await;
    session.close();

    let err = in_flight.await.unwrap_err();
    assert!(matches!(err, Error::Closed));

    server.cancel().await;
}

#[async_std::test]
async fn closed_session_refuses_new_requests() {
    setup_logger();

    let session = Session::new(TcpConnector);
    session.close();
    assert!(session.is_closed());

    let err = session
        .get("http://127.0.0.1:1/", &[], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Closed));

    // close is idempotent.
    session.close();
    assert!(session.is_closed());
}

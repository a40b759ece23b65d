//! Drives a real HTTP/1.1 request through `ActixBridge::serve`, end to end.
#![allow(clippy::unwrap_used)]

use std::net::TcpListener as StdTcpListener;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use txframe_actix::ActixBridge;
use txframe_core::{sync_handler, FrameworkBridge, ReadySignal, RouteSpec};

async fn send_request(addr: std::net::SocketAddr, request: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn a_mounted_route_answers_a_real_request() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut bridge = ActixBridge::new();
    bridge.mount(vec![RouteSpec {
        method: http::Method::GET,
        path: "/ping".to_owned(),
        handler: sync_handler(|ctx| {
            ctx.text(http::StatusCode::OK, "pong");
        }),
    }]);

    let cancel = CancellationToken::new();
    let (ready, waiter) = ReadySignal::pair();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move { Box::new(bridge).serve(listener, cancel_clone, ready).await });
    waiter.wait().await.unwrap();

    let response = send_request(addr, "GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");
    assert!(response.ends_with("pong"), "unexpected body: {response}");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn an_unmounted_path_falls_through_to_not_found() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut bridge = ActixBridge::new();
    bridge.set_not_found_handler(sync_handler(|ctx| {
        ctx.text(http::StatusCode::NOT_FOUND, "missing");
    }));
    bridge.mount(vec![]);

    let cancel = CancellationToken::new();
    let (ready, waiter) = ReadySignal::pair();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move { Box::new(bridge).serve(listener, cancel_clone, ready).await });
    waiter.wait().await.unwrap();

    let response = send_request(addr, "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404"), "unexpected response: {response}");
    assert!(response.ends_with("missing"), "unexpected body: {response}");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

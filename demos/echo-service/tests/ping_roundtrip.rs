//! Drives a real gRPC call through `GrpcServer` against the demo's `Ping`
//! service, over a loopback TCP connection.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use echo_service::pb::ping_client::PingClient;
use echo_service::pb::PingRequest;
use echo_service::ping::PingService;
use txframe_core::{GrpcSink, Runnable};
use txframe_grpc::{from_grpc_service, GrpcServer, GrpcServerOptions};

fn free_loopback_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn ping_round_trips_over_a_real_connection() {
    let port = free_loopback_port();
    let listen_addr = format!("tcp://127.0.0.1:{port}");

    let server = Arc::new(GrpcServer::new(GrpcServerOptions {
        listen_addr: listen_addr.clone(),
        health_enabled: false,
        ..GrpcServerOptions::default()
    }));

    let ping_service = PingService::default();
    server
        .register_grpc_service(from_grpc_service(
            echo_service::pb::ping_server::PingServer::new(ping_service),
        ))
        .unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    server.start(cancel.clone()).await.unwrap();

    let endpoint = tonic::transport::Endpoint::from_shared(format!("http://127.0.0.1:{port}")).unwrap();
    let channel = tokio::time::timeout(Duration::from_secs(5), endpoint.connect())
        .await
        .unwrap()
        .unwrap();
    let mut client = PingClient::new(channel);

    let response = client
        .ping(PingRequest {
            message: "hello".to_owned(),
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.message, "hello");
    assert_eq!(response.counter, 1);

    let response2 = client
        .ping(PingRequest {
            message: "again".to_owned(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response2.counter, 2);

    server.stop(Duration::from_secs(5)).await.unwrap();
}

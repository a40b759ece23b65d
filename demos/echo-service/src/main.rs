//! Demo binary: wires an HTTP-only echo service and a gRPC-only ping service
//! onto a single [`txframe_core::Manager`], selectable between the axum and
//! actix HTTP bridges via config.

use std::sync::Arc;

use clap::Parser;
use echo_service::config::AppConfig;
use echo_service::echo::EchoService;
use echo_service::pb;
use echo_service::ping::PingService;
use txframe_core::{GrpcComponent, HttpServer, HttpServerOptions, Manager, ManagerOptions, Mode};
use txframe_grpc::{GrpcServer, GrpcServerOptions};

#[derive(Parser, Debug)]
#[command(name = "echo-service", about = "txframe demo: HTTP echo + gRPC ping")]
struct Cli {
    /// Path to an optional YAML config file, layered under environment variables.
    #[arg(long)]
    config: Option<String>,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(config.log_json);

    txframe_axum::install();
    txframe_actix::install();

    let http = Arc::new(HttpServer::new(HttpServerOptions {
        bind_addr: config.http_bind_addr.clone(),
        adapter: config.http_adapter.clone(),
        ..HttpServerOptions::default()
    }));

    let grpc = Arc::new(GrpcServer::new(GrpcServerOptions {
        listen_addr: config.grpc_listen_addr.clone(),
        ..GrpcServerOptions::default()
    }));

    let manager = Manager::new(
        ManagerOptions {
            mode: Mode::Both,
            ..ManagerOptions::default()
        },
        Some(Arc::clone(&http)),
        Some(Arc::clone(&grpc) as Arc<dyn GrpcComponent>),
    );

    let registry = manager.registry();
    registry.register_http(Arc::new(EchoService), Arc::new(EchoService));

    let ping_service = PingService::default();
    let ping_identity: Arc<dyn txframe_core::Service> = Arc::new(ping_service.clone());
    let ping_grpc_server = pb::ping_server::PingServer::new(ping_service);
    registry.register_grpc(ping_identity, txframe_grpc::from_grpc_service(ping_grpc_server));

    tracing::info!(
        http = %config.http_bind_addr,
        grpc = %config.grpc_listen_addr,
        adapter = %config.http_adapter,
        "starting echo-service"
    );

    manager.run().await
}

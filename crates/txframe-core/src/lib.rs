//! Transport-agnostic core: neutral request context, router, bridge
//! interface, service registry, HTTP server and server manager.
//!
//! Concrete bridges (`txframe-axum`, `txframe-actix`) and the gRPC server
//! (`txframe-grpc`) depend on this crate; this crate depends on neither.

pub mod bridge;
pub mod context;
pub mod http_server;
pub mod manager;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod runnable;
pub mod service;
pub mod signal;

pub use bridge::{
    construct_bridge, lookup_bridge, register_bridge, BridgeFactory, FrameworkBridge,
    DEFAULT_BRIDGE_ID,
};
pub use context::{RequestContext, Validator, WriteOutcome};
pub use http_server::{HttpServer, HttpServerOptions, MiddlewareOptions};
pub use manager::{Manager, ManagerOptions, Mode};
pub use registry::{GrpcSink, HttpSink, Registry};
pub use router::{sync_handler, NeutralHandler, NeutralMiddleware, NeutralRouter, RouteSpec};
pub use runnable::{GrpcComponent, Runnable};
pub use service::{
    not_found_problem, CloseService, GrpcServiceDesc, HTTPHandler, HealthCheckService,
    InitService, Service,
};
pub use signal::{wait_for_shutdown, ReadySignal, ReadyWaiter};

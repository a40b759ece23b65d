//! Library half of the demo: an HTTP-only echo service and a gRPC-only ping
//! service, wired onto a single [`txframe_core::Manager`]. Split out of
//! `main.rs` so integration tests can exercise the same service types the
//! binary runs.

pub mod config;
pub mod echo;
pub mod ping;

pub mod pb {
    //! Generated from `proto/ping.proto` by `build.rs` via `tonic-prost-build`.
    tonic::include_proto!("txframe.demo.ping");
}

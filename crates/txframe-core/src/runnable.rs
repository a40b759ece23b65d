//! The `Runnable` contract (§3): anything the Manager can start and stop
//! alongside the HTTP and gRPC servers.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Runnable: Send + Sync {
    fn name(&self) -> &str;

    /// Returns once the component has reached an accepting/running state, or
    /// propagates a construction error immediately. Must honor `cancel`.
    async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()>;

    /// Graceful stop bounded by `deadline`. Idempotent: stopping a component
    /// that never started (or was already stopped) returns `Ok(())`.
    async fn stop(&self, deadline: Duration) -> anyhow::Result<()>;
}

/// A gRPC component the Manager can both drive (via [`Runnable`]) and apply
/// the Registry's descriptors onto (via [`crate::registry::GrpcSink`]), held
/// as a single trait object so `Manager::start` never needs to downcast a
/// type-erased `Runnable` back to `GrpcSink`.
pub trait GrpcComponent: Runnable + crate::registry::GrpcSink {}

impl<T: Runnable + crate::registry::GrpcSink> GrpcComponent for T {}

//! Service, HTTPHandler and GRPCServiceDesc (§3, §4 data model).

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::router::NeutralRouter;
use txframe_errors::Problem;

/// An entity with a stable name. The three lifecycle capabilities below are
/// opt-in traits rather than methods on `Service` itself, so a service only
/// pays for what it declares — mirrors the capability-trait split this
/// codebase's module system already uses for `Module`/`StatefulModule`.
pub trait Service: Send + Sync {
    fn service_name(&self) -> &str;

    /// Escape hatch for callers that need to downcast a registered service
    /// back to its concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Returns `Some(self)` when this service also implements
    /// [`InitService`]. A blanket `impl InitService for T` cannot be
    /// auto-detected from a `dyn Service`, so a service that wants `init`
    /// invoked overrides this to hand back the same `self` through the
    /// narrower vtable.
    fn as_init(&self) -> Option<&dyn InitService> {
        None
    }

    /// Same pattern as [`Service::as_init`], for [`CloseService`].
    fn as_close(&self) -> Option<&dyn CloseService> {
        None
    }

    /// Same pattern as [`Service::as_init`], for [`HealthCheckService`].
    fn as_health_check(&self) -> Option<&dyn HealthCheckService> {
        None
    }
}

/// Opt-in: `init` is invoked exactly once before any request is served.
#[async_trait]
pub trait InitService: Service {
    async fn init(&self) -> anyhow::Result<()>;
}

/// Opt-in: `close` is invoked exactly once after all listeners have stopped.
#[async_trait]
pub trait CloseService: Service {
    async fn close(&self) -> anyhow::Result<()>;
}

/// Opt-in: backs the Health middleware's readiness aggregate.
#[async_trait]
pub trait HealthCheckService: Service {
    async fn health_check(&self) -> anyhow::Result<()>;
}

/// An object exposing route registration. Invoked exactly once, during
/// `HttpServer::start`, after middleware is attached.
pub trait HTTPHandler: Send + Sync {
    fn register_routes(&self, router: NeutralRouter);
}

/// A type-erased gRPC service implementation plus the closure that mounts it
/// onto a native gRPC routes builder. The erasure lets the Registry hold
/// descriptors for arbitrary `tonic`-generated service types without this
/// crate depending on `tonic` directly; `txframe-grpc` supplies the ergonomic
/// constructor (`GrpcServiceDesc::from_service`) that captures the concrete
/// type at the call site and downcasts it back inside `mount`.
#[derive(Clone)]
pub struct GrpcServiceDesc {
    pub service_name: &'static str,
    pub inner: Arc<dyn Any + Send + Sync>,
    pub mount: Arc<dyn Fn(&(dyn Any + Send + Sync), &mut dyn Any) + Send + Sync>,
}

impl GrpcServiceDesc {
    #[must_use]
    pub fn new(
        service_name: &'static str,
        inner: Arc<dyn Any + Send + Sync>,
        mount: Arc<dyn Fn(&(dyn Any + Send + Sync), &mut dyn Any) + Send + Sync>,
    ) -> Self {
        Self {
            service_name,
            inner,
            mount,
        }
    }

    /// Mount this descriptor onto a native routes builder, identified only as
    /// `&mut dyn Any` here; the closure created in `txframe-grpc` knows the
    /// concrete type and downcasts it.
    pub fn mount_onto(&self, builder: &mut dyn Any) {
        (self.mount)(self.inner.as_ref(), builder);
    }
}

/// The not-found handler's stable wire contract (§6): 404 with a structured
/// JSON error body containing at minimum `code` and `message`.
#[must_use]
pub fn not_found_problem(path: &str) -> Problem {
    Problem::not_found(path)
}

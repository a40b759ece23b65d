//! Service Registry (§4.6): the concurrency-safe name→service(+handler,
//! +gRPC descriptors) mapping exclusively owned by a Manager.

use std::sync::Arc;

use parking_lot::RwLock;
use txframe_errors::RegistrationError;

use crate::service::{GrpcServiceDesc, HTTPHandler, Service};

/// Implemented by the HTTP Server so the Registry can forward registrations
/// without depending on `txframe-core`'s own `http_server` module directly
/// (kept as a trait seam for symmetry with [`GrpcSink`], whose implementor
/// lives in a different crate entirely).
pub trait HttpSink: Send + Sync {
    fn register_http_handler(
        &self,
        service_name: &str,
        handler: Arc<dyn HTTPHandler>,
    ) -> Result<(), RegistrationError>;
}

/// Implemented by the gRPC Server (`txframe-grpc`), which depends on this
/// crate — not the other way around — so the Registry stays gRPC-runtime
/// agnostic.
pub trait GrpcSink: Send + Sync {
    fn register_grpc_service(&self, desc: GrpcServiceDesc) -> Result<(), RegistrationError>;
}

#[derive(Default)]
pub struct Registry {
    services: RwLock<Vec<(String, Arc<dyn Service>)>>,
    http_handlers: RwLock<Vec<(String, Arc<dyn HTTPHandler>)>>,
    grpc_descs: RwLock<Vec<GrpcServiceDesc>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn upsert_service(&self, name: &str, svc: Arc<dyn Service>) {
        let mut services = self.services.write();
        if let Some(entry) = services.iter_mut().find(|(n, _)| n == name) {
            entry.1 = svc;
        } else {
            services.push((name.to_owned(), svc));
        }
    }

    fn upsert_http_handler(&self, name: &str, handler: Arc<dyn HTTPHandler>) {
        let mut handlers = self.http_handlers.write();
        if let Some(entry) = handlers.iter_mut().find(|(n, _)| n == name) {
            tracing::warn!(service = name, "overwriting previously registered HTTP handler");
            entry.1 = handler;
        } else {
            handlers.push((name.to_owned(), handler));
        }
    }

    /// Stores `svc` by name; stores `http_handler` by name iff present;
    /// appends `grpc_desc` iff present. Overwriting an existing name replaces
    /// both the service record and the HTTP handler record. gRPC descriptors
    /// are always appended: re-registering a service name does NOT
    /// deduplicate its prior gRPC descriptor.
    pub fn register_service(
        &self,
        svc: Arc<dyn Service>,
        http_handler: Option<Arc<dyn HTTPHandler>>,
        grpc_desc: Option<GrpcServiceDesc>,
    ) {
        let name = svc.service_name().to_owned();
        self.upsert_service(&name, svc);
        if let Some(handler) = http_handler {
            self.upsert_http_handler(&name, handler);
        }
        if let Some(desc) = grpc_desc {
            self.grpc_descs.write().push(desc);
        }
    }

    pub fn register_http(&self, svc: Arc<dyn Service>, handler: Arc<dyn HTTPHandler>) {
        self.register_service(svc, Some(handler), None);
    }

    pub fn register_grpc(&self, svc: Arc<dyn Service>, desc: GrpcServiceDesc) {
        self.register_service(svc, None, Some(desc));
    }

    #[must_use]
    pub fn get_service(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| Arc::clone(s))
    }

    #[must_use]
    pub fn all_services(&self) -> Vec<Arc<dyn Service>> {
        self.services.read().iter().map(|(_, s)| Arc::clone(s)).collect()
    }

    /// Forward every registered HTTP handler to `sink`. Services without a
    /// registered HTTP handler are silently skipped. The first error
    /// short-circuits the rest.
    ///
    /// # Errors
    /// Propagates the first [`RegistrationError`] `sink` returns.
    pub fn apply_to_http(&self, sink: &dyn HttpSink) -> Result<(), RegistrationError> {
        let handlers = self.http_handlers.read().clone();
        for (name, handler) in handlers {
            sink.register_http_handler(&name, handler)?;
        }
        Ok(())
    }

    /// Forward every queued gRPC descriptor to `sink`, in registration order.
    ///
    /// # Errors
    /// Propagates the first [`RegistrationError`] `sink` returns.
    pub fn apply_to_grpc(&self, sink: &dyn GrpcSink) -> Result<(), RegistrationError> {
        let descs = self.grpc_descs.read().clone();
        for desc in descs {
            sink.register_grpc_service(desc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::router::NeutralRouter;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubService(&'static str);
    impl Service for StubService {
        fn service_name(&self) -> &str {
            self.0
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct StubHandler;
    impl HTTPHandler for StubHandler {
        fn register_routes(&self, _router: NeutralRouter) {}
    }

    struct CountingHttpSink(AtomicUsize);
    impl HttpSink for CountingHttpSink {
        fn register_http_handler(
            &self,
            _service_name: &str,
            _handler: Arc<dyn HTTPHandler>,
        ) -> Result<(), RegistrationError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn re_registering_same_name_replaces_service_and_handler() {
        let registry = Registry::new();
        registry.register_http(Arc::new(StubService("echo")), Arc::new(StubHandler));
        registry.register_http(Arc::new(StubService("echo")), Arc::new(StubHandler));
        assert_eq!(registry.all_services().len(), 1);
        assert_eq!(registry.http_handlers.read().len(), 1);
    }

    #[test]
    fn grpc_descriptors_are_never_deduplicated() {
        let registry = Registry::new();
        let desc = |name| GrpcServiceDesc::new(name, Arc::new(()), Arc::new(|_, _| {}));
        registry.register_grpc(Arc::new(StubService("echo")), desc("echo"));
        registry.register_grpc(Arc::new(StubService("echo")), desc("echo"));
        assert_eq!(registry.grpc_descs.read().len(), 2);
    }

    #[test]
    fn apply_to_http_forwards_every_handler() {
        let registry = Registry::new();
        registry.register_http(Arc::new(StubService("a")), Arc::new(StubHandler));
        registry.register_http(Arc::new(StubService("b")), Arc::new(StubHandler));
        let sink = CountingHttpSink(AtomicUsize::new(0));
        registry.apply_to_http(&sink).unwrap();
        assert_eq!(sink.0.load(Ordering::SeqCst), 2);
    }
}

//! Router & Middleware Contract (§4.2): the onion-model middleware encoding
//! and the neutral router that collects routes before a bridge mounts them.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use http::Method;

use crate::context::RequestContext;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A handler over the neutral context. Boxed-future-returning rather than
/// `async fn` in a trait, since `NeutralHandler` must be object-safe and
/// storable in middleware closures.
pub type NeutralHandler = Arc<dyn for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync>;

/// A middleware: `next -> handler`. Composing `[m1, m2, .., mn]` yields the
/// call order `m1(m2(...mn(actual)))` per §4.2.
pub type NeutralMiddleware = Arc<dyn Fn(NeutralHandler) -> NeutralHandler + Send + Sync>;

/// One collected route, ready for a bridge to mount natively.
#[derive(Clone)]
pub struct RouteSpec {
    pub method: Method,
    pub path: String,
    pub handler: NeutralHandler,
}

/// A live router tied to a framework bridge. `group` returns a router that
/// shares the same route sink but carries its own prefix and a snapshot of
/// the parent's middleware stack taken at group-creation time — so `use_middleware`
/// calls on the parent after a group is created do not retroactively apply to
/// that group, matching the ordering contract in §4.2.
#[derive(Clone)]
pub struct NeutralRouter {
    prefix: String,
    middleware: Vec<NeutralMiddleware>,
    routes: Arc<Mutex<Vec<RouteSpec>>>,
}

impl Default for NeutralRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl NeutralRouter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            middleware: Vec::new(),
            routes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Attach middleware. Applies only to routes registered on this router
    /// (or its future groups) after this call.
    pub fn use_middleware(&mut self, mw: NeutralMiddleware) -> &mut Self {
        self.middleware.push(mw);
        self
    }

    #[must_use]
    pub fn group(&self, prefix: &str) -> Self {
        Self {
            prefix: format!("{}{}", self.prefix, prefix),
            middleware: self.middleware.clone(),
            routes: Arc::clone(&self.routes),
        }
    }

    /// Register a route. The handler is wrapped with this router's current
    /// middleware stack, outermost first, before being stored.
    pub fn handle(&self, method: Method, path: &str, handler: NeutralHandler) {
        let wrapped = self
            .middleware
            .iter()
            .rev()
            .fold(handler, |inner, mw| mw(inner));
        let full_path = format!("{}{}", self.prefix, path);
        self.routes.lock().unwrap_or_else(|e| e.into_inner()).push(RouteSpec {
            method,
            path: full_path,
            handler: wrapped,
        });
    }

    /// A point-in-time copy of every route registered on this router (or any
    /// router sharing its sink) so far. Bridges call this once, after every
    /// handler's `register_routes` has run, to mount the final route set.
    #[must_use]
    pub fn routes_snapshot(&self) -> Vec<RouteSpec> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Wrap a synchronous `Fn(&mut RequestContext)` as a `NeutralHandler`, for
/// built-in middleware and tests that don't need to suspend.
pub fn sync_handler<F>(f: F) -> NeutralHandler
where
    F: Fn(&mut RequestContext) + Send + Sync + 'static,
{
    Arc::new(move |ctx: &mut RequestContext| {
        f(ctx);
        Box::pin(async {})
    })
}

//! The default HTTP framework bridge (§4.3), backed by `axum`.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{ConnectInfo, Path as AxumPath, Request as AxumRequest};
use axum::response::Response as AxumResponse;
use axum::routing::MethodRouter;
use axum::Router;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use txframe_core::{FrameworkBridge, NeutralHandler, ReadySignal, RequestContext, RouteSpec};
use txframe_errors::Problem;

/// Caps how much of a request body this bridge buffers before giving up,
/// matching the actix bridge's `MAX_BODY_BYTES`.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct AxumBridge {
    not_found: Option<NeutralHandler>,
    error_handler: Option<NeutralHandler>,
    router: Option<Router>,
}

impl Default for AxumBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl AxumBridge {
    #[must_use]
    pub fn new() -> Self {
        Self {
            not_found: None,
            error_handler: None,
            router: None,
        }
    }
}

/// Registers this bridge under the id `"axum"`, as the process-wide default.
/// Call once at start-up, before the HTTP Server starts.
pub fn install() {
    txframe_core::register_bridge("axum", Arc::new(|| Box::new(AxumBridge::new())));
}

/// Wraps `handler` as an axum handler. `error_handler` is invoked instead of
/// `handler` when axum itself fails to collect the request body — a failure
/// the neutral middleware chain never gets a chance to see — so
/// `FrameworkBridge::set_error_handler` is not a disguised no-op.
fn to_axum_handler(
    handler: NeutralHandler,
    error_handler: Option<NeutralHandler>,
) -> impl Fn(AxumPath<HashMap<String, String>>, ConnectInfo<SocketAddr>, AxumRequest) -> std::pin::Pin<Box<dyn std::future::Future<Output = AxumResponse> + Send>>
       + Clone
       + Send
       + Sync
       + 'static {
    move |AxumPath(path_params): AxumPath<HashMap<String, String>>,
          ConnectInfo(addr): ConnectInfo<SocketAddr>,
          req: AxumRequest| {
        let handler = Arc::clone(&handler);
        let error_handler = error_handler.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let mut ctx = match body.collect().await {
                Ok(collected) => RequestContext::new(
                    parts.method,
                    parts.uri,
                    parts.headers,
                    collected.to_bytes(),
                    path_params,
                    Some(addr),
                ),
                Err(e) => {
                    let mut ctx = RequestContext::new(
                        parts.method,
                        parts.uri,
                        parts.headers,
                        bytes::Bytes::new(),
                        path_params,
                        Some(addr),
                    );
                    match &error_handler {
                        Some(eh) => eh(&mut ctx).await,
                        None => {
                            ctx.try_write_problem(Problem::new(
                                StatusCode::BAD_REQUEST,
                                "invalid_body",
                                format!("failed to read request body: {e}"),
                            ));
                        }
                    }
                    return context_to_response(&ctx);
                }
            };
            handler(&mut ctx).await;
            context_to_response(&ctx)
        })
    }
}

fn to_method_router(method: &Method, handler: NeutralHandler, error_handler: Option<NeutralHandler>) -> MethodRouter {
    let svc = to_axum_handler(handler, error_handler);
    match *method {
        Method::GET => axum::routing::get(svc),
        Method::POST => axum::routing::post(svc),
        Method::PUT => axum::routing::put(svc),
        Method::DELETE => axum::routing::delete(svc),
        Method::PATCH => axum::routing::patch(svc),
        Method::HEAD => axum::routing::head(svc),
        Method::OPTIONS => axum::routing::options(svc),
        _ => axum::routing::any(svc),
    }
}

fn context_to_response(ctx: &RequestContext) -> AxumResponse {
    let mut builder = AxumResponse::builder().status(ctx.response_status());
    for (name, value) in ctx.response_headers() {
        builder = builder.header(name.clone(), value.clone());
    }
    builder
        .body(Body::from(ctx.response_body().clone()))
        .unwrap_or_else(|_| AxumResponse::new(Body::empty()))
}

#[async_trait]
impl FrameworkBridge for AxumBridge {
    fn name(&self) -> &'static str {
        "axum"
    }

    fn set_not_found_handler(&mut self, handler: NeutralHandler) {
        self.not_found = Some(handler);
    }

    fn set_error_handler(&mut self, handler: NeutralHandler) {
        self.error_handler = Some(handler);
    }

    fn mount(&mut self, routes: Vec<RouteSpec>) {
        let mut router = Router::new();
        for route in routes {
            router = router.route(
                &route.path,
                to_method_router(&route.method, route.handler, self.error_handler.clone()),
            );
        }
        if let Some(not_found) = self.not_found.clone() {
            router = router.fallback(to_axum_handler(not_found, self.error_handler.clone()));
        }
        router = router
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(CatchPanicLayer::new());
        self.router = Some(router);
    }

    async fn serve(
        self: Box<Self>,
        listener: StdTcpListener,
        cancel: CancellationToken,
        mut ready: ReadySignal,
    ) -> anyhow::Result<()> {
        let router = self.router.unwrap_or_else(Router::new);
        let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

        let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
        ready.notify();

        axum::serve(tokio_listener, make_service)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use txframe_core::sync_handler;

    #[test]
    fn mount_builds_a_router_without_panicking() {
        let mut bridge = AxumBridge::new();
        bridge.set_not_found_handler(sync_handler(|ctx| {
            ctx.text(http::StatusCode::NOT_FOUND, "missing");
        }));
        bridge.mount(vec![RouteSpec {
            method: Method::GET,
            path: "/ping".to_owned(),
            handler: sync_handler(|ctx| {
                ctx.text(http::StatusCode::OK, "pong");
            }),
        }]);
        assert!(bridge.router.is_some());
    }

    #[tokio::test]
    async fn serve_honors_cancellation() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let mut bridge = AxumBridge::new();
        bridge.mount(vec![]);
        let cancel = CancellationToken::new();
        let (ready, waiter) = ReadySignal::pair();
        let cancel_clone = cancel.clone();

        let handle = tokio::spawn(async move { Box::new(bridge).serve(listener, cancel_clone, ready).await });
        waiter.wait().await.unwrap();
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}

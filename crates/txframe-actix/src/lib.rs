//! An alternative HTTP framework bridge (§4.3, §9 "Bridge Pluggability"),
//! backed by `actix-web`. Demonstrates that the HTTP Server is not wired to
//! any one framework: it only depends on [`FrameworkBridge`].
//!
//! `actix-web` 4.x vendors an older major version of the `http` crate than
//! the rest of this workspace, so every neutral `http::Method`/`StatusCode`/
//! `HeaderMap` value crossing the boundary is converted by hand rather than
//! cast, since the two versions are distinct, unrelated types to the
//! compiler despite sharing a name.

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;

use actix_web::web::Payload;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer as ActixHttpServer};
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use txframe_core::{FrameworkBridge, NeutralHandler, ReadySignal, RequestContext, RouteSpec};
use txframe_errors::Problem;

/// Caps how much of a request body this bridge buffers before giving up,
/// since `Payload` hands us the stream unbounded.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct ActixBridge {
    not_found: Option<NeutralHandler>,
    error_handler: Option<NeutralHandler>,
    routes: Vec<RouteSpec>,
}

impl Default for ActixBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ActixBridge {
    #[must_use]
    pub fn new() -> Self {
        Self {
            not_found: None,
            error_handler: None,
            routes: Vec::new(),
        }
    }
}

/// Registers this bridge under the id `"actix"`. Call once at start-up and
/// set `HttpServerOptions::adapter` to `"actix"` to select it.
pub fn install() {
    txframe_core::register_bridge("actix", Arc::new(|| Box::new(ActixBridge::new())));
}

fn core_method_to_actix(method: &http::Method) -> actix_web::http::Method {
    actix_web::http::Method::from_bytes(method.as_str().as_bytes())
        .unwrap_or(actix_web::http::Method::GET)
}

fn actix_method_to_core(method: &actix_web::http::Method) -> http::Method {
    http::Method::from_bytes(method.as_str().as_bytes()).unwrap_or(http::Method::GET)
}

fn core_status_to_actix(status: http::StatusCode) -> actix_web::http::StatusCode {
    actix_web::http::StatusCode::from_u16(status.as_u16())
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
}

fn actix_headers_to_core(headers: &actix_web::http::header::HeaderMap) -> http::HeaderMap {
    let mut out = http::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::from_bytes(name.as_str().as_bytes()),
            http::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            out.append(name, value);
        }
    }
    out
}

/// Collects `payload` into a single buffer, honoring [`MAX_BODY_BYTES`].
async fn collect_body(mut payload: Payload) -> Result<bytes::Bytes, actix_web::Error> {
    let mut buf = bytes::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(actix_web::error::ErrorPayloadTooLarge("request body too large"));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Runs `handler` (or, on a body-read failure, `error_handler`) against the
/// neutral request context built from `req`/`payload`.
async fn run_neutral(
    handler: NeutralHandler,
    error_handler: Option<NeutralHandler>,
    req: HttpRequest,
    payload: Payload,
) -> HttpResponse {
    let method = actix_method_to_core(req.method());
    let uri: http::Uri = req.uri().to_string().parse().unwrap_or_else(|_| http::Uri::from_static("/"));
    let headers = actix_headers_to_core(req.headers());
    let path_params = req
        .match_info()
        .iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
    let client_addr = req.peer_addr();

    let mut ctx = match collect_body(payload).await {
        Ok(body) => RequestContext::new(method, uri, headers, body, path_params, client_addr),
        Err(e) => {
            let mut ctx = RequestContext::new(
                method,
                uri,
                headers,
                bytes::Bytes::new(),
                path_params,
                client_addr,
            );
            match &error_handler {
                Some(eh) => eh(&mut ctx).await,
                None => {
                    ctx.try_write_problem(Problem::new(
                        http::StatusCode::BAD_REQUEST,
                        "invalid_body",
                        format!("failed to read request body: {e}"),
                    ));
                }
            }
            return build_response(&ctx);
        }
    };
    handler(&mut ctx).await;
    build_response(&ctx)
}

fn build_response(ctx: &RequestContext) -> HttpResponse {
    let mut builder = HttpResponse::build(core_status_to_actix(ctx.response_status()));
    for (name, value) in ctx.response_headers() {
        if let Ok(v) = value.to_str() {
            builder.insert_header((name.as_str(), v));
        }
    }
    builder.body(ctx.response_body().to_vec())
}

#[async_trait]
impl FrameworkBridge for ActixBridge {
    fn name(&self) -> &'static str {
        "actix"
    }

    fn set_not_found_handler(&mut self, handler: NeutralHandler) {
        self.not_found = Some(handler);
    }

    fn set_error_handler(&mut self, handler: NeutralHandler) {
        self.error_handler = Some(handler);
    }

    fn mount(&mut self, routes: Vec<RouteSpec>) {
        self.routes = routes;
    }

    async fn serve(
        self: Box<Self>,
        listener: StdTcpListener,
        cancel: CancellationToken,
        mut ready: ReadySignal,
    ) -> anyhow::Result<()> {
        let routes = Arc::new(self.routes);
        let not_found = Arc::new(self.not_found);
        let error_handler = Arc::new(self.error_handler);

        let server = ActixHttpServer::new(move || {
            let mut app = App::new();
            for route in routes.iter() {
                let handler = Arc::clone(&route.handler);
                let error_handler = Arc::clone(&error_handler);
                let actix_method = core_method_to_actix(&route.method);
                app = app.route(
                    &route.path,
                    actix_web::web::method(actix_method).to(
                        move |req: HttpRequest, payload: Payload| {
                            let handler = Arc::clone(&handler);
                            let error_handler = (*error_handler).clone();
                            async move { run_neutral(handler, error_handler, req, payload).await }
                        },
                    ),
                );
            }
            let not_found = Arc::clone(&not_found);
            let error_handler = Arc::clone(&error_handler);
            app.default_service(actix_web::web::route().to(
                move |req: HttpRequest, payload: Payload| {
                    let not_found = Arc::clone(&not_found);
                    let error_handler = (*error_handler).clone();
                    async move {
                        match not_found.as_ref() {
                            Some(handler) => {
                                run_neutral(Arc::clone(handler), error_handler, req, payload).await
                            }
                            None => HttpResponse::NotFound().finish(),
                        }
                    }
                },
            ))
        })
        .listen(listener)?
        .shutdown_timeout(30)
        .run();

        let handle = server.handle();
        ready.notify();

        let watcher = tokio::spawn(async move {
            cancel.cancelled().await;
            handle.stop(true).await;
        });

        server.await?;
        watcher.abort();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn method_conversions_round_trip_standard_verbs() {
        let core = http::Method::POST;
        let actix = core_method_to_actix(&core);
        assert_eq!(actix_method_to_core(&actix), core);
    }

    #[test]
    fn status_conversion_preserves_code() {
        let actix = core_status_to_actix(http::StatusCode::NOT_FOUND);
        assert_eq!(actix.as_u16(), 404);
    }

    #[tokio::test]
    async fn serve_honors_cancellation() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let mut bridge = ActixBridge::new();
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

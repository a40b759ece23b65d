//! Metrics scrape endpoint and recording middleware (§4.8).
//!
//! No metrics backend is shipped (out of scope per §1): [`MetricsRecorder`]
//! is a trait seam the host application implements; [`NoopMetricsRecorder`]
//! is the default so the middleware is safe to enable with nothing wired up.

use std::sync::Arc;

use http::{Method, StatusCode};

use crate::context::RequestContext;
use crate::router::{sync_handler, NeutralHandler, NeutralMiddleware, NeutralRouter};

pub trait MetricsRecorder: Send + Sync {
    fn record(&self, method: &str, path: &str, status: u16);
    /// Rendered in the standard scrape format of whatever backend this
    /// recorder is backed by. Empty when nothing has been recorded.
    fn render(&self) -> String {
        String::new()
    }
}

#[derive(Default)]
pub struct NoopMetricsRecorder;

impl MetricsRecorder for NoopMetricsRecorder {
    fn record(&self, _method: &str, _path: &str, _status: u16) {}
}

#[derive(Clone)]
pub struct MetricsOptions {
    pub path: String,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            path: "/metrics".to_owned(),
        }
    }
}

/// The recording middleware (applied after Timeout, per the fixed ordering
/// in §4.4, so it only observes handlers that actually ran).
#[must_use]
pub fn metrics_recording(recorder: Arc<dyn MetricsRecorder>) -> NeutralMiddleware {
    Arc::new(move |next: NeutralHandler| -> NeutralHandler {
        let next = Arc::clone(&next);
        let recorder = Arc::clone(&recorder);
        Arc::new(move |ctx: &mut RequestContext| {
            let next = Arc::clone(&next);
            let recorder = Arc::clone(&recorder);
            Box::pin(async move {
                let method = ctx.method().to_string();
                let path = ctx.path().to_owned();
                next(ctx).await;
                recorder.record(&method, &path, ctx.response_status().as_u16());
            })
        })
    })
}

pub fn register_scrape_endpoint(
    router: &NeutralRouter,
    options: &MetricsOptions,
    recorder: Arc<dyn MetricsRecorder>,
) {
    router.handle(
        Method::GET,
        &options.path,
        sync_handler(move |ctx| {
            ctx.text(StatusCode::OK, recorder.render());
        }),
    );
}

//! Logger middleware (§4.8): structured `tracing` events per request.

use std::sync::Arc;
use std::time::Instant;

use crate::context::RequestContext;
use crate::router::{NeutralHandler, NeutralMiddleware};

#[derive(Clone, Default)]
pub struct LoggerOptions {
    /// Path prefixes that are never logged (e.g. `/healthz`).
    pub skip_paths: Vec<String>,
}

#[must_use]
pub fn logger(options: LoggerOptions) -> NeutralMiddleware {
    Arc::new(move |next: NeutralHandler| -> NeutralHandler {
        let next = Arc::clone(&next);
        let skip_paths = options.skip_paths.clone();
        Arc::new(move |ctx: &mut RequestContext| {
            let next = Arc::clone(&next);
            let skip_paths = skip_paths.clone();
            Box::pin(async move {
                let skip = skip_paths.iter().any(|p| ctx.path().starts_with(p.as_str()));
                let method = ctx.method().clone();
                let path = ctx.path().to_owned();
                let client_addr = ctx.client_addr();
                let started = Instant::now();

                next(ctx).await;

                if skip {
                    return;
                }
                let latency = started.elapsed();
                tracing::info!(
                    method = %method,
                    path = %path,
                    status = ctx.response_status().as_u16(),
                    latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    request_id = ctx.request_id().unwrap_or_default(),
                    client_addr = ?client_addr,
                    "request handled"
                );
            })
        })
    })
}

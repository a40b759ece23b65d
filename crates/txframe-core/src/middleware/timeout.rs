//! Timeout middleware (§4.8).

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use txframe_errors::Problem;

use crate::context::RequestContext;
use crate::router::{NeutralHandler, NeutralMiddleware};

#[derive(Clone)]
pub struct TimeoutOptions {
    pub duration: Duration,
    pub skip_paths: Vec<String>,
}

#[must_use]
pub fn timeout(options: TimeoutOptions) -> NeutralMiddleware {
    Arc::new(move |next: NeutralHandler| -> NeutralHandler {
        let next = Arc::clone(&next);
        let options = options.clone();
        Arc::new(move |ctx: &mut RequestContext| {
            let next = Arc::clone(&next);
            let duration = options.duration;
            let skip = options.skip_paths.iter().any(|p| ctx.path().starts_with(p.as_str()));
            Box::pin(async move {
                if skip {
                    next(ctx).await;
                    return;
                }
                match tokio::time::timeout(duration, next(ctx)).await {
                    Ok(()) => {}
                    Err(_elapsed) => {
                        tracing::warn!(path = ctx.path(), "request exceeded timeout");
                        ctx.try_write_problem(Problem::timeout(format!(
                            "request exceeded {}ms timeout",
                            duration.as_millis()
                        )));
                    }
                }
            })
        })
    })
}

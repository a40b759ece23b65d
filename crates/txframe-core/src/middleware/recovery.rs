//! Recovery middleware (§4.8): catches panics, logs, writes a 500 Problem.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use txframe_errors::Problem;

use crate::context::RequestContext;
use crate::router::{NeutralHandler, NeutralMiddleware};

/// Callback invoked after logging and before the response is written,
/// mirroring the configurable `OnPanic(info)` hook in §4.8.
pub type OnPanic = Arc<dyn Fn(&str) + Send + Sync>;

#[must_use]
pub fn recovery(on_panic: Option<OnPanic>) -> NeutralMiddleware {
    Arc::new(move |next: NeutralHandler| -> NeutralHandler {
        let next = Arc::clone(&next);
        let on_panic = on_panic.clone();
        Arc::new(move |ctx: &mut RequestContext| {
            let next = Arc::clone(&next);
            let on_panic = on_panic.clone();
            Box::pin(async move {
                let result = AssertUnwindSafe(next(ctx)).catch_unwind().await;
                match result {
                    Ok(()) => {}
                    Err(payload) => {
                        let message = panic_message(&payload);
                        tracing::error!(panic = %message, "handler panicked; recovered");
                        if let Some(cb) = &on_panic {
                            cb(&message);
                        }
                        let problem = Problem::new(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "internal_error",
                            message,
                        );
                        ctx.try_write_problem(problem);
                    }
                }
            })
        })
    })
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::router::sync_handler;
    use std::collections::HashMap;

    fn ctx() -> RequestContext {
        RequestContext::new(
            http::Method::GET,
            "/crash".parse().unwrap(),
            http::HeaderMap::new(),
            bytes::Bytes::new(),
            HashMap::new(),
            None,
        )
    }

    #[tokio::test]
    async fn panicking_handler_is_recovered_as_500() {
        let mw = recovery(None);
        let handler = mw(sync_handler(|_ctx| {
            panic!("boom");
        }));
        let mut c = ctx();
        handler(&mut c).await;
        assert_eq!(c.response_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(c.written());
    }

    #[tokio::test]
    async fn non_panicking_handler_passes_through() {
        let mw = recovery(None);
        let handler = mw(sync_handler(|ctx| {
            ctx.text(StatusCode::OK, "fine");
        }));
        let mut c = ctx();
        handler(&mut c).await;
        assert_eq!(c.response_status(), StatusCode::OK);
    }
}

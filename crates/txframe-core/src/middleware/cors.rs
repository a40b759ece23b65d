//! CORS middleware (§4.8).

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderValue, Method, StatusCode};

use crate::context::RequestContext;
use crate::router::{NeutralHandler, NeutralMiddleware};

#[derive(Clone)]
pub struct CorsOptions {
    pub allow_origin: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: Duration,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allow_origin: vec!["*".to_owned()],
            allow_methods: vec!["GET".into(), "POST".into(), "PUT".into(), "DELETE".into()],
            allow_headers: vec!["*".to_owned()],
            expose_headers: vec![],
            allow_credentials: false,
            max_age: Duration::from_secs(600),
        }
    }
}

impl CorsOptions {
    fn allow_origin_value(&self, origin: Option<&str>) -> HeaderValue {
        if self.allow_origin.iter().any(|o| o == "*") {
            return HeaderValue::from_static("*");
        }
        if let Some(origin) = origin {
            if self.allow_origin.iter().any(|o| o == origin) {
                if let Ok(v) = HeaderValue::from_str(origin) {
                    return v;
                }
            }
        }
        HeaderValue::from_static("null")
    }

    fn apply_common_headers(&self, ctx: &mut RequestContext, origin: Option<&str>) {
        ctx.set_header(
            http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin_value(origin),
        );
        if !self.expose_headers.is_empty() {
            if let Ok(v) = HeaderValue::from_str(&self.expose_headers.join(",")) {
                ctx.set_header(http::header::ACCESS_CONTROL_EXPOSE_HEADERS, v);
            }
        }
        if self.allow_credentials {
            ctx.set_header(
                http::header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }
}

#[must_use]
pub fn cors(options: CorsOptions) -> NeutralMiddleware {
    Arc::new(move |next: NeutralHandler| -> NeutralHandler {
        let next = Arc::clone(&next);
        let options = options.clone();
        Arc::new(move |ctx: &mut RequestContext| {
            let next = Arc::clone(&next);
            let options = options.clone();
            Box::pin(async move {
                let origin = ctx.header("origin").map(str::to_owned);

                if ctx.method() == Method::OPTIONS {
                    options.apply_common_headers(ctx, origin.as_deref());
                    if let Ok(v) = HeaderValue::from_str(&options.allow_methods.join(",")) {
                        ctx.set_header(http::header::ACCESS_CONTROL_ALLOW_METHODS, v);
                    }
                    if let Ok(v) = HeaderValue::from_str(&options.allow_headers.join(",")) {
                        ctx.set_header(http::header::ACCESS_CONTROL_ALLOW_HEADERS, v);
                    }
                    ctx.set_header(
                        http::header::ACCESS_CONTROL_MAX_AGE,
                        HeaderValue::from_str(&options.max_age.as_secs().to_string())
                            .unwrap_or_else(|_| HeaderValue::from_static("600")),
                    );
                    ctx.no_content();
                    return;
                }

                next(ctx).await;
                options.apply_common_headers(ctx, origin.as_deref());
            })
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::router::sync_handler;
    use std::collections::HashMap;

    #[tokio::test]
    async fn preflight_short_circuits_with_204() {
        let mw = cors(CorsOptions::default());
        let handler = mw(sync_handler(|_| panic!("should not reach handler")));
        let mut ctx = RequestContext::new(
            Method::OPTIONS,
            "/x".parse().unwrap(),
            http::HeaderMap::new(),
            bytes::Bytes::new(),
            HashMap::new(),
            None,
        );
        handler(&mut ctx).await;
        assert_eq!(ctx.response_status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn non_preflight_request_reaches_handler() {
        let mw = cors(CorsOptions::default());
        let handler = mw(sync_handler(|ctx| {
            ctx.text(StatusCode::OK, "ok");
        }));
        let mut ctx = RequestContext::new(
            Method::GET,
            "/x".parse().unwrap(),
            http::HeaderMap::new(),
            bytes::Bytes::new(),
            HashMap::new(),
            None,
        );
        handler(&mut ctx).await;
        assert_eq!(ctx.response_status(), StatusCode::OK);
        assert!(ctx.response_headers().contains_key("access-control-allow-origin"));
    }
}

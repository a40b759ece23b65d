//! RequestID middleware (§4.8).

use std::sync::Arc;

use http::{HeaderName, HeaderValue};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::router::{NeutralHandler, NeutralMiddleware};

pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct RequestIdOptions {
    pub header: HeaderName,
    pub generator: IdGenerator,
}

impl Default for RequestIdOptions {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static("x-request-id"),
            generator: Arc::new(|| Uuid::now_v7().to_string()),
        }
    }
}

#[must_use]
pub fn request_id(options: RequestIdOptions) -> NeutralMiddleware {
    Arc::new(move |next: NeutralHandler| -> NeutralHandler {
        let next = Arc::clone(&next);
        let header = options.header.clone();
        let generator = Arc::clone(&options.generator);
        Arc::new(move |ctx: &mut RequestContext| {
            let next = Arc::clone(&next);
            let header = header.clone();
            let generator = Arc::clone(&generator);
            Box::pin(async move {
                let id = ctx
                    .header(header.as_str())
                    .map(str::to_owned)
                    .unwrap_or_else(|| generator());
                ctx.set_request_id(id.clone());
                if let Ok(value) = HeaderValue::from_str(&id) {
                    ctx.set_header(header, value);
                }
                next(ctx).await;
            })
        })
    })
}

//! Health endpoints (§4.8, §6): liveness, readiness, aggregate.

use std::sync::Arc;

use dashmap::DashMap;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::router::{BoxFuture, NeutralRouter};

/// A readiness checker. Returns a future rather than a plain `Result` since
/// [`crate::service::HealthCheckService::health_check`], the capability this
/// backs, is itself async.
pub type Checker = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Clone)]
pub struct HealthOptions {
    pub liveness_path: String,
    pub readiness_path: String,
    pub aggregate_path: String,
}

impl Default for HealthOptions {
    fn default() -> Self {
        Self {
            liveness_path: "/livez".to_owned(),
            readiness_path: "/readyz".to_owned(),
            aggregate_path: "/healthz".to_owned(),
        }
    }
}

/// Holds the named readiness-checker functions the aggregate and readiness
/// endpoints evaluate on every call.
#[derive(Default, Clone)]
pub struct HealthState {
    checkers: Arc<DashMap<String, Checker>>,
}

impl HealthState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_checker(&self, name: impl Into<String>, checker: Checker) {
        self.checkers.insert(name.into(), checker);
    }

    /// Evaluates every registered checker. Collected into an owned `Vec`
    /// before awaiting any of them, since `DashMap`'s iterator holds shard
    /// locks that must not be held across an `.await`.
    async fn failing(&self) -> Vec<String> {
        let entries: Vec<(String, Checker)> = self
            .checkers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut failing = Vec::new();
        for (name, checker) in entries {
            if checker().await.is_err() {
                failing.push(name);
            }
        }
        failing
    }
}

#[derive(Serialize)]
struct AggregateStatus {
    status: &'static str,
    failing: Vec<String>,
}

pub fn register_routes(router: &NeutralRouter, options: &HealthOptions, state: HealthState) {
    router.handle(
        Method::GET,
        &options.liveness_path,
        crate::router::sync_handler(|ctx| {
            ctx.text(StatusCode::OK, "ok");
        }),
    );

    let readiness_state = state.clone();
    router.handle(
        Method::GET,
        &options.readiness_path,
        Arc::new(move |ctx: &mut crate::context::RequestContext| {
            let readiness_state = readiness_state.clone();
            Box::pin(async move {
                let failing = readiness_state.failing().await;
                if failing.is_empty() {
                    ctx.text(StatusCode::OK, "ok");
                } else {
                    ctx.json(
                        StatusCode::SERVICE_UNAVAILABLE,
                        &json!({ "code": "not_ready", "failing": failing }),
                    );
                }
            })
        }),
    );

    let aggregate_state = state;
    router.handle(
        Method::GET,
        &options.aggregate_path,
        Arc::new(move |ctx: &mut crate::context::RequestContext| {
            let aggregate_state = aggregate_state.clone();
            Box::pin(async move {
                let failing = aggregate_state.failing().await;
                let status = if failing.is_empty() { "ok" } else { "degraded" };
                ctx.json(StatusCode::OK, &AggregateStatus { status, failing });
            })
        }),
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn readyz_is_503_when_a_checker_fails() {
        let router = NeutralRouter::new();
        let state = HealthState::new();
        state.register_checker("db", Arc::new(|| Box::pin(async { anyhow::bail!("down") })));
        register_routes(&router, &HealthOptions::default(), state);

        let routes = router.routes_snapshot();
        let readyz = routes.iter().find(|r| r.path == "/readyz").unwrap();
        let mut ctx = crate::context::RequestContext::new(
            Method::GET,
            "/readyz".parse().unwrap(),
            http::HeaderMap::new(),
            bytes::Bytes::new(),
            std::collections::HashMap::new(),
            None,
        );
        (readyz.handler)(&mut ctx).await;
        assert_eq!(ctx.response_status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn livez_is_always_ok() {
        let router = NeutralRouter::new();
        register_routes(&router, &HealthOptions::default(), HealthState::new());
        let routes = router.routes_snapshot();
        let livez = routes.iter().find(|r| r.path == "/livez").unwrap();
        let mut ctx = crate::context::RequestContext::new(
            Method::GET,
            "/livez".parse().unwrap(),
            http::HeaderMap::new(),
            bytes::Bytes::new(),
            std::collections::HashMap::new(),
            None,
        );
        (livez.handler)(&mut ctx).await;
        assert_eq!(ctx.response_status(), StatusCode::OK);
    }
}

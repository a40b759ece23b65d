//! HTTP Server (§4.4): owns a TCP listener, composes the bridge, applies
//! configured middleware, registers built-in endpoints and application
//! handlers, and honors graceful shutdown.

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use txframe_errors::{Problem, RegistrationError};

use crate::bridge::construct_bridge;
use crate::middleware::{
    cors_middleware, health, logger_middleware, metrics, metrics_recording, pprof,
    recovery_middleware, request_id_middleware, timeout_middleware, CorsOptions, HealthOptions,
    HealthState, LoggerOptions, MetricsOptions, MetricsRecorder, NoopMetricsRecorder, OnPanic,
    PprofOptions, RequestIdOptions, TimeoutOptions,
};
use crate::registry::HttpSink;
use crate::router::{sync_handler, NeutralRouter};
use crate::runnable::Runnable;
use crate::service::{not_found_problem, HTTPHandler};
use crate::signal::ReadySignal;

#[derive(Clone)]
pub struct MiddlewareOptions {
    pub recovery_enabled: bool,
    pub on_panic: Option<OnPanic>,
    pub request_id_enabled: bool,
    pub request_id: RequestIdOptions,
    pub logger_enabled: bool,
    pub logger: LoggerOptions,
    pub cors: Option<CorsOptions>,
    pub timeout: Option<Duration>,
    pub timeout_skip_paths: Vec<String>,
    pub metrics_recording_enabled: bool,
    pub metrics_recorder: Arc<dyn MetricsRecorder>,
    pub health_enabled: bool,
    pub health: HealthOptions,
    pub metrics_enabled: bool,
    pub metrics: MetricsOptions,
    pub pprof: PprofOptions,
}

impl Default for MiddlewareOptions {
    fn default() -> Self {
        Self {
            recovery_enabled: true,
            on_panic: None,
            request_id_enabled: true,
            request_id: RequestIdOptions::default(),
            logger_enabled: true,
            logger: LoggerOptions::default(),
            cors: None,
            timeout: None,
            timeout_skip_paths: vec![],
            metrics_recording_enabled: false,
            metrics_recorder: Arc::new(NoopMetricsRecorder),
            health_enabled: true,
            health: HealthOptions::default(),
            metrics_enabled: true,
            metrics: MetricsOptions::default(),
            pprof: PprofOptions::default(),
        }
    }
}

#[derive(Clone)]
pub struct HttpServerOptions {
    pub bind_addr: String,
    pub adapter: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub middleware: MiddlewareOptions,
}

impl Default for HttpServerOptions {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_owned(),
            adapter: crate::bridge::DEFAULT_BRIDGE_ID.to_owned(),
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(60),
            middleware: MiddlewareOptions::default(),
        }
    }
}

struct RunningState {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    terminal_error: Arc<Mutex<Option<String>>>,
}

pub struct HttpServer {
    options: HttpServerOptions,
    handlers: Mutex<Vec<(String, Arc<dyn HTTPHandler>)>>,
    root: Mutex<NeutralRouter>,
    health_state: HealthState,
    running: Mutex<Option<RunningState>>,
}

impl HttpServer {
    #[must_use]
    pub fn new(options: HttpServerOptions) -> Self {
        Self {
            options,
            handlers: Mutex::new(Vec::new()),
            root: Mutex::new(NeutralRouter::new()),
            health_state: HealthState::new(),
            running: Mutex::new(None),
        }
    }

    /// Appends to the internal handler list. Must be called before `start`.
    pub fn register_http_handler(&self, service_name: &str, handler: Arc<dyn HTTPHandler>) {
        self.handlers.lock().push((service_name.to_owned(), handler));
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        self.health_state.clone()
    }

    /// The root neutral router, used by built-in endpoint registration and
    /// tests. Returns a group handle sharing the live route sink.
    #[must_use]
    pub fn router(&self) -> NeutralRouter {
        self.root.lock().clone()
    }

    fn build_router_and_mount(&self) -> Vec<crate::router::RouteSpec> {
        let mw = &self.options.middleware;
        let mut root = self.root.lock();

        if mw.recovery_enabled {
            root.use_middleware(recovery_middleware(mw.on_panic.clone()));
        }
        if mw.request_id_enabled {
            root.use_middleware(request_id_middleware(mw.request_id.clone()));
        }
        if mw.logger_enabled {
            root.use_middleware(logger_middleware(mw.logger.clone()));
        }
        if let Some(cors) = &mw.cors {
            root.use_middleware(cors_middleware(cors.clone()));
        }
        if let Some(duration) = mw.timeout {
            root.use_middleware(timeout_middleware(TimeoutOptions {
                duration,
                skip_paths: mw.timeout_skip_paths.clone(),
            }));
        }
        if mw.metrics_recording_enabled {
            root.use_middleware(metrics_recording(Arc::clone(&mw.metrics_recorder)));
        }

        if mw.health_enabled {
            health::register_routes(&root, &mw.health, self.health_state.clone());
        }
        if mw.metrics_enabled {
            metrics::register_scrape_endpoint(&root, &mw.metrics, Arc::clone(&mw.metrics_recorder));
        }
        pprof::register_routes(&root, &mw.pprof);

        for (_, handler) in self.handlers.lock().iter() {
            handler.register_routes(root.clone());
        }

        root.routes_snapshot()
    }
}

impl HttpSink for HttpServer {
    fn register_http_handler(
        &self,
        service_name: &str,
        handler: Arc<dyn HTTPHandler>,
    ) -> Result<(), RegistrationError> {
        self.handlers.lock().push((service_name.to_owned(), handler));
        Ok(())
    }
}

fn not_found_handler() -> crate::router::NeutralHandler {
    sync_handler(|ctx| {
        let problem = not_found_problem(ctx.path());
        ctx.try_write_problem(problem);
    })
}

#[async_trait]
impl Runnable for HttpServer {
    fn name(&self) -> &str {
        "http"
    }

    async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let routes = self.build_router_and_mount();

        let mut bridge = construct_bridge(&self.options.adapter).map_err(anyhow::Error::from)?;
        bridge.set_not_found_handler(not_found_handler());
        bridge.set_error_handler(sync_handler(|ctx| {
            ctx.try_write_problem(Problem::internal("bridge error"));
        }));
        bridge.mount(routes);

        let std_listener = StdTcpListener::bind(&self.options.bind_addr)?;
        std_listener.set_nonblocking(true)?;

        let child_cancel = cancel.child_token();
        let (ready, waiter) = ReadySignal::pair();
        let terminal_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let terminal_error_task = Arc::clone(&terminal_error);
        let serve_cancel = child_cancel.clone();

        let join = tokio::spawn(async move {
            if let Err(e) = bridge.serve(std_listener, serve_cancel, ready).await {
                tracing::error!(error = %e, "http server terminated with error");
                *terminal_error_task.lock() = Some(e.to_string());
            }
        });

        waiter.wait().await?;

        *self.running.lock() = Some(RunningState {
            cancel: child_cancel,
            join,
            terminal_error,
        });

        Ok(())
    }

    async fn stop(&self, deadline: Duration) -> anyhow::Result<()> {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return Ok(());
        };

        running.cancel.cancel();

        match tokio::time::timeout(deadline, running.join).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => return Err(anyhow::anyhow!("http server task panicked: {join_err}")),
            Err(_elapsed) => {
                return Err(anyhow::anyhow!("http server did not stop within {deadline:?}"));
            }
        }

        if let Some(err) = running.terminal_error.lock().take() {
            tracing::warn!(error = %err, "http server reported a terminal error during its lifetime");
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_middleware_options_match_spec_defaults() {
        let opts = MiddlewareOptions::default();
        assert!(opts.recovery_enabled);
        assert!(opts.request_id_enabled);
        assert!(opts.logger_enabled);
        assert!(opts.cors.is_none());
        assert!(opts.timeout.is_none());
        assert!(!opts.metrics_recording_enabled);
        assert!(!opts.pprof.enabled);
    }

    #[test]
    fn not_found_handler_is_constructible() {
        let _ = not_found_handler();
    }
}

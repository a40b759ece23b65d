//! Server Manager (§4.7): the unified lifecycle controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::http_server::HttpServer;
use crate::registry::Registry;
use crate::runnable::{GrpcComponent, Runnable};

/// Which transports the Manager constructs and drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    HttpOnly,
    GrpcOnly,
    Both,
}

pub struct ManagerOptions {
    pub mode: Mode,
    pub shutdown_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Both,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

pub struct Manager {
    options: ManagerOptions,
    registry: Arc<Registry>,
    http: Option<Arc<HttpServer>>,
    grpc: Option<Arc<dyn GrpcComponent>>,
    aux: Mutex<Vec<Arc<dyn Runnable>>>,
    started: AtomicBool,
}

impl Manager {
    #[must_use]
    pub fn new(
        options: ManagerOptions,
        http: Option<Arc<HttpServer>>,
        grpc: Option<Arc<dyn GrpcComponent>>,
    ) -> Self {
        Self {
            options,
            registry: Arc::new(Registry::new()),
            http,
            grpc,
            aux: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    #[must_use]
    pub fn http_server(&self) -> Option<Arc<HttpServer>> {
        self.http.clone()
    }

    pub fn add_server(&self, runnable: Arc<dyn Runnable>) {
        self.aux.lock().push(runnable);
    }

    /// # Errors
    /// Returns an error if the Manager is already started, if applying the
    /// Registry to either transport fails, if a service's `init` fails, or
    /// if starting any component fails. Running components are not stopped
    /// on a partial-start failure; the caller is expected to call `stop`.
    pub async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            anyhow::bail!("manager already started");
        }

        if matches!(self.options.mode, Mode::HttpOnly | Mode::Both) {
            if let Some(http) = &self.http {
                self.registry.apply_to_http(http.as_ref())?;
            }
        }

        if matches!(self.options.mode, Mode::GrpcOnly | Mode::Both) {
            if let Some(grpc) = &self.grpc {
                self.registry.apply_to_grpc(grpc.as_ref())?;
            }
        }

        if let Some(http) = &self.http {
            let health_state = http.health_state();
            for service in self.registry.all_services() {
                if service.as_health_check().is_none() {
                    continue;
                }
                let name = service.service_name().to_owned();
                health_state.register_checker(
                    name,
                    Arc::new(move || {
                        let service = Arc::clone(&service);
                        Box::pin(async move {
                            match service.as_health_check() {
                                Some(checker) => checker.health_check().await,
                                None => Ok(()),
                            }
                        })
                    }),
                );
            }
        }

        for service in self.registry.all_services() {
            if let Some(init) = service.as_init() {
                init.init().await?;
            }
        }

        if let Some(http) = &self.http {
            http.start(cancel.clone()).await?;
        }
        if let Some(grpc) = &self.grpc {
            grpc.start(cancel.clone()).await?;
        }
        for runnable in self.aux.lock().iter() {
            runnable.start(cancel.clone()).await?;
        }

        Ok(())
    }

    /// # Errors
    /// Returns an aggregated error if any stop step fails; every step is
    /// still attempted. Idempotent: calling `stop` when not started is a
    /// no-op.
    pub async fn stop(&self, deadline: Duration) -> anyhow::Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut errors = Vec::new();

        for runnable in self.aux.lock().iter() {
            if let Err(e) = runnable.stop(deadline).await {
                errors.push(format!("aux runnable {} stop failed: {e}", runnable.name()));
            }
        }
        if let Some(http) = &self.http {
            if let Err(e) = http.stop(deadline).await {
                errors.push(format!("http server stop failed: {e}"));
            }
        }
        if let Some(grpc) = &self.grpc {
            if let Err(e) = grpc.stop(deadline).await {
                errors.push(format!("grpc server stop failed: {e}"));
            }
        }
        for service in self.registry.all_services() {
            if let Some(close) = service.as_close() {
                if let Err(e) = close.close().await {
                    errors.push(format!("service close failed: {e}"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(errors.join("; ")))
        }
    }

    /// Installs a SIGINT/SIGTERM handler, blocks until a signal arrives,
    /// then stops with the configured shutdown timeout.
    ///
    /// # Errors
    /// Propagates any error from `start` or `stop`.
    pub async fn run(&self) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        self.start(cancel.clone()).await?;

        tokio::select! {
            result = crate::signal::wait_for_shutdown() => { result?; }
            () = cancel.cancelled() => {}
        }

        self.stop(self.options.shutdown_timeout).await
    }

    /// Reserved for future readiness-barrier semantics (§4.7, §9); currently
    /// a documented no-op.
    #[allow(clippy::unused_async)]
    pub async fn wait(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_before_start_is_a_noop() {
        let manager = Manager::new(ManagerOptions::default(), None, None);
        manager.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn starting_twice_is_an_error() {
        let manager = Manager::new(ManagerOptions::default(), None, None);
        manager.start(CancellationToken::new()).await.unwrap();
        let err = manager.start(CancellationToken::new()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn wait_is_a_documented_noop() {
        let manager = Manager::new(ManagerOptions::default(), None, None);
        manager.wait(CancellationToken::new()).await.unwrap();
    }
}

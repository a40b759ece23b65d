//! gRPC Server (§4.5): wraps `tonic`, registers descriptors from the
//! Service Registry, and serves over TCP or (on unix) a Unix domain socket.

use std::any::Any;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::codegen::Service as TonicService;
use tonic::server::NamedService;
use tonic::service::{Routes, RoutesBuilder};
use txframe_core::{GrpcServiceDesc, GrpcSink, ReadySignal, Runnable};
use txframe_errors::RegistrationError;

/// A parsed listen address, matching the `tcp://` / `uds://` scheme
/// convention used for gRPC listen addresses elsewhere in this codebase.
#[derive(Debug, Clone)]
pub enum ListenAddr {
    Tcp(SocketAddr),
    #[cfg(unix)]
    Uds(PathBuf),
}

/// # Errors
/// Returns an error if `raw` has no recognized scheme or the remainder fails
/// to parse as the scheme requires.
pub fn parse_listen_addr(raw: &str) -> anyhow::Result<ListenAddr> {
    if let Some(rest) = raw.strip_prefix("tcp://") {
        return Ok(ListenAddr::Tcp(rest.parse()?));
    }
    #[cfg(unix)]
    if let Some(rest) = raw.strip_prefix("uds://") {
        return Ok(ListenAddr::Uds(PathBuf::from(rest)));
    }
    anyhow::bail!("unrecognized listen address scheme: {raw}")
}

#[derive(Clone)]
pub struct GrpcServerOptions {
    pub listen_addr: String,
    pub max_recv_message_size: usize,
    pub max_send_message_size: usize,
    pub request_timeout: Option<Duration>,
    pub health_enabled: bool,
    pub reflection_enabled: bool,
}

impl Default for GrpcServerOptions {
    fn default() -> Self {
        Self {
            listen_addr: "tcp://127.0.0.1:50051".to_owned(),
            max_recv_message_size: 4 * 1024 * 1024,
            max_send_message_size: 4 * 1024 * 1024,
            request_timeout: Some(Duration::from_secs(30)),
            health_enabled: true,
            reflection_enabled: false,
        }
    }
}

struct RunningState {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

pub struct GrpcServer {
    options: GrpcServerOptions,
    descs: Mutex<Vec<GrpcServiceDesc>>,
    running: Mutex<Option<RunningState>>,
}

impl GrpcServer {
    #[must_use]
    pub fn new(options: GrpcServerOptions) -> Self {
        Self {
            options,
            descs: Mutex::new(Vec::new()),
            running: Mutex::new(None),
        }
    }
}

impl GrpcSink for GrpcServer {
    fn register_grpc_service(&self, desc: GrpcServiceDesc) -> Result<(), RegistrationError> {
        self.descs.lock().push(desc);
        Ok(())
    }
}

#[async_trait]
impl Runnable for GrpcServer {
    fn name(&self) -> &str {
        "grpc"
    }

    async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let addr = parse_listen_addr(&self.options.listen_addr)?;
        let mut routes_builder = RoutesBuilder::default();

        for desc in self.descs.lock().iter() {
            desc.mount_onto(&mut routes_builder as &mut dyn Any);
        }

        #[cfg(feature = "health")]
        if self.options.health_enabled {
            let (reporter, health_service) = tonic_health::server::health_reporter();
            for desc in self.descs.lock().iter() {
                reporter
                    .set_service_status(desc.service_name, tonic_health::ServingStatus::Serving)
                    .await;
            }
            routes_builder.add_service(health_service);
        }

        #[cfg(feature = "reflection")]
        if self.options.reflection_enabled {
            tracing::warn!("reflection requested but no file descriptor set was supplied; skipping");
        }

        let routes: Routes = routes_builder.routes();
        let server = tonic::transport::Server::builder()
            .timeout(self.options.request_timeout.unwrap_or(Duration::from_secs(30)));

        let child_cancel = cancel.child_token();
        let (mut ready, waiter) = ReadySignal::pair();
        let shutdown_cancel = child_cancel.clone();

        let join: JoinHandle<()> = match addr {
            ListenAddr::Tcp(socket_addr) => {
                let listener = tokio::net::TcpListener::bind(socket_addr).await?;
                ready.notify();
                tokio::spawn(async move {
                    let incoming =
                        tokio_stream::wrappers::TcpListenerStream::new(listener);
                    if let Err(e) = server
                        .add_routes(routes)
                        .serve_with_incoming_shutdown(incoming, async move {
                            shutdown_cancel.cancelled().await;
                        })
                        .await
                    {
                        tracing::error!(error = %e, "grpc server terminated with error");
                    }
                })
            }
            #[cfg(unix)]
            ListenAddr::Uds(path) => {
                let _ = std::fs::remove_file(&path);
                let listener = tokio::net::UnixListener::bind(&path)?;
                ready.notify();
                tokio::spawn(async move {
                    let incoming = tokio_stream::wrappers::UnixListenerStream::new(listener);
                    if let Err(e) = server
                        .add_routes(routes)
                        .serve_with_incoming_shutdown(incoming, async move {
                            shutdown_cancel.cancelled().await;
                        })
                        .await
                    {
                        tracing::error!(error = %e, "grpc server terminated with error");
                    }
                })
            }
        };

        waiter.wait().await?;

        *self.running.lock() = Some(RunningState {
            cancel: child_cancel,
            join,
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
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_err)) => Err(anyhow::anyhow!("grpc server task panicked: {join_err}")),
            Err(_elapsed) => Err(anyhow::anyhow!("grpc server did not stop within {deadline:?}")),
        }
    }
}

/// Builds a [`GrpcServiceDesc`] from any `tonic`-generated server type,
/// capturing the concrete type here so the gRPC-agnostic Registry in
/// `txframe-core` only ever handles it as `Arc<dyn Any + Send + Sync>`.
pub fn from_grpc_service<S>(service: S) -> GrpcServiceDesc
where
    S: TonicService<
            http::Request<tonic::body::Body>,
            Response = http::Response<tonic::body::Body>,
            Error = std::convert::Infallible,
        > + NamedService
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    let inner: Arc<dyn Any + Send + Sync> = Arc::new(service);
    let mount = Arc::new(move |inner: &(dyn Any + Send + Sync), builder: &mut dyn Any| {
        let (Some(svc), Some(routes_builder)) = (
            inner.downcast_ref::<S>(),
            builder.downcast_mut::<RoutesBuilder>(),
        ) else {
            tracing::error!(service = S::NAME, "gRPC descriptor type mismatch at mount time");
            return;
        };
        routes_builder.add_service(svc.clone());
    });
    GrpcServiceDesc::new(S::NAME, inner, mount)
}

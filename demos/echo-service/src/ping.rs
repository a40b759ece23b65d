//! The demo's gRPC-only service: a trivial counter-incrementing ping.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tonic::{Request, Response, Status};
use txframe_core::Service;

use crate::pb::ping_server::Ping;
use crate::pb::{PingRequest, PingResponse};

/// Cheaply `Clone` (shares its counter) so the same instance can back both
/// the registry's `Service` identity and the tonic-generated server wrapper,
/// which takes ownership of its inner value.
#[derive(Clone, Default)]
pub struct PingService {
    counter: Arc<AtomicU64>,
}

impl Service for PingService {
    fn service_name(&self) -> &str {
        "ping"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[tonic::async_trait]
impl Ping for PingService {
    async fn ping(&self, request: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Response::new(PingResponse {
            message: request.into_inner().message,
            counter,
        }))
    }
}

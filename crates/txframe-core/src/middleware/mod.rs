//! Built-in Middleware Set (§4.8).

pub mod cors;
pub mod health;
pub mod logger;
pub mod metrics;
pub mod pprof;
pub mod recovery;
pub mod request_id;
pub mod timeout;

pub use cors::{cors as cors_middleware, CorsOptions};
pub use health::{HealthOptions, HealthState};
pub use logger::{logger as logger_middleware, LoggerOptions};
pub use metrics::{metrics_recording, MetricsOptions, MetricsRecorder, NoopMetricsRecorder};
pub use pprof::PprofOptions;
pub use recovery::{recovery as recovery_middleware, OnPanic};
pub use request_id::{request_id as request_id_middleware, RequestIdOptions};
pub use timeout::{timeout as timeout_middleware, TimeoutOptions};

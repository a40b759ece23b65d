//! Pprof endpoints (§4.8): off by default for safety.

use std::time::Duration;

use http::{Method, StatusCode};

use crate::router::{sync_handler, NeutralRouter};

#[derive(Clone)]
pub struct PprofOptions {
    pub enabled: bool,
    pub prefix: String,
    pub profile_duration: Duration,
}

impl Default for PprofOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: "/debug/pprof".to_owned(),
            profile_duration: Duration::from_secs(10),
        }
    }
}

/// Mounts `{prefix}/profile`, returning a protobuf CPU profile sampled for
/// `profile_duration`. No-op when `options.enabled` is false.
pub fn register_routes(router: &NeutralRouter, options: &PprofOptions) {
    if !options.enabled {
        return;
    }

    let duration = options.profile_duration;
    let handler: crate::router::NeutralHandler = std::sync::Arc::new(move |ctx| {
        Box::pin(async move {
            #[cfg(feature = "pprof")]
            {
                match tokio::task::spawn_blocking(move || capture_profile(duration)).await {
                    Ok(Ok(bytes)) => {
                        ctx.bytes(
                            StatusCode::OK,
                            http::HeaderValue::from_static("application/octet-stream"),
                            bytes.into(),
                        );
                    }
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, "pprof capture failed");
                        ctx.text(StatusCode::INTERNAL_SERVER_ERROR, "profiling failed");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "pprof task panicked");
                        ctx.text(StatusCode::INTERNAL_SERVER_ERROR, "profiling failed");
                    }
                }
            }
            #[cfg(not(feature = "pprof"))]
            {
                let _ = duration;
                ctx.text(StatusCode::NOT_IMPLEMENTED, "pprof feature disabled");
            }
        })
    });
    router.handle(Method::GET, &format!("{}/profile", options.prefix), handler);
}

#[cfg(feature = "pprof")]
fn capture_profile(duration: Duration) -> anyhow::Result<Vec<u8>> {
    use pprof::protos::Message;

    let guard = pprof::ProfilerGuardBuilder::default()
        .frequency(100)
        .build()?;
    std::thread::sleep(duration);
    let report = guard.report().build()?;
    let profile = report.pprof()?;
    Ok(profile.write_to_bytes()?)
}


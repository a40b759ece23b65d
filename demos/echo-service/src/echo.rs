//! The demo's HTTP-only service: echoes back a JSON body.

use std::any::Any;

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use txframe_core::{sync_handler, HTTPHandler, NeutralRouter, Service};

pub struct EchoService;

#[derive(Serialize, Deserialize)]
struct EchoBody {
    message: String,
}

impl Service for EchoService {
    fn service_name(&self) -> &str {
        "echo"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HTTPHandler for EchoService {
    fn register_routes(&self, router: NeutralRouter) {
        router.handle(
            Method::POST,
            "/echo",
            sync_handler(|ctx| match ctx.bind::<EchoBody>() {
                Ok(body) => {
                    ctx.json(StatusCode::OK, &body);
                }
                Err(problem) => {
                    ctx.try_write_problem(problem);
                }
            }),
        );
    }
}

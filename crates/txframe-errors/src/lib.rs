//! Error taxonomy shared across the transport-layer crates: structured,
//! matchable error enums for fatal/constructor paths, and an RFC 9457
//! Problem+JSON type for per-request error bodies.

mod catalog;
mod problem;

pub use catalog::{BridgeError, ConfigError, RegistrationError};
pub use problem::{Problem, APPLICATION_PROBLEM_JSON};

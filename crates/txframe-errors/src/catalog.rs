//! Structured, matchable error enums for the fatal/constructor error paths.
//!
//! Per-request errors use [`crate::Problem`] instead; these types are for the
//! synchronous failures callers are expected to match on (configuration,
//! registration, bridge lookup).

use thiserror::Error;

/// Errors raised while constructing a server or bridge from its options.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid listen address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("unsupported bridge adapter: {0}")]
    UnsupportedAdapter(String),

    #[error("missing required configuration option: {0}")]
    MissingOption(&'static str),
}

/// Errors raised from [`crate::registry`]-shaped registration operations.
///
/// Named generically (not `RegistryError`) so it can be reused by any
/// name-keyed registration surface, not only the service registry.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("handler for service {0:?} is absent")]
    MissingHandler(String),
}

/// Errors raised while looking up a framework bridge in the process-wide
/// bridge registry.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no bridge registered for adapter {0:?} and no default bridge is available")]
    NoDefaultBridge(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_are_stable() {
        let err = ConfigError::UnsupportedAdapter("fastify".to_owned());
        assert_eq!(err.to_string(), "unsupported bridge adapter: fastify");
    }

    #[test]
    fn registration_error_names_the_service() {
        let err = RegistrationError::MissingHandler("echo".to_owned());
        assert!(err.to_string().contains("echo"));
    }

    #[test]
    fn bridge_error_falls_back_message_names_default() {
        let err = BridgeError::NoDefaultBridge("nope".to_owned());
        assert!(err.to_string().contains("nope"));
    }
}

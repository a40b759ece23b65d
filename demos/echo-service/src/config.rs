//! Layered configuration: built-in defaults, an optional YAML file, then
//! environment variables, highest precedence last.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use txframe_errors::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub http_bind_addr: String,
    pub http_adapter: String,
    pub grpc_listen_addr: String,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_bind_addr: "127.0.0.1:8080".to_owned(),
            http_adapter: "axum".to_owned(),
            grpc_listen_addr: "tcp://127.0.0.1:50051".to_owned(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// # Errors
    /// Returns an error if `config_path` is set but unreadable, or if any
    /// layer fails to deserialize into [`AppConfig`].
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed("ECHO_"));
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns [`ConfigError::MissingOption`] if a required field was
    /// overridden to an empty string by a config layer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_bind_addr.trim().is_empty() {
            return Err(ConfigError::MissingOption("http_bind_addr"));
        }
        if self.grpc_listen_addr.trim().is_empty() {
            return Err(ConfigError::MissingOption("grpc_listen_addr"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.http_bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn env_vars_override_defaults() {
        temp_env::with_var("ECHO_HTTP_BIND_ADDR", Some("0.0.0.0:9090"), || {
            let cfg = AppConfig::load(None).unwrap();
            assert_eq!(cfg.http_bind_addr, "0.0.0.0:9090");
        });
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"http_adapter: actix\n").unwrap();
        let cfg = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(cfg.http_adapter, "actix");
    }

    #[test]
    fn empty_bind_addr_fails_validation() {
        temp_env::with_var("ECHO_HTTP_BIND_ADDR", Some(""), || {
            let err = AppConfig::load(None).unwrap_err();
            assert!(err.to_string().contains("http_bind_addr"));
        });
    }
}

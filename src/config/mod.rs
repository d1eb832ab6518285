use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Connection settings handed to the backend on initialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub application_id: String,
    pub server_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log every built query in its REST encoding at debug level
    pub debug_queries: bool,
    /// Default tracing filter when RUST_LOG is not set
    pub default_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("BRIDGE_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("BRIDGE_APP_ID") {
            self.backend.application_id = v;
        }
        if let Ok(v) = env::var("BRIDGE_SERVER_URL") {
            match url::Url::parse(&v) {
                Ok(parsed) => self.backend.server_url = parsed.into(),
                Err(e) => {
                    tracing::warn!("Ignoring BRIDGE_SERVER_URL '{}': {}", v, e);
                }
            }
        }
        if let Ok(v) = env::var("BRIDGE_DEBUG_QUERIES") {
            self.logging.debug_queries = v.parse().unwrap_or(self.logging.debug_queries);
        }
        if let Ok(v) = env::var("BRIDGE_LOG") {
            self.logging.default_filter = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            backend: BackendConfig {
                application_id: "dev".to_string(),
                server_url: "http://localhost:1337/parse".to_string(),
            },
            logging: LoggingConfig {
                debug_queries: true,
                default_filter: "debug".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            backend: BackendConfig {
                application_id: "staging".to_string(),
                server_url: "https://staging.example.com/parse".to_string(),
            },
            logging: LoggingConfig {
                debug_queries: false,
                default_filter: "info".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            backend: BackendConfig {
                application_id: "production".to_string(),
                server_url: "https://api.example.com/parse".to_string(),
            },
            logging: LoggingConfig {
                debug_queries: false,
                default_filter: "warn".to_string(),
            },
        }
    }
}

// Global config - initialized on first access
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.logging.debug_queries);
        assert_eq!(config.backend.server_url, "http://localhost:1337/parse");
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.logging.debug_queries);
        assert_eq!(config.environment, Environment::Production);
        assert!(url::Url::parse(&config.backend.server_url).is_ok());
    }
}

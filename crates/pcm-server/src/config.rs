//! Server configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

/// Deployment environment, from `APP_ENV`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Local,
    Dev,
    Qa,
    Uat,
    Prod,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Dev => "DEV",
            Self::Qa => "QA",
            Self::Uat => "UAT",
            Self::Prod => "PROD",
            Self::Test => "TEST",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(Self::Local),
            "DEV" => Ok(Self::Dev),
            "QA" => Ok(Self::Qa),
            "UAT" => Ok(Self::Uat),
            "PROD" => Ok(Self::Prod),
            "TEST" => Ok(Self::Test),
            other => Err(ConfigError::InvalidValue {
                name: "APP_ENV".to_string(),
                reason: format!("unknown environment '{}'", other),
            }),
        }
    }
}

/// Which document store the server runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackendKind {
    #[default]
    Mongo,
    /// In-process store, empty at startup.
    Memory,
}

impl FromStr for StoreBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                name: "PCM_STORE_BACKEND".to_string(),
                reason: format!("expected 'mongo' or 'memory', got '{}'", other),
            }),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server port to listen on.
    pub port: u16,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// CORS allowed origins (comma-separated or "*" for all).
    pub cors_allowed_origins: String,
    /// Deployment environment.
    pub environment: Environment,
    /// Document store backend.
    pub store_backend: StoreBackendKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            log_level: "info".to_string(),
            cors_allowed_origins: "*".to_string(),
            environment: Environment::default(),
            store_backend: StoreBackendKind::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `PORT`: Server port (default: 3000)
    /// - `LOG_LEVEL`: Logging level (default: "info")
    /// - `CORS_ALLOWED_ORIGINS`: Allowed CORS origins (default: "*")
    /// - `APP_ENV`: LOCAL, DEV, QA, UAT, PROD or TEST (default: LOCAL)
    /// - `PCM_STORE_BACKEND`: "mongo" or "memory" (default: "mongo")
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT".to_string(),
                reason: format!("'{}' is not a port number", s),
            })?,
            Err(_) => 3000,
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let cors_allowed_origins =
            env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string());

        let environment = env::var("APP_ENV")
            .ok()
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();

        let store_backend = env::var("PCM_STORE_BACKEND")
            .ok()
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            port,
            log_level,
            cors_allowed_origins,
            environment,
            store_backend,
        })
    }

    /// Get the socket address for the server.
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid environment variable value.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ServerConfig::default();

        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cors_allowed_origins, "*");
        assert_eq!(config.environment, Environment::Local);
        assert_eq!(config.store_backend, StoreBackendKind::Mongo);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("uat".parse::<Environment>().unwrap(), Environment::Uat);
        assert_eq!(" PROD ".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
        assert_eq!(Environment::Qa.to_string(), "QA");
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(
            "Memory".parse::<StoreBackendKind>().unwrap(),
            StoreBackendKind::Memory
        );
        assert_eq!(
            "mongodb".parse::<StoreBackendKind>().unwrap(),
            StoreBackendKind::Mongo
        );
        let err = "postgres".parse::<StoreBackendKind>().unwrap_err();
        assert!(err.to_string().contains("PCM_STORE_BACKEND"));
    }
}

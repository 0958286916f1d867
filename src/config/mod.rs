use crate::error::{CrudrouteError, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Variable selecting which `.env.<environment>` file is loaded.
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

/// Prefix shared by every database connection setting.
pub const DATABASE_PREFIX: &str = "DB_";

const DEFAULT_ENVIRONMENT: &str = "development";

/// Configuration service
///
/// A snapshot of the process environment, taken after the environment
/// specific `.env` file has been applied.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Load `.env.<APP_ENV>` from the working directory, then snapshot the environment.
    pub fn load() -> Self {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Self {
        let environment =
            env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
        let env_file = dir.join(format!(".env.{environment}"));
        match dotenvy::from_path(&env_file) {
            Ok(()) => tracing::info!("Loaded environment file {}", env_file.display()),
            Err(e) if e.not_found() => {
                tracing::debug!("No environment file at {}", env_file.display())
            }
            Err(e) => tracing::warn!("Ignoring environment file {}: {}", env_file.display(), e),
        }

        let service = Self::from_vars(env::vars());
        service.set(ENVIRONMENT_VAR, &environment);
        service
    }

    /// Build from explicit key/value pairs, bypassing the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let service = Self::default();
        for (key, value) in vars {
            service.config.insert(key.into(), value.into());
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(CrudrouteError::InvalidConfig {
                    key: key.to_string(),
                    value,
                }),
            },
        }
    }

    /// Every `DB_*` variable, keyed by its lower-cased suffix.
    pub fn database_config(&self) -> DatabaseConfig {
        let settings = self
            .config
            .iter()
            .filter_map(|entry| {
                entry
                    .key()
                    .strip_prefix(DATABASE_PREFIX)
                    .filter(|suffix| !suffix.is_empty())
                    .map(|suffix| (suffix.to_lowercase(), entry.value().clone()))
            })
            .collect();
        DatabaseConfig { settings }
    }

    pub fn server_config(&self) -> Result<ServerConfig> {
        let port_raw = self.get_or("PORT", "3000");
        let port = port_raw
            .parse::<u16>()
            .map_err(|_| CrudrouteError::InvalidConfig {
                key: "PORT".to_string(),
                value: port_raw.clone(),
            })?;

        Ok(ServerConfig {
            environment: self.get_or(ENVIRONMENT_VAR, DEFAULT_ENVIRONMENT),
            host: self.get_or("HOST", "0.0.0.0"),
            port,
            controllers_dir: PathBuf::from(self.get_or("CONTROLLERS_DIR", "controllers")),
            models_dir: PathBuf::from(self.get_or("MODELS_DIR", "models")),
            expose_error_stack: self.parse_bool("EXPOSE_ERROR_STACK", true)?,
        })
    }
}

/// Connection settings for the model layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseConfig {
    settings: BTreeMap<String, String>,
}

impl DatabaseConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Backend name; `memory` when unset.
    pub fn dialect(&self) -> &str {
        self.get("dialect").unwrap_or("memory")
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.settings.insert(key.to_lowercase(), value.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub controllers_dir: PathBuf,
    pub models_dir: PathBuf,
    /// Include the diagnostic trace in error bodies.
    pub expose_error_stack: bool,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            controllers_dir: PathBuf::from("controllers"),
            models_dir: PathBuf::from("models"),
            expose_error_stack: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_strips_prefix() {
        let config = ConfigService::from_vars([
            ("DB_DIALECT", "memory"),
            ("DB_USERNAME", "app"),
            ("DB_", "ignored"),
            ("DATABASE_URL", "postgres://nope"),
        ]);
        let db = config.database_config();
        assert_eq!(db.dialect(), "memory");
        assert_eq!(db.get("username"), Some("app"));
        assert_eq!(db.get(""), None);
        assert_eq!(db.get("database_url"), None);
    }

    #[test]
    fn test_dialect_defaults_to_memory() {
        let config = ConfigService::from_vars(Vec::<(String, String)>::new());
        assert_eq!(config.database_config().dialect(), "memory");
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ConfigService::from_vars([("PORT", "8081")]);
        let server = config.server_config().unwrap();
        assert_eq!(server.port, 8081);
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.controllers_dir, PathBuf::from("controllers"));
        assert!(server.expose_error_stack);
        assert_eq!(server.bind_addr(), "0.0.0.0:8081");
    }

    #[test]
    fn test_server_config_rejects_bad_values() {
        let config = ConfigService::from_vars([("PORT", "eighty")]);
        assert!(matches!(
            config.server_config(),
            Err(CrudrouteError::InvalidConfig { .. })
        ));

        let config = ConfigService::from_vars([("EXPOSE_ERROR_STACK", "maybe")]);
        assert!(config.server_config().is_err());

        let config = ConfigService::from_vars([("EXPOSE_ERROR_STACK", "off")]);
        assert!(!config.server_config().unwrap().expose_error_stack);
    }

    #[test]
    fn test_load_reads_env_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env.development"),
            "CRUDROUTE_TEST_ONLY_KEY=from-file\n",
        )
        .unwrap();
        // APP_ENV is not set by the test harness; the default environment applies.
        if env::var(ENVIRONMENT_VAR).is_ok() {
            return;
        }
        let config = ConfigService::load_from(dir.path());
        assert_eq!(
            config.get("CRUDROUTE_TEST_ONLY_KEY").as_deref(),
            Some("from-file")
        );
        assert_eq!(config.get(ENVIRONMENT_VAR).as_deref(), Some("development"));
    }
}

//! Configuration management

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/stockroom";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Import Pipeline Constants
// ============================================================================

/// Default directory accepted uploads are written to.
pub const DEFAULT_IMPORT_UPLOAD_DIR: &str = "./uploads/imports";

/// Default maximum upload size (10 MiB).
pub const DEFAULT_IMPORT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default delay between queue polls when the queue is empty.
pub const DEFAULT_IMPORT_WORKER_POLL_INTERVAL_MS: u64 = 1000;

/// Default number of rows between progress writes.
pub const DEFAULT_IMPORT_PROGRESS_INTERVAL: usize = 100;

/// Default age after which a processing job counts as stalled (30 minutes).
pub const DEFAULT_IMPORT_STALE_JOB_TIMEOUT_SECS: u64 = 1800;

/// Default interval between stale job sweeps (5 minutes).
pub const DEFAULT_IMPORT_STALE_SWEEP_INTERVAL_SECS: u64 = 300;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub imports: ImportConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Bulk import pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Directory uploads are written to; created on first upload
    pub upload_dir: PathBuf,
    /// Largest accepted request body and file, in bytes
    pub max_upload_bytes: usize,
    /// Run the background import worker in this process
    pub worker_enabled: bool,
    pub worker_poll_interval_ms: u64,
    /// Rows processed between progress writes and cancellation checks
    pub progress_interval: usize,
    pub stale_job_timeout_secs: u64,
    pub stale_sweep_interval_secs: u64,
}

impl ImportConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    pub fn stale_job_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_job_timeout_secs)
    }

    pub fn stale_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.stale_sweep_interval_secs)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_IMPORT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_IMPORT_MAX_UPLOAD_BYTES,
            worker_enabled: true,
            worker_poll_interval_ms: DEFAULT_IMPORT_WORKER_POLL_INTERVAL_MS,
            progress_interval: DEFAULT_IMPORT_PROGRESS_INTERVAL,
            stale_job_timeout_secs: DEFAULT_IMPORT_STALE_JOB_TIMEOUT_SECS,
            stale_sweep_interval_secs: DEFAULT_IMPORT_STALE_SWEEP_INTERVAL_SECS,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("STOCKROOM_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("STOCKROOM_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "STOCKROOM_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
            imports: ImportConfig {
                upload_dir: std::env::var("IMPORT_UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_IMPORT_UPLOAD_DIR)),
                max_upload_bytes: env_or(
                    "IMPORT_MAX_UPLOAD_BYTES",
                    DEFAULT_IMPORT_MAX_UPLOAD_BYTES,
                ),
                worker_enabled: env_or("IMPORT_WORKER_ENABLED", true),
                worker_poll_interval_ms: env_or(
                    "IMPORT_WORKER_POLL_INTERVAL_MS",
                    DEFAULT_IMPORT_WORKER_POLL_INTERVAL_MS,
                ),
                progress_interval: env_or(
                    "IMPORT_PROGRESS_INTERVAL",
                    DEFAULT_IMPORT_PROGRESS_INTERVAL,
                ),
                stale_job_timeout_secs: env_or(
                    "IMPORT_STALE_JOB_TIMEOUT_SECS",
                    DEFAULT_IMPORT_STALE_JOB_TIMEOUT_SECS,
                ),
                stale_sweep_interval_secs: env_or(
                    "IMPORT_STALE_SWEEP_INTERVAL_SECS",
                    DEFAULT_IMPORT_STALE_SWEEP_INTERVAL_SECS,
                ),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.imports.upload_dir.as_os_str().is_empty() {
            anyhow::bail!("Import upload directory cannot be empty");
        }

        if self.imports.max_upload_bytes == 0 {
            anyhow::bail!("Import max_upload_bytes must be greater than 0");
        }

        if self.imports.progress_interval == 0 {
            anyhow::bail!("Import progress_interval must be greater than 0");
        }

        if self.imports.worker_poll_interval_ms == 0 {
            anyhow::bail!("Import worker poll interval must be greater than 0");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            imports: ImportConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const IMPORT_VARS: [&str; 4] = [
        "IMPORT_UPLOAD_DIR",
        "IMPORT_MAX_UPLOAD_BYTES",
        "IMPORT_PROGRESS_INTERVAL",
        "IMPORT_WORKER_ENABLED",
    ];

    fn clear_import_vars() {
        for var in IMPORT_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.imports.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.imports.progress_interval, 100);
        assert_eq!(config.imports.stale_job_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn test_validate_rejects_bad_pool_sizes() {
        let mut config = Config::default();
        config.database.min_connections = 20;
        config.database.max_connections = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_import_limits() {
        let mut config = Config::default();
        config.imports.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.imports.progress_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_reads_import_variables() {
        clear_import_vars();
        std::env::set_var("IMPORT_UPLOAD_DIR", "/var/lib/stockroom/imports");
        std::env::set_var("IMPORT_MAX_UPLOAD_BYTES", "2048");
        std::env::set_var("IMPORT_PROGRESS_INTERVAL", "25");
        std::env::set_var("IMPORT_WORKER_ENABLED", "false");

        let config = Config::load();
        clear_import_vars();
        let config = config.unwrap();

        assert_eq!(config.imports.upload_dir, PathBuf::from("/var/lib/stockroom/imports"));
        assert_eq!(config.imports.max_upload_bytes, 2048);
        assert_eq!(config.imports.progress_interval, 25);
        assert!(!config.imports.worker_enabled);
    }

    #[test]
    #[serial]
    fn test_load_ignores_malformed_numbers() {
        clear_import_vars();
        std::env::set_var("IMPORT_MAX_UPLOAD_BYTES", "ten megabytes");

        let config = Config::load();
        clear_import_vars();

        assert_eq!(config.unwrap().imports.max_upload_bytes, DEFAULT_IMPORT_MAX_UPLOAD_BYTES);
    }
}

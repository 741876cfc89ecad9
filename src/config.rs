/// Configuration management for Purge Hub
use crate::error::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub moderation: ModerationConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: String,
    /// Expected `aud` claim, if tokens carry one
    pub jwt_audience: Option<String>,
    /// Email whose owner is treated as principal even without a super_admin role row
    pub principal_email: Option<String>,
}

/// Moderation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    pub default_ban_reason: String,
    pub default_deletion_reason: String,
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub reconcile_enabled: bool,
    pub reconcile_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> HubResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("HUB_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("HUB_PORT")
            .unwrap_or_else(|_| "54321".to_string())
            .parse()
            .map_err(|_| HubError::Validation("Invalid port number".to_string()))?;
        let version = env::var("HUB_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("HUB_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("HUB_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("hub.sqlite"));

        let jwt_secret = env::var("HUB_JWT_SECRET")
            .map_err(|_| HubError::Validation("JWT secret required".to_string()))?;
        let jwt_audience = env::var("HUB_JWT_AUDIENCE").ok().filter(|s| !s.is_empty());
        let principal_email = env::var("HUB_PRINCIPAL_EMAIL")
            .ok()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let default_ban_reason = env::var("HUB_DEFAULT_BAN_REASON")
            .unwrap_or_else(|_| "Banned by admin".to_string());
        let default_deletion_reason = env::var("HUB_DEFAULT_DELETION_REASON")
            .unwrap_or_else(|_| "Account deleted by admin".to_string());

        let reconcile_enabled = env::var("HUB_RECONCILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let reconcile_interval_secs = env::var("HUB_RECONCILE_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "purge_hub=debug,tower_http=debug".to_string());
        let log_json = env::var("HUB_LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                jwt_secret,
                jwt_audience,
                principal_email,
            },
            moderation: ModerationConfig {
                default_ban_reason,
                default_deletion_reason,
            },
            jobs: JobsConfig {
                reconcile_enabled,
                reconcile_interval_secs,
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> HubResult<()> {
        if self.service.hostname.is_empty() {
            return Err(HubError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(HubError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.jobs.reconcile_interval_secs == 0 {
            return Err(HubError::Validation(
                "Reconcile interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config(secret: &str) -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
            version: "test".to_string(),
        },
        storage: StorageConfig {
            data_directory: PathBuf::from("./data"),
            database: PathBuf::from(":memory:"),
        },
        authentication: AuthConfig {
            jwt_secret: secret.to_string(),
            jwt_audience: None,
            principal_email: None,
        },
        moderation: ModerationConfig {
            default_ban_reason: "Banned by admin".to_string(),
            default_deletion_reason: "Account deleted by admin".to_string(),
        },
        jobs: JobsConfig {
            reconcile_enabled: false,
            reconcile_interval_secs: 3600,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            json: false,
        },
    }
}

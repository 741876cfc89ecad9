/// Application context and dependency injection
use crate::{
    account::AccountManager,
    admin::{AccountDeletion, AdminConsole, BanLedger, ProfileManager, ReportManager, RoleManager},
    config::ServerConfig,
    db,
    error::{HubError, HubResult},
    events::EventBus,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    // Admin & Moderation
    pub role_manager: Arc<RoleManager>,
    pub profile_manager: Arc<ProfileManager>,
    pub report_manager: Arc<ReportManager>,
    pub ban_ledger: Arc<BanLedger>,
    pub admin_console: Arc<AdminConsole>,
    pub account_deletion: Arc<AccountDeletion>,
    // In-process moderation events
    pub events: EventBus,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> HubResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        Ok(Self::with_pool(config, db))
    }

    /// Wire every service over an already-migrated pool
    pub fn with_pool(config: ServerConfig, db: SqlitePool) -> Self {
        let config = Arc::new(config);
        let events = EventBus::default();

        let account_manager = Arc::new(AccountManager::new(db.clone(), config.clone()));
        let role_manager = Arc::new(RoleManager::new(db.clone()));
        let profile_manager = Arc::new(ProfileManager::new(db.clone()));
        let report_manager = Arc::new(ReportManager::new(db.clone()));
        let ban_ledger = Arc::new(BanLedger::new(db.clone()));

        let admin_console = Arc::new(AdminConsole::new(
            db.clone(),
            config.clone(),
            account_manager.clone(),
            role_manager.clone(),
            profile_manager.clone(),
            report_manager.clone(),
            ban_ledger.clone(),
            events.clone(),
        ));

        let account_deletion = Arc::new(AccountDeletion::new(
            db.clone(),
            config.clone(),
            account_manager.clone(),
            role_manager.clone(),
            profile_manager.clone(),
            ban_ledger.clone(),
            events.clone(),
        ));

        Self {
            config,
            db,
            account_manager,
            role_manager,
            profile_manager,
            report_manager,
            ban_ledger,
            admin_console,
            account_deletion,
            events,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> HubResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                HubError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

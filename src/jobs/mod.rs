use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        if self.context.config.jobs.reconcile_enabled {
            tokio::spawn(Self::orphan_reconciliation_job(Arc::clone(&self)));
        } else {
            info!("Orphan reconciliation disabled");
        }

        // Spawn monitoring tasks
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Sweep rows left behind by interrupted account deletions
    async fn orphan_reconciliation_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.jobs.reconcile_interval_secs;
        let mut interval = interval(Duration::from_secs(period));

        loop {
            interval.tick().await;
            info!("Running orphan reconciliation");

            match tasks::reconcile_orphans(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Reconciliation removed {} orphaned rows", count);
                    } else {
                        info!("Reconciliation: no orphaned rows found");
                    }
                }
                Err(e) => error!("Failed to reconcile orphaned rows: {}", e),
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }
        }
    }
}

//! Batch sync across every tenant.
//!
//! - Fan-out: one task per company, at most `max_concurrent` in flight
//! - Isolation: a failing or slow tenant is recorded and the batch continues
//! - Hard error only when the directory is unreachable or every enabled tenant failed

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use forgecmms_core::CompanyId;

use crate::engine::{EngineError, PredictiveMaintenanceEngine, SyncOutcome};

/// Per-tenant result of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantSyncStatus {
    Synced {
        created: usize,
        refreshed: usize,
        resolved: usize,
        warnings: usize,
    },
    /// Module disabled for the company; nothing read or written.
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSyncDetail {
    pub company_id: CompanyId,
    #[serde(flatten)]
    pub status: TenantSyncStatus,
}

/// Batch result; `details` follow directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatchSummary {
    pub success_count: usize,
    pub fail_count: usize,
    pub skipped_count: usize,
    pub details: Vec<TenantSyncDetail>,
}

impl SyncBatchSummary {
    fn from_details(details: Vec<TenantSyncDetail>) -> Self {
        let mut summary = Self::default();
        for d in &details {
            match d.status {
                TenantSyncStatus::Synced { .. } => summary.success_count += 1,
                TenantSyncStatus::Skipped => summary.skipped_count += 1,
                TenantSyncStatus::Failed { .. } => summary.fail_count += 1,
            }
        }
        summary.details = details;
        summary
    }
}

/// Runs [`PredictiveMaintenanceEngine::sync_alerts`] for every company.
#[derive(Debug, Clone)]
pub struct SyncOrchestrator {
    engine: Arc<PredictiveMaintenanceEngine>,
    max_concurrent: usize,
    timeout: Duration,
}

impl SyncOrchestrator {
    /// Concurrency and timeout come from the engine's configuration.
    pub fn new(engine: Arc<PredictiveMaintenanceEngine>) -> Self {
        let max_concurrent = engine.config().max_concurrent_tenants.max(1);
        let timeout = engine.config().tenant_timeout();
        Self {
            engine,
            max_concurrent,
            timeout,
        }
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(&self) -> Result<SyncBatchSummary, EngineError> {
        let companies = self
            .engine
            .collaborators()
            .directory
            .list_companies()
            .await
            .map_err(|e| EngineError::DirectoryUnavailable(e.to_string()))?;

        info!(companies = companies.len(), max_concurrent = self.max_concurrent, "alert sync batch started");

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (slot, company_id) in companies.iter().copied().enumerate() {
            let engine = self.engine.clone();
            let permits = permits.clone();
            let timeout = self.timeout;

            tasks.spawn(async move {
                let status = match permits.acquire_owned().await {
                    Ok(_permit) => sync_one(&engine, company_id, timeout).await,
                    Err(e) => TenantSyncStatus::Failed {
                        error: EngineError::TaskFailed(e.to_string()).to_string(),
                    },
                };
                (slot, status)
            });
        }

        let mut statuses: Vec<Option<TenantSyncStatus>> = vec![None; companies.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, status)) => statuses[slot] = Some(status),
                Err(e) => error!(error = %e, "alert sync task aborted"),
            }
        }

        let details: Vec<TenantSyncDetail> = companies
            .iter()
            .zip(statuses)
            .map(|(company_id, status)| TenantSyncDetail {
                company_id: *company_id,
                status: status.unwrap_or_else(|| TenantSyncStatus::Failed {
                    error: EngineError::TaskFailed("task panicked or was cancelled".to_string()).to_string(),
                }),
            })
            .collect();

        let summary = SyncBatchSummary::from_details(details);
        info!(
            success = summary.success_count,
            failed = summary.fail_count,
            skipped = summary.skipped_count,
            "alert sync batch finished"
        );

        let enabled = summary.success_count + summary.fail_count;
        if enabled > 0 && summary.success_count == 0 {
            return Err(EngineError::AllTenantsFailed {
                failed: summary.fail_count,
            });
        }
        Ok(summary)
    }
}

async fn sync_one(engine: &PredictiveMaintenanceEngine, company_id: CompanyId, timeout: Duration) -> TenantSyncStatus {
    let result = match tokio::time::timeout(timeout, engine.sync_alerts(company_id)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout {
            company_id,
            after: timeout,
        }),
    };

    match result {
        Ok(SyncOutcome { module_enabled: false, .. }) => TenantSyncStatus::Skipped,
        Ok(outcome) => TenantSyncStatus::Synced {
            created: outcome.created,
            refreshed: outcome.refreshed,
            resolved: outcome.resolved,
            warnings: outcome.warnings.len(),
        },
        Err(e) => {
            warn!(company = %company_id, error = %e, "company sync failed");
            TenantSyncStatus::Failed { error: e.to_string() }
        }
    }
}

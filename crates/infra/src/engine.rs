//! Tenant-scoped alert engine: reads collaborators, runs the predictive
//! pipeline, reconciles alert history.
//!
//! All collaborator reads of a run happen before any history write, so a
//! collaborator outage leaves nothing persisted for that tenant.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use forgecmms_core::{AlertId, CompanyId, ComponentId, DomainError, UserId, WorkOrderId};
use forgecmms_predictive::{
    AlertCounts, AlertKey, HistoryRecord, MODULE_KEY, MaintenanceAlert, TrendSeries,
    UpsertOutcome, evaluate_component, sort_alerts,
};

use crate::config::EngineConfig;
use crate::history::{AlertHistoryStore, HistoryStoreError};
use crate::orchestrator::{SyncBatchSummary, SyncOrchestrator};
use crate::ports::{Collaborators, StoreError};

pub use crate::ports::ComponentWarning;

/// Engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A collaborator store could not be reached; the tenant run was aborted.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("alert history: {0}")]
    History(#[from] HistoryStoreError),

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("company {company_id} timed out after {after:?}")]
    Timeout { company_id: CompanyId, after: Duration },

    #[error("company directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("all {failed} enabled companies failed")]
    AllTenantsFailed { failed: usize },

    #[error("sync task failed: {0}")]
    TaskFailed(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => EngineError::DependencyUnavailable(msg),
            StoreError::Malformed(msg) => EngineError::Validation(DomainError::validation(msg)),
        }
    }
}

/// Result of an on-demand (read-only) alert generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub company_id: CompanyId,
    pub generated_at: DateTime<Utc>,
    /// `false` when the company has the module switched off; alerts are then empty.
    pub module_enabled: bool,
    /// Sorted, most severe first.
    pub alerts: Vec<MaintenanceAlert>,
    pub counts: AlertCounts,
    pub warnings: Vec<ComponentWarning>,
}

/// Result of reconciling one company's alert history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub company_id: CompanyId,
    pub module_enabled: bool,
    pub created: usize,
    pub refreshed: usize,
    pub resolved: usize,
    pub warnings: Vec<ComponentWarning>,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Predictive maintenance alert engine.
#[derive(Clone)]
pub struct PredictiveMaintenanceEngine {
    collaborators: Collaborators,
    history: Arc<dyn AlertHistoryStore>,
    config: EngineConfig,
    clock: Clock,
}

impl core::fmt::Debug for PredictiveMaintenanceEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PredictiveMaintenanceEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PredictiveMaintenanceEngine {
    pub fn new(collaborators: Collaborators, history: Arc<dyn AlertHistoryStore>, config: EngineConfig) -> Self {
        Self {
            collaborators,
            history,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock (tests, replays).
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Compute the current alerts for a company without persisting anything.
    pub async fn generate_alerts(&self, company_id: CompanyId) -> Result<AlertReport, EngineError> {
        let now = self.now();
        let run = self.evaluate(company_id, now).await?;
        let counts = AlertCounts::of(&run.alerts);

        Ok(AlertReport {
            company_id,
            generated_at: now,
            module_enabled: run.module_enabled,
            alerts: run.alerts,
            counts,
            warnings: run.warnings,
        })
    }

    /// Generate alerts and reconcile them into history: upsert every active
    /// alert, then auto-resolve open records whose condition has cleared.
    ///
    /// Open records of skipped components are left alone: their condition was
    /// not evaluated, so it has not been seen to clear.
    pub async fn sync_alerts(&self, company_id: CompanyId) -> Result<SyncOutcome, EngineError> {
        let now = self.now();
        let run = self.evaluate(company_id, now).await?;
        let skipped: HashSet<ComponentId> = run.warnings.iter().map(|w| w.component_id).collect();

        let mut outcome = SyncOutcome {
            company_id,
            module_enabled: run.module_enabled,
            created: 0,
            refreshed: 0,
            resolved: 0,
            warnings: run.warnings,
        };
        if !run.module_enabled {
            return Ok(outcome);
        }

        let mut active = HashSet::with_capacity(run.alerts.len());
        for alert in &run.alerts {
            active.insert(AlertKey::of(alert));
            match self.history.upsert_open(company_id, alert, now).await? {
                UpsertOutcome::Created(r) => {
                    outcome.created += 1;
                    debug!(company = %company_id, component = %alert.component_id, alert_type = ?alert.alert_type, alert_id = %r.id, "alert opened");
                }
                UpsertOutcome::Refreshed(r) => {
                    outcome.refreshed += 1;
                    debug!(company = %company_id, component = %alert.component_id, alert_type = ?alert.alert_type, alert_id = %r.id, "alert refreshed");
                }
            }
        }
        outcome.resolved = self.history.close_stale(company_id, &active, &skipped, now).await?;

        info!(
            company = %company_id,
            created = outcome.created,
            refreshed = outcome.refreshed,
            resolved = outcome.resolved,
            warnings = outcome.warnings.len(),
            "alert history synced"
        );
        Ok(outcome)
    }

    /// Sync every company in the directory with bounded parallelism.
    pub async fn sync_all_companies(self: &Arc<Self>) -> Result<SyncBatchSummary, EngineError> {
        SyncOrchestrator::new(self.clone()).run().await
    }

    /// Day-by-day alert counts over the trailing `days` (today inclusive).
    pub async fn get_trends(&self, company_id: CompanyId, days: u32) -> Result<TrendSeries, EngineError> {
        let today = self.now().date_naive();
        let from = TrendSeries::window_start(days, today)?;
        let since = Utc.from_utc_datetime(&from.and_time(NaiveTime::MIN));

        let records = self.history.list_since(company_id, since).await?;
        Ok(TrendSeries::build(company_id, &records, days, today)?)
    }

    /// Resolve an alert by hand. Resolving an already-resolved alert returns
    /// it unchanged.
    pub async fn resolve_alert(
        &self,
        company_id: CompanyId,
        alert_id: AlertId,
        resolved_by: UserId,
        linked_work_order_id: Option<WorkOrderId>,
        notes: Option<String>,
    ) -> Result<HistoryRecord, EngineError> {
        let now = self.now();
        let record = self
            .history
            .resolve(company_id, alert_id, resolved_by, linked_work_order_id, notes, now)
            .await?;
        if record.resolved_at == Some(now) && record.resolved_by == Some(resolved_by) {
            info!(company = %company_id, alert_id = %alert_id, user = %resolved_by, "alert resolved");
        } else {
            debug!(company = %company_id, alert_id = %alert_id, "alert already resolved; nothing changed");
        }
        Ok(record)
    }

    pub async fn list_open_alerts(&self, company_id: CompanyId) -> Result<Vec<HistoryRecord>, EngineError> {
        Ok(self.history.list_open(company_id).await?)
    }

    /// Read phase shared by generation and sync.
    async fn evaluate(&self, company_id: CompanyId, now: DateTime<Utc>) -> Result<Evaluation, EngineError> {
        let c = &self.collaborators;

        if !c.feature_flags.is_module_enabled(company_id, MODULE_KEY).await? {
            debug!(company = %company_id, module = MODULE_KEY, "module disabled; nothing to evaluate");
            return Ok(Evaluation::disabled());
        }

        let company_hours = match c.directory.daily_operating_hours(company_id).await {
            Ok(hours) => hours,
            Err(StoreError::Malformed(msg)) => {
                warn!(company = %company_id, error = %msg, "unreadable daily operating hours; using default");
                None
            }
            Err(e) => return Err(e.into()),
        };
        let settings = self.config.forecast_settings(company_hours);
        let classifier = self.config.classifier();
        let window_start = now - self.config.observation_window();

        let listing = c.components.list_components(company_id).await?;
        let mut alerts = Vec::new();
        let mut warnings = Vec::with_capacity(listing.rejected.len());

        for rejected in listing.rejected {
            warn!(company = %company_id, component = %rejected.component_id, reason = %rejected.message, "skipping unreadable component");
            warnings.push(rejected);
        }

        for component in &listing.components {
            let mut skip = |message: String| {
                warn!(company = %company_id, component = %component.id, reason = %message, "skipping component");
                warnings.push(ComponentWarning::for_component(component, message));
            };

            let Some(item_id) = component.inventory_item_id else {
                skip("no linked inventory item".to_string());
                continue;
            };

            let stock = match c.inventory.stock_level(company_id, item_id).await {
                Ok(Some(stock)) => stock,
                Ok(None) => {
                    skip(format!("inventory item {item_id} not found"));
                    continue;
                }
                Err(StoreError::Malformed(msg)) => {
                    skip(msg);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let failures = match c
                .work_orders
                .closed_corrective_work_orders(company_id, component.id, window_start)
                .await
            {
                Ok(failures) => failures,
                Err(StoreError::Malformed(msg)) => {
                    skip(msg);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let evaluation =
                match evaluate_component(&classifier, component, &failures, &stock, settings, window_start, now) {
                    Ok(evaluation) => evaluation,
                    Err(e) => {
                        skip(e.to_string());
                        continue;
                    }
                };

            if evaluation.forecast.is_none() {
                info!(company = %company_id, component = %component.id, "no MTBF or maintenance interval; time-based alerts suppressed");
            }
            alerts.extend(evaluation.alert);
        }

        sort_alerts(&mut alerts);
        Ok(Evaluation {
            module_enabled: true,
            alerts,
            warnings,
        })
    }
}

struct Evaluation {
    module_enabled: bool,
    alerts: Vec<MaintenanceAlert>,
    warnings: Vec<ComponentWarning>,
}

impl Evaluation {
    fn disabled() -> Self {
        Self {
            module_enabled: false,
            alerts: vec![],
            warnings: vec![],
        }
    }
}

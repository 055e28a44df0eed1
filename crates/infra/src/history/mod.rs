//! Alert history persistence (open → resolved lifecycle).

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use forgecmms_core::{AlertId, CompanyId, ComponentId, UserId, WorkOrderId};
use forgecmms_predictive::{AlertKey, HistoryRecord, MaintenanceAlert, UpsertOutcome};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryAlertHistoryStore;
pub use postgres::PostgresAlertHistoryStore;

/// History store error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryStoreError {
    #[error("alert history record not found: {0}")]
    NotFound(AlertId),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Tenant-scoped store of alert history records.
///
/// Implementations must guarantee at most one open record per
/// `(company, component, alert type)` even under overlapping invocations;
/// callers rely on idempotency, not on locks.
#[async_trait]
pub trait AlertHistoryStore: Send + Sync {
    /// Atomically find-or-create the open record for the alert's
    /// `(component, type)`: refresh it if present, insert it otherwise.
    async fn upsert_open(
        &self,
        company_id: CompanyId,
        alert: &MaintenanceAlert,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, HistoryStoreError>;

    /// Resolve a record. Resolving an already-resolved record is a no-op
    /// that returns the stored record unchanged.
    async fn resolve(
        &self,
        company_id: CompanyId,
        id: AlertId,
        resolved_by: UserId,
        linked_work_order_id: Option<WorkOrderId>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, HistoryStoreError>;

    /// Resolve every open record of the company whose key is not in `active`,
    /// with notes [`CONDITION_CLEARED`](forgecmms_predictive::CONDITION_CLEARED).
    /// Records of components in `retained` (not evaluated this run) stay open.
    /// Returns how many records were closed.
    async fn close_stale(
        &self,
        company_id: CompanyId,
        active: &HashSet<AlertKey>,
        retained: &HashSet<ComponentId>,
        now: DateTime<Utc>,
    ) -> Result<usize, HistoryStoreError>;

    async fn get(&self, company_id: CompanyId, id: AlertId) -> Result<Option<HistoryRecord>, HistoryStoreError>;

    async fn list_open(&self, company_id: CompanyId) -> Result<Vec<HistoryRecord>, HistoryStoreError>;

    /// Records opened or resolved at or after `since`.
    async fn list_since(
        &self,
        company_id: CompanyId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, HistoryStoreError>;
}

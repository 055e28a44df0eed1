//! Postgres-backed alert history store.
//!
//! Table: `maintenance_alert_history` (see `migrations/0001_maintenance_alert_history.sql`).
//! A partial unique index on `(company_id, component_id, alert_type) WHERE status = 'OPEN'`
//! enforces "at most one open record per condition"; `upsert_open` leans on it
//! through `ON CONFLICT`, so concurrent syncs of the same company cannot create
//! duplicates.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | HistoryStoreError |
//! |------------|----------------------|-------------------|
//! | Database (unique violation) | `23505` | `Storage` (conflict) |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / Io / other | N/A | `Storage` |

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use forgecmms_core::{AlertId, CompanyId, ComponentId, UserId, WorkOrderId};
use forgecmms_predictive::{
    AlertKey, AlertStatus, AlertType, CONDITION_CLEARED, HistoryRecord, MaintenanceAlert, Severity,
    UpsertOutcome, history::snapshot_of,
};

use super::{AlertHistoryStore, HistoryStoreError};

const COLUMNS: &str = "id, company_id, component_id, alert_type, severity, status, opened_at, \
    last_seen_at, resolved_at, resolved_by, linked_work_order_id, resolution_notes, occurrences, snapshot";

#[derive(Debug, Clone)]
pub struct PostgresAlertHistoryStore {
    pool: Arc<PgPool>,
}

impl PostgresAlertHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    async fn fetch_by_id(&self, id: AlertId) -> Result<Option<HistoryRecord>, HistoryStoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM maintenance_alert_history WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_by_id", e))?;

        row.map(|r| decode(&r)).transpose()
    }
}

#[async_trait]
impl AlertHistoryStore for PostgresAlertHistoryStore {
    #[instrument(
        skip(self, alert),
        fields(company_id = %company_id, component_id = %alert.component_id, alert_type = %alert.alert_type),
        err
    )]
    async fn upsert_open(
        &self,
        company_id: CompanyId,
        alert: &MaintenanceAlert,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, HistoryStoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO maintenance_alert_history (
                id, company_id, component_id, alert_type, severity, status,
                opened_at, last_seen_at, occurrences, snapshot
            )
            VALUES ($1, $2, $3, $4, $5, 'OPEN', $6, $6, 1, $7)
            ON CONFLICT (company_id, component_id, alert_type) WHERE status = 'OPEN'
            DO UPDATE SET
                last_seen_at = EXCLUDED.last_seen_at,
                severity = EXCLUDED.severity,
                snapshot = EXCLUDED.snapshot,
                occurrences = maintenance_alert_history.occurrences + 1
            RETURNING {COLUMNS}, (xmax = 0) AS inserted
            "#
        ))
        .bind(AlertId::new().as_uuid())
        .bind(company_id.as_uuid())
        .bind(alert.component_id.as_uuid())
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(now)
        .bind(snapshot_of(alert))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_open", e))?;

        let inserted: bool = row
            .try_get("inserted")
            .map_err(|e| HistoryStoreError::Storage(format!("failed to read inserted flag: {e}")))?;
        let record = decode(&row)?;

        Ok(if inserted {
            UpsertOutcome::Created(record)
        } else {
            UpsertOutcome::Refreshed(record)
        })
    }

    #[instrument(skip(self, notes), fields(company_id = %company_id, alert_id = %id), err)]
    async fn resolve(
        &self,
        company_id: CompanyId,
        id: AlertId,
        resolved_by: UserId,
        linked_work_order_id: Option<WorkOrderId>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, HistoryStoreError> {
        let updated = sqlx::query(&format!(
            r#"
            UPDATE maintenance_alert_history
            SET status = 'RESOLVED',
                resolved_at = $3,
                resolved_by = $4,
                linked_work_order_id = $5,
                resolution_notes = $6
            WHERE id = $1 AND company_id = $2 AND status = 'OPEN'
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(company_id.as_uuid())
        .bind(now)
        .bind(resolved_by.as_uuid())
        .bind(linked_work_order_id.map(|w| *w.as_uuid()))
        .bind(notes)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("resolve", e))?;

        if let Some(row) = updated {
            return decode(&row);
        }

        // Nothing updated: already resolved, another tenant's record, or unknown id.
        match self.fetch_by_id(id).await? {
            Some(existing) if existing.company_id == company_id => Ok(existing),
            Some(_) => Err(HistoryStoreError::TenantIsolation(format!(
                "alert {id} does not belong to company {company_id}"
            ))),
            None => Err(HistoryStoreError::NotFound(id)),
        }
    }

    #[instrument(
        skip(self, active, retained),
        fields(company_id = %company_id, active = active.len(), retained = retained.len()),
        err
    )]
    async fn close_stale(
        &self,
        company_id: CompanyId,
        active: &HashSet<AlertKey>,
        retained: &HashSet<ComponentId>,
        now: DateTime<Utc>,
    ) -> Result<usize, HistoryStoreError> {
        let (component_ids, alert_types): (Vec<uuid::Uuid>, Vec<String>) = active
            .iter()
            .map(|k| (*k.component_id.as_uuid(), k.alert_type.as_str().to_string()))
            .unzip();
        let retained_ids: Vec<uuid::Uuid> = retained.iter().map(|id| *id.as_uuid()).collect();

        let result = sqlx::query(
            r#"
            UPDATE maintenance_alert_history h
            SET status = 'RESOLVED',
                resolved_at = $2,
                resolution_notes = $3
            WHERE h.company_id = $1
              AND h.status = 'OPEN'
              AND NOT (h.component_id = ANY($6::uuid[]))
              AND NOT EXISTS (
                  SELECT 1
                  FROM UNNEST($4::uuid[], $5::text[]) AS a(component_id, alert_type)
                  WHERE a.component_id = h.component_id AND a.alert_type = h.alert_type
              )
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(now)
        .bind(CONDITION_CLEARED)
        .bind(component_ids)
        .bind(alert_types)
        .bind(retained_ids)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("close_stale", e))?;

        Ok(result.rows_affected() as usize)
    }

    #[instrument(skip(self), fields(company_id = %company_id, alert_id = %id), err)]
    async fn get(&self, company_id: CompanyId, id: AlertId) -> Result<Option<HistoryRecord>, HistoryStoreError> {
        match self.fetch_by_id(id).await? {
            Some(r) if r.company_id == company_id => Ok(Some(r)),
            Some(_) => Err(HistoryStoreError::TenantIsolation(format!(
                "alert {id} does not belong to company {company_id}"
            ))),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn list_open(&self, company_id: CompanyId) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM maintenance_alert_history
            WHERE company_id = $1 AND status = 'OPEN'
            ORDER BY CASE severity WHEN 'CRITICAL' THEN 0 WHEN 'WARNING' THEN 1 ELSE 2 END, opened_at
            "#
        ))
        .bind(company_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_open", e))?;

        rows.iter().map(decode).collect()
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn list_since(
        &self,
        company_id: CompanyId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM maintenance_alert_history
            WHERE company_id = $1 AND (opened_at >= $2 OR resolved_at >= $2)
            ORDER BY opened_at
            "#
        ))
        .bind(company_id.as_uuid())
        .bind(since)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_since", e))?;

        rows.iter().map(decode).collect()
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<HistoryRecord, HistoryStoreError> {
    HistoryRow::from_row(row)
        .map_err(|e| HistoryStoreError::Storage(format!("failed to deserialize alert history row: {e}")))?
        .try_into()
}

/// Map SQLx errors to HistoryStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> HistoryStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => HistoryStoreError::Storage(format!("conflict: {msg}")),
                _ => HistoryStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            HistoryStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => HistoryStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct HistoryRow {
    id: uuid::Uuid,
    company_id: uuid::Uuid,
    component_id: uuid::Uuid,
    alert_type: String,
    severity: String,
    status: String,
    opened_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    resolved_by: Option<uuid::Uuid>,
    linked_work_order_id: Option<uuid::Uuid>,
    resolution_notes: Option<String>,
    occurrences: i32,
    snapshot: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for HistoryRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(HistoryRow {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            component_id: row.try_get("component_id")?,
            alert_type: row.try_get("alert_type")?,
            severity: row.try_get("severity")?,
            status: row.try_get("status")?,
            opened_at: row.try_get("opened_at")?,
            last_seen_at: row.try_get("last_seen_at")?,
            resolved_at: row.try_get("resolved_at")?,
            resolved_by: row.try_get("resolved_by")?,
            linked_work_order_id: row.try_get("linked_work_order_id")?,
            resolution_notes: row.try_get("resolution_notes")?,
            occurrences: row.try_get("occurrences")?,
            snapshot: row.try_get("snapshot")?,
        })
    }
}

impl TryFrom<HistoryRow> for HistoryRecord {
    type Error = HistoryStoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let corrupt = |e: forgecmms_core::DomainError| HistoryStoreError::Storage(format!("corrupt alert history row {}: {e}", row.id));
        Ok(HistoryRecord {
            id: AlertId::from_uuid(row.id),
            company_id: CompanyId::from_uuid(row.company_id),
            component_id: ComponentId::from_uuid(row.component_id),
            alert_type: row.alert_type.parse::<AlertType>().map_err(corrupt)?,
            severity: row.severity.parse::<Severity>().map_err(corrupt)?,
            status: row.status.parse::<AlertStatus>().map_err(corrupt)?,
            opened_at: row.opened_at,
            last_seen_at: row.last_seen_at,
            resolved_at: row.resolved_at,
            resolved_by: row.resolved_by.map(UserId::from_uuid),
            linked_work_order_id: row.linked_work_order_id.map(WorkOrderId::from_uuid),
            resolution_notes: row.resolution_notes,
            occurrences: u32::try_from(row.occurrences).unwrap_or(0),
            snapshot: row.snapshot,
        })
    }
}

//! Postgres adapters for the collaborator ports.
//!
//! Reads the platform's own tables; nothing here writes. Every query is
//! scoped by `company_id`.
//!
//! | Port | Table | Columns read |
//! |------|-------|--------------|
//! | `CompanyDirectory` | `companies` | `id`, `daily_operating_hours`, `created_at` |
//! | `FeatureFlagStore` | `company_modules` | `company_id`, `module_key`, `enabled` |
//! | `ComponentStore` | `components` | `id`, `company_id`, `name`, `criticality`, `operating_hours`, `seeded_mtbf_hours`, `maintenance_interval_hours`, `operating_hours_at_last_maintenance`, `inventory_item_id`, `archived_at` |
//! | `WorkOrderStore` | `work_orders` | `id`, `company_id`, `component_id`, `kind`, `status`, `started_at`, `completed_at` |
//! | `InventoryStore` | `inventory_items` | `id`, `company_id`, `current_stock`, `minimum_stock`, `reorder_point`, `lead_time_days` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::{instrument, warn};

use forgecmms_core::{CompanyId, ComponentId, InventoryItemId, WorkOrderId};
use forgecmms_predictive::{Component, Criticality, StockLevel, WorkOrderRecord};

use crate::ports::{
    CompanyDirectory, ComponentListing, ComponentStore, ComponentWarning, FeatureFlagStore,
    InventoryStore, StoreError, WorkOrderStore,
};

/// All collaborator ports over one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresPlatform {
    pool: Arc<PgPool>,
}

impl PostgresPlatform {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl CompanyDirectory for PostgresPlatform {
    #[instrument(skip(self), err)]
    async fn list_companies(&self) -> Result<Vec<CompanyId>, StoreError> {
        let rows = sqlx::query("SELECT id FROM companies ORDER BY created_at, id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_companies", e))?;

        rows.iter()
            .map(|r| {
                r.try_get::<uuid::Uuid, _>("id")
                    .map(CompanyId::from_uuid)
                    .map_err(|e| StoreError::malformed(format!("company id: {e}")))
            })
            .collect()
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn daily_operating_hours(&self, company_id: CompanyId) -> Result<Option<f64>, StoreError> {
        let row = sqlx::query("SELECT daily_operating_hours FROM companies WHERE id = $1")
            .bind(company_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("daily_operating_hours", e))?;

        match row {
            Some(r) => r
                .try_get::<Option<f64>, _>("daily_operating_hours")
                .map_err(|e| StoreError::malformed(format!("daily_operating_hours: {e}"))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FeatureFlagStore for PostgresPlatform {
    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn is_module_enabled(&self, company_id: CompanyId, module: &str) -> Result<bool, StoreError> {
        let enabled: Option<bool> = sqlx::query_scalar(
            "SELECT enabled FROM company_modules WHERE company_id = $1 AND module_key = $2",
        )
        .bind(company_id.as_uuid())
        .bind(module)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("is_module_enabled", e))?;

        Ok(enabled.unwrap_or(false))
    }
}

#[async_trait]
impl ComponentStore for PostgresPlatform {
    /// Rows whose fields cannot be decoded are returned as rejected; a row
    /// without a readable id or name fails the whole listing.
    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn list_components(&self, company_id: CompanyId) -> Result<ComponentListing, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                name,
                criticality,
                operating_hours,
                seeded_mtbf_hours,
                maintenance_interval_hours,
                operating_hours_at_last_maintenance,
                inventory_item_id
            FROM components
            WHERE company_id = $1 AND archived_at IS NULL
            ORDER BY name, id
            "#,
        )
        .bind(company_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_components", e))?;

        let mut listing = ComponentListing::default();
        for row in &rows {
            let id: uuid::Uuid = row
                .try_get("id")
                .map_err(|e| StoreError::malformed(format!("component id: {e}")))?;
            let name: String = row
                .try_get("name")
                .map_err(|e| StoreError::malformed(format!("component {id} name: {e}")))?;

            match ComponentRow::from_row(row)
                .map_err(|e| StoreError::malformed(e.to_string()))
                .and_then(Component::try_from)
            {
                Ok(c) => listing.components.push(c),
                Err(e) => {
                    warn!(company_id = %company_id, component_id = %id, error = %e, "unreadable component row");
                    listing
                        .rejected
                        .push(ComponentWarning::new(ComponentId::from_uuid(id), name, e.to_string()));
                }
            }
        }
        Ok(listing)
    }
}

#[async_trait]
impl WorkOrderStore for PostgresPlatform {
    #[instrument(skip(self), fields(company_id = %company_id, component_id = %component_id), err)]
    async fn closed_corrective_work_orders(
        &self,
        company_id: CompanyId,
        component_id: ComponentId,
        since: DateTime<Utc>,
    ) -> Result<Vec<WorkOrderRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, started_at, completed_at
            FROM work_orders
            WHERE company_id = $1
              AND component_id = $2
              AND kind = 'CORRECTIVE'
              AND status = 'CLOSED'
              AND started_at IS NOT NULL
              AND completed_at >= $3
            ORDER BY completed_at
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(component_id.as_uuid())
        .bind(since)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("closed_corrective_work_orders", e))?;

        rows.iter()
            .map(|r| -> Result<WorkOrderRecord, sqlx::Error> {
                Ok(WorkOrderRecord {
                    id: WorkOrderId::from_uuid(r.try_get("id")?),
                    started_at: r.try_get("started_at")?,
                    completed_at: r.try_get("completed_at")?,
                })
            })
            .collect::<Result<_, _>>()
            .map_err(|e| StoreError::malformed(format!("work order row: {e}")))
    }
}

#[async_trait]
impl InventoryStore for PostgresPlatform {
    #[instrument(skip(self), fields(company_id = %company_id, item_id = %item_id), err)]
    async fn stock_level(
        &self,
        company_id: CompanyId,
        item_id: InventoryItemId,
    ) -> Result<Option<StockLevel>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT current_stock, minimum_stock, reorder_point, lead_time_days
            FROM inventory_items
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_level", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw = |col: &str| {
            row.try_get::<i64, _>(col)
                .map_err(|e| StoreError::malformed(format!("inventory item {item_id}: {col}: {e}")))
        };
        StockLevel::from_raw(
            raw("current_stock")?,
            raw("minimum_stock")?,
            raw("reorder_point")?,
            raw("lead_time_days")?,
        )
        .map(Some)
        .map_err(|e| StoreError::malformed(format!("inventory item {item_id}: {e}")))
    }
}

/// Connection-level failures make the collaborator unavailable; decode
/// failures mean the data is malformed.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::malformed(format!("decode error in {}: {}", operation, err))
        }
        sqlx::Error::Database(db_err) => {
            StoreError::unavailable(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::unavailable(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct ComponentRow {
    id: uuid::Uuid,
    name: String,
    criticality: String,
    operating_hours: f64,
    seeded_mtbf_hours: Option<f64>,
    maintenance_interval_hours: Option<f64>,
    operating_hours_at_last_maintenance: Option<f64>,
    inventory_item_id: Option<uuid::Uuid>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ComponentRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ComponentRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            criticality: row.try_get("criticality")?,
            operating_hours: row.try_get("operating_hours")?,
            seeded_mtbf_hours: row.try_get("seeded_mtbf_hours")?,
            maintenance_interval_hours: row.try_get("maintenance_interval_hours")?,
            operating_hours_at_last_maintenance: row.try_get("operating_hours_at_last_maintenance")?,
            inventory_item_id: row.try_get("inventory_item_id")?,
        })
    }
}

impl TryFrom<ComponentRow> for Component {
    type Error = StoreError;

    fn try_from(row: ComponentRow) -> Result<Self, Self::Error> {
        let criticality = row
            .criticality
            .parse::<Criticality>()
            .map_err(|e| StoreError::malformed(format!("component {}: {e}", row.id)))?;
        Ok(Component {
            id: ComponentId::from_uuid(row.id),
            name: row.name,
            criticality,
            operating_hours: row.operating_hours,
            seeded_mtbf_hours: row.seeded_mtbf_hours,
            maintenance_interval_hours: row.maintenance_interval_hours,
            operating_hours_at_last_maintenance: row.operating_hours_at_last_maintenance,
            inventory_item_id: row.inventory_item_id.map(InventoryItemId::from_uuid),
        })
    }
}

//! In-memory alert history store for tests/dev.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use forgecmms_core::{AlertId, CompanyId, ComponentId, UserId, WorkOrderId};
use forgecmms_predictive::{
    AlertKey, CONDITION_CLEARED, HistoryRecord, MaintenanceAlert, UpsertOutcome,
};

use super::{AlertHistoryStore, HistoryStoreError};

/// Each operation runs under a single write lock, which makes find-or-create
/// atomic across concurrent callers.
#[derive(Debug, Default)]
pub struct InMemoryAlertHistoryStore {
    inner: RwLock<HashMap<AlertId, HistoryRecord>>,
}

impl InMemoryAlertHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records of every tenant, oldest first.
    pub fn all(&self) -> Vec<HistoryRecord> {
        let mut records: Vec<HistoryRecord> = match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => return vec![],
        };
        records.sort_by_key(|r| (r.opened_at, r.id));
        records
    }

    fn poisoned() -> HistoryStoreError {
        HistoryStoreError::Storage("alert history lock poisoned".to_string())
    }
}

#[async_trait]
impl AlertHistoryStore for InMemoryAlertHistoryStore {
    async fn upsert_open(
        &self,
        company_id: CompanyId,
        alert: &MaintenanceAlert,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, HistoryStoreError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let key = AlertKey::of(alert);

        if let Some(existing) = map
            .values_mut()
            .find(|r| r.company_id == company_id && r.is_open() && r.key() == key)
        {
            existing.refresh(alert, now);
            return Ok(UpsertOutcome::Refreshed(existing.clone()));
        }

        let record = HistoryRecord::open(company_id, alert, now);
        map.insert(record.id, record.clone());
        Ok(UpsertOutcome::Created(record))
    }

    async fn resolve(
        &self,
        company_id: CompanyId,
        id: AlertId,
        resolved_by: UserId,
        linked_work_order_id: Option<WorkOrderId>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, HistoryStoreError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let record = map.get_mut(&id).ok_or(HistoryStoreError::NotFound(id))?;
        if record.company_id != company_id {
            return Err(HistoryStoreError::TenantIsolation(format!(
                "alert {id} does not belong to company {company_id}"
            )));
        }
        record.resolve(Some(resolved_by), linked_work_order_id, notes, now);
        Ok(record.clone())
    }

    async fn close_stale(
        &self,
        company_id: CompanyId,
        active: &HashSet<AlertKey>,
        retained: &HashSet<ComponentId>,
        now: DateTime<Utc>,
    ) -> Result<usize, HistoryStoreError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let closed = map
            .values_mut()
            .filter(|r| {
                r.company_id == company_id
                    && r.is_open()
                    && !active.contains(&r.key())
                    && !retained.contains(&r.component_id)
            })
            .map(|r| r.resolve(None, None, Some(CONDITION_CLEARED.to_string()), now))
            .filter(|changed| *changed)
            .count();
        Ok(closed)
    }

    async fn get(&self, company_id: CompanyId, id: AlertId) -> Result<Option<HistoryRecord>, HistoryStoreError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        match map.get(&id) {
            Some(r) if r.company_id == company_id => Ok(Some(r.clone())),
            Some(_) => Err(HistoryStoreError::TenantIsolation(format!(
                "alert {id} does not belong to company {company_id}"
            ))),
            None => Ok(None),
        }
    }

    async fn list_open(&self, company_id: CompanyId) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        let mut open: Vec<HistoryRecord> = map
            .values()
            .filter(|r| r.company_id == company_id && r.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.opened_at.cmp(&b.opened_at)));
        Ok(open)
    }

    async fn list_since(
        &self,
        company_id: CompanyId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(map
            .values()
            .filter(|r| {
                r.company_id == company_id
                    && (r.opened_at >= since || r.resolved_at.is_some_and(|at| at >= since))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
        use forgecmms_predictive::{
        AlertStatus, AlertType, Component, Criticality, ReliabilityMetrics, StockLevel,
        classify_component,
    };
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 2, 0, 0).unwrap()
    }

    fn alert_for(component_id: ComponentId, current_stock: u32) -> MaintenanceAlert {
        let c = Component {
            id: component_id,
            name: "Impeller".to_string(),
            criticality: Criticality::B,
            operating_hours: 0.0,
            seeded_mtbf_hours: None,
            maintenance_interval_hours: None,
            operating_hours_at_last_maintenance: None,
            inventory_item_id: None,
        };
        let stock = StockLevel {
            current_stock,
            minimum_stock: 1,
            reorder_point: 5,
            lead_time_days: 3,
        };
        let m = ReliabilityMetrics::compute(&c, &[], now(), now());
        classify_component(&c, &m, None, &stock, now()).unwrap()
    }

    #[tokio::test]
    async fn upsert_creates_then_refreshes() {
        let store = InMemoryAlertHistoryStore::new();
        let company = CompanyId::new();
        let alert = alert_for(ComponentId::new(), 2);

        let first = store.upsert_open(company, &alert, now()).await.unwrap();
        assert!(first.is_created());

        let later = now() + Duration::hours(24);
        let second = store.upsert_open(company, &alert, later).await.unwrap();
        assert!(!second.is_created());
        assert_eq!(second.record().id, first.record().id);
        assert_eq!(second.record().last_seen_at, later);
        assert_eq!(second.record().occurrences, 2);
        assert_eq!(store.all().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_leave_one_open_record() {
        let store = Arc::new(InMemoryAlertHistoryStore::new());
        let company = CompanyId::new();
        let alert = alert_for(ComponentId::new(), 2);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            let alert = alert.clone();
            tasks.spawn(async move { store.upsert_open(company, &alert, now()).await });
        }
        let mut created = 0;
        while let Some(res) = tasks.join_next().await {
            if res.unwrap().unwrap().is_created() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        let open = store.list_open(company).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].occurrences, 16);
    }

    #[tokio::test]
    async fn resolve_twice_is_a_no_op() {
        let store = InMemoryAlertHistoryStore::new();
        let company = CompanyId::new();
        let rec = store.upsert_open(company, &alert_for(ComponentId::new(), 2), now()).await.unwrap();
        let id = rec.record().id;
        let user = UserId::new();
        let wo = WorkOrderId::new();

        let resolved = store
            .resolve(company, id, user, Some(wo), Some("bearing replaced".into()), now())
            .await
            .unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.linked_work_order_id, Some(wo));

        let again = store
            .resolve(company, id, UserId::new(), None, None, now() + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(again, resolved);
    }

    #[tokio::test]
    async fn resolve_checks_tenant_and_existence() {
        let store = InMemoryAlertHistoryStore::new();
        let company = CompanyId::new();
        let rec = store.upsert_open(company, &alert_for(ComponentId::new(), 2), now()).await.unwrap();

        let err = store
            .resolve(CompanyId::new(), rec.record().id, UserId::new(), None, None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryStoreError::TenantIsolation(_)));

        let missing = AlertId::new();
        let err = store.resolve(company, missing, UserId::new(), None, None, now()).await.unwrap_err();
        assert_eq!(err, HistoryStoreError::NotFound(missing));
    }

    #[tokio::test]
    async fn close_stale_resolves_only_inactive_keys() {
        let store = InMemoryAlertHistoryStore::new();
        let company = CompanyId::new();
        let other_company = CompanyId::new();
        let keep = alert_for(ComponentId::new(), 2);
        let gone = alert_for(ComponentId::new(), 0);

        store.upsert_open(company, &keep, now()).await.unwrap();
        store.upsert_open(company, &gone, now()).await.unwrap();
        store.upsert_open(other_company, &gone, now()).await.unwrap();

        let active: HashSet<AlertKey> = [AlertKey::of(&keep)].into_iter().collect();
        let closed = store.close_stale(company, &active, &HashSet::new(), now()).await.unwrap();
        assert_eq!(closed, 1);

        let open = store.list_open(company).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].component_id, keep.component_id);

        let cleared: Vec<HistoryRecord> = store
            .all()
            .into_iter()
            .filter(|r| r.company_id == company && !r.is_open())
            .collect();
        assert_eq!(cleared[0].resolution_notes.as_deref(), Some(CONDITION_CLEARED));
        assert_eq!(cleared[0].resolved_by, None);

        // Other tenants are untouched.
        assert_eq!(store.list_open(other_company).await.unwrap().len(), 1);
        // A second pass finds nothing left to close.
        assert_eq!(store.close_stale(company, &active, &HashSet::new(), now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reopening_after_resolution_creates_a_new_record() {
        let store = InMemoryAlertHistoryStore::new();
        let company = CompanyId::new();
        let alert = alert_for(ComponentId::new(), 2);
        assert_eq!(alert.alert_type, AlertType::ReorderRecommended);

        let first = store.upsert_open(company, &alert, now()).await.unwrap();
        store.close_stale(company, &HashSet::new(), &HashSet::new(), now()).await.unwrap();
        let second = store.upsert_open(company, &alert, now() + Duration::days(1)).await.unwrap();

        assert!(second.is_created());
        assert_ne!(second.record().id, first.record().id);
        assert_eq!(store.all().len(), 2);
    }

    #[tokio::test]
    async fn close_stale_keeps_retained_components_open() {
        let store = InMemoryAlertHistoryStore::new();
        let company = CompanyId::new();
        let skipped = alert_for(ComponentId::new(), 2);
        let cleared = alert_for(ComponentId::new(), 2);
        store.upsert_open(company, &skipped, now()).await.unwrap();
        store.upsert_open(company, &cleared, now()).await.unwrap();

        let retained: HashSet<ComponentId> = [skipped.component_id].into_iter().collect();
        let closed = store.close_stale(company, &HashSet::new(), &retained, now()).await.unwrap();

        assert_eq!(closed, 1);
        let open = store.list_open(company).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].component_id, skipped.component_id);
    }
}

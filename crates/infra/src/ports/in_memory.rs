//! In-memory collaborator backend for tests/dev.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use forgecmms_core::{CompanyId, ComponentId, InventoryItemId};
use forgecmms_predictive::{Component, StockLevel, WorkOrderRecord};

use super::{
    CompanyDirectory, ComponentListing, ComponentStore, ComponentWarning, FeatureFlagStore,
    InventoryStore, StoreError, WorkOrderStore,
};

/// A collaborator that can be switched off to simulate an outage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    Components,
    WorkOrders,
    Inventory,
    FeatureFlags,
}

#[derive(Debug, Default)]
struct State {
    companies: Vec<CompanyId>,
    daily_hours: HashMap<CompanyId, f64>,
    modules: HashSet<(CompanyId, String)>,
    components: HashMap<CompanyId, Vec<Component>>,
    work_orders: HashMap<(CompanyId, ComponentId), Vec<WorkOrderRecord>>,
    stock: HashMap<(CompanyId, InventoryItemId), StockLevel>,
    outages: HashSet<(CompanyId, Dependency)>,
    latency: HashMap<CompanyId, Duration>,
    malformed_components: HashMap<(CompanyId, ComponentId), String>,
    malformed_stock: HashMap<(CompanyId, InventoryItemId), String>,
}

/// Every collaborator port backed by one tenant-keyed in-memory state.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    inner: RwLock<State>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self, f: impl FnOnce(&mut State)) {
        if let Ok(mut state) = self.inner.write() {
            f(&mut state);
        }
    }

    fn read<T>(&self, company_id: CompanyId, dep: Option<Dependency>, f: impl FnOnce(&State) -> T) -> Result<T, StoreError> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::unavailable("in-memory platform lock poisoned"))?;
        if let Some(dep) = dep {
            if state.outages.contains(&(company_id, dep)) {
                return Err(StoreError::unavailable(format!("{dep:?} store unreachable for company {company_id}")));
            }
        }
        Ok(f(&state))
    }

    pub fn add_company(&self, company_id: CompanyId) {
        self.write(|s| {
            if !s.companies.contains(&company_id) {
                s.companies.push(company_id);
            }
        });
    }

    pub fn set_daily_operating_hours(&self, company_id: CompanyId, hours: f64) {
        self.write(|s| {
            s.daily_hours.insert(company_id, hours);
        });
    }

    pub fn set_module_enabled(&self, company_id: CompanyId, module: &str, enabled: bool) {
        self.write(|s| {
            let key = (company_id, module.to_string());
            if enabled {
                s.modules.insert(key);
            } else {
                s.modules.remove(&key);
            }
        });
    }

    /// Insert or replace a component (matched by id).
    pub fn upsert_component(&self, company_id: CompanyId, component: Component) {
        self.write(|s| {
            let list = s.components.entry(company_id).or_default();
            match list.iter_mut().find(|c| c.id == component.id) {
                Some(existing) => *existing = component,
                None => list.push(component),
            }
        });
    }

    pub fn add_work_order(&self, company_id: CompanyId, component_id: ComponentId, record: WorkOrderRecord) {
        self.write(|s| {
            s.work_orders.entry((company_id, component_id)).or_default().push(record);
        });
    }

    pub fn set_stock(&self, company_id: CompanyId, item_id: InventoryItemId, stock: StockLevel) {
        self.write(|s| {
            s.stock.insert((company_id, item_id), stock);
        });
    }

    pub fn set_outage(&self, company_id: CompanyId, dependency: Dependency, down: bool) {
        self.write(|s| {
            if down {
                s.outages.insert((company_id, dependency));
            } else {
                s.outages.remove(&(company_id, dependency));
            }
        });
    }

    /// Make a component row undecodable (`Some(reason)`) or readable again (`None`).
    pub fn set_component_malformed(&self, company_id: CompanyId, component_id: ComponentId, reason: Option<&str>) {
        self.write(|s| match reason {
            Some(reason) => {
                s.malformed_components.insert((company_id, component_id), reason.to_string());
            }
            None => {
                s.malformed_components.remove(&(company_id, component_id));
            }
        });
    }

    /// Make an inventory row undecodable (`Some(reason)`) or readable again (`None`).
    pub fn set_stock_malformed(&self, company_id: CompanyId, item_id: InventoryItemId, reason: Option<&str>) {
        self.write(|s| match reason {
            Some(reason) => {
                s.malformed_stock.insert((company_id, item_id), reason.to_string());
            }
            None => {
                s.malformed_stock.remove(&(company_id, item_id));
            }
        });
    }

    /// Delay component listing for a company (slow tenant simulation).
    pub fn set_latency(&self, company_id: CompanyId, latency: Duration) {
        self.write(|s| {
            s.latency.insert(company_id, latency);
        });
    }
}

#[async_trait]
impl ComponentStore for InMemoryPlatform {
    async fn list_components(&self, company_id: CompanyId) -> Result<ComponentListing, StoreError> {
        let (listing, latency) = self.read(company_id, Some(Dependency::Components), |s| {
            let mut listing = ComponentListing::default();
            for component in s.components.get(&company_id).into_iter().flatten() {
                match s.malformed_components.get(&(company_id, component.id)) {
                    Some(reason) => listing
                        .rejected
                        .push(ComponentWarning::for_component(component, reason.clone())),
                    None => listing.components.push(component.clone()),
                }
            }
            (listing, s.latency.get(&company_id).copied())
        })?;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(listing)
    }
}

#[async_trait]
impl WorkOrderStore for InMemoryPlatform {
    async fn closed_corrective_work_orders(
        &self,
        company_id: CompanyId,
        component_id: ComponentId,
        since: DateTime<Utc>,
    ) -> Result<Vec<WorkOrderRecord>, StoreError> {
        self.read(company_id, Some(Dependency::WorkOrders), |s| {
            s.work_orders
                .get(&(company_id, component_id))
                .map(|records| {
                    records
                        .iter()
                        .filter(|r| r.completed_at >= since)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        })
    }
}

#[async_trait]
impl InventoryStore for InMemoryPlatform {
    async fn stock_level(
        &self,
        company_id: CompanyId,
        item_id: InventoryItemId,
    ) -> Result<Option<StockLevel>, StoreError> {
        self.read(company_id, Some(Dependency::Inventory), |s| {
            match s.malformed_stock.get(&(company_id, item_id)) {
                Some(reason) => Err(StoreError::malformed(format!("inventory item {item_id}: {reason}"))),
                None => Ok(s.stock.get(&(company_id, item_id)).copied()),
            }
        })?
    }
}

#[async_trait]
impl FeatureFlagStore for InMemoryPlatform {
    async fn is_module_enabled(&self, company_id: CompanyId, module: &str) -> Result<bool, StoreError> {
        self.read(company_id, Some(Dependency::FeatureFlags), |s| {
            s.modules.contains(&(company_id, module.to_string()))
        })
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryPlatform {
    async fn list_companies(&self) -> Result<Vec<CompanyId>, StoreError> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::unavailable("in-memory platform lock poisoned"))?;
        Ok(state.companies.clone())
    }

    async fn daily_operating_hours(&self, company_id: CompanyId) -> Result<Option<f64>, StoreError> {
        self.read(company_id, None, |s| s.daily_hours.get(&company_id).copied())
    }
}

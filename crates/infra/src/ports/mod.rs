//! Collaborator ports consumed by the alert engine.
//!
//! Components, work orders, inventory, feature flags and the company directory
//! are owned by the wider platform. The engine only reads them, through these
//! tenant-scoped async traits, so tests/dev can swap in [`InMemoryPlatform`]
//! and production uses the Postgres adapters.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use forgecmms_core::{CompanyId, ComponentId, InventoryItemId};
use forgecmms_predictive::{Component, StockLevel, WorkOrderRecord};

pub mod in_memory;

pub use in_memory::{Dependency, InMemoryPlatform};

/// Collaborator failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached; aborts the current tenant's run.
    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    /// A record was readable but invalid; skips the affected component.
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// A component left out of a run, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentWarning {
    pub component_id: ComponentId,
    pub component_name: String,
    pub message: String,
}

impl ComponentWarning {
    pub fn new(component_id: ComponentId, component_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component_id,
            component_name: component_name.into(),
            message: message.into(),
        }
    }

    pub fn for_component(component: &Component, message: impl Into<String>) -> Self {
        Self::new(component.id, component.name.clone(), message)
    }
}

/// Components of a company, split into readable ones and rows that exist but
/// could not be decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentListing {
    pub components: Vec<Component>,
    pub rejected: Vec<ComponentWarning>,
}

/// Tracked components of a company.
#[async_trait]
pub trait ComponentStore: Send + Sync {
    async fn list_components(&self, company_id: CompanyId) -> Result<ComponentListing, StoreError>;
}

/// Closed corrective work orders (failure history).
#[async_trait]
pub trait WorkOrderStore: Send + Sync {
    /// Closed corrective work orders for a component completed at or after `since`.
    async fn closed_corrective_work_orders(
        &self,
        company_id: CompanyId,
        component_id: ComponentId,
        since: DateTime<Utc>,
    ) -> Result<Vec<WorkOrderRecord>, StoreError>;
}

/// Spare-part stock levels.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// `Ok(None)` when the item does not exist for this company.
    async fn stock_level(
        &self,
        company_id: CompanyId,
        item_id: InventoryItemId,
    ) -> Result<Option<StockLevel>, StoreError>;
}

/// Per-company module switches. Looked up fresh on every run.
#[async_trait]
pub trait FeatureFlagStore: Send + Sync {
    async fn is_module_enabled(&self, company_id: CompanyId, module: &str) -> Result<bool, StoreError>;
}

/// Enumerates tenants.
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    async fn list_companies(&self) -> Result<Vec<CompanyId>, StoreError>;

    /// Company-configured operating hours per day, if any.
    async fn daily_operating_hours(&self, _company_id: CompanyId) -> Result<Option<f64>, StoreError> {
        Ok(None)
    }
}

/// The set of collaborators an engine reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub components: Arc<dyn ComponentStore>,
    pub work_orders: Arc<dyn WorkOrderStore>,
    pub inventory: Arc<dyn InventoryStore>,
    pub feature_flags: Arc<dyn FeatureFlagStore>,
    pub directory: Arc<dyn CompanyDirectory>,
}

impl Collaborators {
    /// Use one backend for every port.
    pub fn from_platform<P>(platform: Arc<P>) -> Self
    where
        P: ComponentStore + WorkOrderStore + InventoryStore + FeatureFlagStore + CompanyDirectory + 'static,
    {
        Self {
            components: platform.clone(),
            work_orders: platform.clone(),
            inventory: platform.clone(),
            feature_flags: platform.clone(),
            directory: platform,
        }
    }
}

impl core::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

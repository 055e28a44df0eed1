//! Infrastructure layer: collaborator adapters, alert history stores, the
//! alert engine and the batch orchestrator.

pub mod config;
pub mod engine;
pub mod history;
pub mod orchestrator;
pub mod ports;
pub mod postgres;

pub use config::EngineConfig;
pub use engine::{AlertReport, ComponentWarning, EngineError, PredictiveMaintenanceEngine, SyncOutcome};
pub use history::{AlertHistoryStore, HistoryStoreError, InMemoryAlertHistoryStore, PostgresAlertHistoryStore};
pub use orchestrator::{SyncBatchSummary, SyncOrchestrator, TenantSyncDetail, TenantSyncStatus};
pub use ports::{Collaborators, InMemoryPlatform, StoreError};
pub use postgres::PostgresPlatform;

//! `forgecmms-predictive`
//!
//! **Responsibility:** the predictive maintenance alert pipeline as pure,
//! deterministic domain logic (no IO, no storage, no clock reads).
//!
//! Pipeline, leaf-first:
//! - [`reliability`]: MTBF/MTTR from closed corrective work orders
//! - [`forecast`]: hours/days until the next maintenance is due
//! - [`stock`]: spare-parts sufficiency and the ordered alert decision table
//! - [`escalation`]: criticality-based severity bump, applied after the table
//! - [`alert`]: typed alerts with message/recommendation templates and ordering
//! - [`pipeline`]: the above chained for one component
//!
//! Persistence-facing types live in [`history`] (open/resolve lifecycle) and
//! [`trend`] (zero-filled day/severity series). Callers in `forgecmms-infra`
//! supply inputs and the current time.

pub mod alert;
pub mod component;
pub mod escalation;
pub mod forecast;
pub mod history;
pub mod pipeline;
pub mod reliability;
pub mod stock;
pub mod trend;

pub use alert::{
    AlertCounts, AlertSignals, AlertType, Classifier, MaintenanceAlert, Severity,
    classify_component, sort_alerts,
};
pub use component::{Component, Criticality, StockLevel, WorkOrderRecord};
pub use escalation::EscalationPolicy;
pub use forecast::{Forecast, ForecastBasis, ForecastSettings};
pub use history::{AlertKey, AlertStatus, CONDITION_CLEARED, HistoryRecord, UpsertOutcome};
pub use pipeline::{ComponentEvaluation, evaluate_component};
pub use reliability::{MtbfSource, ReliabilityMetrics};
pub use stock::{AlertOutcome, ClassificationInput, StockAssessment, StockStatus};
pub use trend::{TrendPoint, TrendSeries};

/// Feature-flag module key gating the whole pipeline per company.
pub const MODULE_KEY: &str = "PREDICTIVE_MAINTENANCE";

//! Persisted alert history: the open → resolved lifecycle.
//!
//! Stores (in-memory, Postgres) live in `forgecmms-infra`; this module holds
//! the record type and its state transitions so every store applies the same
//! rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use forgecmms_core::{AlertId, CompanyId, ComponentId, DomainError, UserId, WorkOrderId};

use crate::alert::{AlertType, MaintenanceAlert, Severity};

/// Resolution notes written by reconciliation when a condition disappears.
pub const CONDITION_CLEARED: &str = "condition cleared";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Open,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "OPEN",
            AlertStatus::Resolved => "RESOLVED",
        }
    }
}

impl core::str::FromStr for AlertStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(AlertStatus::Open),
            "RESOLVED" => Ok(AlertStatus::Resolved),
            other => Err(DomainError::validation(format!("unknown alert status: {other}"))),
        }
    }
}

/// Identity of an alert condition within a company.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertKey {
    pub component_id: ComponentId,
    pub alert_type: AlertType,
}

impl AlertKey {
    pub fn of(alert: &MaintenanceAlert) -> Self {
        Self {
            component_id: alert.component_id,
            alert_type: alert.alert_type,
        }
    }
}

/// One persisted alert condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: AlertId,
    pub company_id: CompanyId,
    pub component_id: ComponentId,
    pub alert_type: AlertType,
    /// Severity as of the latest sighting.
    pub severity: Severity,
    pub status: AlertStatus,
    pub opened_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// `None` for automatic resolution.
    pub resolved_by: Option<UserId>,
    pub linked_work_order_id: Option<WorkOrderId>,
    pub resolution_notes: Option<String>,
    /// Number of sync passes that observed the condition.
    pub occurrences: u32,
    /// Latest alert as JSON.
    pub snapshot: JsonValue,
}

impl HistoryRecord {
    /// New open record for a first detection.
    pub fn open(company_id: CompanyId, alert: &MaintenanceAlert, now: DateTime<Utc>) -> Self {
        Self {
            id: AlertId::new(),
            company_id,
            component_id: alert.component_id,
            alert_type: alert.alert_type,
            severity: alert.severity,
            status: AlertStatus::Open,
            opened_at: now,
            last_seen_at: now,
            resolved_at: None,
            resolved_by: None,
            linked_work_order_id: None,
            resolution_notes: None,
            occurrences: 1,
            snapshot: snapshot_of(alert),
        }
    }

    pub fn key(&self) -> AlertKey {
        AlertKey {
            component_id: self.component_id,
            alert_type: self.alert_type,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AlertStatus::Open
    }

    /// The condition was seen again.
    pub fn refresh(&mut self, alert: &MaintenanceAlert, now: DateTime<Utc>) {
        self.last_seen_at = now;
        self.severity = alert.severity;
        self.snapshot = snapshot_of(alert);
        self.occurrences = self.occurrences.saturating_add(1);
    }

    /// Resolve the record. Returns `false` (and changes nothing) if it was
    /// already resolved.
    pub fn resolve(
        &mut self,
        resolved_by: Option<UserId>,
        linked_work_order_id: Option<WorkOrderId>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(now);
        self.resolved_by = resolved_by;
        self.linked_work_order_id = linked_work_order_id;
        self.resolution_notes = notes;
        true
    }
}

/// Serialized alert; non-representable values degrade to `null`.
pub fn snapshot_of(alert: &MaintenanceAlert) -> JsonValue {
    serde_json::to_value(alert).unwrap_or(JsonValue::Null)
}

/// Result of an atomic find-or-create of an open record.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Created(HistoryRecord),
    Refreshed(HistoryRecord),
}

impl UpsertOutcome {
    pub fn record(&self) -> &HistoryRecord {
        match self {
            UpsertOutcome::Created(r) | UpsertOutcome::Refreshed(r) => r,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

//! Inputs to the pipeline: components, their spare-part stock and failure history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgecmms_core::{ComponentId, DomainError, DomainResult, InventoryItemId, WorkOrderId};

/// ISO-14224-style importance tier. `A` is the most critical.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criticality {
    A,
    B,
    C,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::A => "A",
            Criticality::B => "B",
            Criticality::C => "C",
        }
    }
}

impl core::str::FromStr for Criticality {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Criticality::A),
            "B" => Ok(Criticality::B),
            "C" => Ok(Criticality::C),
            other => Err(DomainError::validation(format!(
                "criticality must be one of A, B, C (got {other:?})"
            ))),
        }
    }
}

/// A tracked component as seen by the alert engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub criticality: Criticality,
    /// Operating-hours counter reading.
    pub operating_hours: f64,
    /// Manufacturer MTBF seeded at commissioning, used when no failures were observed.
    pub seeded_mtbf_hours: Option<f64>,
    /// Fixed preventive maintenance interval, authoritative over MTBF when set.
    pub maintenance_interval_hours: Option<f64>,
    /// Operating-hours reading when maintenance was last performed.
    pub operating_hours_at_last_maintenance: Option<f64>,
    pub inventory_item_id: Option<InventoryItemId>,
}

impl Component {
    /// Checks the fields the pipeline relies on.
    pub fn validate(&self) -> DomainResult<()> {
        if !(self.operating_hours.is_finite() && self.operating_hours >= 0.0) {
            return Err(DomainError::validation(format!(
                "component {}: operating hours must be a non-negative number",
                self.id
            )));
        }
        for (field, value) in [
            ("seeded MTBF", self.seeded_mtbf_hours),
            ("maintenance interval", self.maintenance_interval_hours),
            ("operating hours at last maintenance", self.operating_hours_at_last_maintenance),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(DomainError::validation(format!(
                        "component {}: {field} must be a non-negative number",
                        self.id
                    )));
                }
            }
        }
        if let Some(at_last) = self.operating_hours_at_last_maintenance {
            if at_last > self.operating_hours {
                return Err(DomainError::validation(format!(
                    "component {}: operating hours at last maintenance ({at_last}) exceed the current reading ({})",
                    self.id, self.operating_hours
                )));
            }
        }
        Ok(())
    }
}

/// Spare-part stock for the inventory item linked to a component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub current_stock: u32,
    pub minimum_stock: u32,
    pub reorder_point: u32,
    pub lead_time_days: u32,
}

impl StockLevel {
    /// Build a stock level from raw storage values, rejecting negatives.
    pub fn from_raw(
        current_stock: i64,
        minimum_stock: i64,
        reorder_point: i64,
        lead_time_days: i64,
    ) -> DomainResult<Self> {
        let field = |name: &str, v: i64| {
            u32::try_from(v).map_err(|_| {
                DomainError::validation(format!("{name} must be a non-negative integer (got {v})"))
            })
        };
        Ok(Self {
            current_stock: field("current stock", current_stock)?,
            minimum_stock: field("minimum stock", minimum_stock)?,
            reorder_point: field("reorder point", reorder_point)?,
            lead_time_days: field("lead time days", lead_time_days)?,
        })
    }
}

/// A closed corrective work order (one failure event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderRecord {
    pub id: WorkOrderId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component() -> Component {
        Component {
            id: ComponentId::new(),
            name: "Main bearing".to_string(),
            criticality: Criticality::B,
            operating_hours: 100.0,
            seeded_mtbf_hours: None,
            maintenance_interval_hours: None,
            operating_hours_at_last_maintenance: None,
            inventory_item_id: None,
        }
    }

    #[test]
    fn stock_level_rejects_negative_fields() {
        let err = StockLevel::from_raw(3, -1, 5, 2).unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("minimum stock")));
        assert!(StockLevel::from_raw(0, 0, 0, 0).is_ok());
    }

    #[test]
    fn criticality_parses_case_insensitively() {
        assert_eq!("a".parse::<Criticality>().unwrap(), Criticality::A);
        assert_eq!(" C ".parse::<Criticality>().unwrap(), Criticality::C);
        assert!("D".parse::<Criticality>().is_err());
    }

    #[test]
    fn component_rejects_negative_hours() {
        let mut c = component();
        assert!(c.validate().is_ok());
        c.operating_hours = -1.0;
        assert!(c.validate().is_err());

        let mut c = component();
        c.maintenance_interval_hours = Some(f64::NAN);
        assert!(c.validate().is_err());
    }

    #[test]
    fn component_rejects_last_maintenance_beyond_counter() {
        let mut c = component();
        c.maintenance_interval_hours = Some(500.0);
        c.operating_hours_at_last_maintenance = Some(100.0);
        assert!(c.validate().is_ok());

        // Counter reset after the last service.
        c.operating_hours_at_last_maintenance = Some(150.0);
        let err = c.validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("last maintenance")));
    }
}

//! One component through reliability → forecast → stock → classification.

use chrono::{DateTime, Utc};

use forgecmms_core::DomainResult;

use crate::alert::{Classifier, MaintenanceAlert};
use crate::component::{Component, StockLevel, WorkOrderRecord};
use crate::forecast::{Forecast, ForecastSettings};
use crate::reliability::ReliabilityMetrics;

/// Everything computed for a component during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEvaluation {
    pub reliability: ReliabilityMetrics,
    /// `None` when neither an interval nor an MTBF is known.
    pub forecast: Option<Forecast>,
    pub alert: Option<MaintenanceAlert>,
}

/// Run the full pipeline for a single component.
///
/// Fails only on malformed component data; an unknown forecast is reported
/// through `forecast == None`, not as an error.
pub fn evaluate_component(
    classifier: &Classifier,
    component: &Component,
    failures: &[WorkOrderRecord],
    stock: &StockLevel,
    settings: ForecastSettings,
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DomainResult<ComponentEvaluation> {
    component.validate()?;

    let reliability = ReliabilityMetrics::compute(component, failures, window_start, now);
    let forecast = Forecast::project(component, &reliability, settings);
    let alert = classifier.classify(component, &reliability, forecast.as_ref(), stock, now);

    Ok(ComponentEvaluation {
        reliability,
        forecast,
        alert,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertType;
    use crate::component::Criticality;
    use chrono::{Duration, TimeZone};
    use forgecmms_core::{ComponentId, WorkOrderId};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap()
    }

    fn component(operating_hours: f64) -> Component {
        Component {
            id: ComponentId::new(),
            name: "Conveyor motor".to_string(),
            criticality: Criticality::B,
            operating_hours,
            seeded_mtbf_hours: None,
            maintenance_interval_hours: None,
            operating_hours_at_last_maintenance: None,
            inventory_item_id: None,
        }
    }

    fn stock() -> StockLevel {
        StockLevel {
            current_stock: 1,
            minimum_stock: 2,
            reorder_point: 4,
            lead_time_days: 14,
        }
    }

    #[test]
    fn zero_failures_never_produce_time_gated_alerts() {
        let eval = evaluate_component(
            &Classifier::default(),
            &component(700.0),
            &[],
            &stock(),
            ForecastSettings::default(),
            now() - Duration::days(365),
            now(),
        )
        .unwrap();

        assert_eq!(eval.reliability.mtbf_hours, None);
        assert!(eval.forecast.is_none());
        let alert = eval.alert.unwrap();
        assert!(!alert.alert_type.requires_forecast());
    }

    #[test]
    fn failures_drive_an_urgent_alert() {
        // 2 failures over 1500 h -> MTBF 750 h, already passed by the hour counter.
        let failures: Vec<WorkOrderRecord> = (1..=2)
            .map(|i| WorkOrderRecord {
                id: WorkOrderId::new(),
                started_at: now() - Duration::days(i * 30),
                completed_at: now() - Duration::days(i * 30) + Duration::hours(3),
            })
            .collect();
        let c = component(1500.0);

        let eval = evaluate_component(
            &Classifier::default(),
            &c,
            &failures,
            &stock(),
            ForecastSettings::default(),
            now() - Duration::days(365),
            now(),
        )
        .unwrap();

        assert_eq!(eval.reliability.mtbf_hours, Some(750.0));
        assert_eq!(eval.reliability.mttr_hours, Some(3.0));
        let forecast = eval.forecast.unwrap();
        assert!(forecast.overdue);
        assert_eq!(eval.alert.unwrap().alert_type, AlertType::UrgentMtbf);
    }

    #[test]
    fn malformed_component_is_rejected() {
        let err = evaluate_component(
            &Classifier::default(),
            &component(-5.0),
            &[],
            &stock(),
            ForecastSettings::default(),
            now() - Duration::days(365),
            now(),
        );
        assert!(err.is_err());
    }
}

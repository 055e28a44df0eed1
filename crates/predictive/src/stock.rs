//! Spare-parts cross-reference and the ordered alert decision table.

use serde::{Deserialize, Serialize};

use crate::alert::{AlertType, Severity};
use crate::component::{Criticality, StockLevel};
use crate::forecast::Forecast;

/// Sufficiency of the spare-part stock for a component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Critical,
    Low,
    Sufficient,
}

impl StockStatus {
    pub fn of(stock: &StockLevel) -> Self {
        if stock.current_stock == 0 || stock.current_stock < stock.minimum_stock {
            StockStatus::Critical
        } else if stock.current_stock < stock.reorder_point {
            StockStatus::Low
        } else {
            StockStatus::Sufficient
        }
    }

    /// `Low` or worse.
    pub fn is_below_reorder(&self) -> bool {
        *self != StockStatus::Sufficient
    }
}

/// Stock evaluated against the forecast.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAssessment {
    pub status: StockStatus,
    /// `lead_time_days > days_until_maintenance`; `None` without a forecast.
    pub lead_time_exceeded: Option<bool>,
}

impl StockAssessment {
    pub fn assess(stock: &StockLevel, forecast: Option<&Forecast>) -> Self {
        Self {
            status: StockStatus::of(stock),
            lead_time_exceeded: forecast
                .map(|f| f64::from(stock.lead_time_days) > f.days_until_maintenance),
        }
    }
}

/// Everything the decision table looks at.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClassificationInput {
    pub stock_status: StockStatus,
    pub current_stock: u32,
    pub criticality: Criticality,
    pub days_until_maintenance: Option<f64>,
    pub lead_time_exceeded: Option<bool>,
}

impl ClassificationInput {
    pub fn new(
        criticality: Criticality,
        stock: &StockLevel,
        assessment: &StockAssessment,
        forecast: Option<&Forecast>,
    ) -> Self {
        Self {
            stock_status: assessment.status,
            current_stock: stock.current_stock,
            criticality,
            days_until_maintenance: forecast.map(|f| f.days_until_maintenance),
            lead_time_exceeded: assessment.lead_time_exceeded,
        }
    }

    fn due_within(&self, days: f64) -> bool {
        self.days_until_maintenance.is_some_and(|d| d <= days)
    }
}

/// Base classification produced by a rule, before criticality escalation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AlertOutcome {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub priority: u8,
    /// Whether the escalation policy may bump this outcome's severity.
    pub escalable: bool,
}

/// One row of the decision table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&ClassificationInput) -> bool,
    pub outcome: AlertOutcome,
}

fn urgent(i: &ClassificationInput) -> bool {
    i.stock_status == StockStatus::Critical && i.due_within(7.0)
}

fn lead_time(i: &ClassificationInput) -> bool {
    i.lead_time_exceeded == Some(true) && i.stock_status != StockStatus::Sufficient
}

fn stock_out_critical(i: &ClassificationInput) -> bool {
    i.current_stock == 0 && i.criticality == Criticality::A
}

// Rules 4 and 5 treat critical stock as at least low: critical stock that
// misses the 7-day gate must still warn.
fn warning(i: &ClassificationInput) -> bool {
    i.stock_status.is_below_reorder() && i.due_within(30.0)
}

fn reorder(i: &ClassificationInput) -> bool {
    i.stock_status.is_below_reorder()
}

/// Evaluated top-down; the first matching rule wins. No match means no alert.
///
/// A stock-out on a criticality-A component is the most specific condition and
/// is checked first; the three critical rules share severity and priority, so
/// the order only decides which type is reported.
pub const DECISION_TABLE: [Rule; 5] = [
    Rule {
        name: "stock out on criticality A",
        applies: stock_out_critical,
        outcome: AlertOutcome {
            alert_type: AlertType::StockOutCritical,
            severity: Severity::Critical,
            priority: 1,
            escalable: false,
        },
    },
    Rule {
        name: "critical stock due within 7 days",
        applies: urgent,
        outcome: AlertOutcome {
            alert_type: AlertType::UrgentMtbf,
            severity: Severity::Critical,
            priority: 1,
            escalable: false,
        },
    },
    Rule {
        name: "lead time exceeds forecast with insufficient stock",
        applies: lead_time,
        outcome: AlertOutcome {
            alert_type: AlertType::LeadTimeExceeded,
            severity: Severity::Critical,
            priority: 1,
            escalable: false,
        },
    },
    Rule {
        name: "low stock due within 30 days",
        applies: warning,
        outcome: AlertOutcome {
            alert_type: AlertType::WarningMtbf,
            severity: Severity::Warning,
            priority: 2,
            escalable: false,
        },
    },
    Rule {
        name: "low stock",
        applies: reorder,
        outcome: AlertOutcome {
            alert_type: AlertType::ReorderRecommended,
            severity: Severity::Info,
            priority: 3,
            escalable: true,
        },
    },
];

/// First matching rule of [`DECISION_TABLE`].
pub fn evaluate(input: &ClassificationInput) -> Option<&'static Rule> {
    DECISION_TABLE.iter().find(|rule| (rule.applies)(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(current: u32, minimum: u32, reorder: u32, lead: u32) -> StockLevel {
        StockLevel {
            current_stock: current,
            minimum_stock: minimum,
            reorder_point: reorder,
            lead_time_days: lead,
        }
    }

    fn input(status: StockStatus, current: u32, crit: Criticality, days: Option<f64>, lead: Option<bool>) -> ClassificationInput {
        ClassificationInput {
            stock_status: status,
            current_stock: current,
            criticality: crit,
            days_until_maintenance: days,
            lead_time_exceeded: lead,
        }
    }

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(StockStatus::of(&stock(0, 0, 0, 0)), StockStatus::Critical);
        assert_eq!(StockStatus::of(&stock(4, 5, 10, 0)), StockStatus::Critical);
        assert_eq!(StockStatus::of(&stock(5, 5, 10, 0)), StockStatus::Low);
        assert_eq!(StockStatus::of(&stock(10, 5, 10, 0)), StockStatus::Sufficient);
    }

    #[test]
    fn lead_time_compares_against_forecast_days() {
        let s = stock(5, 1, 10, 10);
        let f = Forecast::from_hours(
            crate::forecast::ForecastBasis::Mtbf,
            20.0 * 24.0,
            Default::default(),
        );
        assert_eq!(StockAssessment::assess(&s, Some(&f)).lead_time_exceeded, Some(false));

        let f = Forecast::from_hours(crate::forecast::ForecastBasis::Mtbf, 5.0 * 24.0, Default::default());
        assert_eq!(StockAssessment::assess(&s, Some(&f)).lead_time_exceeded, Some(true));
        assert_eq!(StockAssessment::assess(&s, None).lead_time_exceeded, None);
    }

    #[test]
    fn rule_urgent_needs_both_time_pressure_and_critical_stock() {
        let rule = &DECISION_TABLE[1];
        assert!((rule.applies)(&input(StockStatus::Critical, 1, Criticality::C, Some(7.0), Some(false))));
        assert!(!(rule.applies)(&input(StockStatus::Critical, 1, Criticality::C, Some(7.5), Some(false))));
        assert!(!(rule.applies)(&input(StockStatus::Low, 1, Criticality::C, Some(1.0), Some(false))));
        assert!(!(rule.applies)(&input(StockStatus::Critical, 1, Criticality::C, None, None)));
    }

    #[test]
    fn rule_lead_time_ignores_sufficient_stock() {
        let rule = &DECISION_TABLE[2];
        assert!((rule.applies)(&input(StockStatus::Low, 3, Criticality::C, Some(2.0), Some(true))));
        assert!(!(rule.applies)(&input(StockStatus::Sufficient, 30, Criticality::A, Some(2.0), Some(true))));
    }

    #[test]
    fn rule_stock_out_only_for_criticality_a() {
        let rule = &DECISION_TABLE[0];
        assert!((rule.applies)(&input(StockStatus::Critical, 0, Criticality::A, None, None)));
        assert!(!(rule.applies)(&input(StockStatus::Critical, 0, Criticality::B, None, None)));
    }

    #[test]
    fn rule_warning_window_is_thirty_days() {
        let rule = &DECISION_TABLE[3];
        assert!((rule.applies)(&input(StockStatus::Low, 3, Criticality::B, Some(30.0), Some(false))));
        assert!(!(rule.applies)(&input(StockStatus::Low, 3, Criticality::B, Some(30.1), Some(false))));
        assert!((rule.applies)(&input(StockStatus::Critical, 3, Criticality::B, Some(12.0), Some(false))));
    }

    #[test]
    fn critical_stock_without_forecast_still_recommends_reorder() {
        let i = input(StockStatus::Critical, 2, Criticality::B, None, None);
        assert_eq!(evaluate(&i).unwrap().outcome.alert_type, AlertType::ReorderRecommended);
    }

    #[test]
    fn first_match_wins() {
        // Stock out on A due in 2 days: the stock-out rule outranks the 7-day gate.
        let i = input(StockStatus::Critical, 0, Criticality::A, Some(2.0), Some(true));
        assert_eq!(evaluate(&i).unwrap().outcome.alert_type, AlertType::StockOutCritical);

        // Critical but not empty, due in 3 days, lead time exceeded: urgent beats lead time.
        let i = input(StockStatus::Critical, 1, Criticality::A, Some(3.0), Some(true));
        assert_eq!(evaluate(&i).unwrap().outcome.alert_type, AlertType::UrgentMtbf);

        // Stock out on B, plenty of time, lead time exceeded: lead time rule.
        let i = input(StockStatus::Critical, 0, Criticality::B, Some(40.0), Some(true));
        assert_eq!(evaluate(&i).unwrap().outcome.alert_type, AlertType::LeadTimeExceeded);

        // Critical stock 20 days out with lead time inside the window: the
        // 7-day gate fails, so the 30-day warning applies.
        let i = input(StockStatus::Critical, 5, Criticality::B, Some(20.0), Some(false));
        assert_eq!(evaluate(&i).unwrap().outcome.alert_type, AlertType::WarningMtbf);
    }

    #[test]
    fn sufficient_stock_never_alerts() {
        let i = input(StockStatus::Sufficient, 50, Criticality::A, Some(0.0), Some(true));
        assert!(evaluate(&i).is_none());
    }
}

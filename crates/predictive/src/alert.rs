//! Alert classification: typed, severity-ranked alerts with message templates.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use forgecmms_core::{ComponentId, DomainError};

use crate::component::{Component, Criticality, StockLevel};
use crate::escalation::EscalationPolicy;
use crate::forecast::{Forecast, ForecastBasis};
use crate::reliability::{MtbfSource, ReliabilityMetrics};
use crate::stock::{self, ClassificationInput, StockAssessment, StockStatus};

/// Kind of maintenance alert.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    UrgentMtbf,
    LeadTimeExceeded,
    StockOutCritical,
    WarningMtbf,
    ReorderRecommended,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::UrgentMtbf => "URGENT_MTBF",
            AlertType::LeadTimeExceeded => "LEAD_TIME_EXCEEDED",
            AlertType::StockOutCritical => "STOCK_OUT_CRITICAL",
            AlertType::WarningMtbf => "WARNING_MTBF",
            AlertType::ReorderRecommended => "REORDER_RECOMMENDED",
        }
    }

    /// Whether this type can only be produced with a maintenance forecast.
    pub fn requires_forecast(&self) -> bool {
        matches!(
            self,
            AlertType::UrgentMtbf | AlertType::LeadTimeExceeded | AlertType::WarningMtbf
        )
    }
}

impl core::fmt::Display for AlertType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AlertType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "URGENT_MTBF" => Ok(AlertType::UrgentMtbf),
            "LEAD_TIME_EXCEEDED" => Ok(AlertType::LeadTimeExceeded),
            "STOCK_OUT_CRITICAL" => Ok(AlertType::StockOutCritical),
            "WARNING_MTBF" => Ok(AlertType::WarningMtbf),
            "REORDER_RECOMMENDED" => Ok(AlertType::ReorderRecommended),
            other => Err(DomainError::validation(format!("unknown alert type: {other}"))),
        }
    }
}

/// Alert severity. Ordered `Info < Warning < Critical`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }

    /// One step up, saturating at `Critical`.
    pub fn escalated(self) -> Self {
        match self {
            Severity::Info => Severity::Warning,
            Severity::Warning | Severity::Critical => Severity::Critical,
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Severity::Info),
            "WARNING" => Ok(Severity::Warning),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(DomainError::validation(format!("unknown severity: {other}"))),
        }
    }
}

/// The computed signals an alert was derived from (persisted as its snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSignals {
    pub criticality: Criticality,
    pub failure_count: usize,
    pub mtbf_hours: Option<f64>,
    pub mtbf_source: Option<MtbfSource>,
    pub mttr_hours: Option<f64>,
    pub forecast_basis: Option<ForecastBasis>,
    pub hours_until_maintenance: Option<f64>,
    pub days_until_maintenance: Option<f64>,
    pub overdue: bool,
    pub current_stock: u32,
    pub minimum_stock: u32,
    pub reorder_point: u32,
    pub lead_time_days: u32,
    pub stock_status: StockStatus,
    pub lead_time_exceeded: Option<bool>,
}

/// A transient alert, recomputed on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceAlert {
    pub component_id: ComponentId,
    pub component_name: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    /// 1 is the highest priority.
    pub priority: u8,
    pub message: String,
    pub recommendation: String,
    pub generated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub signals: AlertSignals,
}

impl MaintenanceAlert {
    pub fn days_until_maintenance(&self) -> Option<f64> {
        self.signals.days_until_maintenance
    }
}

/// Maps computed signals to an alert.
///
/// Deterministic: identical inputs (including `generated_at`) give identical alerts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    policy: EscalationPolicy,
    ttl: Option<Duration>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            policy: EscalationPolicy::default(),
            ttl: Some(Duration::hours(24)),
        }
    }
}

impl Classifier {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Alerts expire `ttl` after generation; `None` means they never expire.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn classify(
        &self,
        component: &Component,
        reliability: &ReliabilityMetrics,
        forecast: Option<&Forecast>,
        stock: &StockLevel,
        generated_at: DateTime<Utc>,
    ) -> Option<MaintenanceAlert> {
        let assessment = StockAssessment::assess(stock, forecast);
        let input = ClassificationInput::new(component.criticality, stock, &assessment, forecast);

        let rule = stock::evaluate(&input)?;
        let outcome = self.policy.apply(rule.outcome, component.criticality);

        let (message, recommendation) = render(outcome.alert_type, component, forecast, stock);

        Some(MaintenanceAlert {
            component_id: component.id,
            component_name: component.name.clone(),
            alert_type: outcome.alert_type,
            severity: outcome.severity,
            priority: outcome.priority,
            message,
            recommendation,
            generated_at,
            expires_at: self.ttl.map(|ttl| generated_at + ttl),
            signals: AlertSignals {
                criticality: component.criticality,
                failure_count: reliability.failure_count,
                mtbf_hours: reliability.mtbf_hours,
                mtbf_source: reliability.mtbf_source,
                mttr_hours: reliability.mttr_hours,
                forecast_basis: forecast.map(|f| f.basis),
                hours_until_maintenance: forecast.map(|f| f.hours_until_maintenance),
                days_until_maintenance: forecast.map(|f| f.days_until_maintenance),
                overdue: forecast.is_some_and(|f| f.overdue),
                current_stock: stock.current_stock,
                minimum_stock: stock.minimum_stock,
                reorder_point: stock.reorder_point,
                lead_time_days: stock.lead_time_days,
                stock_status: assessment.status,
                lead_time_exceeded: assessment.lead_time_exceeded,
            },
        })
    }
}

/// Convenience wrapper using the default classifier.
pub fn classify_component(
    component: &Component,
    reliability: &ReliabilityMetrics,
    forecast: Option<&Forecast>,
    stock: &StockLevel,
    generated_at: DateTime<Utc>,
) -> Option<MaintenanceAlert> {
    Classifier::default().classify(component, reliability, forecast, stock, generated_at)
}

fn due_phrase(forecast: Option<&Forecast>) -> String {
    match forecast {
        Some(f) if f.overdue => format!(
            "maintenance is overdue by {:.1} operating hours",
            -f.hours_until_maintenance
        ),
        Some(f) => format!("maintenance is due in {:.1} days", f.days_until_maintenance),
        None => "no maintenance forecast is available".to_string(),
    }
}

fn reorder_quantity(stock: &StockLevel) -> u32 {
    stock
        .reorder_point
        .saturating_sub(stock.current_stock)
        .max(stock.minimum_stock.saturating_sub(stock.current_stock))
        .max(1)
}

fn render(
    alert_type: AlertType,
    component: &Component,
    forecast: Option<&Forecast>,
    stock: &StockLevel,
) -> (String, String) {
    let name = &component.name;
    let due = due_phrase(forecast);
    let qty = reorder_quantity(stock);
    let lead = stock.lead_time_days;

    match alert_type {
        AlertType::StockOutCritical => (
            format!("{name}: no spare parts in stock for a criticality A component; {due}."),
            format!("Order {qty} unit(s) immediately; supplier lead time is {lead} days."),
        ),
        AlertType::UrgentMtbf => (
            format!(
                "{name}: {due} and spare-part stock is critical ({} in stock, minimum {}).",
                stock.current_stock, stock.minimum_stock
            ),
            format!("Expedite an order of {qty} unit(s) and schedule the maintenance now."),
        ),
        AlertType::LeadTimeExceeded => (
            format!(
                "{name}: supplier lead time of {lead} days exceeds the time left; {due} with {} in stock (reorder point {}).",
                stock.current_stock, stock.reorder_point
            ),
            format!("Place an order for {qty} unit(s) today or source an alternative supplier."),
        ),
        AlertType::WarningMtbf => (
            format!(
                "{name}: {due} and spare-part stock is low ({} in stock, reorder point {}).",
                stock.current_stock, stock.reorder_point
            ),
            format!("Reorder {qty} unit(s) before the maintenance window; supplier lead time is {lead} days."),
        ),
        AlertType::ReorderRecommended => (
            format!(
                "{name}: spare-part stock of {} is below the reorder point of {}.",
                stock.current_stock, stock.reorder_point
            ),
            format!("Reorder {qty} unit(s) to restore stock to the reorder point."),
        ),
    }
}

/// Sort by severity (critical first), then ascending days until maintenance
/// (unknown last), then component name and type for a stable order.
pub fn sort_alerts(alerts: &mut [MaintenanceAlert]) {
    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| match (a.days_until_maintenance(), b.days_until_maintenance()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => core::cmp::Ordering::Less,
                (None, Some(_)) => core::cmp::Ordering::Greater,
                (None, None) => core::cmp::Ordering::Equal,
            })
            .then_with(|| a.component_name.cmp(&b.component_name))
            .then_with(|| a.alert_type.cmp(&b.alert_type))
    });
}

/// Per-severity counts of an alert set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub total: usize,
}

impl AlertCounts {
    pub fn of(alerts: &[MaintenanceAlert]) -> Self {
        alerts.iter().fold(Self::default(), |mut acc, a| {
            match a.severity {
                Severity::Critical => acc.critical += 1,
                Severity::Warning => acc.warning += 1,
                Severity::Info => acc.info += 1,
            }
            acc.total += 1;
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastSettings;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 6, 0, 0).unwrap()
    }

    fn component(name: &str, criticality: Criticality, operating_hours: f64) -> Component {
        Component {
            id: ComponentId::new(),
            name: name.to_string(),
            criticality,
            operating_hours,
            seeded_mtbf_hours: None,
            maintenance_interval_hours: None,
            operating_hours_at_last_maintenance: None,
            inventory_item_id: None,
        }
    }

    fn metrics(mtbf: Option<f64>) -> ReliabilityMetrics {
        ReliabilityMetrics {
            failure_count: usize::from(mtbf.is_some()),
            observed_mtbf_hours: mtbf,
            mttr_hours: None,
            mtbf_hours: mtbf,
            mtbf_source: mtbf.map(|_| MtbfSource::Observed),
        }
    }

    fn stock(current: u32, minimum: u32, reorder: u32, lead: u32) -> StockLevel {
        StockLevel {
            current_stock: current,
            minimum_stock: minimum,
            reorder_point: reorder,
            lead_time_days: lead,
        }
    }

    fn forecast_days(days: f64) -> Forecast {
        Forecast::from_hours(ForecastBasis::Mtbf, days * 24.0, ForecastSettings::default())
    }

    #[test]
    fn scenario_stock_out_on_class_a() {
        let c = component("Compressor valve", Criticality::A, 950.0);
        let m = metrics(Some(1000.0));
        let f = Forecast::project(&c, &m, ForecastSettings::default()).unwrap();
        assert_eq!(f.hours_until_maintenance, 50.0);

        let alert = classify_component(&c, &m, Some(&f), &stock(0, 2, 4, 5), now()).unwrap();
        assert_eq!(alert.alert_type, AlertType::StockOutCritical);
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.priority, 1);
        assert!(alert.message.contains("due in 2.1 days"));
        assert_eq!(alert.expires_at, Some(now() + Duration::hours(24)));
    }

    #[test]
    fn scenario_seven_day_gate_decides_urgency() {
        let c = component("Drive belt", Criticality::B, 0.0);
        let f = forecast_days(20.0);
        let alert = classify_component(&c, &metrics(Some(480.0)), Some(&f), &stock(5, 10, 15, 10), now())
            .unwrap();
        assert_eq!(alert.signals.stock_status, StockStatus::Critical);
        assert_eq!(alert.signals.lead_time_exceeded, Some(false));
        assert_eq!(alert.alert_type, AlertType::WarningMtbf);
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.priority, 2);
    }

    #[test]
    fn reorder_severity_depends_on_criticality() {
        let f = forecast_days(90.0);
        for (crit, expected) in [
            (Criticality::A, Severity::Warning),
            (Criticality::B, Severity::Warning),
            (Criticality::C, Severity::Info),
        ] {
            let c = component("Filter", crit, 0.0);
            let alert = classify_component(&c, &metrics(Some(2160.0)), Some(&f), &stock(6, 2, 8, 3), now())
                .unwrap();
            assert_eq!(alert.alert_type, AlertType::ReorderRecommended);
            assert_eq!(alert.severity, expected);
            assert_eq!(alert.priority, 3);
            assert!(alert.recommendation.contains("Reorder 2 unit(s)"));
        }
    }

    #[test]
    fn without_forecast_only_stock_rules_fire() {
        let c = component("Seal kit", Criticality::B, 100.0);
        let alert = classify_component(&c, &metrics(None), None, &stock(1, 2, 5, 30), now()).unwrap();
        assert_eq!(alert.alert_type, AlertType::ReorderRecommended);
        assert!(!alert.alert_type.requires_forecast());
        assert!(alert.message.contains("below the reorder point"));
        assert_eq!(alert.signals.days_until_maintenance, None);
    }

    #[test]
    fn sufficient_stock_produces_no_alert() {
        let c = component("Coupling", Criticality::A, 990.0);
        let f = forecast_days(0.2);
        assert!(classify_component(&c, &metrics(Some(1000.0)), Some(&f), &stock(10, 2, 5, 30), now()).is_none());
    }

    #[test]
    fn overdue_message_mentions_overdue_hours() {
        let c = component("Spindle", Criticality::C, 1100.0);
        let m = metrics(Some(1000.0));
        let f = Forecast::project(&c, &m, ForecastSettings::default()).unwrap();
        let alert = classify_component(&c, &m, Some(&f), &stock(1, 2, 4, 1), now()).unwrap();
        assert_eq!(alert.alert_type, AlertType::UrgentMtbf);
        assert!(alert.message.contains("overdue by 100.0 operating hours"));
        assert_eq!(alert.signals.days_until_maintenance, Some(0.0));
        assert!(alert.signals.overdue);
    }

    #[test]
    fn sort_orders_by_severity_then_days() {
        let mk = |name: &str, crit, days: f64, s: StockLevel| {
            classify_component(&component(name, crit, 0.0), &metrics(Some(days * 24.0)), Some(&forecast_days(days)), &s, now())
                .unwrap()
        };
        let mut alerts = vec![
            mk("c-info", Criticality::C, 60.0, stock(3, 1, 5, 1)),
            mk("b-warning", Criticality::B, 25.0, stock(3, 1, 5, 1)),
            mk("a-critical-later", Criticality::A, 5.0, stock(0, 1, 5, 1)),
            mk("b-critical-sooner", Criticality::B, 1.0, stock(1, 2, 5, 1)),
        ];
        sort_alerts(&mut alerts);

        let names: Vec<&str> = alerts.iter().map(|a| a.component_name.as_str()).collect();
        assert_eq!(names, vec!["b-critical-sooner", "a-critical-later", "b-warning", "c-info"]);

        let counts = AlertCounts::of(&alerts);
        assert_eq!(counts, AlertCounts { critical: 2, warning: 1, info: 1, total: 4 });
    }

    #[test]
    fn alert_type_round_trips_through_str() {
        for t in [
            AlertType::UrgentMtbf,
            AlertType::LeadTimeExceeded,
            AlertType::StockOutCritical,
            AlertType::WarningMtbf,
            AlertType::ReorderRecommended,
        ] {
            assert_eq!(t.as_str().parse::<AlertType>().unwrap(), t);
        }
        assert!("PANIC".parse::<AlertType>().is_err());
    }

    proptest! {
        /// Property: classification is a pure function of its inputs.
        #[test]
        fn classification_is_deterministic(
            operating in 0.0f64..5_000.0,
            mtbf in 1.0f64..5_000.0,
            current in 0u32..20,
            minimum in 0u32..20,
            reorder in 0u32..30,
            lead in 0u32..60,
        ) {
            let c = component("Pump", Criticality::A, operating);
            let m = metrics(Some(mtbf));
            let f = Forecast::project(&c, &m, ForecastSettings::default());
            let s = stock(current, minimum, reorder, lead);

            let first = classify_component(&c, &m, f.as_ref(), &s, now());
            let second = classify_component(&c, &m, f.as_ref(), &s, now());
            prop_assert_eq!(first, second);
        }

        /// Property: critical precedes warning precedes info, ties by ascending days.
        #[test]
        fn sorted_alerts_respect_severity_order(
            specs in proptest::collection::vec((0u32..6, 0u32..4, 0.0f64..60.0), 1..12),
        ) {
            let mut alerts: Vec<MaintenanceAlert> = specs
                .iter()
                .enumerate()
                .filter_map(|(i, (current, crit, days))| {
                    let crit = match crit % 3 { 0 => Criticality::A, 1 => Criticality::B, _ => Criticality::C };
                    let c = component(&format!("c{i}"), crit, 0.0);
                    classify_component(&c, &metrics(Some(days * 24.0)), Some(&forecast_days(*days)), &stock(*current, 2, 6, 10), now())
                })
                .collect();
            sort_alerts(&mut alerts);

            for pair in alerts.windows(2) {
                prop_assert!(pair[0].severity >= pair[1].severity);
                if pair[0].severity == pair[1].severity {
                    let a = pair[0].days_until_maintenance().unwrap();
                    let b = pair[1].days_until_maintenance().unwrap();
                    prop_assert!(a <= b);
                }
            }
        }
    }
}

//! Forecast of the next maintenance due date.

use serde::{Deserialize, Serialize};

use forgecmms_core::{DomainError, DomainResult};

use crate::component::Component;
use crate::reliability::ReliabilityMetrics;

/// Default assumption: continuous operation.
pub const DEFAULT_DAILY_OPERATING_HOURS: f64 = 24.0;

/// Per-company forecast parameters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    daily_operating_hours: f64,
}

impl ForecastSettings {
    /// `daily_operating_hours` must lie in `(0, 24]`.
    pub fn new(daily_operating_hours: f64) -> DomainResult<Self> {
        if !(daily_operating_hours.is_finite()
            && daily_operating_hours > 0.0
            && daily_operating_hours <= 24.0)
        {
            return Err(DomainError::validation(format!(
                "daily operating hours must be in (0, 24] (got {daily_operating_hours})"
            )));
        }
        Ok(Self {
            daily_operating_hours,
        })
    }

    pub fn daily_operating_hours(&self) -> f64 {
        self.daily_operating_hours
    }
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            daily_operating_hours: DEFAULT_DAILY_OPERATING_HOURS,
        }
    }
}

/// Which signal the forecast was derived from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastBasis {
    ExplicitInterval,
    Mtbf,
}

/// Time until a component's next maintenance.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub basis: ForecastBasis,
    /// Raw projection; negative when overdue.
    pub hours_until_maintenance: f64,
    /// `max(0, hours) / daily_operating_hours`; never negative.
    pub days_until_maintenance: f64,
    pub overdue: bool,
}

impl Forecast {
    /// Project the next maintenance for `component`.
    ///
    /// The explicit interval wins over the MTBF estimate when both exist.
    /// Returns `None` when neither is available (nothing to forecast from).
    pub fn project(
        component: &Component,
        reliability: &ReliabilityMetrics,
        settings: ForecastSettings,
    ) -> Option<Self> {
        let (basis, hours) = match (component.maintenance_interval_hours, reliability.mtbf_hours) {
            (Some(interval), _) => {
                let since_last = component.operating_hours
                    - component.operating_hours_at_last_maintenance.unwrap_or(0.0);
                (ForecastBasis::ExplicitInterval, interval - since_last)
            }
            (None, Some(mtbf)) => (ForecastBasis::Mtbf, mtbf - component.operating_hours),
            (None, None) => return None,
        };

        Some(Self::from_hours(basis, hours, settings))
    }

    pub fn from_hours(basis: ForecastBasis, hours: f64, settings: ForecastSettings) -> Self {
        Self {
            basis,
            hours_until_maintenance: hours,
            days_until_maintenance: hours.max(0.0) / settings.daily_operating_hours(),
            overdue: hours < 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Criticality;
    use crate::reliability::MtbfSource;
    use forgecmms_core::ComponentId;
    use proptest::prelude::*;

    fn component(operating_hours: f64) -> Component {
        Component {
            id: ComponentId::new(),
            name: "Gearbox".to_string(),
            criticality: Criticality::B,
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

    #[test]
    fn mtbf_based_forecast() {
        let f = Forecast::project(&component(950.0), &metrics(Some(1000.0)), ForecastSettings::default())
            .unwrap();
        assert_eq!(f.basis, ForecastBasis::Mtbf);
        assert_eq!(f.hours_until_maintenance, 50.0);
        assert!((f.days_until_maintenance - 50.0 / 24.0).abs() < 1e-9);
        assert!(!f.overdue);
    }

    #[test]
    fn explicit_interval_takes_precedence() {
        let mut c = component(1300.0);
        c.maintenance_interval_hours = Some(500.0);
        c.operating_hours_at_last_maintenance = Some(1000.0);

        let f = Forecast::project(&c, &metrics(Some(5000.0)), ForecastSettings::default()).unwrap();
        assert_eq!(f.basis, ForecastBasis::ExplicitInterval);
        assert_eq!(f.hours_until_maintenance, 200.0);
    }

    #[test]
    fn overdue_is_clamped_to_zero_days() {
        let f = Forecast::project(&component(1200.0), &metrics(Some(1000.0)), ForecastSettings::default())
            .unwrap();
        assert_eq!(f.hours_until_maintenance, -200.0);
        assert_eq!(f.days_until_maintenance, 0.0);
        assert!(f.overdue);
    }

    #[test]
    fn shift_based_operation_stretches_days() {
        let settings = ForecastSettings::new(8.0).unwrap();
        let f = Forecast::project(&component(920.0), &metrics(Some(1000.0)), settings).unwrap();
        assert_eq!(f.days_until_maintenance, 10.0);
    }

    #[test]
    fn nothing_to_forecast_from() {
        assert!(Forecast::project(&component(10.0), &metrics(None), ForecastSettings::default()).is_none());
    }

    #[test]
    fn settings_reject_out_of_range_hours() {
        assert!(ForecastSettings::new(0.0).is_err());
        assert!(ForecastSettings::new(25.0).is_err());
        assert!(ForecastSettings::new(f64::INFINITY).is_err());
        assert!(ForecastSettings::new(16.0).is_ok());
    }

    proptest! {
        /// Property: reported days are never negative, whatever the raw projection.
        #[test]
        fn days_are_never_negative(
            operating in 0.0f64..100_000.0,
            mtbf in 0.0f64..100_000.0,
            daily in 0.5f64..24.0,
        ) {
            let settings = ForecastSettings::new(daily).unwrap();
            let f = Forecast::project(&component(operating), &metrics(Some(mtbf)), settings).unwrap();
            prop_assert!(f.days_until_maintenance >= 0.0);
            prop_assert_eq!(f.overdue, f.hours_until_maintenance < 0.0);
        }
    }
}

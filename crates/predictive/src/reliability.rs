//! Reliability metrics (MTBF/MTTR) from closed corrective work orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::component::{Component, WorkOrderRecord};

/// Where the MTBF used for forecasting came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MtbfSource {
    /// Computed from failures recorded in the observation window.
    Observed,
    /// Manufacturer value seeded on the component.
    Seeded,
}

/// Output of the reliability calculation for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityMetrics {
    /// Failures counted in the observation window.
    pub failure_count: usize,
    /// `operating_hours / failure_count`; `None` when no failures were recorded.
    pub observed_mtbf_hours: Option<f64>,
    /// Mean repair duration in hours over failures with a usable duration.
    pub mttr_hours: Option<f64>,
    /// MTBF used downstream (observed, else seeded).
    pub mtbf_hours: Option<f64>,
    pub mtbf_source: Option<MtbfSource>,
}

impl ReliabilityMetrics {
    /// Compute metrics for `component` from the failures that fall in
    /// `[window_start, window_end]`.
    ///
    /// Never divides by zero: zero failures yield `observed_mtbf_hours = None`
    /// and the seeded manufacturer MTBF (if any) is used instead.
    pub fn compute(
        component: &Component,
        failures: &[WorkOrderRecord],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Self {
        let in_window: Vec<&WorkOrderRecord> = failures
            .iter()
            .filter(|wo| wo.completed_at >= window_start && wo.completed_at <= window_end)
            .collect();

        let failure_count = in_window.len();
        let operating_hours = component.operating_hours.max(0.0);

        let observed_mtbf_hours = if failure_count == 0 {
            None
        } else {
            Some(operating_hours / failure_count as f64)
        };

        // Records closed before they started are still failures, but their
        // repair duration is unknown.
        let durations: Vec<f64> = in_window
            .iter()
            .filter(|wo| wo.completed_at >= wo.started_at)
            .map(|wo| (wo.completed_at - wo.started_at).num_seconds() as f64 / 3600.0)
            .collect();
        let mttr_hours = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        };

        let (mtbf_hours, mtbf_source) = match (observed_mtbf_hours, component.seeded_mtbf_hours) {
            (Some(observed), _) => (Some(observed), Some(MtbfSource::Observed)),
            (None, Some(seeded)) => (Some(seeded.max(0.0)), Some(MtbfSource::Seeded)),
            (None, None) => (None, None),
        };

        Self {
            failure_count,
            observed_mtbf_hours,
            mttr_hours,
            mtbf_hours,
            mtbf_source,
        }
    }
}

//! Day-by-day, severity-bucketed alert counts for charting.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use forgecmms_core::{CompanyId, DomainError, DomainResult};

use crate::alert::Severity;
use crate::history::HistoryRecord;

/// Longest trailing window served by trend queries.
pub const MAX_TREND_DAYS: u32 = 365;

/// Counts for one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    /// Alerts opened that day, by latest severity.
    pub critical: u32,
    pub warning: u32,
    pub info: u32,
    pub total: u32,
    /// Alerts resolved that day (manually or by reconciliation).
    pub resolved: u32,
}

impl TrendPoint {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            critical: 0,
            warning: 0,
            info: 0,
            total: 0,
            resolved: 0,
        }
    }
}

/// A gap-free series covering `[from, to]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub company_id: CompanyId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    /// First day of a `days`-long window ending on `today` (inclusive).
    pub fn window_start(days: u32, today: NaiveDate) -> DomainResult<NaiveDate> {
        if days == 0 || days > MAX_TREND_DAYS {
            return Err(DomainError::validation(format!(
                "trend window must be between 1 and {MAX_TREND_DAYS} days (got {days})"
            )));
        }
        Ok(today - Duration::days(i64::from(days) - 1))
    }

    /// Bucket `records` into one point per day; days without activity are zeros.
    pub fn build(
        company_id: CompanyId,
        records: &[HistoryRecord],
        days: u32,
        today: NaiveDate,
    ) -> DomainResult<Self> {
        let from = Self::window_start(days, today)?;
        let mut points: Vec<TrendPoint> = from
            .iter_days()
            .take(days as usize)
            .map(TrendPoint::empty)
            .collect();

        let slot = |date: NaiveDate| -> Option<usize> {
            if date < from || date > today {
                return None;
            }
            usize::try_from((date - from).num_days()).ok()
        };

        for record in records.iter().filter(|r| r.company_id == company_id) {
            if let Some(i) = slot(record.opened_at.date_naive()) {
                let point = &mut points[i];
                match record.severity {
                    Severity::Critical => point.critical += 1,
                    Severity::Warning => point.warning += 1,
                    Severity::Info => point.info += 1,
                }
                point.total += 1;
            }
            if let Some(i) = record.resolved_at.and_then(|at| slot(at.date_naive())) {
                points[i].resolved += 1;
            }
        }

        Ok(Self {
            company_id,
            from,
            to: today,
            points,
        })
    }
}

//! Engine configuration.
//!
//! Defaults suit continuous operation; every field can be overridden through
//! `FORGECMMS_*` environment variables (see [`EngineConfig::from_env`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use forgecmms_predictive::{Classifier, EscalationPolicy, ForecastSettings};
use forgecmms_predictive::forecast::DEFAULT_DAILY_OPERATING_HOURS;

/// Configuration for the alert engine and the batch orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Used for companies that have not configured their own operating hours.
    pub default_daily_operating_hours: f64,
    /// How far back corrective work orders count as failures.
    pub observation_window_days: u32,
    /// Alert validity after generation; 0 disables expiry.
    pub alert_ttl_hours: u32,
    /// Tenants processed in parallel by a batch run.
    pub max_concurrent_tenants: usize,
    /// Upper bound on a single tenant's pipeline within a batch run.
    pub tenant_timeout_secs: u64,
    pub escalation: EscalationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_daily_operating_hours: DEFAULT_DAILY_OPERATING_HOURS,
            observation_window_days: 365,
            alert_ttl_hours: 24,
            max_concurrent_tenants: 4,
            tenant_timeout_secs: 30,
            escalation: EscalationPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load overrides from the process environment.
    ///
    /// Unparseable or out-of-range values are logged and replaced by defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            default_daily_operating_hours: read(
                &lookup,
                "FORGECMMS_DAILY_OPERATING_HOURS",
                defaults.default_daily_operating_hours,
                |v: &f64| ForecastSettings::new(*v).is_ok(),
            ),
            observation_window_days: read(
                &lookup,
                "FORGECMMS_OBSERVATION_WINDOW_DAYS",
                defaults.observation_window_days,
                |v| *v > 0,
            ),
            alert_ttl_hours: read(&lookup, "FORGECMMS_ALERT_TTL_HOURS", defaults.alert_ttl_hours, |_| true),
            max_concurrent_tenants: read(
                &lookup,
                "FORGECMMS_MAX_CONCURRENT_TENANTS",
                defaults.max_concurrent_tenants,
                |v| *v > 0,
            ),
            tenant_timeout_secs: read(
                &lookup,
                "FORGECMMS_TENANT_TIMEOUT_SECS",
                defaults.tenant_timeout_secs,
                |v| *v > 0,
            ),
            escalation: defaults.escalation,
        }
    }

    pub fn with_max_concurrent_tenants(mut self, max: usize) -> Self {
        self.max_concurrent_tenants = max.max(1);
        self
    }

    pub fn with_tenant_timeout(mut self, timeout: Duration) -> Self {
        self.tenant_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_escalation(mut self, escalation: EscalationPolicy) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn with_default_daily_operating_hours(mut self, hours: f64) -> Self {
        self.default_daily_operating_hours = hours;
        self
    }

    pub fn tenant_timeout(&self) -> Duration {
        Duration::from_secs(self.tenant_timeout_secs)
    }

    pub fn observation_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.observation_window_days))
    }

    /// Forecast settings for a company, falling back to the default when the
    /// company's own value is missing or invalid.
    pub fn forecast_settings(&self, company_hours: Option<f64>) -> ForecastSettings {
        let fallback = ForecastSettings::new(self.default_daily_operating_hours).unwrap_or_default();
        match company_hours {
            None => fallback,
            Some(hours) => ForecastSettings::new(hours).unwrap_or_else(|e| {
                warn!(hours, error = %e, "ignoring invalid company daily operating hours");
                fallback
            }),
        }
    }

    pub fn classifier(&self) -> Classifier {
        let ttl = (self.alert_ttl_hours > 0).then(|| chrono::Duration::hours(i64::from(self.alert_ttl_hours)));
        Classifier::new(self.escalation).with_ttl(ttl)
    }
}

fn read<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T
where
    T: core::str::FromStr + Copy + core::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => v,
        _ => {
            warn!(key, value = %raw, default = ?default, "invalid configuration value; using default");
            default
        }
    }
}

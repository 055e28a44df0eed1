//! Criticality-based severity escalation.
//!
//! Applied after the decision table, so the policy can change without touching
//! the classification rules.

use serde::{Deserialize, Serialize};

use crate::component::Criticality;
use crate::stock::AlertOutcome;

/// Number of severity steps each criticality tier adds to an escalable outcome.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub steps_a: u8,
    pub steps_b: u8,
    pub steps_c: u8,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            steps_a: 1,
            steps_b: 1,
            steps_c: 0,
        }
    }
}

impl EscalationPolicy {
    /// Policy that never changes severities.
    pub fn none() -> Self {
        Self {
            steps_a: 0,
            steps_b: 0,
            steps_c: 0,
        }
    }

    pub fn steps_for(&self, criticality: Criticality) -> u8 {
        match criticality {
            Criticality::A => self.steps_a,
            Criticality::B => self.steps_b,
            Criticality::C => self.steps_c,
        }
    }

    /// Escalate `outcome` for a component of `criticality`.
    ///
    /// Non-escalable outcomes pass through unchanged; escalation saturates at
    /// `Critical` and never lowers a severity.
    pub fn apply(&self, outcome: AlertOutcome, criticality: Criticality) -> AlertOutcome {
        if !outcome.escalable {
            return outcome;
        }
        let mut severity = outcome.severity;
        for _ in 0..self.steps_for(criticality) {
            severity = severity.escalated();
        }
        AlertOutcome { severity, ..outcome }
    }
}

//! Timeline trigger definitions and their due policy.
//!
//! A trigger pairs a condition (a date passing, an interval elapsing, or a
//! milestone being crossed) with the ceremony to invoke when it holds. The
//! condition is a closed tagged enum, so a trigger's type and its data can
//! never disagree.
//!
//! Date and milestone triggers are level-triggered: once their condition
//! holds they are due on every evaluation until disabled. Nothing here
//! disables a trigger after it fires.

use crate::error::TriggerError;
use chrono::{DateTime, Utc};
use forgebot_core::{ActionKey, Payload, TriggerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The type of trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Fires once an absolute instant has passed.
    Date,
    /// Fires whenever an interval has elapsed since the last firing.
    Interval,
    /// Fires while an externally tracked value is at or above a threshold.
    Milestone,
}

impl TriggerType {
    /// Returns the snake_case name of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Interval => "interval",
            Self::Milestone => "milestone",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a milestone trigger measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    /// Number of active sponsors.
    SponsorCount,
    /// Recurring revenue.
    RevenueThreshold,
    /// Count of elapsed anniversaries.
    DateAnniversary,
}

/// The condition under which a trigger is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerCondition {
    /// Due once `scheduled_date` has passed.
    Date {
        /// The instant after which the trigger is due.
        scheduled_date: DateTime<Utc>,
        /// Informational only; comparisons use absolute instants.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
    /// Due when never fired, or when `interval` has elapsed since `last_fired`.
    Interval {
        /// Minimum time between firings.
        #[serde(rename = "interval_ms", with = "forgebot_core::millis")]
        interval: Duration,
        /// When the trigger last fired successfully.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_fired: Option<DateTime<Utc>>,
    },
    /// Due while `current_value` is recorded, non-zero, and at least `threshold`.
    Milestone {
        /// What is being measured.
        kind: MilestoneKind,
        /// Value at which the milestone is reached.
        threshold: f64,
        /// Latest externally reported value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_value: Option<f64>,
    },
}

impl TriggerCondition {
    /// Returns the trigger type for this condition.
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Date { .. } => TriggerType::Date,
            Self::Interval { .. } => TriggerType::Interval,
            Self::Milestone { .. } => TriggerType::Milestone,
        }
    }

    /// Evaluates the condition against `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Date { scheduled_date, .. } => now >= *scheduled_date,
            Self::Interval {
                interval,
                last_fired,
            } => match last_fired {
                None => true,
                // A last firing later than `now` yields a negative delta, which
                // `to_std` rejects: not due.
                Some(last) => (now - *last)
                    .to_std()
                    .is_ok_and(|elapsed| elapsed >= *interval),
            },
            Self::Milestone {
                threshold,
                current_value,
                ..
            } => match current_value {
                // Zero counts as "no value recorded yet".
                Some(value) if *value != 0.0 => *value >= *threshold,
                _ => false,
            },
        }
    }
}

/// A timeline trigger definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineTrigger {
    /// Unique, stable identifier.
    pub id: TriggerId,
    /// Display name.
    pub name: String,
    /// Whether the scheduler evaluates this trigger.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// When the trigger is due.
    pub condition: TriggerCondition,
    /// The ceremony to invoke.
    pub action_key: ActionKey,
    /// Data passed through to the ceremony unexamined.
    #[serde(default)]
    pub payload: Payload,
}

fn default_enabled() -> bool {
    true
}

impl TimelineTrigger {
    /// Creates an enabled trigger with an empty payload.
    #[must_use]
    pub fn new(
        id: impl Into<TriggerId>,
        name: impl Into<String>,
        condition: TriggerCondition,
        action_key: impl Into<ActionKey>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            condition,
            action_key: action_key.into(),
            payload: Payload::new(),
        }
    }

    /// Creates a date trigger.
    #[must_use]
    pub fn date(
        id: impl Into<TriggerId>,
        name: impl Into<String>,
        scheduled_date: DateTime<Utc>,
        action_key: impl Into<ActionKey>,
    ) -> Self {
        Self::new(
            id,
            name,
            TriggerCondition::Date {
                scheduled_date,
                timezone: None,
            },
            action_key,
        )
    }

    /// Creates an interval trigger that has never fired.
    #[must_use]
    pub fn interval(
        id: impl Into<TriggerId>,
        name: impl Into<String>,
        interval: Duration,
        action_key: impl Into<ActionKey>,
    ) -> Self {
        Self::new(
            id,
            name,
            TriggerCondition::Interval {
                interval,
                last_fired: None,
            },
            action_key,
        )
    }

    /// Creates a milestone trigger with no recorded value.
    #[must_use]
    pub fn milestone(
        id: impl Into<TriggerId>,
        name: impl Into<String>,
        kind: MilestoneKind,
        threshold: f64,
        action_key: impl Into<ActionKey>,
    ) -> Self {
        Self::new(
            id,
            name,
            TriggerCondition::Milestone {
                kind,
                threshold,
                current_value: None,
            },
            action_key,
        )
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Returns the trigger type.
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        self.condition.trigger_type()
    }

    /// Returns whether the trigger is enabled and its condition holds at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.condition.is_due(now)
    }

    /// Enables this trigger.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disables this trigger.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Records a successful firing at `now`.
    ///
    /// Only interval triggers keep firing state; other types are unchanged.
    pub fn record_fired(&mut self, now: DateTime<Utc>) {
        if let TriggerCondition::Interval { last_fired, .. } = &mut self.condition {
            *last_fired = Some(now);
        }
    }

    /// Replaces the recorded value of a milestone trigger.
    ///
    /// # Errors
    ///
    /// Returns `NotAMilestone` if this is not a milestone trigger.
    pub fn set_milestone_value(&mut self, value: f64) -> Result<(), TriggerError> {
        match &mut self.condition {
            TriggerCondition::Milestone { current_value, .. } => {
                *current_value = Some(value);
                Ok(())
            }
            other => Err(TriggerError::NotAMilestone {
                id: self.id.clone(),
                actual: other.trigger_type(),
            }),
        }
    }
}

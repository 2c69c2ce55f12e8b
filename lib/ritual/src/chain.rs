//! Ritual chain definitions.
//!
//! A chain owns an ordered sequence of steps. The sequence may grow while the
//! chain runs: a step's `on_success` or `on_failure` hook inserts a new step
//! directly after it, and the inserted step is an ordinary member of the
//! sequence from then on.

use crate::error::ChainError;
use forgebot_core::{ActionKey, ChainId, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::Duration;

/// Payload key naming the failed step in a remediation step's payload.
pub const FAILED_STEP_KEY: &str = "failedStep";

/// The lifecycle status of a chain.
///
/// Transitions only run `Pending -> Executing -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// Not started.
    #[default]
    Pending,
    /// Steps are running.
    Executing,
    /// Every step ran; failures, if any, were remediated.
    Completed,
    /// A step failed without a fallback, or the run hit its step ceiling.
    Failed,
}

impl ChainStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether the lifecycle allows moving to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: ChainStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executing)
                | (Self::Executing, Self::Completed)
                | (Self::Executing, Self::Failed)
        )
    }

    /// Returns the snake_case name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single step within a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// The ceremony to invoke.
    pub action_key: ActionKey,
    /// Data passed to the ceremony.
    #[serde(default)]
    pub payload: Payload,
    /// Whether the author expects the outcome to be awaited.
    ///
    /// Kept for external bookkeeping; the executor always awaits.
    #[serde(default = "default_wait_for_completion")]
    pub wait_for_completion: bool,
    /// Ceremony inserted after this step when it succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<ActionKey>,
    /// Ceremony inserted after this step when it fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<ActionKey>,
    /// Pause before invoking this step.
    #[serde(
        rename = "delay_ms",
        default,
        with = "forgebot_core::millis::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub delay_before_run: Option<Duration>,
}

fn default_wait_for_completion() -> bool {
    true
}

impl Step {
    /// Creates a step with an empty payload and no hooks.
    #[must_use]
    pub fn new(action_key: impl Into<ActionKey>) -> Self {
        Self {
            action_key: action_key.into(),
            payload: Payload::new(),
            wait_for_completion: true,
            on_success: None,
            on_failure: None,
            delay_before_run: None,
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the ceremony to run after this step succeeds.
    #[must_use]
    pub fn on_success(mut self, action_key: impl Into<ActionKey>) -> Self {
        self.on_success = Some(action_key.into());
        self
    }

    /// Sets the ceremony to run after this step fails.
    #[must_use]
    pub fn on_failure(mut self, action_key: impl Into<ActionKey>) -> Self {
        self.on_failure = Some(action_key.into());
        self
    }

    /// Sets the pause before this step runs.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_before_run = Some(delay);
        self
    }

    /// Marks the step as not needing its outcome awaited.
    #[must_use]
    pub fn fire_and_forget(mut self) -> Self {
        self.wait_for_completion = false;
        self
    }

    /// The step inserted when a step with `on_success` succeeds.
    #[must_use]
    pub fn follow_up(action_key: ActionKey) -> Self {
        Self::new(action_key)
    }

    /// The step inserted when `failed` fails and has `on_failure`.
    #[must_use]
    pub fn remediation(action_key: ActionKey, failed: &ActionKey) -> Self {
        let mut payload = Payload::new();
        payload.insert(
            FAILED_STEP_KEY.to_string(),
            JsonValue::String(failed.to_string()),
        );
        Self::new(action_key).with_payload(payload)
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualChain {
    /// Unique identifier.
    pub id: ChainId,
    /// Display name.
    pub name: String,
    /// What the chain accomplishes.
    #[serde(default)]
    pub description: String,
    /// The steps, in execution order.
    pub steps: Vec<Step>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ChainStatus,
    /// Index of the last started step while executing.
    #[serde(default)]
    pub current_step_index: usize,
}

impl RitualChain {
    /// Creates a pending chain.
    #[must_use]
    pub fn new(
        id: impl Into<ChainId>,
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<Step>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            steps,
            status: ChainStatus::Pending,
            current_step_index: 0,
        }
    }

    /// Returns a pending copy of this definition, with its steps as authored.
    ///
    /// Steps inserted during a previous run are not removed; callers that
    /// re-run a chain should start from the original definition.
    #[must_use]
    pub fn to_pending(&self) -> Self {
        Self {
            status: ChainStatus::Pending,
            current_step_index: 0,
            ..self.clone()
        }
    }

    /// Moves the chain to `next`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the lifecycle does not allow it.
    pub fn transition_to(&mut self, next: ChainStatus) -> Result<(), ChainError> {
        if !self.status.can_transition_to(next) {
            return Err(ChainError::InvalidTransition {
                chain_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

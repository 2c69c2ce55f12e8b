//! In-memory trigger registry.
//!
//! Triggers are kept in registration order, which is the order the scheduler
//! evaluates them in. The registry is a cheap, cloneable handle; clones share
//! the same storage. No lock is ever held across an `.await`.

use crate::error::TriggerError;
use crate::trigger::{TimelineTrigger, TriggerType};
use chrono::{DateTime, Utc};
use forgebot_core::{ActionKey, Payload, TriggerId};
use rootcause::Report;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// What the scheduler needs to invoke a due trigger.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DueInvocation {
    pub(crate) name: String,
    pub(crate) trigger_type: TriggerType,
    pub(crate) action_key: ActionKey,
    pub(crate) payload: Payload,
}

/// Registration-ordered storage of timeline triggers.
#[derive(Debug, Clone, Default)]
pub struct TriggerRegistry {
    triggers: Arc<RwLock<Vec<TimelineTrigger>>>,
}

impl TriggerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trigger, replacing any trigger with the same id.
    ///
    /// A replacement keeps the original registration position. Returns the
    /// replaced definition, if any.
    pub async fn register(&self, trigger: TimelineTrigger) -> Option<TimelineTrigger> {
        let mut triggers = self.triggers.write().await;
        info!(
            trigger_id = %trigger.id,
            trigger_name = %trigger.name,
            trigger_type = %trigger.trigger_type(),
            "registered timeline trigger"
        );
        match triggers.iter_mut().find(|existing| existing.id == trigger.id) {
            Some(existing) => Some(std::mem::replace(existing, trigger)),
            None => {
                triggers.push(trigger);
                None
            }
        }
    }

    /// Removes a trigger. Absent ids are ignored.
    pub async fn unregister(&self, id: &TriggerId) -> Option<TimelineTrigger> {
        let mut triggers = self.triggers.write().await;
        let position = triggers.iter().position(|trigger| &trigger.id == id)?;
        info!(trigger_id = %id, "unregistered timeline trigger");
        Some(triggers.remove(position))
    }

    /// Returns a copy of a trigger.
    pub async fn get(&self, id: &TriggerId) -> Option<TimelineTrigger> {
        self.triggers
            .read()
            .await
            .iter()
            .find(|trigger| &trigger.id == id)
            .cloned()
    }

    /// Returns copies of all triggers in registration order.
    pub async fn list(&self) -> Vec<TimelineTrigger> {
        self.triggers.read().await.clone()
    }

    /// Returns all trigger ids in registration order.
    pub async fn ids(&self) -> Vec<TriggerId> {
        self.triggers
            .read()
            .await
            .iter()
            .map(|trigger| trigger.id.clone())
            .collect()
    }

    /// Returns the number of registered triggers.
    pub async fn len(&self) -> usize {
        self.triggers.read().await.len()
    }

    /// Returns whether no triggers are registered.
    pub async fn is_empty(&self) -> bool {
        self.triggers.read().await.is_empty()
    }

    /// Enables or disables a trigger.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no trigger has this id.
    pub async fn set_enabled(
        &self,
        id: &TriggerId,
        enabled: bool,
    ) -> Result<(), Report<TriggerError>> {
        self.with_trigger(id, |trigger| {
            if enabled {
                trigger.enable();
            } else {
                trigger.disable();
            }
            Ok(())
        })
        .await?;
        debug!(trigger_id = %id, enabled, "trigger enabled state changed");
        Ok(())
    }

    /// Records the latest value of a milestone trigger.
    ///
    /// This is the only external write path into a live trigger's progress;
    /// the assignment happens under the registry lock, so it is atomic with
    /// respect to a concurrent due-check.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `NotAMilestone` if the trigger
    /// is not a milestone trigger.
    pub async fn update_milestone_value(
        &self,
        id: &TriggerId,
        value: f64,
    ) -> Result<(), Report<TriggerError>> {
        self.with_trigger(id, |trigger| trigger.set_milestone_value(value))
            .await?;
        debug!(trigger_id = %id, value, "milestone value updated");
        Ok(())
    }

    /// Returns the invocation for a trigger if it is enabled and due at `now`.
    pub(crate) async fn due_invocation(
        &self,
        id: &TriggerId,
        now: DateTime<Utc>,
    ) -> Option<DueInvocation> {
        let triggers = self.triggers.read().await;
        let trigger = triggers.iter().find(|trigger| &trigger.id == id)?;
        trigger.is_due(now).then(|| DueInvocation {
            name: trigger.name.clone(),
            trigger_type: trigger.trigger_type(),
            action_key: trigger.action_key.clone(),
            payload: trigger.payload.clone(),
        })
    }

    /// Records a successful firing. Triggers removed in the meantime are ignored.
    pub(crate) async fn record_fired(&self, id: &TriggerId, now: DateTime<Utc>) {
        let mut triggers = self.triggers.write().await;
        if let Some(trigger) = triggers.iter_mut().find(|trigger| &trigger.id == id) {
            trigger.record_fired(now);
        }
    }

    async fn with_trigger<F>(&self, id: &TriggerId, f: F) -> Result<(), Report<TriggerError>>
    where
        F: FnOnce(&mut TimelineTrigger) -> Result<(), TriggerError>,
    {
        let mut triggers = self.triggers.write().await;
        let trigger = triggers
            .iter_mut()
            .find(|trigger| &trigger.id == id)
            .ok_or_else(|| TriggerError::NotFound { id: id.clone() })?;
        f(trigger)?;
        Ok(())
    }
}

//! Error types for the scheduler crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `TriggerError`: Errors from trigger and registry operations
//! - `SchedulerError`: Errors from the polling loop itself

use crate::trigger::TriggerType;
use forgebot_core::TriggerId;
use std::fmt;

/// Errors from trigger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    /// Trigger not found.
    NotFound { id: TriggerId },
    /// A milestone operation was applied to a trigger of another type.
    NotAMilestone { id: TriggerId, actual: TriggerType },
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "trigger not found: {id}"),
            Self::NotAMilestone { id, actual } => {
                write!(f, "trigger {id} is a {actual} trigger, not a milestone")
            }
        }
    }
}

impl std::error::Error for TriggerError {}

/// Errors from the scheduler loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The polling loop ended abnormally.
    LoopTerminated { reason: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoopTerminated { reason } => {
                write!(f, "timeline trigger loop terminated: {reason}")
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

//! Timeline trigger scheduler for forgebot.
//!
//! This crate provides:
//!
//! - **Triggers**: date, interval, and milestone conditions with their due policy
//! - **Trigger Registry**: in-memory, registration-ordered trigger storage
//! - **Scheduler**: the polling loop that invokes ceremonies for due triggers

pub mod error;
pub mod registry;
pub mod scheduler;
pub mod trigger;

pub use error::{SchedulerError, TriggerError};
pub use registry::TriggerRegistry;
pub use scheduler::{PollReport, TriggerScheduler};
pub use trigger::{MilestoneKind, TimelineTrigger, TriggerCondition, TriggerType};

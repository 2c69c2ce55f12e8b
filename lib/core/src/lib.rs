//! Core domain types and utilities for forgebot.
//!
//! This crate provides the foundational types shared by the scheduler, the
//! ritual chain executor, and the host service:
//!
//! - **Keys**: string-keyed identifiers for triggers, chains, and actions
//! - **Invoker**: the [`ActionInvoker`] seam through which ceremonies run
//! - **Errors**: the rootcause-based `Result` alias

pub mod error;
pub mod id;
pub mod invoker;
pub mod millis;

pub use error::Result;
pub use id::{ActionKey, ChainId, ParseKeyError, TriggerId};
pub use invoker::{
    ActionInvoker, FnInvoker, InvocationError, LoggingInvoker, Payload, RecordedCall,
    ScriptedInvoker, ScriptedOutcome,
};

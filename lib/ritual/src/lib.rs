//! Ritual chain executor for forgebot.
//!
//! This crate provides:
//!
//! - **Chain Model**: ordered, growable step sequences with success/failure hooks
//! - **Status Tracker**: live, queryable records of started chains
//! - **Executor**: strictly sequential step execution with delays and branching

pub mod chain;
pub mod error;
pub mod executor;
pub mod tracker;

pub use chain::{ChainStatus, FAILED_STEP_KEY, RitualChain, Step};
pub use error::ChainError;
pub use executor::{ChainExecutor, DEFAULT_MAX_STEPS};
pub use tracker::{ChainHandle, ChainTracker};

//! Error types for the ritual crate.
//!
//! Errors are designed for layered context using rootcause. Configuration
//! problems (`NotPending`, `AlreadyExecuting`) are raised before a chain
//! starts; the rest are chain-fatal and are only raised after the chain has
//! been marked failed.

use crate::chain::ChainStatus;
use forgebot_core::{ActionKey, ChainId};
use std::fmt;

/// Errors from chain execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Only pending chains can be executed.
    NotPending { chain_id: ChainId, status: ChainStatus },
    /// A chain with this id is already executing.
    AlreadyExecuting { chain_id: ChainId },
    /// A step failed and had no fallback.
    StepFailed {
        chain_id: ChainId,
        step_index: usize,
        action_key: ActionKey,
    },
    /// The run reached its step ceiling.
    StepLimitExceeded { chain_id: ChainId, max_steps: usize },
    /// A status change that the chain lifecycle does not allow.
    InvalidTransition {
        chain_id: ChainId,
        from: ChainStatus,
        to: ChainStatus,
    },
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPending { chain_id, status } => {
                write!(f, "chain {chain_id} is {status}, expected pending")
            }
            Self::AlreadyExecuting { chain_id } => {
                write!(f, "chain {chain_id} is already executing")
            }
            Self::StepFailed {
                chain_id,
                step_index,
                action_key,
            } => write!(
                f,
                "ritual {action_key} (step {}) of chain {chain_id} failed without fallback",
                step_index + 1
            ),
            Self::StepLimitExceeded {
                chain_id,
                max_steps,
            } => write!(f, "chain {chain_id} exceeded the limit of {max_steps} steps"),
            Self::InvalidTransition { chain_id, from, to } => {
                write!(f, "chain {chain_id} cannot move from {from} to {to}")
            }
        }
    }
}

impl std::error::Error for ChainError {}

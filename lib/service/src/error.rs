//! Error types for the service crate.
//!
//! Lower-layer reports (`ChainError`, `TriggerError`) are wrapped with a
//! `ServiceError` context as they cross into the host facade.

use forgebot_core::{ChainId, TriggerId};
use std::fmt;
use std::path::PathBuf;

/// Errors loading or validating a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The catalog file could not be read or parsed.
    Load { path: PathBuf, reason: String },
    /// Two triggers share an id.
    DuplicateTrigger { id: TriggerId },
    /// Two chains share an id.
    DuplicateChain { id: ChainId },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { path, reason } => {
                write!(f, "failed to load catalog {}: {reason}", path.display())
            }
            Self::DuplicateTrigger { id } => write!(f, "duplicate trigger id in catalog: {id}"),
            Self::DuplicateChain { id } => write!(f, "duplicate chain id in catalog: {id}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Errors surfaced by the host facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// No chain with this id exists in the catalog.
    UnknownChain { chain_id: ChainId },
    /// A chain run did not complete.
    ChainExecution { chain_id: ChainId },
    /// A trigger could not be updated.
    TriggerUpdate { trigger_id: TriggerId },
    /// The configured catalog could not be loaded.
    Catalog,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownChain { chain_id } => write!(f, "unknown ritual chain: {chain_id}"),
            Self::ChainExecution { chain_id } => {
                write!(f, "ritual chain {chain_id} did not complete")
            }
            Self::TriggerUpdate { trigger_id } => {
                write!(f, "failed to update timeline trigger {trigger_id}")
            }
            Self::Catalog => write!(f, "failed to load the ritual catalog"),
        }
    }
}

impl std::error::Error for ServiceError {}

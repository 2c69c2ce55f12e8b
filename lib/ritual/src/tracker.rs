//! Live status records for started chains.
//!
//! The tracker keeps one shared record per chain id. A [`ChainHandle`] reads
//! the same record the executor mutates, so status and progress are visible
//! while the chain is still running.

use crate::chain::{ChainStatus, RitualChain};
use crate::error::ChainError;
use forgebot_core::ChainId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};

/// A shared view of a tracked chain.
#[derive(Debug, Clone)]
pub struct ChainHandle {
    chain: Arc<RwLock<RitualChain>>,
}

impl ChainHandle {
    fn new(chain: RitualChain) -> Self {
        Self {
            chain: Arc::new(RwLock::new(chain)),
        }
    }

    /// Returns a copy of the chain as it currently stands.
    pub async fn snapshot(&self) -> RitualChain {
        self.chain.read().await.clone()
    }

    /// Returns the current status.
    pub async fn status(&self) -> ChainStatus {
        self.chain.read().await.status
    }

    /// Returns the index of the last started step.
    pub async fn current_step_index(&self) -> usize {
        self.chain.read().await.current_step_index
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, RitualChain> {
        self.chain.write().await
    }
}

/// Registry of every chain that has been started, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ChainTracker {
    chains: Arc<RwLock<HashMap<ChainId, ChainHandle>>>,
}

impl ChainTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for a chain id, if one has been started.
    pub async fn get(&self, id: &ChainId) -> Option<ChainHandle> {
        self.chains.read().await.get(id).cloned()
    }

    /// Returns snapshots of all tracked chains.
    pub async fn list(&self) -> Vec<RitualChain> {
        let handles: Vec<ChainHandle> = self.chains.read().await.values().cloned().collect();
        let mut chains = Vec::with_capacity(handles.len());
        for handle in handles {
            chains.push(handle.snapshot().await);
        }
        chains.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        chains
    }

    /// Starts tracking a chain, replacing any finished record with the same id.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExecuting` if a chain with this id is still executing.
    pub(crate) async fn track(&self, chain: RitualChain) -> Result<ChainHandle, ChainError> {
        let mut chains = self.chains.write().await;
        if let Some(existing) = chains.get(&chain.id)
            && existing.status().await == ChainStatus::Executing
        {
            return Err(ChainError::AlreadyExecuting {
                chain_id: chain.id.clone(),
            });
        }
        let id = chain.id.clone();
        let handle = ChainHandle::new(chain);
        chains.insert(id, handle.clone());
        Ok(handle)
    }
}

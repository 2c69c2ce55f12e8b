//! Timeline invocations that start ritual chains.
//!
//! An action key of the form `chain:<chain-id>` runs the named catalog chain
//! to completion; every other key goes to the ceremony bridge. Steps inside
//! the chain are always sent to the bridge, so a chain cannot start another.

use crate::bridge::CeremonyBridge;
use crate::catalog::Catalog;
use async_trait::async_trait;
use forgebot_core::{ActionInvoker, ActionKey, ChainId, InvocationError, Payload};
use forgebot_ritual::ChainExecutor;
use rootcause::Report;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix marking an action key as a chain reference.
pub const CHAIN_KEY_PREFIX: &str = "chain:";

/// Routes `chain:` keys to the executor and everything else to the bridge.
#[derive(Debug, Clone)]
pub struct ChainRoutingInvoker {
    catalog: Arc<Catalog>,
    executor: ChainExecutor,
    bridge: CeremonyBridge,
}

impl ChainRoutingInvoker {
    /// Creates a router over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, executor: ChainExecutor, bridge: CeremonyBridge) -> Self {
        Self {
            catalog,
            executor,
            bridge,
        }
    }

    /// Returns the chain id referenced by an action key, if any.
    #[must_use]
    pub fn chain_reference(action_key: &ActionKey) -> Option<ChainId> {
        action_key
            .as_str()
            .strip_prefix(CHAIN_KEY_PREFIX)
            .filter(|id| !id.is_empty())
            .map(ChainId::new)
    }
}

#[async_trait]
impl ActionInvoker for ChainRoutingInvoker {
    async fn invoke(
        &self,
        action_key: &ActionKey,
        payload: &Payload,
    ) -> Result<bool, Report<InvocationError>> {
        let Some(chain_id) = Self::chain_reference(action_key) else {
            return self.bridge.invoke(action_key, payload).await;
        };

        let Some(chain) = self.catalog.chain(&chain_id) else {
            return Err(InvocationError::HandlerFailed {
                action_key: action_key.clone(),
                reason: format!("no ritual chain named {chain_id}"),
            }
            .into());
        };

        debug!(%chain_id, "timeline trigger starting ritual chain");
        match self.executor.execute_chain(chain, &self.bridge).await {
            Ok(_) => Ok(true),
            Err(err) => {
                warn!(%chain_id, error = %err, "ritual chain started by trigger did not complete");
                Ok(false)
            }
        }
    }
}

//! Forwarding from forgebot to the host's ceremony handler.

use async_trait::async_trait;
use forgebot_core::{ActionInvoker, ActionKey, InvocationError, Payload};
use rootcause::Report;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Forwards invocations to a replaceable ceremony handler.
///
/// Without a handler every invocation fails. A handler error is logged and
/// reported as a plain failure, so callers only ever see `Ok`.
#[derive(Clone, Default)]
pub struct CeremonyBridge {
    handler: Arc<RwLock<Option<Arc<dyn ActionInvoker>>>>,
}

impl std::fmt::Debug for CeremonyBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CeremonyBridge").finish_non_exhaustive()
    }
}

impl CeremonyBridge {
    /// Creates a bridge with no handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the handler, replacing any previous one.
    pub async fn set_handler(&self, handler: Arc<dyn ActionInvoker>) {
        *self.handler.write().await = Some(handler);
        info!("ceremony handler configured");
    }

    /// Removes the handler.
    pub async fn clear_handler(&self) {
        *self.handler.write().await = None;
    }

    /// Returns whether a handler is installed.
    pub async fn has_handler(&self) -> bool {
        self.handler.read().await.is_some()
    }
}

#[async_trait]
impl ActionInvoker for CeremonyBridge {
    async fn invoke(
        &self,
        action_key: &ActionKey,
        payload: &Payload,
    ) -> Result<bool, Report<InvocationError>> {
        let handler = self.handler.read().await.clone();
        let Some(handler) = handler else {
            error!(%action_key, "no ceremony handler configured");
            return Ok(false);
        };

        info!(%action_key, payload = %serde_json::Value::Object(payload.clone()), "invoking ceremony");
        match handler.invoke(action_key, payload).await {
            Ok(succeeded) => Ok(succeeded),
            Err(err) => {
                warn!(%action_key, error = %err, "ceremony handler failed");
                Ok(false)
            }
        }
    }
}

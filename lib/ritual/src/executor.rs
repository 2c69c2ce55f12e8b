//! Sequential chain execution.
//!
//! Steps run strictly one after another. Each step may wait before running,
//! and its outcome decides what comes next:
//!
//! - success with `on_success` inserts a follow-up step right after it
//! - failure with `on_failure` inserts a remediation step right after it
//! - failure without `on_failure` fails the whole chain
//!
//! Inserted steps run next, before whatever was originally scheduled after
//! the step that produced them.

use crate::chain::{ChainStatus, RitualChain, Step};
use crate::error::ChainError;
use crate::tracker::{ChainHandle, ChainTracker};
use forgebot_core::{ActionInvoker, ChainId};
use rootcause::Report;
use tracing::{debug, error, info, instrument, warn};

/// Default ceiling on steps executed in one run.
pub const DEFAULT_MAX_STEPS: usize = 1000;

/// Runs ritual chains and records their progress.
#[derive(Debug, Clone)]
pub struct ChainExecutor {
    tracker: ChainTracker,
    max_steps: usize,
}

impl Default for ChainExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainExecutor {
    /// Creates an executor with the default step ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_steps(DEFAULT_MAX_STEPS)
    }

    /// Creates an executor with a custom step ceiling.
    #[must_use]
    pub fn with_max_steps(max_steps: usize) -> Self {
        Self {
            tracker: ChainTracker::new(),
            max_steps,
        }
    }

    /// Returns the step ceiling.
    #[must_use]
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Returns the tracker holding every started chain.
    #[must_use]
    pub fn tracker(&self) -> &ChainTracker {
        &self.tracker
    }

    /// Returns the live record of a started chain.
    pub async fn chain_status(&self, id: &ChainId) -> Option<ChainHandle> {
        self.tracker.get(id).await
    }

    /// Returns snapshots of every started chain.
    pub async fn list_chains(&self) -> Vec<RitualChain> {
        self.tracker.list().await
    }

    /// Executes a pending chain to completion.
    ///
    /// The chain is registered with the tracker before its first step runs.
    /// On success, returns the final state of the chain, including any steps
    /// inserted during the run.
    ///
    /// # Errors
    ///
    /// - `NotPending` if the chain is not pending
    /// - `AlreadyExecuting` if a chain with the same id is executing
    /// - `StepFailed` if a step fails without a fallback
    /// - `StepLimitExceeded` if the run reaches the step ceiling
    ///
    /// The last two mark the chain failed before returning.
    #[instrument(skip_all, fields(chain_id = %chain.id))]
    pub async fn execute_chain(
        &self,
        mut chain: RitualChain,
        invoker: &dyn ActionInvoker,
    ) -> Result<RitualChain, Report<ChainError>> {
        if chain.status != ChainStatus::Pending {
            return Err(ChainError::NotPending {
                chain_id: chain.id.clone(),
                status: chain.status,
            }
            .into());
        }

        chain.transition_to(ChainStatus::Executing)?;
        chain.current_step_index = 0;
        let chain_id = chain.id.clone();
        info!(chain_name = %chain.name, steps = chain.steps.len(), "starting ritual chain");
        let handle = self.tracker.track(chain).await?;

        let mut index = 0;
        let mut executed = 0;
        loop {
            let (step, total) = {
                let mut chain = handle.write().await;
                if index >= chain.steps.len() {
                    break;
                }
                if executed >= self.max_steps {
                    drop(chain);
                    let limit = ChainError::StepLimitExceeded {
                        chain_id: chain_id.clone(),
                        max_steps: self.max_steps,
                    };
                    return Err(self.abort(&handle, limit).await);
                }
                chain.current_step_index = index;
                (chain.steps[index].clone(), chain.steps.len())
            };

            debug!(
                step = index + 1,
                total,
                action_key = %step.action_key,
                "executing ritual step"
            );

            if let Some(delay) = step.delay_before_run.filter(|delay| !delay.is_zero()) {
                debug!(?delay, "waiting before ritual step");
                tokio::time::sleep(delay).await;
            }

            let succeeded = match invoker.invoke(&step.action_key, &step.payload).await {
                Ok(succeeded) => succeeded,
                Err(err) => {
                    warn!(action_key = %step.action_key, error = %err, "ritual invocation errored");
                    false
                }
            };
            executed += 1;

            if succeeded {
                if let Some(next) = &step.on_success {
                    debug!(action_key = %next, "inserting success follow-up");
                    handle
                        .write()
                        .await
                        .steps
                        .insert(index + 1, Step::follow_up(next.clone()));
                }
            } else if let Some(fallback) = &step.on_failure {
                warn!(
                    action_key = %step.action_key,
                    fallback = %fallback,
                    "ritual step failed, running fallback"
                );
                handle
                    .write()
                    .await
                    .steps
                    .insert(index + 1, Step::remediation(fallback.clone(), &step.action_key));
            } else {
                let failure = ChainError::StepFailed {
                    chain_id: chain_id.clone(),
                    step_index: index,
                    action_key: step.action_key.clone(),
                };
                return Err(self.abort(&handle, failure).await);
            }

            index += 1;
        }

        handle.write().await.transition_to(ChainStatus::Completed)?;
        info!(steps_executed = executed, "ritual chain completed");
        Ok(handle.snapshot().await)
    }

    async fn abort(&self, handle: &ChainHandle, failure: ChainError) -> Report<ChainError> {
        let mut chain = handle.write().await;
        if let Err(err) = chain.transition_to(ChainStatus::Failed) {
            return err.into();
        }
        error!(error = %failure, "ritual chain failed");
        failure.into()
    }
}

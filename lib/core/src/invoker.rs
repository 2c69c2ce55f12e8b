//! The action invoker seam.
//!
//! Ceremonies are implemented outside forgebot. The scheduler and the chain
//! executor only know a ceremony by its [`ActionKey`] and hand it an opaque
//! [`Payload`]; everything else goes through [`ActionInvoker`].

use crate::id::ActionKey;
use async_trait::async_trait;
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

/// Opaque key-value data passed through to a ceremony.
pub type Payload = serde_json::Map<String, JsonValue>;

/// Errors raised by an invoker while running a ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// The ceremony handler ran and reported an error.
    HandlerFailed { action_key: ActionKey, reason: String },
    /// No handler is available for the ceremony.
    NoHandler { action_key: ActionKey },
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandlerFailed { action_key, reason } => {
                write!(f, "ceremony {action_key} failed: {reason}")
            }
            Self::NoHandler { action_key } => {
                write!(f, "no handler configured for ceremony {action_key}")
            }
        }
    }
}

impl std::error::Error for InvocationError {}

/// Runs a ceremony by key.
///
/// `Ok(true)` means the ceremony succeeded and `Ok(false)` that it ran but
/// reported failure. `Err` means the invocation itself could not be carried
/// out. Implementations must not assume they are called from one task only.
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    /// Invokes the ceremony identified by `action_key` with `payload`.
    async fn invoke(
        &self,
        action_key: &ActionKey,
        payload: &Payload,
    ) -> Result<bool, Report<InvocationError>>;
}

#[async_trait]
impl<T: ActionInvoker + ?Sized> ActionInvoker for Arc<T> {
    async fn invoke(
        &self,
        action_key: &ActionKey,
        payload: &Payload,
    ) -> Result<bool, Report<InvocationError>> {
        (**self).invoke(action_key, payload).await
    }
}

/// Adapts an async closure into an [`ActionInvoker`].
///
/// The closure receives owned copies of the key and payload so the returned
/// future can be `'static`.
pub struct FnInvoker<F> {
    f: F,
}

impl<F, Fut> FnInvoker<F>
where
    F: Fn(ActionKey, Payload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, Report<InvocationError>>> + Send,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ActionInvoker for FnInvoker<F>
where
    F: Fn(ActionKey, Payload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, Report<InvocationError>>> + Send,
{
    async fn invoke(
        &self,
        action_key: &ActionKey,
        payload: &Payload,
    ) -> Result<bool, Report<InvocationError>> {
        (self.f)(action_key.clone(), payload.clone()).await
    }
}

/// An invoker that only logs the ceremony and reports success.
///
/// Used when no ceremony backend is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInvoker;

#[async_trait]
impl ActionInvoker for LoggingInvoker {
    async fn invoke(
        &self,
        action_key: &ActionKey,
        payload: &Payload,
    ) -> Result<bool, Report<InvocationError>> {
        info!(
            action_key = %action_key,
            payload = %JsonValue::Object(payload.clone()),
            "ceremony invoked"
        );
        Ok(true)
    }
}

/// A scripted outcome for [`ScriptedInvoker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Return `Ok(true)`.
    Succeed,
    /// Return `Ok(false)`.
    Fail,
    /// Return an `InvocationError::HandlerFailed` with the given reason.
    Error(String),
}

/// A call observed by [`ScriptedInvoker`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The ceremony that was invoked.
    pub action_key: ActionKey,
    /// The payload it was invoked with.
    pub payload: Payload,
    /// When the invocation started, on the Tokio clock.
    pub at: Instant,
}

/// An invoker with per-key scripted outcomes that records every call.
///
/// Each key can be given a sequence of outcomes; they are consumed in order
/// and the last one repeats. Keys without a script use the default outcome.
pub struct ScriptedInvoker {
    default_outcome: ScriptedOutcome,
    scripts: Mutex<HashMap<ActionKey, VecDeque<ScriptedOutcome>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedInvoker {
    /// Creates an invoker where unscripted keys succeed.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::with_default(ScriptedOutcome::Succeed)
    }

    /// Creates an invoker where unscripted keys fail.
    #[must_use]
    pub fn failing() -> Self {
        Self::with_default(ScriptedOutcome::Fail)
    }

    fn with_default(default_outcome: ScriptedOutcome) -> Self {
        Self {
            default_outcome,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Scripts a single outcome for `action_key`.
    #[must_use]
    pub fn with_outcome(self, action_key: impl Into<ActionKey>, outcome: ScriptedOutcome) -> Self {
        self.with_sequence(action_key, [outcome])
    }

    /// Scripts a sequence of outcomes for `action_key`.
    #[must_use]
    pub fn with_sequence(
        mut self,
        action_key: impl Into<ActionKey>,
        outcomes: impl IntoIterator<Item = ScriptedOutcome>,
    ) -> Self {
        self.scripts
            .get_mut()
            .insert(action_key.into(), outcomes.into_iter().collect());
        self
    }

    /// Returns every call observed so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// Returns the keys of every call observed so far, in order.
    pub async fn invoked_keys(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|call| call.action_key.to_string())
            .collect()
    }

    async fn next_outcome(&self, action_key: &ActionKey) -> ScriptedOutcome {
        let mut scripts = self.scripts.lock().await;
        match scripts.get_mut(action_key) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| self.default_outcome.clone()),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| self.default_outcome.clone()),
            None => self.default_outcome.clone(),
        }
    }
}

#[async_trait]
impl ActionInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        action_key: &ActionKey,
        payload: &Payload,
    ) -> Result<bool, Report<InvocationError>> {
        self.calls.lock().await.push(RecordedCall {
            action_key: action_key.clone(),
            payload: payload.clone(),
            at: Instant::now(),
        });

        match self.next_outcome(action_key).await {
            ScriptedOutcome::Succeed => Ok(true),
            ScriptedOutcome::Fail => Ok(false),
            ScriptedOutcome::Error(reason) => Err(InvocationError::HandlerFailed {
                action_key: action_key.clone(),
                reason,
            }
            .into()),
        }
    }
}

//! The host facade.
//!
//! A [`ForgebotService`] owns the trigger scheduler, the chain executor, the
//! catalog and the ceremony bridge. Hosts create one, install a ceremony
//! handler, and drive it through the operations below.

use crate::bridge::CeremonyBridge;
use crate::catalog::Catalog;
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::routing::ChainRoutingInvoker;
use chrono::{DateTime, Utc};
use forgebot_core::{ActionInvoker, ChainId, TriggerId};
use forgebot_ritual::{ChainExecutor, ChainHandle, RitualChain};
use forgebot_scheduler::{PollReport, TriggerScheduler};
use rootcause::prelude::{Report, ResultExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Timeline scheduler and ritual chain executor behind one handle.
#[derive(Debug)]
pub struct ForgebotService {
    catalog: Arc<Catalog>,
    scheduler: TriggerScheduler,
    executor: ChainExecutor,
    bridge: CeremonyBridge,
    poll_period: Duration,
}

impl ForgebotService {
    /// Creates a service over a catalog and registers the catalog's triggers.
    pub async fn new(catalog: Catalog, config: &ServiceConfig) -> Self {
        let catalog = Arc::new(catalog);
        let scheduler = TriggerScheduler::new();
        for trigger in &catalog.triggers {
            scheduler.register(trigger.clone()).await;
        }
        Self {
            catalog,
            scheduler,
            executor: ChainExecutor::with_max_steps(config.max_chain_steps),
            bridge: CeremonyBridge::new(),
            poll_period: config.poll_period(),
        }
    }

    /// Creates a service from configuration, loading the configured catalog
    /// file or falling back to the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns `Catalog` if the configured catalog file cannot be loaded.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, Report<ServiceError>> {
        let catalog = match &config.catalog_path {
            Some(path) => Catalog::from_file(path).context(ServiceError::Catalog)?,
            None => Catalog::builtin(),
        };
        Ok(Self::new(catalog, config).await)
    }

    /// Returns the catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the trigger scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &TriggerScheduler {
        &self.scheduler
    }

    /// Installs the ceremony handler.
    pub async fn set_ceremony_handler(&self, handler: Arc<dyn ActionInvoker>) {
        self.bridge.set_handler(handler).await;
    }

    /// Starts the timeline loop. Returns false if it is already running.
    pub fn start_timeline(&self) -> bool {
        let started = self
            .scheduler
            .start(self.poll_period, Arc::new(self.router()));
        if started {
            info!(poll_period = ?self.poll_period, "timeline started");
        }
        started
    }

    /// Signals the timeline loop to stop.
    pub fn stop_timeline(&self) {
        self.scheduler.stop();
    }

    /// Returns whether the timeline loop is running.
    #[must_use]
    pub fn is_timeline_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Evaluates the timeline once at `now`, outside the loop.
    pub async fn poll_timeline_once(&self, now: DateTime<Utc>) -> PollReport {
        self.scheduler.poll_once(now, &self.router()).await
    }

    /// Runs a catalog chain by id.
    ///
    /// # Errors
    ///
    /// Returns `UnknownChain` if the catalog has no such chain, and
    /// `ChainExecution` if the run does not complete.
    #[instrument(skip(self), fields(chain_id = %chain_id))]
    pub async fn execute_chain(&self, chain_id: &ChainId) -> Result<RitualChain, Report<ServiceError>> {
        let chain = self
            .catalog
            .chain(chain_id)
            .ok_or_else(|| ServiceError::UnknownChain {
                chain_id: chain_id.clone(),
            })?;
        self.execute_chain_definition(chain).await
    }

    /// Runs a caller-supplied chain definition.
    ///
    /// # Errors
    ///
    /// Returns `ChainExecution` if the run does not complete.
    pub async fn execute_chain_definition(
        &self,
        chain: RitualChain,
    ) -> Result<RitualChain, Report<ServiceError>> {
        let chain_id = chain.id.clone();
        self.executor
            .execute_chain(chain, &self.bridge)
            .await
            .context(ServiceError::ChainExecution { chain_id })
    }

    /// Records the latest value of a milestone trigger.
    ///
    /// # Errors
    ///
    /// Returns `TriggerUpdate` for an unknown or non-milestone trigger.
    pub async fn update_milestone_value(
        &self,
        trigger_id: &TriggerId,
        value: f64,
    ) -> Result<(), Report<ServiceError>> {
        self.scheduler
            .registry()
            .update_milestone_value(trigger_id, value)
            .await
            .context(ServiceError::TriggerUpdate {
                trigger_id: trigger_id.clone(),
            })
    }

    /// Returns the live record of a started chain.
    pub async fn chain_status(&self, chain_id: &ChainId) -> Option<ChainHandle> {
        self.executor.chain_status(chain_id).await
    }

    /// Returns snapshots of every started chain.
    pub async fn list_chains(&self) -> Vec<RitualChain> {
        self.executor.list_chains().await
    }

    /// Stops the timeline and detaches the ceremony handler.
    pub async fn shutdown(&self) {
        if self.scheduler.is_running() {
            self.scheduler.stop();
        } else {
            warn!("shutdown requested while timeline was not running");
        }
        self.bridge.clear_handler().await;
        info!("forgebot service shut down");
    }

    fn router(&self) -> ChainRoutingInvoker {
        ChainRoutingInvoker::new(
            self.catalog.clone(),
            self.executor.clone(),
            self.bridge.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use forgebot_core::{ScriptedInvoker, ScriptedOutcome};
    use forgebot_ritual::{ChainStatus, Step};
    use forgebot_scheduler::{MilestoneKind, TimelineTrigger};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    async fn builtin_with(handler: ScriptedInvoker) -> (ForgebotService, Arc<ScriptedInvoker>) {
        let service = ForgebotService::new(Catalog::builtin(), &ServiceConfig::default()).await;
        let handler = Arc::new(handler);
        service.set_ceremony_handler(handler.clone()).await;
        (service, handler)
    }

    #[tokio::test]
    async fn registers_catalog_triggers() {
        let (service, _handler) = builtin_with(ScriptedInvoker::succeeding()).await;
        assert_eq!(service.scheduler().registry().len().await, 6);
    }

    #[tokio::test]
    async fn first_poll_fires_interval_triggers_only() {
        let (service, handler) = builtin_with(ScriptedInvoker::succeeding()).await;

        let report = service.poll_timeline_once(now()).await;

        assert_eq!(report.invoked(), 3);
        assert_eq!(
            handler.invoked_keys().await,
            vec!["content_generation", "analytics_generation", "platform_sync"]
        );
    }

    #[tokio::test]
    async fn milestone_update_makes_trigger_due() {
        let (service, handler) = builtin_with(ScriptedInvoker::succeeding()).await;
        service.poll_timeline_once(now()).await;

        service
            .update_milestone_value(&TriggerId::new("milestone-100-sponsors"), 101.0)
            .await
            .unwrap();
        let report = service.poll_timeline_once(now()).await;

        assert_eq!(
            report.fired,
            vec![TriggerId::new("milestone-100-sponsors")]
        );
        let calls = handler.calls().await;
        let last = calls.last().unwrap();
        assert_eq!(last.action_key.as_str(), "milestone_celebration");
        assert_eq!(last.payload["celebrationType"], "epic");
    }

    #[tokio::test]
    async fn milestone_update_on_interval_trigger_fails() {
        let (service, _handler) = builtin_with(ScriptedInvoker::succeeding()).await;

        let err = service
            .update_milestone_value(&TriggerId::new("weekly-analytics"), 5.0)
            .await
            .unwrap_err();

        assert_eq!(
            err.current_context(),
            &ServiceError::TriggerUpdate {
                trigger_id: TriggerId::new("weekly-analytics")
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn executes_catalog_chain() {
        let (service, handler) = builtin_with(ScriptedInvoker::succeeding()).await;
        let chain_id = ChainId::new("emergency-alert");

        let finished = service.execute_chain(&chain_id).await.unwrap();

        assert_eq!(finished.status, ChainStatus::Completed);
        assert_eq!(
            handler.invoked_keys().await,
            vec![
                "validate_emergency",
                "notify_discord_admin",
                "notify_email_admin",
                "create_incident_log"
            ]
        );
        let handle = service.chain_status(&chain_id).await.unwrap();
        assert_eq!(handle.status().await, ChainStatus::Completed);
        assert_eq!(service.list_chains().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn onboarding_success_runs_follow_up() {
        let (service, handler) = builtin_with(ScriptedInvoker::succeeding()).await;

        let finished = service
            .execute_chain(&ChainId::new("new-sponsor-onboarding"))
            .await
            .unwrap();

        assert_eq!(finished.steps.len(), 5);
        assert_eq!(
            handler.invoked_keys().await,
            vec![
                "validate_sponsor",
                "assign_discord_role",
                "assign_discord_role",
                "send_welcome_message",
                "log_sponsor_event"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_validation_runs_remediation() {
        let (service, handler) = builtin_with(
            ScriptedInvoker::succeeding().with_outcome("validate_payment", ScriptedOutcome::Fail),
        )
        .await;

        let finished = service
            .execute_chain(&ChainId::new("scroll-pack-drop"))
            .await
            .unwrap();

        assert_eq!(finished.status, ChainStatus::Completed);
        let calls = handler.calls().await;
        assert_eq!(calls[1].action_key.as_str(), "payment_validation_failed");
        assert_eq!(calls[1].payload["failedStep"], "validate_payment");
        assert_eq!(calls.len(), 7);
    }

    #[tokio::test]
    async fn without_handler_chain_fails() {
        let service = ForgebotService::new(Catalog::builtin(), &ServiceConfig::default()).await;
        let chain_id = ChainId::new("new-sponsor-onboarding");

        let err = service.execute_chain(&chain_id).await.unwrap_err();

        assert_eq!(
            err.current_context(),
            &ServiceError::ChainExecution {
                chain_id: chain_id.clone()
            }
        );
        let handle = service.chain_status(&chain_id).await.unwrap();
        assert_eq!(handle.status().await, ChainStatus::Failed);
        assert_eq!(handle.current_step_index().await, 1);
    }

    #[tokio::test]
    async fn unknown_chain_is_rejected() {
        let (service, handler) = builtin_with(ScriptedInvoker::succeeding()).await;

        let err = service
            .execute_chain(&ChainId::new("moonrise"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.current_context(),
            ServiceError::UnknownChain { .. }
        ));
        assert!(handler.calls().await.is_empty());
    }

    #[tokio::test]
    async fn executes_ad_hoc_definition() {
        let (service, handler) = builtin_with(ScriptedInvoker::succeeding()).await;
        let chain = RitualChain::new(
            "ad-hoc",
            "Ad Hoc",
            "",
            vec![Step::new("light_candle"), Step::new("ring_bell")],
        );

        service.execute_chain_definition(chain).await.unwrap();

        assert_eq!(handler.invoked_keys().await, vec!["light_candle", "ring_bell"]);
    }

    #[tokio::test]
    async fn ad_hoc_definition_must_be_pending() {
        let (service, _handler) = builtin_with(ScriptedInvoker::succeeding()).await;
        let mut chain = RitualChain::new("done", "Done", "", vec![Step::new("a")]);
        chain.status = ChainStatus::Failed;

        let err = service.execute_chain_definition(chain).await.unwrap_err();

        assert!(matches!(
            err.current_context(),
            ServiceError::ChainExecution { .. }
        ));
        assert!(service.chain_status(&ChainId::new("done")).await.is_none());
    }

    #[tokio::test]
    async fn trigger_can_start_a_chain() {
        let catalog = Catalog::new(
            vec![TimelineTrigger::milestone(
                "ten-sponsors",
                "Ten Sponsors",
                MilestoneKind::SponsorCount,
                10.0,
                "chain:celebration",
            )],
            vec![RitualChain::new(
                "celebration",
                "Celebration",
                "",
                vec![Step::new("confetti"), Step::new("announce")],
            )],
        )
        .unwrap();
        let service = ForgebotService::new(catalog, &ServiceConfig::default()).await;
        let handler = Arc::new(ScriptedInvoker::succeeding());
        service.set_ceremony_handler(handler.clone()).await;

        service
            .update_milestone_value(&TriggerId::new("ten-sponsors"), 12.0)
            .await
            .unwrap();
        let report = service.poll_timeline_once(now()).await;

        assert_eq!(report.fired, vec![TriggerId::new("ten-sponsors")]);
        assert_eq!(handler.invoked_keys().await, vec!["confetti", "announce"]);
        let handle = service
            .chain_status(&ChainId::new("celebration"))
            .await
            .unwrap();
        assert_eq!(handle.status().await, ChainStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn timeline_runs_until_shutdown() {
        let config = ServiceConfig {
            poll_period_ms: 1_000,
            ..ServiceConfig::default()
        };
        let catalog = Catalog::new(
            vec![TimelineTrigger::interval(
                "hourly",
                "Hourly",
                Duration::from_secs(60 * 60),
                "platform_sync",
            )],
            vec![],
        )
        .unwrap();
        let service = ForgebotService::new(catalog, &config).await;
        let handler = Arc::new(ScriptedInvoker::succeeding());
        service.set_ceremony_handler(handler.clone()).await;

        assert!(service.start_timeline());
        assert!(!service.start_timeline());
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(service.is_timeline_running());

        service.shutdown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!service.is_timeline_running());
        assert_eq!(handler.invoked_keys().await, vec!["platform_sync"]);
    }

    #[tokio::test]
    async fn from_config_reports_bad_catalog_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            catalog_path: Some(dir.path().join("missing.json")),
            ..ServiceConfig::default()
        };

        let err = ForgebotService::from_config(&config).await.unwrap_err();
        assert_eq!(err.current_context(), &ServiceError::Catalog);
    }
}

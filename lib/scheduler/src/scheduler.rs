//! The timeline trigger scheduler.
//!
//! The scheduler polls its [`TriggerRegistry`] on a fixed period. Each poll
//! walks the triggers in registration order, invoking the ceremony of every
//! due trigger and awaiting it before moving on. A failing ceremony is logged
//! and skipped; it never stops the poll or the loop.
//!
//! The loop runs on a `tokio::time::interval` ticker raced against a `watch`
//! stop signal. Stopping only prevents future polls; an in-flight poll runs
//! to completion.

use crate::error::SchedulerError;
use crate::registry::TriggerRegistry;
use crate::trigger::{TimelineTrigger, TriggerType};
use chrono::{DateTime, Utc};
use forgebot_core::{ActionInvoker, TriggerId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

/// Shortest poll period the loop will use.
const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Outcome of a single poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Triggers whose ceremony was invoked successfully, in invocation order.
    pub fired: Vec<TriggerId>,
    /// Triggers whose ceremony failed or errored, in invocation order.
    pub failed: Vec<TriggerId>,
}

impl PollReport {
    /// Returns the number of ceremonies invoked during the poll.
    #[must_use]
    pub fn invoked(&self) -> usize {
        self.fired.len() + self.failed.len()
    }
}

struct SchedulerInner {
    registry: TriggerRegistry,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
}

/// Polls timeline triggers and invokes ceremonies for the due ones.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct TriggerScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for TriggerScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerScheduler")
            .field("registry", &self.inner.registry)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Default for TriggerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerScheduler {
    /// Creates a scheduler with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(TriggerRegistry::new())
    }

    /// Creates a scheduler over an existing registry.
    #[must_use]
    pub fn with_registry(registry: TriggerRegistry) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                registry,
                running: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    /// Returns the trigger registry.
    #[must_use]
    pub fn registry(&self) -> &TriggerRegistry {
        &self.inner.registry
    }

    /// Registers a trigger, replacing any trigger with the same id.
    pub async fn register(&self, trigger: TimelineTrigger) -> Option<TimelineTrigger> {
        self.inner.registry.register(trigger).await
    }

    /// Removes a trigger; it will not fire on any later poll.
    pub async fn unregister(&self, id: &TriggerId) -> Option<TimelineTrigger> {
        self.inner.registry.unregister(id).await
    }

    /// Evaluates every enabled trigger against `now` and invokes the due ones.
    ///
    /// Invocations are sequential, in registration order. Only `Ok(true)`
    /// counts as success; an interval trigger records `now` as its last
    /// firing only then, so a failed ceremony is retried on the next poll.
    /// Date and milestone triggers are not disabled after firing and fire
    /// again on every poll while their condition holds.
    #[instrument(skip(self, invoker), fields(triggers))]
    pub async fn poll_once(&self, now: DateTime<Utc>, invoker: &dyn ActionInvoker) -> PollReport {
        let registry = &self.inner.registry;
        let ids = registry.ids().await;
        tracing::Span::current().record("triggers", ids.len());

        let mut report = PollReport::default();
        for id in ids {
            // Re-read per trigger: an earlier ceremony may have unregistered,
            // disabled, or updated this one.
            let Some(due) = registry.due_invocation(&id, now).await else {
                continue;
            };

            info!(
                trigger_id = %id,
                trigger_name = %due.name,
                action_key = %due.action_key,
                "timeline trigger activated"
            );

            match invoker.invoke(&due.action_key, &due.payload).await {
                Ok(true) => {
                    if due.trigger_type == TriggerType::Interval {
                        registry.record_fired(&id, now).await;
                    }
                    report.fired.push(id);
                }
                Ok(false) => {
                    warn!(
                        trigger_id = %id,
                        action_key = %due.action_key,
                        "ceremony reported failure for timeline trigger"
                    );
                    report.failed.push(id);
                }
                Err(error) => {
                    warn!(
                        trigger_id = %id,
                        action_key = %due.action_key,
                        error = %error,
                        "failed to execute ceremony for timeline trigger"
                    );
                    report.failed.push(id);
                }
            }
        }
        report
    }

    /// Spawns the polling loop onto the Tokio runtime.
    ///
    /// Returns `false`, after logging a warning, if the loop is already
    /// running. If the loop task dies abnormally the failure is logged and
    /// [`is_running`](Self::is_running) becomes false.
    pub fn start(&self, poll_period: Duration, invoker: Arc<dyn ActionInvoker>) -> bool {
        let Some(shutdown) = self.try_begin() else {
            return false;
        };

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.supervise(poll_period, invoker, shutdown).await;
        });
        true
    }

    /// Runs the polling loop until [`stop`](Self::stop), returning once it
    /// has exited.
    ///
    /// Returns immediately, after logging a warning, if the loop is already
    /// running. A loop that dies abnormally is logged and does not unwind
    /// into the caller.
    pub async fn run(&self, poll_period: Duration, invoker: Arc<dyn ActionInvoker>) {
        let Some(shutdown) = self.try_begin() else {
            return;
        };
        self.supervise(poll_period, invoker, shutdown).await;
    }

    /// Signals the loop to exit before its next poll.
    pub fn stop(&self) {
        self.inner.shutdown.send_replace(true);
        info!("timeline trigger scheduler stopping");
    }

    /// Returns whether the polling loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Drives the loop task to completion, then releases the running flag.
    async fn supervise(
        &self,
        poll_period: Duration,
        invoker: Arc<dyn ActionInvoker>,
        shutdown: watch::Receiver<bool>,
    ) {
        let loop_task = tokio::spawn(self.clone().run_loop(poll_period, invoker, shutdown));
        if let Err(join_error) = loop_task.await {
            let error = SchedulerError::LoopTerminated {
                reason: join_error.to_string(),
            };
            error!(error = %error, "fatal error in timeline trigger scheduler");
        }
        self.inner.running.store(false, Ordering::SeqCst);
    }

    /// Claims the running flag and arms a fresh stop signal.
    fn try_begin(&self) -> Option<watch::Receiver<bool>> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("timeline trigger scheduler already running");
            return None;
        }
        self.inner.shutdown.send_replace(false);
        Some(self.inner.shutdown.subscribe())
    }

    async fn run_loop(
        self,
        poll_period: Duration,
        invoker: Arc<dyn ActionInvoker>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let poll_period = if poll_period < MIN_POLL_PERIOD {
            warn!(?poll_period, "poll period too short, clamping");
            MIN_POLL_PERIOD
        } else {
            poll_period
        };

        let mut ticker = tokio::time::interval(poll_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?poll_period, "timeline trigger scheduler started");

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.poll_once(Utc::now(), invoker.as_ref()).await;
                }
            }
        }

        info!("timeline trigger scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::MilestoneKind;
    use chrono::TimeZone;
    use forgebot_core::{
        ActionKey, FnInvoker, InvocationError, Payload, ScriptedInvoker, ScriptedOutcome,
    };
    use rootcause::Report;
    use std::sync::atomic::AtomicUsize;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn after(offset: Duration) -> DateTime<Utc> {
        t0() + chrono::Duration::from_std(offset).unwrap()
    }

    fn ids(list: &[TriggerId]) -> Vec<&str> {
        list.iter().map(TriggerId::as_str).collect()
    }

    #[tokio::test]
    async fn interval_without_last_fired_invokes_once_on_first_poll() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::interval("daily", "Daily", 24 * HOUR, "content_generation"))
            .await;
        let invoker = ScriptedInvoker::succeeding();

        let report = scheduler.poll_once(t0(), &invoker).await;

        assert_eq!(ids(&report.fired), vec!["daily"]);
        assert_eq!(invoker.invoked_keys().await, vec!["content_generation"]);
    }

    #[tokio::test]
    async fn interval_not_due_again_until_interval_elapses() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::interval("sync", "Sync", 6 * HOUR, "platform_sync"))
            .await;
        let invoker = ScriptedInvoker::succeeding();

        scheduler.poll_once(t0(), &invoker).await;
        let early = scheduler
            .poll_once(after(6 * HOUR - Duration::from_secs(1)), &invoker)
            .await;
        let on_time = scheduler.poll_once(after(6 * HOUR), &invoker).await;

        assert_eq!(early.invoked(), 0);
        assert_eq!(ids(&on_time.fired), vec!["sync"]);
        assert_eq!(invoker.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_interval_invocation_is_retried_next_poll() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::interval("sync", "Sync", HOUR, "platform_sync"))
            .await;
        let invoker = ScriptedInvoker::succeeding().with_sequence(
            "platform_sync",
            [
                ScriptedOutcome::Error("backend offline".to_string()),
                ScriptedOutcome::Fail,
                ScriptedOutcome::Succeed,
            ],
        );

        let first = scheduler.poll_once(t0(), &invoker).await;
        let second = scheduler.poll_once(after(Duration::from_secs(60)), &invoker).await;
        let third = scheduler.poll_once(after(Duration::from_secs(120)), &invoker).await;
        let fourth = scheduler.poll_once(after(Duration::from_secs(180)), &invoker).await;

        assert_eq!(ids(&first.failed), vec!["sync"]);
        assert_eq!(ids(&second.failed), vec!["sync"]);
        assert_eq!(ids(&third.fired), vec!["sync"]);
        assert_eq!(fourth.invoked(), 0, "last_fired advanced only on success");
    }

    #[tokio::test]
    async fn one_failing_trigger_does_not_block_the_rest() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::interval("a", "A", HOUR, "broken"))
            .await;
        scheduler
            .register(TimelineTrigger::interval("b", "B", HOUR, "healthy"))
            .await;
        let invoker = ScriptedInvoker::succeeding()
            .with_outcome("broken", ScriptedOutcome::Error("boom".to_string()));

        let report = scheduler.poll_once(t0(), &invoker).await;

        assert_eq!(ids(&report.failed), vec!["a"]);
        assert_eq!(ids(&report.fired), vec!["b"]);
    }

    #[tokio::test]
    async fn triggers_are_invoked_in_registration_order() {
        let scheduler = TriggerScheduler::new();
        for id in ["third", "first", "second"] {
            scheduler
                .register(TimelineTrigger::date(id, id, t0(), id))
                .await;
        }
        let invoker = ScriptedInvoker::succeeding();

        scheduler.poll_once(t0(), &invoker).await;

        assert_eq!(invoker.invoked_keys().await, vec!["third", "first", "second"]);
    }

    // Date triggers are level-triggered and are never auto-disabled, so the
    // same ceremony is invoked on every poll after the date.
    #[tokio::test]
    async fn date_trigger_fires_on_every_poll_after_date() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::date(
                "anniversary",
                "First Light Anniversary",
                t0(),
                "anniversary_celebration",
            ))
            .await;
        let invoker = ScriptedInvoker::succeeding();

        let before = scheduler
            .poll_once(t0() - chrono::Duration::seconds(1), &invoker)
            .await;
        for minute in 0..3 {
            let report = scheduler
                .poll_once(after(Duration::from_secs(60 * minute)), &invoker)
                .await;
            assert_eq!(ids(&report.fired), vec!["anniversary"]);
        }

        assert_eq!(before.invoked(), 0);
        assert_eq!(invoker.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn date_trigger_stops_once_disabled() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::date("d", "D", t0(), "x"))
            .await;
        let invoker = ScriptedInvoker::succeeding();

        scheduler.poll_once(t0(), &invoker).await;
        scheduler
            .registry()
            .set_enabled(&TriggerId::new("d"), false)
            .await
            .unwrap();
        let report = scheduler.poll_once(after(HOUR), &invoker).await;

        assert_eq!(report.invoked(), 0);
    }

    #[tokio::test]
    async fn milestone_stays_due_until_threshold_raised() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::milestone(
                "sponsors",
                "100 Sponsors",
                MilestoneKind::SponsorCount,
                100.0,
                "milestone_celebration",
            ))
            .await;
        let id = TriggerId::new("sponsors");
        let invoker = ScriptedInvoker::succeeding();

        assert_eq!(scheduler.poll_once(t0(), &invoker).await.invoked(), 0);

        scheduler
            .registry()
            .update_milestone_value(&id, 100.0)
            .await
            .unwrap();
        for hour in 0..3 {
            let report = scheduler.poll_once(after(HOUR * hour), &invoker).await;
            assert_eq!(ids(&report.fired), vec!["sponsors"]);
        }

        let mut raised = scheduler.registry().get(&id).await.unwrap();
        raised.condition = crate::trigger::TriggerCondition::Milestone {
            kind: MilestoneKind::SponsorCount,
            threshold: 250.0,
            current_value: Some(100.0),
        };
        scheduler.register(raised).await;
        assert_eq!(scheduler.poll_once(after(4 * HOUR), &invoker).await.invoked(), 0);
    }

    #[tokio::test]
    async fn unregistered_trigger_does_not_fire_again() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::date("d", "D", t0(), "x"))
            .await;
        let invoker = ScriptedInvoker::succeeding();

        assert_eq!(scheduler.poll_once(t0(), &invoker).await.invoked(), 1);
        scheduler.unregister(&TriggerId::new("d")).await;
        assert_eq!(scheduler.poll_once(after(HOUR), &invoker).await.invoked(), 0);
    }

    #[tokio::test]
    async fn ceremony_can_unregister_later_trigger_mid_poll() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::date("first", "First", t0(), "cleanup"))
            .await;
        scheduler
            .register(TimelineTrigger::date("second", "Second", t0(), "never"))
            .await;

        let handle = scheduler.clone();
        let invoker = FnInvoker::new(move |key: ActionKey, _payload: Payload| {
            let handle = handle.clone();
            async move {
                if key.as_str() == "cleanup" {
                    handle.unregister(&TriggerId::new("second")).await;
                }
                Ok::<_, Report<InvocationError>>(true)
            }
        });

        let report = scheduler.poll_once(t0(), &invoker).await;

        assert_eq!(ids(&report.fired), vec!["first"]);
    }

    #[tokio::test(start_paused = true)]
    async fn started_loop_polls_until_stopped() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::date(
                "past",
                "Past",
                Utc::now() - chrono::Duration::days(1),
                "x",
            ))
            .await;
        let invoker = Arc::new(ScriptedInvoker::succeeding());

        assert!(scheduler.start(Duration::from_secs(10), invoker.clone()));
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(25)).await;
        let polled = invoker.calls().await.len();
        assert!(polled >= 2, "expected repeated polls, got {polled}");

        scheduler.stop();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(invoker.calls().await.len(), polled);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_is_a_noop() {
        let scheduler = TriggerScheduler::new();
        let invoker: Arc<dyn ActionInvoker> = Arc::new(ScriptedInvoker::succeeding());

        assert!(scheduler.start(Duration::from_secs(60), invoker.clone()));
        assert!(!scheduler.start(Duration::from_secs(60), invoker.clone()));

        scheduler.stop();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!scheduler.is_running());
        assert!(scheduler.start(Duration::from_secs(60), invoker));
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_after_stop() {
        let scheduler = TriggerScheduler::new();
        let invoker: Arc<dyn ActionInvoker> = Arc::new(ScriptedInvoker::succeeding());

        let runner = scheduler.clone();
        let task = tokio::spawn(async move { runner.run(Duration::from_secs(5), invoker).await });
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(scheduler.is_running());

        scheduler.stop();
        task.await.unwrap();
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_ceremony_clears_running_flag() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::date(
                "past",
                "Past",
                Utc::now() - chrono::Duration::days(1),
                "explode",
            ))
            .await;
        assert!(scheduler.start(Duration::from_secs(10), panicking_invoker()));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!scheduler.is_running());
    }

    fn panicking_invoker() -> Arc<dyn ActionInvoker> {
        Arc::new(FnInvoker::new(|_key: ActionKey, _payload: Payload| async move {
            if true {
                panic!("ceremony handler bug");
            }
            Ok::<_, Report<InvocationError>>(true)
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_ceremony_under_run_clears_running_flag() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::date(
                "past",
                "Past",
                Utc::now() - chrono::Duration::days(1),
                "explode",
            ))
            .await;

        let runner = scheduler.clone();
        let task = tokio::spawn(async move {
            runner
                .run(Duration::from_secs(5), panicking_invoker())
                .await
        });

        assert!(task.await.is_ok(), "loop panic escaped run()");
        assert!(!scheduler.is_running());

        let invoker: Arc<dyn ActionInvoker> = Arc::new(ScriptedInvoker::succeeding());
        assert!(scheduler.start(Duration::from_secs(5), invoker));
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_lets_in_flight_ceremony_finish() {
        let scheduler = TriggerScheduler::new();
        scheduler
            .register(TimelineTrigger::date(
                "past",
                "Past",
                Utc::now() - chrono::Duration::days(1),
                "slow",
            ))
            .await;
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let invoker: Arc<dyn ActionInvoker> = {
            let started = started.clone();
            let finished = finished.clone();
            Arc::new(FnInvoker::new(move |_key: ActionKey, _payload: Payload| {
                let started = started.clone();
                let finished = finished.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Report<InvocationError>>(true)
                }
            }))
        };

        assert!(scheduler.start(Duration::from_secs(10), invoker));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        scheduler.stop();
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }
}

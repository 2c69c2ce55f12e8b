//! The static catalog of timeline triggers and ritual chains.
//!
//! A catalog is loaded once at start, either from the built-in tables or from
//! a file, and is read-only afterwards.

use crate::error::CatalogError;
use chrono::{TimeZone, Utc};
use forgebot_core::{ChainId, Payload, TriggerId};
use forgebot_ritual::{RitualChain, Step};
use forgebot_scheduler::{MilestoneKind, TimelineTrigger, TriggerCondition};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Trigger and chain definitions known to the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Timeline triggers, in registration order.
    #[serde(default)]
    pub triggers: Vec<TimelineTrigger>,
    /// Ritual chain definitions, all pending.
    #[serde(default)]
    pub chains: Vec<RitualChain>,
}

impl Catalog {
    /// Creates a catalog, rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTrigger` or `DuplicateChain` on a repeated id.
    pub fn new(
        triggers: Vec<TimelineTrigger>,
        chains: Vec<RitualChain>,
    ) -> Result<Self, Report<CatalogError>> {
        let catalog = Self { triggers, chains };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Loads a catalog file. The format follows the file extension.
    ///
    /// # Errors
    ///
    /// Returns `Load` if the file cannot be read or parsed, and a duplicate
    /// error if two entries share an id.
    pub fn from_file(path: &Path) -> Result<Self, Report<CatalogError>> {
        let load_error = |err: config::ConfigError| CatalogError::Load {
            path: path.to_path_buf(),
            reason: err.to_string(),
        };
        let catalog: Self = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(load_error)?
            .try_deserialize()
            .map_err(load_error)?;
        catalog.validate()?;
        info!(
            path = %path.display(),
            triggers = catalog.triggers.len(),
            chains = catalog.chains.len(),
            "loaded ritual catalog"
        );
        Ok(catalog)
    }

    /// Returns a trigger definition.
    #[must_use]
    pub fn trigger(&self, id: &TriggerId) -> Option<&TimelineTrigger> {
        self.triggers.iter().find(|trigger| &trigger.id == id)
    }

    /// Returns a fresh, pending copy of a chain definition.
    #[must_use]
    pub fn chain(&self, id: &ChainId) -> Option<RitualChain> {
        self.chains
            .iter()
            .find(|chain| &chain.id == id)
            .map(RitualChain::to_pending)
    }

    /// Returns the enabled triggers, in catalog order.
    pub fn active_triggers(&self) -> impl Iterator<Item = &TimelineTrigger> {
        self.triggers.iter().filter(|trigger| trigger.enabled)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut trigger_ids = HashSet::new();
        for trigger in &self.triggers {
            if !trigger_ids.insert(&trigger.id) {
                return Err(CatalogError::DuplicateTrigger {
                    id: trigger.id.clone(),
                });
            }
        }
        let mut chain_ids = HashSet::new();
        for chain in &self.chains {
            if !chain_ids.insert(&chain.id) {
                return Err(CatalogError::DuplicateChain {
                    id: chain.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// The built-in Forgebot timeline and ritual chains.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            triggers: builtin_triggers(),
            chains: builtin_chains(),
        }
    }
}

fn payload(value: JsonValue) -> Payload {
    match value {
        JsonValue::Object(map) => map,
        _ => Payload::new(),
    }
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn builtin_triggers() -> Vec<TimelineTrigger> {
    let first_light = Utc
        .with_ymd_and_hms(2026, 7, 28, 0, 0, 0)
        .single()
        .unwrap_or_default();

    vec![
        TimelineTrigger::interval(
            "daily-content-generation",
            "Daily Content Generation",
            DAY,
            "content_generation",
        )
        .with_payload(payload(json!({ "theme": "daily-shrine-update", "count": 3 }))),
        TimelineTrigger::interval(
            "weekly-analytics",
            "Weekly Analytics Report",
            7 * DAY,
            "analytics_generation",
        )
        .with_payload(payload(json!({ "reportType": "weekly", "includeCharts": true }))),
        TimelineTrigger::milestone(
            "milestone-100-sponsors",
            "100 Sponsors Milestone",
            MilestoneKind::SponsorCount,
            100.0,
            "milestone_celebration",
        )
        .with_payload(payload(
            json!({ "milestone": "100-sponsors", "celebrationType": "epic" }),
        )),
        TimelineTrigger::milestone(
            "revenue-1k-milestone",
            "$1K Revenue Milestone",
            MilestoneKind::RevenueThreshold,
            1000.0,
            "revenue_milestone",
        )
        .with_payload(payload(
            json!({ "threshold": 1000, "celebrationType": "legendary" }),
        )),
        TimelineTrigger::new(
            "first-light-anniversary-2026",
            "First Light Anniversary 2026",
            TriggerCondition::Date {
                scheduled_date: first_light,
                timezone: Some("UTC".to_string()),
            },
            "anniversary_celebration",
        )
        .with_payload(payload(json!({ "anniversary": "first-light", "year": 2026 }))),
        TimelineTrigger::interval(
            "platform-sync-regular",
            "Regular Platform Sync",
            6 * HOUR,
            "platform_sync",
        )
        .with_payload(payload(json!({
            "platforms": ["twitter", "discord", "patreon"],
            "syncType": "full"
        }))),
    ]
}

fn builtin_chains() -> Vec<RitualChain> {
    vec![
        RitualChain::new(
            "new-sponsor-onboarding",
            "New Sponsor Onboarding",
            "Welcome a new sponsor with role assignment and greeting",
            vec![
                Step::new("validate_sponsor")
                    .on_success("assign_discord_role")
                    .on_failure("notify_admin_validation_failed"),
                Step::new("assign_discord_role").with_delay(millis(1000)),
                Step::new("send_welcome_message")
                    .with_payload(payload(json!({ "messageType": "sponsor-welcome" })))
                    .with_delay(millis(2000)),
                Step::new("log_sponsor_event")
                    .with_payload(payload(json!({ "eventType": "onboarding_complete" })))
                    .fire_and_forget(),
            ],
        ),
        RitualChain::new(
            "scroll-pack-drop",
            "Scroll Pack Drop Ceremony",
            "Unseal and distribute a scroll pack to a paying sponsor",
            vec![
                Step::new("validate_payment").on_failure("payment_validation_failed"),
                Step::new("unseal_vault").with_delay(millis(1500)),
                Step::new("distribute_fragments").with_delay(millis(1000)),
                Step::new("emit_badge").with_delay(millis(500)),
                Step::new("celebrate_sponsor").with_delay(millis(1000)),
                Step::new("log_scroll_pack_event")
                    .with_payload(payload(json!({ "eventType": "scroll-pack-complete" })))
                    .fire_and_forget(),
            ],
        ),
        RitualChain::new(
            "monthly-analytics-pipeline",
            "Monthly Analytics Pipeline",
            "Collect, report, chart, publish and archive monthly analytics",
            vec![
                Step::new("collect_metrics").with_payload(payload(json!({ "period": "monthly" }))),
                Step::new("generate_analytics_report")
                    .with_payload(payload(json!({ "reportType": "comprehensive" })))
                    .with_delay(millis(3000)),
                Step::new("create_visualizations")
                    .with_payload(payload(
                        json!({ "chartTypes": ["revenue", "engagement", "growth"] }),
                    ))
                    .with_delay(millis(2000)),
                Step::new("publish_to_discord")
                    .with_payload(payload(json!({ "channel": "analytics" })))
                    .with_delay(millis(1000)),
                Step::new("archive_report").fire_and_forget(),
            ],
        ),
        RitualChain::new(
            "emergency-alert",
            "Emergency Alert Protocol",
            "Validate an emergency and alert administrators on every channel",
            vec![
                Step::new("validate_emergency").on_failure("log_false_alarm"),
                Step::new("notify_discord_admin")
                    .with_payload(payload(json!({ "priority": "critical" })))
                    .fire_and_forget(),
                Step::new("notify_email_admin")
                    .with_payload(payload(json!({ "priority": "critical" })))
                    .fire_and_forget(),
                Step::new("create_incident_log"),
            ],
        ),
        RitualChain::new(
            "platform-convergence",
            "Platform Convergence Ritual",
            "Synchronize every connected platform and verify the result",
            vec![
                Step::new("sync_discord"),
                Step::new("sync_twitter").with_delay(millis(500)),
                Step::new("sync_patreon").with_delay(millis(500)),
                Step::new("sync_github").with_delay(millis(500)),
                Step::new("verify_sync_status").with_delay(millis(1000)),
                Step::new("log_convergence_complete").fire_and_forget(),
            ],
        ),
    ]
}

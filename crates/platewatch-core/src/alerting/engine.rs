//! Alert engine state: rule set, notification list, connectivity

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{AlertNotification, AlertRule, AlertRuleInput, SensorSample};

use super::clock::{Clock, SystemClock};
use super::evaluator;

/// Engine shared between the poll scheduler and the API
pub type SharedEngine = Arc<RwLock<AlertEngine>>;

/// Reachability of the sensor source as seen by the last poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// No poll has completed yet
    #[default]
    Unknown,
    /// The last poll returned a sample
    Online,
    /// The last poll failed
    Offline,
}

/// Where the engine is in its poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    /// Waiting for the next tick
    #[default]
    Idle,
    /// A poll request is in flight
    Polling,
    /// Evaluating a fresh sample
    Evaluating,
    /// The last poll failed; returns to idle on the next tick
    Failed,
}

/// Read-only summary for the UI layer
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub connectivity: Connectivity,
    pub phase: EnginePhase,
    pub unread_count: usize,
    pub notification_count: usize,
    pub rule_count: usize,
    pub active_rule_count: usize,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Evaluates samples against the rule set and keeps the notification list
pub struct AlertEngine {
    clock: Arc<dyn Clock>,
    dedup_window: Duration,
    max_notifications: usize,
    group_names: BTreeMap<String, String>,
    rules: Vec<AlertRule>,
    /// Newest first
    notifications: Vec<AlertNotification>,
    latest_sample: Option<SensorSample>,
    connectivity: Connectivity,
    phase: EnginePhase,
    last_poll_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl AlertEngine {
    /// Create an engine on the system clock with an empty rule set
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine on the given clock with an empty rule set
    pub fn with_clock(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let window_ms = i64::try_from(config.dedup_window.as_millis()).unwrap_or(i64::MAX);

        Self {
            clock,
            dedup_window: Duration::milliseconds(window_ms),
            max_notifications: config.max_notifications,
            group_names: config.group_names.clone(),
            rules: Vec::new(),
            notifications: Vec::new(),
            latest_sample: None,
            connectivity: Connectivity::Unknown,
            phase: EnginePhase::Idle,
            last_poll_at: None,
            last_error: None,
        }
    }

    /// Wrap the engine for sharing with the scheduler and API
    pub fn into_shared(self) -> SharedEngine {
        Arc::new(RwLock::new(self))
    }

    // --- Rules ---

    /// Current rule set, in insertion order
    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Look up a rule by id
    pub fn rule(&self, id: &str) -> Option<&AlertRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Validate and append a rule
    pub fn add_rule(&mut self, input: AlertRuleInput) -> Result<AlertRule> {
        let rule = input.into_rule()?;
        if self.rule(&rule.id).is_some() {
            return Err(Error::conflict("Rule", rule.id));
        }

        info!(rule_id = %rule.id, group = rule.group_key(), "Rule added");
        self.rules.push(rule.clone());
        Ok(rule)
    }

    /// Replace a rule's definition in place, keeping its id and position
    pub fn update_rule(&mut self, id: &str, input: AlertRuleInput) -> Result<AlertRule> {
        let slot = self.position(id)?;
        let rule = input.into_rule_with_id(id.to_string())?;

        info!(rule_id = %id, "Rule updated");
        self.rules[slot] = rule.clone();
        Ok(rule)
    }

    /// Remove a rule
    pub fn delete_rule(&mut self, id: &str) -> Result<AlertRule> {
        let slot = self.position(id)?;
        info!(rule_id = %id, "Rule deleted");
        Ok(self.rules.remove(slot))
    }

    /// Flip a rule's active flag
    pub fn toggle_rule(&mut self, id: &str) -> Result<AlertRule> {
        let slot = self.position(id)?;
        let rule = &mut self.rules[slot];
        rule.is_active = !rule.is_active;

        info!(rule_id = %id, active = rule.is_active, "Rule toggled");
        Ok(rule.clone())
    }

    /// Swap in a whole rule set, e.g. one loaded from disk
    pub fn replace_rules(&mut self, rules: Vec<AlertRule>) {
        for rule in rules.iter().filter(|r| !r.operator.is_known()) {
            warn!(rule_id = %rule.id, operator = %rule.operator, "Rule has unknown operator and will never match");
        }
        self.rules = rules;
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.rules
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::not_found("Rule", id))
    }

    // --- Notifications ---

    /// Notifications, newest first
    pub fn notifications(&self) -> &[AlertNotification] {
        &self.notifications
    }

    /// Number of notifications not yet read
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }

    /// Mark one notification as read
    pub fn mark_read(&mut self, id: &str) -> Result<()> {
        let notification = self
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::not_found("Notification", id))?;
        notification.is_read = true;
        Ok(())
    }

    /// Mark every notification as read, returning how many changed
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for notification in self.notifications.iter_mut().filter(|n| !n.is_read) {
            notification.is_read = true;
            changed += 1;
        }
        changed
    }

    /// Remove one notification
    pub fn delete_notification(&mut self, id: &str) -> Result<AlertNotification> {
        let slot = self
            .notifications
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| Error::not_found("Notification", id))?;
        Ok(self.notifications.remove(slot))
    }

    /// Remove every notification, returning how many were dropped
    pub fn clear_notifications(&mut self) -> usize {
        let count = self.notifications.len();
        self.notifications.clear();
        count
    }

    /// Restore a notification list, e.g. one loaded from disk.
    ///
    /// The list is re-sorted newest first and cut to the configured bound.
    pub fn restore_notifications(&mut self, mut notifications: Vec<AlertNotification>) {
        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        notifications.truncate(self.max_notifications);
        self.notifications = notifications;
    }

    // --- Evaluation ---

    /// Group ids that trigger for the sample under the current rule set
    pub fn evaluate(&self, sample: &SensorSample) -> Vec<String> {
        evaluator::evaluate_sample(sample, &self.rules)
    }

    /// Display name for a group, falling back to the given rule name
    pub fn group_display_name(&self, group_id: &str, fallback: &str) -> String {
        self.group_names
            .get(group_id)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Build and record a notification for a triggered group.
    ///
    /// Returns `None` when the group is empty or when a notification for the
    /// same group is younger than the dedup window.
    pub fn emit(
        &mut self,
        group_id: &str,
        rules: &[AlertRule],
        sample: &SensorSample,
    ) -> Option<AlertNotification> {
        let lead = rules.first()?;
        let now = self.clock.now();

        if let Some(recent) = self
            .notifications
            .iter()
            .find(|n| n.rule_id == group_id && now - n.timestamp < self.dedup_window)
        {
            debug!(
                group = group_id,
                recent_id = %recent.id,
                "Notification suppressed (dedup window)"
            );
            return None;
        }

        let rule_name = self.group_display_name(group_id, &lead.name);
        let notification = AlertNotification {
            id: self.unique_id(now, group_id),
            rule_id: group_id.to_string(),
            message: AlertNotification::message_for(&rule_name),
            rule_name,
            timestamp: now,
            severity: lead.severity,
            data: sample.clone(),
            is_read: false,
        };

        info!(
            group = group_id,
            notification_id = %notification.id,
            severity = %notification.severity,
            "Alert triggered"
        );

        self.notifications.insert(0, notification.clone());
        self.notifications.truncate(self.max_notifications);
        Some(notification)
    }

    fn unique_id(&self, at: DateTime<Utc>, group_id: &str) -> String {
        let base = AlertNotification::base_id(at, group_id);
        let taken = |candidate: &str| self.notifications.iter().any(|n| n.id == candidate);

        if !taken(&base) {
            return base;
        }
        let mut suffix = 1;
        loop {
            let candidate = format!("{base}-{suffix}");
            if !taken(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Evaluate a freshly polled sample and emit notifications for every
    /// triggered group, in group order.
    pub fn process_sample(&mut self, sample: SensorSample) -> Vec<AlertNotification> {
        self.phase = EnginePhase::Evaluating;
        self.connectivity = Connectivity::Online;
        self.last_poll_at = Some(self.clock.now());
        self.last_error = None;

        let triggered: Vec<(String, Vec<AlertRule>)> =
            evaluator::triggered_groups(&sample, &self.rules)
                .into_iter()
                .map(|group| {
                    let members = group.rules.into_iter().cloned().collect();
                    (group.id.to_string(), members)
                })
                .collect();

        debug!(
            fields = sample.len(),
            triggered = triggered.len(),
            "Sample evaluated"
        );

        let emitted = triggered
            .iter()
            .filter_map(|(group_id, members)| self.emit(group_id, members, &sample))
            .collect();

        self.latest_sample = Some(sample);
        self.phase = EnginePhase::Idle;
        emitted
    }

    /// Record a failed poll. Rules and notifications are left untouched.
    pub fn poll_failed(&mut self, error: &Error) {
        self.connectivity = Connectivity::Offline;
        self.phase = EnginePhase::Failed;
        self.last_poll_at = Some(self.clock.now());
        self.last_error = Some(error.to_string());
        self.latest_sample = None;
    }

    /// Record the scheduler's progress through a cycle
    pub fn set_phase(&mut self, phase: EnginePhase) {
        self.phase = phase;
    }

    /// Most recent successfully polled sample
    pub fn latest_sample(&self) -> Option<&SensorSample> {
        self.latest_sample.as_ref()
    }

    /// Connectivity flag from the last poll
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Summary for the UI layer
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            connectivity: self.connectivity,
            phase: self.phase,
            unread_count: self.unread_count(),
            notification_count: self.notifications.len(),
            rule_count: self.rules.len(),
            active_rule_count: self.rules.iter().filter(|r| r.is_active).count(),
            last_poll_at: self.last_poll_at,
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::clock::ManualClock;
    use crate::models::{default_rules, Operator, RuleValue, Severity};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn engine_at(start: DateTime<Utc>) -> (AlertEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let mut engine = AlertEngine::with_clock(&EngineConfig::default(), clock.clone());
        engine.replace_rules(default_rules());
        (engine, clock)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn overplating_sample() -> SensorSample {
        SensorSample::new()
            .with("temperature", "TEMP_55.0C")
            .with("voltage", "VOLTAGE_30.0V")
            .with("ph_level", "PH_2.0")
    }

    #[test]
    fn test_emit_uses_group_name_and_lead_severity() {
        let (mut engine, _) = engine_at(start());

        let emitted = engine.process_sample(overplating_sample());
        assert_eq!(emitted.len(), 1);

        let n = &emitted[0];
        assert_eq!(n.rule_id, "overplating_roughness");
        assert_eq!(n.rule_name, "Overplating + Roughness");
        assert_eq!(n.severity, Severity::Error);
        assert_eq!(n.id, format!("{}_overplating_roughness", start().timestamp_millis()));
        assert_eq!(n.data, overplating_sample());
        assert!(!n.is_read);
        assert_eq!(engine.unread_count(), 1);
    }

    #[test]
    fn test_emit_falls_back_to_lead_rule_name() {
        let (mut engine, _) = engine_at(start());
        let rule = engine
            .add_rule(AlertRuleInput {
                name: Some("Conveyor jam".to_string()),
                field: Some("status".to_string()),
                operator: Some(Operator::Contains),
                value: Some(RuleValue::Text("JAM".to_string())),
                severity: Some(Severity::Info),
                ..Default::default()
            })
            .unwrap();

        let emitted = engine.process_sample(SensorSample::new().with("status", "BELT_JAM_3"));
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].rule_id, rule.id);
        assert_eq!(emitted[0].rule_name, "Conveyor jam");
        assert_eq!(emitted[0].message, "Conveyor jam defect risk - all conditions met");
        assert_eq!(emitted[0].severity, Severity::Info);
    }

    #[test]
    fn test_dedup_window_is_sliding() {
        let (mut engine, clock) = engine_at(start());

        assert_eq!(engine.process_sample(overplating_sample()).len(), 1);

        clock.advance(Duration::seconds(30));
        assert!(engine.process_sample(overplating_sample()).is_empty());

        clock.advance(Duration::seconds(29));
        assert!(engine.process_sample(overplating_sample()).is_empty());

        clock.advance(Duration::seconds(1));
        assert_eq!(engine.process_sample(overplating_sample()).len(), 1);
        assert_eq!(engine.notifications().len(), 2);
    }

    #[test]
    fn test_deleted_notification_no_longer_suppresses() {
        let (mut engine, _) = engine_at(start());
        let first = engine.process_sample(overplating_sample()).remove(0);

        engine.delete_notification(&first.id).unwrap();
        let again = engine.process_sample(overplating_sample());
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, first.id);
    }

    #[test]
    fn test_notification_ids_stay_unique() {
        let (mut engine, _) = engine_at(start());
        let first = engine.process_sample(overplating_sample()).remove(0);

        // Same millisecond, same group, but the earlier one no longer blocks
        engine.notifications[0].rule_id = "archived".to_string();
        let second = engine.process_sample(overplating_sample()).remove(0);
        assert_eq!(second.id, format!("{}-1", first.id));
    }

    #[test]
    fn test_notifications_newest_first_and_bounded() {
        let clock = Arc::new(ManualClock::new(start()));
        let config = EngineConfig {
            max_notifications: 2,
            ..EngineConfig::default()
        };
        let mut engine = AlertEngine::with_clock(&config, clock.clone());
        engine.replace_rules(default_rules());

        for _ in 0..3 {
            engine.process_sample(overplating_sample());
            clock.advance(Duration::minutes(2));
        }

        let stamps: Vec<_> = engine.notifications().iter().map(|n| n.timestamp).collect();
        assert_eq!(stamps.len(), 2);
        assert!(stamps[0] > stamps[1]);
    }

    #[test]
    fn test_poll_failure_keeps_state() {
        let (mut engine, _) = engine_at(start());
        engine.process_sample(overplating_sample());
        let rules_before = engine.rules().to_vec();
        let notifications_before = engine.notifications().to_vec();

        engine.poll_failed(&Error::EmptyPayload);

        assert_eq!(engine.rules(), rules_before.as_slice());
        assert_eq!(engine.notifications(), notifications_before.as_slice());
        assert_eq!(engine.connectivity(), Connectivity::Offline);
        assert!(engine.latest_sample().is_none());

        let status = engine.status();
        assert_eq!(status.phase, EnginePhase::Failed);
        assert!(status.last_error.is_some());
    }

    #[test]
    fn test_toggle_takes_effect_next_evaluation() {
        let (mut engine, clock) = engine_at(start());
        let toggled = engine.toggle_rule("1").unwrap();
        assert!(!toggled.is_active);

        // The voltage member still matches, but the group is out of play
        assert!(engine.process_sample(overplating_sample()).is_empty());

        engine.toggle_rule("1").unwrap();
        clock.advance(Duration::seconds(10));
        assert_eq!(engine.process_sample(overplating_sample()).len(), 1);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let (mut engine, _) = engine_at(start());
        assert!(matches!(engine.delete_rule("nope"), Err(Error::NotFound { .. })));
        assert!(matches!(engine.toggle_rule("nope"), Err(Error::NotFound { .. })));
        assert!(matches!(engine.mark_read("nope"), Err(Error::NotFound { .. })));
        assert!(matches!(
            engine.delete_notification("nope"),
            Err(Error::NotFound { .. })
        ));
        assert_eq!(engine.rules().len(), 6);
    }

    #[test]
    fn test_add_rule_rejects_duplicate_id() {
        let (mut engine, _) = engine_at(start());
        let input = AlertRuleInput {
            id: Some("1".to_string()),
            name: Some("dup".to_string()),
            field: Some("voltage".to_string()),
            value: Some(RuleValue::Number(1.0)),
            ..Default::default()
        };
        assert!(matches!(engine.add_rule(input), Err(Error::Conflict { .. })));
    }

    #[test]
    fn test_update_rule_keeps_position() {
        let (mut engine, _) = engine_at(start());
        let mut input = AlertRuleInput::from(engine.rule("3").unwrap().clone());
        input.value = Some(RuleValue::Number(6.0));

        let updated = engine.update_rule("3", input).unwrap();
        assert_eq!(updated.value, RuleValue::Number(6.0));
        assert_eq!(engine.rules()[2].id, "3");
    }

    #[test]
    fn test_mark_read_and_unread_count() {
        let (mut engine, clock) = engine_at(start());
        let first = engine.process_sample(overplating_sample()).remove(0);
        clock.advance(Duration::minutes(5));
        engine.process_sample(overplating_sample());
        assert_eq!(engine.unread_count(), 2);

        engine.mark_read(&first.id).unwrap();
        assert_eq!(engine.unread_count(), 1);
        assert_eq!(engine.mark_all_read(), 1);
        assert_eq!(engine.unread_count(), 0);
    }
}

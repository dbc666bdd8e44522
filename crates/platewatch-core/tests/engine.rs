use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use platewatch::alerting::{AlertEngine, ManualClock};
use platewatch::config::EngineConfig;
use platewatch::models::{
    default_rules, AlertRule, AlertRuleInput, Operator, RuleValue, SensorSample, Severity,
};

fn engine() -> (AlertEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 20, 6, 30, 0).unwrap(),
    ));
    let mut engine = AlertEngine::with_clock(&EngineConfig::default(), clock.clone());
    engine.replace_rules(default_rules());
    (engine, clock)
}

fn peeling_sample() -> SensorSample {
    SensorSample::new()
        .with("voltage", "VOLTAGE_5.0V")
        .with("ph_level", "PH_4.2")
        .with("temperature", "TEMP_40.0C")
}

#[test]
fn encoded_temperature_satisfies_threshold() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let mut engine = AlertEngine::with_clock(&EngineConfig::default(), clock);
    engine
        .add_rule(AlertRuleInput {
            id: Some("hot".to_string()),
            name: Some("Hot bath".to_string()),
            field: Some("temperature".to_string()),
            operator: Some(Operator::Gte),
            value: Some(RuleValue::Number(52.46)),
            ..Default::default()
        })
        .unwrap();

    let triggered = engine.evaluate(&SensorSample::new().with("temperature", "TEMP_55.0C"));
    assert_eq!(triggered, vec!["hot".to_string()]);
}

#[test]
fn partial_group_match_does_not_fire() {
    let (mut engine, _) = engine();

    // Voltage low enough but pH too low for the peeling group
    let emitted = engine.process_sample(
        SensorSample::new()
            .with("voltage", "VOLTAGE_5.0V")
            .with("ph_level", "PH_2.0"),
    );
    assert!(emitted.is_empty());
}

#[test]
fn dedup_window_suppresses_then_reopens() {
    let (mut engine, clock) = engine();

    let first = engine.process_sample(peeling_sample());
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].rule_id, "peeling_adhesion");
    assert_eq!(first[0].severity, Severity::Error);

    clock.advance(Duration::seconds(30));
    assert!(engine.process_sample(peeling_sample()).is_empty());

    clock.advance(Duration::seconds(31));
    let third = engine.process_sample(peeling_sample());
    assert_eq!(third.len(), 1);

    let notifications = engine.notifications();
    assert_eq!(notifications.len(), 2);
    assert!(notifications[0].timestamp > notifications[1].timestamp);
}

#[test]
fn deactivated_rule_removes_its_group() {
    let (mut engine, _) = engine();

    engine.toggle_rule("3").unwrap();
    assert!(engine.process_sample(peeling_sample()).is_empty());
    assert!(engine.evaluate(&peeling_sample()).is_empty());

    engine.toggle_rule("3").unwrap();
    assert_eq!(engine.process_sample(peeling_sample()).len(), 1);
}

#[test]
fn add_then_delete_restores_rule_set() {
    let (mut engine, _) = engine();
    let before: HashSet<String> = engine.rules().iter().map(|r| r.id.clone()).collect();
    let snapshot: Vec<AlertRule> = engine.rules().to_vec();

    let added = engine
        .add_rule(AlertRuleInput {
            name: Some("Nickel ratio".to_string()),
            field: Some("nickel".to_string()),
            operator: Some(Operator::Contains),
            value: Some(RuleValue::Text("high".to_string())),
            group_id: Some("nickel".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(engine.rules().len(), before.len() + 1);

    engine.delete_rule(&added.id).unwrap();
    let after: HashSet<String> = engine.rules().iter().map(|r| r.id.clone()).collect();
    assert_eq!(after, before);
    assert_eq!(engine.rules(), snapshot.as_slice());
}

#[test]
fn groups_fire_in_rule_order() {
    let (mut engine, _) = engine();
    engine.replace_rules(
        default_rules()
            .into_iter()
            .map(|mut rule| {
                // Collapse every threshold so all groups hold at once
                rule.operator = Operator::Ne;
                rule.value = RuleValue::Number(-1.0);
                rule
            })
            .collect(),
    );

    let sample = SensorSample::new()
        .with("temperature", 20.0)
        .with("voltage", 20.0)
        .with("ph_level", 2.0);
    let emitted = engine.process_sample(sample);
    let groups: Vec<&str> = emitted.iter().map(|n| n.rule_id.as_str()).collect();
    assert_eq!(
        groups,
        vec!["overplating_roughness", "peeling_adhesion", "stain_corrosion"]
    );
}

#[test]
fn missing_field_does_not_stop_other_groups() {
    let (mut engine, _) = engine();

    let sample = SensorSample::new()
        .with("temperature", serde_json::Value::Null)
        .with("voltage", 5.0)
        .with("ph_level", "PH_3.5");
    let emitted = engine.process_sample(sample);
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].rule_id, "peeling_adhesion");
}

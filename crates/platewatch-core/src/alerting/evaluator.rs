//! Rule group evaluation
//!
//! Active rules are bucketed by group key in first-seen order. A group
//! triggers when every one of its rules holds for the same sample.

use std::collections::HashMap;
use tracing::trace;

use crate::models::{AlertRule, SensorSample};

use super::condition::{evaluate_condition, normalize_field};

/// Active rules sharing one group key, in rule-list order
#[derive(Debug, Clone)]
pub struct RuleGroup<'a> {
    /// Group key (`groupId`, or the rule id for ungrouped rules)
    pub id: &'a str,
    /// Member rules; the first one is the group's representative
    pub rules: Vec<&'a AlertRule>,
}

impl<'a> RuleGroup<'a> {
    /// The representative rule whose name and severity the group reports
    pub fn lead(&self) -> &'a AlertRule {
        self.rules[0]
    }
}

/// Bucket every rule by group key, preserving insertion order of both
/// groups and members.
pub fn group_rules(rules: &[AlertRule]) -> Vec<RuleGroup<'_>> {
    let mut groups: Vec<RuleGroup<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for rule in rules {
        let key = rule.group_key();
        match index.get(key) {
            Some(&slot) => groups[slot].rules.push(rule),
            None => {
                index.insert(key, groups.len());
                groups.push(RuleGroup {
                    id: key,
                    rules: vec![rule],
                });
            }
        }
    }

    groups
}

/// Groups eligible for evaluation.
///
/// A deactivated rule takes its whole group out of consideration, so
/// switching off one condition never widens a compound alert.
pub fn group_active_rules(rules: &[AlertRule]) -> Vec<RuleGroup<'_>> {
    group_rules(rules)
        .into_iter()
        .filter(|group| group.rules.iter().all(|rule| rule.is_active))
        .collect()
}

/// Whether a single rule holds for the sample. A missing or null field is false.
pub fn rule_matches(rule: &AlertRule, sample: &SensorSample) -> bool {
    let Some(field) = sample.get(&rule.field).and_then(normalize_field) else {
        trace!(rule_id = %rule.id, field = %rule.field, "Field absent from sample");
        return false;
    };

    evaluate_condition(&field, &rule.operator, &rule.value)
}

/// Groups whose every active rule holds for the sample, in group order
pub fn triggered_groups<'a>(sample: &SensorSample, rules: &'a [AlertRule]) -> Vec<RuleGroup<'a>> {
    group_active_rules(rules)
        .into_iter()
        .filter(|group| group.rules.iter().all(|rule| rule_matches(rule, sample)))
        .collect()
}

/// Ids of the groups that trigger for the sample, in group order
pub fn evaluate_sample(sample: &SensorSample, rules: &[AlertRule]) -> Vec<String> {
    triggered_groups(sample, rules)
        .into_iter()
        .map(|group| group.id.to_string())
        .collect()
}

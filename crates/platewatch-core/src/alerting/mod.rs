//! Alerting system for PlateWatch
//!
//! Normalizes sensor fields, evaluates AND-joined rule groups against each
//! polled sample, and keeps a deduplicated notification list.

mod clock;
mod condition;
mod engine;
mod evaluator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::{evaluate_condition, loose_eq, normalize_field, FieldValue};
pub use engine::{AlertEngine, Connectivity, EnginePhase, EngineStatus, SharedEngine};
pub use evaluator::{
    evaluate_sample, group_active_rules, group_rules, rule_matches, triggered_groups, RuleGroup,
};

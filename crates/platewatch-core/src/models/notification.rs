//! Alert notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rule::Severity;
use super::sample::SensorSample;

/// A notification raised when every rule in a group matched one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertNotification {
    /// Unique identifier, derived from emission time and group id
    pub id: String,

    /// Group id that triggered this notification
    pub rule_id: String,

    /// Display name of the group
    pub rule_name: String,

    /// Human-readable summary
    pub message: String,

    /// When the notification was created
    pub timestamp: DateTime<Utc>,

    /// Severity of the group's first rule
    pub severity: Severity,

    /// The sample that triggered the notification
    pub data: SensorSample,

    /// Whether the consumer has read this notification
    pub is_read: bool,
}

impl AlertNotification {
    /// Base identifier for a notification emitted at `at` for `group_id`
    pub fn base_id(at: DateTime<Utc>, group_id: &str) -> String {
        format!("{}_{}", at.timestamp_millis(), group_id)
    }

    /// Summary text for a group match
    pub fn message_for(display_name: &str) -> String {
        format!("{display_name} defect risk - all conditions met")
    }
}

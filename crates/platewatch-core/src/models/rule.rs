//! Alert rule data models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Comparison operator applied between a sensor field and a rule threshold
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    /// Greater than
    #[default]
    Gt,
    /// Less than
    Lt,
    /// Loose equality
    Eq,
    /// Greater than or equal to
    Gte,
    /// Less than or equal to
    Lte,
    /// Loose inequality
    Ne,
    /// Substring match on the string forms of both operands
    Contains,
    /// Operator symbol this engine does not understand; never matches
    Unknown(String),
}

impl Operator {
    /// The wire symbol for this operator
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Ne => "!=",
            Self::Contains => "contains",
            Self::Unknown(symbol) => symbol,
        }
    }

    /// Whether this operator is one of the known symbols
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for Operator {
    fn from(symbol: String) -> Self {
        match symbol.as_str() {
            ">" => Self::Gt,
            "<" => Self::Lt,
            "==" => Self::Eq,
            ">=" => Self::Gte,
            "<=" => Self::Lte,
            "!=" => Self::Ne,
            "contains" => Self::Contains,
            _ => Self::Unknown(symbol),
        }
    }
}

impl From<&str> for Operator {
    fn from(symbol: &str) -> Self {
        Self::from(symbol.to_string())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Unknown(symbol) => symbol,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Alert severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Warning
    #[default]
    Warning,
    /// Error
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Threshold a rule compares against: either a number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    /// Numeric threshold
    Number(f64),
    /// String threshold (also used for `contains`)
    Text(String),
}

impl RuleValue {
    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }
}

impl From<f64> for RuleValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RuleValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.pad(&n.to_string()),
            Self::Text(s) => f.pad(s),
        }
    }
}

/// An alert rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    /// Unique identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Sensor field this rule reads
    pub field: String,

    /// Comparison operator
    pub operator: Operator,

    /// Threshold value
    pub value: RuleValue,

    /// Severity of notifications raised by this rule's group
    pub severity: Severity,

    /// Inactive rules are skipped during evaluation
    pub is_active: bool,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Rules sharing a group id are AND-joined into one condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl AlertRule {
    /// Key of the group this rule belongs to.
    ///
    /// Rules without a group id (or with an empty one) form a singleton group
    /// keyed by their own id.
    pub fn group_key(&self) -> &str {
        match self.group_id.as_deref() {
            Some(group) if !group.is_empty() => group,
            _ => &self.id,
        }
    }
}

/// Input for creating or replacing an alert rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRuleInput {
    pub id: Option<String>,
    pub name: Option<String>,
    pub field: Option<String>,
    pub operator: Option<Operator>,
    pub value: Option<RuleValue>,
    pub severity: Option<Severity>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
    pub group_id: Option<String>,
}

impl AlertRuleInput {
    /// Validate the input and build a rule, generating an id when none is given
    pub fn into_rule(self) -> Result<AlertRule> {
        let id = match self.id.clone() {
            Some(id) if id.trim().is_empty() => {
                return Err(Error::validation("rule id must not be blank"))
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };
        self.into_rule_with_id(id)
    }

    /// Validate the input and build a rule carrying the given id
    pub fn into_rule_with_id(self, id: String) -> Result<AlertRule> {
        let name = required_text(self.name, "name")?;
        let field = required_text(self.field, "field")?;

        let value = match self.value {
            Some(value) if !value.is_blank() => value,
            _ => return Err(Error::validation("rule value is required")),
        };

        let operator = self.operator.unwrap_or_default();
        if !operator.is_known() {
            return Err(Error::validation(format!("unknown operator '{operator}'")));
        }

        Ok(AlertRule {
            id,
            name,
            field,
            operator,
            value,
            severity: self.severity.unwrap_or_default(),
            is_active: self.is_active.unwrap_or(true),
            description: self.description.unwrap_or_default(),
            group_id: self.group_id.filter(|g| !g.is_empty()),
        })
    }
}

impl From<AlertRule> for AlertRuleInput {
    fn from(rule: AlertRule) -> Self {
        Self {
            id: Some(rule.id),
            name: Some(rule.name),
            field: Some(rule.field),
            operator: Some(rule.operator),
            value: Some(rule.value),
            severity: Some(rule.severity),
            is_active: Some(rule.is_active),
            description: Some(rule.description),
            group_id: rule.group_id,
        }
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(Error::validation(format!("rule {field} is required"))),
    }
}

/// Group id for over-plating and surface roughness risk
pub const GROUP_OVERPLATING_ROUGHNESS: &str = "overplating_roughness";
/// Group id for peeling and poor adhesion risk
pub const GROUP_PEELING_ADHESION: &str = "peeling_adhesion";
/// Group id for staining and corrosion risk
pub const GROUP_STAIN_CORROSION: &str = "stain_corrosion";

/// Display names for the built-in plating defect groups
pub fn default_group_names() -> BTreeMap<String, String> {
    [
        (GROUP_OVERPLATING_ROUGHNESS, "Overplating + Roughness"),
        (GROUP_PEELING_ADHESION, "Peeling / Poor Adhesion"),
        (GROUP_STAIN_CORROSION, "Stain / Corrosion"),
    ]
    .into_iter()
    .map(|(id, name)| (id.to_string(), name.to_string()))
    .collect()
}

/// The built-in plating line rule set: three defect groups, two conditions each
pub fn default_rules() -> Vec<AlertRule> {
    #[allow(clippy::too_many_arguments)]
    fn rule(
        id: &str,
        name: &str,
        field: &str,
        operator: Operator,
        value: f64,
        severity: Severity,
        description: &str,
        group: &str,
    ) -> AlertRule {
        AlertRule {
            id: id.to_string(),
            name: name.to_string(),
            field: field.to_string(),
            operator,
            value: RuleValue::Number(value),
            severity,
            is_active: true,
            description: description.to_string(),
            group_id: Some(group.to_string()),
        }
    }

    vec![
        rule(
            "1",
            "Overplating + Roughness (temperature)",
            "temperature",
            Operator::Gte,
            52.46,
            Severity::Error,
            "Bath temperature at or above 52.46°C risks overplating and roughness",
            GROUP_OVERPLATING_ROUGHNESS,
        ),
        rule(
            "2",
            "Overplating + Roughness (voltage)",
            "voltage",
            Operator::Gte,
            27.44,
            Severity::Error,
            "Voltage at or above 27.44V risks overplating and roughness",
            GROUP_OVERPLATING_ROUGHNESS,
        ),
        rule(
            "3",
            "Peeling / Poor Adhesion (voltage)",
            "voltage",
            Operator::Lte,
            7.44,
            Severity::Error,
            "Voltage at or below 7.44V risks peeling and poor adhesion",
            GROUP_PEELING_ADHESION,
        ),
        rule(
            "4",
            "Peeling / Poor Adhesion (pH)",
            "ph_level",
            Operator::Gte,
            3.0,
            Severity::Error,
            "pH at or above 3 risks peeling and poor adhesion",
            GROUP_PEELING_ADHESION,
        ),
        rule(
            "5",
            "Stain / Corrosion (temperature)",
            "temperature",
            Operator::Lte,
            32.46,
            Severity::Warning,
            "Bath temperature at or below 32.46°C risks staining and corrosion",
            GROUP_STAIN_CORROSION,
        ),
        rule(
            "6",
            "Stain / Corrosion (pH)",
            "ph_level",
            Operator::Lte,
            1.0,
            Severity::Warning,
            "pH at or below 1 risks staining and corrosion",
            GROUP_STAIN_CORROSION,
        ),
    ]
}

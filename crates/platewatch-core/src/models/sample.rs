//! Sensor sample models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One reading from the plating line: field name to raw value.
///
/// Values are either plain JSON scalars or strings carrying a unit/label
/// prefix such as `"TEMP_55.0C"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorSample(Map<String, Value>);

impl SensorSample {
    /// Create an empty sample
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the sample for chaining
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Raw value of a field, if present
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sample has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over fields
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Pull the latest sample out of a polled response body.
    ///
    /// Accepted shapes:
    /// - `{"data": [sample, ...]}` (index 0 is used)
    /// - `{"data": sample}`
    /// - a bare sample object
    ///
    /// A broker record wrapper (`{"offset": .., "value": {..}}`) is unwrapped
    /// to its `value`. Returns `None` for empty or non-object payloads.
    pub fn from_envelope(body: Value) -> Option<Self> {
        let Value::Object(mut object) = body else {
            return None;
        };

        let selected = match object.remove("data") {
            Some(Value::Array(items)) => items.into_iter().next()?,
            Some(data @ Value::Object(_)) => data,
            None => Value::Object(object),
            Some(_) => return None,
        };

        match selected {
            Value::Object(record) => {
                let record = unwrap_record(record);
                if record.is_empty() {
                    None
                } else {
                    Some(Self(record))
                }
            }
            _ => None,
        }
    }
}

fn unwrap_record(mut record: Map<String, Value>) -> Map<String, Value> {
    if record.contains_key("offset") && matches!(record.get("value"), Some(Value::Object(_))) {
        if let Some(Value::Object(inner)) = record.remove("value") {
            return inner;
        }
    }
    record
}

impl From<Map<String, Value>> for SensorSample {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for SensorSample {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

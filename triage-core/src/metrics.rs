use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Caller-supplied metric name to scalar value map.
///
/// Kept in a `BTreeMap` so the prompt always lists metrics in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<String, Value>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Numeric view of a metric. Numeric strings count; anything else does not.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Metrics used when analysing the tail of the application log.
    pub fn last_logs_defaults() -> Self {
        Self::new()
            .with("source", "last_logs")
            .with("system_load", "unknown")
    }
}

impl From<BTreeMap<String, Value>> for Metrics {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Metrics {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_lookup() {
        let metrics = Metrics::new()
            .with("latency", 1500)
            .with("error_rate", "0.25")
            .with("system_load", "unknown");

        assert_eq!(metrics.get_f64("latency"), Some(1500.0));
        assert_eq!(metrics.get_f64("error_rate"), Some(0.25));
        assert_eq!(metrics.get_f64("system_load"), None);
        assert_eq!(metrics.get_f64("missing"), None);
    }

    #[test]
    fn test_deserializes_from_plain_object() {
        let metrics: Metrics = serde_json::from_value(json!({"b": 2, "a": 1})).unwrap();
        let keys: Vec<_> = metrics.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}

//! Payload filter grammar for the durable vector store.
//!
//! A [`Filter`] is a conjunction of [`Condition`]s on payload fields. Each
//! condition matches a field against either a single value or any of a list
//! of values. The serialized form is the vector database's native wire
//! shape, so a filter can be sent to the managed backend verbatim; the
//! embedded backends evaluate the same conditions locally via
//! [`Filter::matches`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A conjunction of payload conditions. Empty `must` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub must: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a condition, keeping the conjunction.
    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.must.push(condition);
        self
    }

    /// Evaluate the filter against a JSON payload.
    ///
    /// Used by the embedded backends; the managed backend evaluates the
    /// same grammar server-side.
    pub fn matches(&self, payload: &Value) -> bool {
        self.must.iter().all(|c| c.holds(payload))
    }
}

/// A single payload-field constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    #[serde(rename = "match")]
    pub clause: MatchClause,
}

impl Condition {
    /// Equality condition: `payload[key] == value`.
    pub fn matches(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            clause: MatchClause::Value {
                value: value.into(),
            },
        }
    }

    /// Membership condition: `payload[key] ∈ values`.
    pub fn any_of(key: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            key: key.into(),
            clause: MatchClause::Any {
                any: values.into_iter().collect(),
            },
        }
    }

    /// Does this condition hold for the given payload?
    fn holds(&self, payload: &Value) -> bool {
        let Some(field) = payload.get(&self.key) else {
            return false;
        };
        match &self.clause {
            MatchClause::Value { value } => value_matches(field, value),
            MatchClause::Any { any } => any.iter().any(|v| value_matches(field, v)),
        }
    }
}

/// The match arm of a condition: a single value or an "any of" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchClause {
    Value { value: Value },
    Any { any: Vec<Value> },
}

/// A payload field matches an expected value if it equals it, or — for
/// array-valued fields — if any element equals it.
fn value_matches(field: &Value, expected: &Value) -> bool {
    if field == expected {
        return true;
    }
    field
        .as_array()
        .map(|items| items.contains(expected))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equality_condition() {
        let filter = Filter::new().and(Condition::matches("tenantId", "u1"));
        assert!(filter.matches(&json!({"tenantId": "u1"})));
        assert!(!filter.matches(&json!({"tenantId": "u2"})));
        assert!(!filter.matches(&json!({})));
    }

    #[test]
    fn test_any_of_condition() {
        let filter = Filter::new().and(Condition::any_of(
            "noteId",
            vec![json!("n1"), json!("n2")],
        ));
        assert!(filter.matches(&json!({"noteId": "n2"})));
        assert!(!filter.matches(&json!({"noteId": "n3"})));
    }

    #[test]
    fn test_conjunction_requires_all() {
        let filter = Filter::new()
            .and(Condition::matches("tenantId", "u1"))
            .and(Condition::matches("nodeType", "note"));
        assert!(filter.matches(&json!({"tenantId": "u1", "nodeType": "note"})));
        assert!(!filter.matches(&json!({"tenantId": "u1", "nodeType": "resource"})));
    }

    #[test]
    fn test_array_field_matches_on_membership() {
        let filter = Filter::new().and(Condition::matches("tags", "alpha"));
        assert!(filter.matches(&json!({"tags": ["alpha", "beta"]})));
        assert!(!filter.matches(&json!({"tags": ["beta"]})));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().matches(&json!({"anything": 1})));
    }

    #[test]
    fn test_wire_shape() {
        let filter = Filter::new()
            .and(Condition::matches("tenantId", "u1"))
            .and(Condition::any_of("url", vec![json!("a"), json!("b")]));
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            value,
            json!({
                "must": [
                    {"key": "tenantId", "match": {"value": "u1"}},
                    {"key": "url", "match": {"any": ["a", "b"]}},
                ]
            })
        );
        let back: Filter = serde_json::from_value(value).unwrap();
        assert_eq!(back, filter);
    }
}

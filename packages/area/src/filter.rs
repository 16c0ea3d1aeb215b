use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unsupported filter operator `{0}`")]
    UnsupportedOperator(String),

    #[error("unsupported match logic `{0}`")]
    UnsupportedMatch(String),
}

/// A single gate condition. The operator stays a plain string on the wire
/// and is resolved at evaluation time: an unknown operator is a hard error,
/// never a silent false.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FilterCondition {
    /// Field of the event data to test (e.g. message content, channel_id)
    pub field: String,
    /// One of: contains, equals, not_equals, starts_with, ends_with,
    /// greater_than, less_than
    pub operator: String,
    /// Value to compare against
    pub value: Value,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchLogic {
    #[default]
    All,
    Any,
}

/// A set of conditions combined by match logic, attached to actions that
/// opt in. Evaluation is pure: the same event data always yields the same
/// verdict.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FilterConfig {
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub r#match: MatchLogic,
}

impl FilterConfig {
    pub fn evaluate(&self, data: &Map<String, Value>) -> Result<bool, FilterError> {
        let mut results = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            results.push(evaluate_condition(condition, data)?);
        }

        Ok(match self.r#match {
            MatchLogic::All => results.iter().all(|r| *r),
            MatchLogic::Any => results.iter().any(|r| *r),
        })
    }
}

fn evaluate_condition(
    condition: &FilterCondition,
    data: &Map<String, Value>,
) -> Result<bool, FilterError> {
    // absent field: the condition simply does not hold
    let Some(field_value) = data.get(&condition.field) else {
        return Ok(false);
    };

    let expected = &condition.value;

    match condition.operator.as_str() {
        "contains" => Ok(as_str_pair(field_value, expected)
            .map(|(hay, needle)| hay.contains(needle))
            .unwrap_or(false)),
        "starts_with" => Ok(as_str_pair(field_value, expected)
            .map(|(hay, prefix)| hay.starts_with(prefix))
            .unwrap_or(false)),
        "ends_with" => Ok(as_str_pair(field_value, expected)
            .map(|(hay, suffix)| hay.ends_with(suffix))
            .unwrap_or(false)),
        "equals" => Ok(field_value == expected),
        "not_equals" => Ok(field_value != expected),
        "greater_than" => Ok(compare(field_value, expected)
            .map(|ord| ord == std::cmp::Ordering::Greater)
            .unwrap_or(false)),
        "less_than" => Ok(compare(field_value, expected)
            .map(|ord| ord == std::cmp::Ordering::Less)
            .unwrap_or(false)),
        other => Err(FilterError::UnsupportedOperator(other.to_string())),
    }
}

fn as_str_pair<'a>(left: &'a Value, right: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((left.as_str()?, right.as_str()?))
}

/// Numeric when both sides are numbers, lexicographic when both are
/// strings, incomparable otherwise
fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.as_str().cmp(r.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> Map<String, Value> {
        json!({
            "content": "urgent: deploy failed",
            "channel_id": "12345",
            "retries": 3,
        })
        .as_object()
        .unwrap()
        .clone()
    }

    fn filter(conditions: Value) -> FilterConfig {
        serde_json::from_value(conditions).unwrap()
    }

    #[test]
    fn string_operators() {
        let cases = [
            ("contains", json!("urgent"), true),
            ("contains", json!("Urgent"), false), // case-sensitive
            ("starts_with", json!("urgent"), true),
            ("ends_with", json!("failed"), true),
            ("ends_with", json!("passed"), false),
        ];
        for (op, value, expected) in cases {
            let f = filter(json!({
                "conditions": [{"field": "content", "operator": op, "value": value}],
            }));
            assert_eq!(f.evaluate(&data()).unwrap(), expected, "operator {op}");
        }
    }

    #[test]
    fn equality_is_strict() {
        let f = filter(json!({
            "conditions": [{"field": "retries", "operator": "equals", "value": 3}],
        }));
        assert!(f.evaluate(&data()).unwrap());

        // "3" != 3
        let f = filter(json!({
            "conditions": [{"field": "retries", "operator": "equals", "value": "3"}],
        }));
        assert!(!f.evaluate(&data()).unwrap());

        let f = filter(json!({
            "conditions": [{"field": "retries", "operator": "not_equals", "value": 4}],
        }));
        assert!(f.evaluate(&data()).unwrap());
    }

    #[test]
    fn ordering_numeric_and_lexicographic() {
        let f = filter(json!({
            "conditions": [{"field": "retries", "operator": "greater_than", "value": 2}],
        }));
        assert!(f.evaluate(&data()).unwrap());

        let f = filter(json!({
            "conditions": [{"field": "channel_id", "operator": "less_than", "value": "2"}],
        }));
        // "12345" < "2" lexicographically
        assert!(f.evaluate(&data()).unwrap());
    }

    #[test]
    fn absent_field_is_false_but_not_an_error() {
        let f = filter(json!({
            "conditions": [{"field": "missing", "operator": "equals", "value": 1}],
        }));
        assert!(!f.evaluate(&data()).unwrap());
    }

    #[test]
    fn match_logic_combines() {
        let f = filter(json!({
            "match": "any",
            "conditions": [
                {"field": "missing", "operator": "equals", "value": 1},
                {"field": "retries", "operator": "equals", "value": 3},
            ],
        }));
        assert!(f.evaluate(&data()).unwrap());

        let f = filter(json!({
            "match": "all",
            "conditions": [
                {"field": "missing", "operator": "equals", "value": 1},
                {"field": "retries", "operator": "equals", "value": 3},
            ],
        }));
        assert!(!f.evaluate(&data()).unwrap());
    }

    #[test]
    fn unknown_operator_errors() {
        let f = filter(json!({
            "conditions": [{"field": "retries", "operator": "matches_regex", "value": ".*"}],
        }));
        assert_eq!(
            f.evaluate(&data()).unwrap_err(),
            FilterError::UnsupportedOperator("matches_regex".to_string())
        );
    }

    #[test]
    fn evaluation_is_idempotent() {
        let f = filter(json!({
            "match": "any",
            "conditions": [
                {"field": "content", "operator": "contains", "value": "urgent"},
                {"field": "retries", "operator": "less_than", "value": 10},
            ],
        }));
        let d = data();
        let first = f.evaluate(&d).unwrap();
        let second = f.evaluate(&d).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_all_filter_passes() {
        let f = FilterConfig::default();
        assert!(f.evaluate(&data()).unwrap());
    }
}

use area_types::epoch_now;
use serde_json::{Map, Value};
use thiserror::Error;

/// The three component kinds, used for registry namespacing and for the
/// implicit fields a schema carries (triggers get interval/last_run).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Trigger,
    Action,
    Reaction,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComponentKind::Trigger => "trigger",
            ComponentKind::Action => "action",
            ComponentKind::Reaction => "reaction",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Object,
    List,
    /// Accepted verbatim, no coercion
    Any,
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            FieldKind::String => "a string",
            FieldKind::Integer => "an integer",
            FieldKind::Float => "a number",
            FieldKind::Boolean => "a boolean",
            FieldKind::Object => "an object",
            FieldKind::List => "a list",
            FieldKind::Any => "any value",
        }
    }
}

/// One named option in a component's config schema
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    pub fn with_default(name: &'static str, kind: FieldKind, default: impl Into<Value>) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default.into()),
        }
    }
}

/// Declared options for one component. The declared field names double as
/// the projection set: the evaluator copies exactly these keys out of a
/// trigger response when building action params.
#[derive(Clone, Debug, Default)]
pub struct ConfigSchema {
    fields: Vec<FieldSpec>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    fn declares(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` expected {expected}, got `{value}`")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        value: String,
    },

    #[error("field `{field}` out of range: {reason}")]
    OutOfRange { field: String, reason: String },
}

/// An option map that passed schema validation. Unknown keys are kept -
/// components may opt to read them - and the implicit fields are filled in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidatedConfig {
    values: Map<String, Value>,
}

impl ValidatedConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(|v| v.as_bool())
    }

    /// The injected per-service credential; null and absent both mean none
    pub fn token(&self) -> Option<&str> {
        self.get_str("token")
    }

    /// Seconds between trigger evaluations (triggers only, validated >= 1)
    pub fn interval_secs(&self) -> u64 {
        self.get_i64("interval").map(|i| i as u64).unwrap_or(1)
    }

    /// Epoch-seconds cursor of the last firing (triggers only)
    pub fn last_run(&self) -> f64 {
        self.get_f64("last_run").unwrap_or_else(epoch_now)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

/// Validate an untyped option map against a schema, producing a typed view
/// or the first offending field. Coercion is deliberately narrow: strings
/// parse into integer/float fields, nothing else converts.
pub fn validate(
    kind: ComponentKind,
    schema: &ConfigSchema,
    options: &Map<String, Value>,
) -> Result<ValidatedConfig, ConfigError> {
    // unknown fields survive verbatim
    let mut values = options.clone();

    for spec in schema.fields() {
        apply_field(&mut values, spec)?;
    }

    // every component implicitly accepts an optional token
    if !schema.declares("token") {
        apply_field(
            &mut values,
            &FieldSpec::with_default("token", FieldKind::String, Value::Null),
        )?;
    }

    if kind == ComponentKind::Trigger {
        if !schema.declares("interval") {
            apply_field(&mut values, &FieldSpec::with_default("interval", FieldKind::Integer, 1))?;
        }
        let interval = values.get("interval").and_then(|v| v.as_i64()).unwrap_or(1);
        if interval < 1 {
            return Err(ConfigError::OutOfRange {
                field: "interval".to_string(),
                reason: format!("must be at least 1 second, got {}", interval),
            });
        }

        // cursor defaults to one interval in the past so a fresh evaluator
        // fires on its very first tick
        if !schema.declares("last_run") {
            apply_field(
                &mut values,
                &FieldSpec::with_default(
                    "last_run",
                    FieldKind::Float,
                    epoch_now() - interval as f64,
                ),
            )?;
        }
    }

    Ok(ValidatedConfig { values })
}

fn apply_field(values: &mut Map<String, Value>, spec: &FieldSpec) -> Result<(), ConfigError> {
    match values.get(spec.name) {
        None | Some(Value::Null) => {
            if spec.required {
                return Err(ConfigError::MissingField {
                    field: spec.name.to_string(),
                });
            }
            if let Some(default) = &spec.default {
                values.insert(spec.name.to_string(), default.clone());
            }
            Ok(())
        }
        Some(value) => {
            let coerced = coerce(spec, value)?;
            if let Some(coerced) = coerced {
                values.insert(spec.name.to_string(), coerced);
            }
            Ok(())
        }
    }
}

/// Returns Some(new_value) when the value had to be rewritten (string to
/// number), None when it is acceptable as-is
fn coerce(spec: &FieldSpec, value: &Value) -> Result<Option<Value>, ConfigError> {
    let mismatch = || ConfigError::TypeMismatch {
        field: spec.name.to_string(),
        expected: spec.kind.expected(),
        value: value.to_string(),
    };

    match spec.kind {
        FieldKind::Any => Ok(None),
        FieldKind::String => value.as_str().map(|_| None).ok_or_else(mismatch),
        FieldKind::Boolean => value.as_bool().map(|_| None).ok_or_else(mismatch),
        FieldKind::Object => value.as_object().map(|_| None).ok_or_else(mismatch),
        FieldKind::List => value.as_array().map(|_| None).ok_or_else(mismatch),
        FieldKind::Integer => match value {
            Value::Number(n) if n.as_i64().is_some() => Ok(None),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| Some(Value::from(n)))
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        FieldKind::Float => match value {
            Value::Number(_) => Ok(None),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(|n| Some(Value::from(n)))
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn missing_required_field_fails() {
        let schema = ConfigSchema::new().field(FieldSpec::required("repo", FieldKind::String));
        let err = validate(ComponentKind::Trigger, &schema, &Map::new()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingField {
                field: "repo".to_string()
            }
        );
    }

    #[test]
    fn optional_field_gets_default() {
        let schema = ConfigSchema::new().field(FieldSpec::with_default(
            "subject",
            FieldKind::String,
            "No Subject",
        ));
        let config = validate(ComponentKind::Action, &schema, &Map::new()).unwrap();
        assert_eq!(config.get_str("subject"), Some("No Subject"));
    }

    #[test]
    fn string_coerces_into_numbers() {
        let schema = ConfigSchema::new()
            .field(FieldSpec::required("count", FieldKind::Integer))
            .field(FieldSpec::required("ratio", FieldKind::Float));
        let config = validate(
            ComponentKind::Action,
            &schema,
            &options(json!({"count": "42", "ratio": "0.5"})),
        )
        .unwrap();
        assert_eq!(config.get_i64("count"), Some(42));
        assert_eq!(config.get_f64("ratio"), Some(0.5));
    }

    #[test]
    fn unparseable_string_names_the_field() {
        let schema = ConfigSchema::new();
        let err = validate(
            ComponentKind::Trigger,
            &schema,
            &options(json!({"interval": "fast"})),
        )
        .unwrap_err();
        match err {
            ConfigError::TypeMismatch { field, .. } => assert_eq!(field, "interval"),
            other => panic!("expected type mismatch, got {other:?}"),
        }
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let schema = ConfigSchema::new().field(FieldSpec::required("repo", FieldKind::String));
        let config = validate(
            ComponentKind::Action,
            &schema,
            &options(json!({"repo": "a/b", "color": "green"})),
        )
        .unwrap();
        assert_eq!(config.get_str("color"), Some("green"));
    }

    #[test]
    fn trigger_gets_implicit_interval_and_cursor() {
        let config = validate(ComponentKind::Trigger, &ConfigSchema::new(), &Map::new()).unwrap();
        assert_eq!(config.interval_secs(), 1);
        // defaults one interval in the past, so the first tick is due
        assert!(config.last_run() <= epoch_now() - 1.0 + 0.001);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = validate(
            ComponentKind::Trigger,
            &ConfigSchema::new(),
            &options(json!({"interval": 0})),
        )
        .unwrap_err();
        match err {
            ConfigError::OutOfRange { field, .. } => assert_eq!(field, "interval"),
            other => panic!("expected out of range, got {other:?}"),
        }
    }

    #[test]
    fn actions_do_not_get_trigger_fields() {
        let config = validate(ComponentKind::Action, &ConfigSchema::new(), &Map::new()).unwrap();
        assert!(config.get("interval").is_none());
        assert!(config.get("last_run").is_none());
        // but everyone carries a token slot
        assert_eq!(config.get("token"), Some(&Value::Null));
    }

    #[test]
    fn provided_token_passes_through() {
        let config = validate(
            ComponentKind::Reaction,
            &ConfigSchema::new(),
            &options(json!({"token": "B-TOK"})),
        )
        .unwrap();
        assert_eq!(config.token(), Some("B-TOK"));
    }

    #[test]
    fn explicit_null_optional_uses_default() {
        let schema =
            ConfigSchema::new().field(FieldSpec::with_default("cc", FieldKind::List, json!([])));
        let config = validate(
            ComponentKind::Reaction,
            &schema,
            &options(json!({"cc": null})),
        )
        .unwrap();
        assert_eq!(config.get("cc"), Some(&json!([])));
    }
}

//! Request validation: required presence, per-field shape and declarative rules,
//! then resource-level validators. Steps 2 and 3 accumulate every message.

use crate::config::{CompiledRule, DefaultValue, FieldDescriptor, FieldKind, ResourceConfig};
use crate::error::ValidationFailure;
use crate::service::RecordPayload;
use serde_json::Value;

pub const REQUIRED: &str = "required";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Step 1 (create only): every required field present and non-null.
    pub fn required(config: &ResourceConfig, payload: &RecordPayload) -> ValidationFailure {
        let mut failure = ValidationFailure::new(&config.name);
        for f in config.schema.fields.iter().filter(|f| !f.generated) {
            if config.is_required(&f.name) && payload.get(&f.name).map_or(true, Value::is_null) {
                failure.push(&f.name, REQUIRED);
            }
        }
        failure
    }

    /// Step 2: shape of every given field. All problems are collected.
    pub fn fields(config: &ResourceConfig, payload: &RecordPayload, mode: Mode) -> ValidationFailure {
        let mut failure = ValidationFailure::new(&config.name);
        for (name, value) in payload {
            let Some(field) = config.schema.field(name) else {
                failure.push(name, "unknown field");
                continue;
            };
            if !config.is_writable(name) {
                failure.push(name, "not editable");
                continue;
            }
            if value.is_null() {
                if mode == Mode::Update && config.is_required(name) {
                    failure.push(name, REQUIRED);
                } else if !field.nullable && mode == Mode::Update {
                    failure.push(name, "must not be null");
                }
                continue;
            }
            match check_kind(field, value) {
                Err(message) => failure.push(name, message),
                Ok(()) => {
                    if let Some(rule) = config.rules.get(name) {
                        for message in check_rule(value, rule) {
                            failure.push(name, message);
                        }
                    }
                }
            }
        }
        failure
    }

    /// Step 3: resource-level validators over the whole record.
    pub fn custom(config: &ResourceConfig, record: &RecordPayload) -> ValidationFailure {
        let mut failure = ValidationFailure::new(&config.name);
        for validator in &config.validators {
            for (field, message) in (validator.check)(record) {
                failure.push(field, message);
            }
        }
        failure
    }
}

fn check_kind(field: &FieldDescriptor, v: &Value) -> Result<(), String> {
    let ok = match field.kind {
        FieldKind::String => v.is_string(),
        FieldKind::Number => v.is_number(),
        FieldKind::Boolean => v.is_boolean(),
        FieldKind::Date => v.as_str().is_some_and(is_date),
        FieldKind::Enum => v.as_str().is_some_and(|s| field.enum_values.iter().any(|e| e == s)),
        FieldKind::Json => true,
    };
    if ok {
        return Ok(());
    }
    Err(match field.kind {
        FieldKind::String => "must be a string".into(),
        FieldKind::Number => "must be a number".into(),
        FieldKind::Boolean => "must be a boolean".into(),
        FieldKind::Date => "must be a valid date".into(),
        FieldKind::Enum => format!("must be one of: {}", field.enum_values.join(", ")),
        FieldKind::Json => String::new(),
    })
}

/// RFC 3339 timestamp, `YYYY-MM-DDTHH:MM[:SS]` or plain `YYYY-MM-DD`.
pub fn is_date(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
        || chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn check_rule(v: &Value, compiled: &CompiledRule) -> Vec<String> {
    let rule = &compiled.rule;
    let mut out = Vec::new();
    if let (Some(format), Some(s)) = (&rule.format, v.as_str()) {
        if let Err(message) = check_format(s, format) {
            out.push(message);
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                out.push(format!("must be at most {} characters", max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                out.push(format!("must be at least {} characters", min));
            }
        }
        if let Some(re) = &compiled.pattern {
            if !re.is_match(s) {
                out.push("does not match required pattern".into());
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            let shown: Vec<String> = allowed.iter().take(5).map(crate::config::display_scalar).collect();
            out.push(format!("must be one of: {}", shown.join(", ")));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                out.push(format!("must be at least {}", min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                out.push(format!("must be at most {}", max));
            }
        }
    }
    out
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(s: &str, format: &str) -> Result<(), String> {
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = s
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'));
            if !valid {
                return Err("must be a valid email".into());
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err("must be a valid UUID".into());
            }
        }
        "url" => {
            let valid = ["http://", "https://"]
                .iter()
                .any(|scheme| s.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()));
            if !valid {
                return Err("must be a valid URL".into());
            }
        }
        _ => {}
    }
    Ok(())
}

/// Typed value for a query-string or form value of `field`. Values that do not
/// parse stay strings so validation can report them.
pub fn coerce(field: &FieldDescriptor, raw: &str) -> Value {
    let s = raw.trim();
    match field.kind {
        FieldKind::Number => {
            if let Ok(i) = s.parse::<i64>() {
                return Value::from(i);
            }
            s.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string()))
        }
        FieldKind::Boolean => match s.to_lowercase().as_str() {
            "true" | "on" | "1" | "yes" => Value::Bool(true),
            "false" | "off" | "0" | "no" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        FieldKind::Json => serde_json::from_str(s).unwrap_or_else(|_| Value::String(raw.to_string())),
        FieldKind::String | FieldKind::Date | FieldKind::Enum => Value::String(raw.to_string()),
    }
}

/// Typed value for a query filter on `field`. Unlike `coerce`, a value the
/// field's kind or storage type cannot hold is an error.
pub fn coerce_filter(field: &FieldDescriptor, raw: &str) -> Result<Value, String> {
    let value = coerce(field, raw);
    check_kind(field, &value)?;
    if is_uuid_column(field) && value.as_str().map_or(true, |s| uuid::Uuid::parse_str(s).is_err()) {
        return Err("must be a valid UUID".into());
    }
    Ok(value)
}

fn is_uuid_column(field: &FieldDescriptor) -> bool {
    field.db_type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("uuid"))
        || field.default == Some(DefaultValue::Uuid)
}

/// Payload from a submitted form. Empty inputs mean "no value".
pub fn coerce_form(config: &ResourceConfig, form: Vec<(String, String)>) -> RecordPayload {
    let mut payload = RecordPayload::new();
    for (name, raw) in form {
        let value = match config.schema.field(&name) {
            _ if raw.is_empty() => Value::Null,
            Some(field) => coerce(field, &raw),
            None => Value::String(raw),
        };
        payload.insert(name, value);
    }
    payload
}

/// An edit-form checkbox left unticked is absent from the submission and
/// means `false`. Only for bodies posted by the rendered create/edit form.
pub fn untick_checkboxes(config: &ResourceConfig, payload: &mut RecordPayload) {
    for field in config.schema.fields.iter().filter(|f| f.kind == FieldKind::Boolean) {
        if config.is_writable(&field.name) && !payload.contains_key(&field.name) {
            payload.insert(field.name.clone(), Value::Bool(false));
        }
    }
}

/// Primary key value from a path segment; `None` when it cannot name a record.
pub fn parse_id(config: &ResourceConfig, raw: &str) -> Option<Value> {
    match config.schema.primary_kind {
        FieldKind::Number => raw
            .parse::<i64>()
            .ok()
            .map(Value::from)
            .or_else(|| raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number)),
        FieldKind::Boolean => None,
        _ => {
            let uuid_key = config.schema.field(&config.schema.primary_key).is_some_and(is_uuid_column);
            if uuid_key && uuid::Uuid::parse_str(raw).is_err() {
                return None;
            }
            Some(Value::String(raw.to_string()))
        }
    }
}

//! Request validation: strict enforcement of a generated shape, then per-column rules from config.

use crate::config::{ScalarType, ValidationRule};
use crate::error::{AppError, FieldError};
use crate::schema::{FieldType, GeneratedShape};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct ShapeValidator;

impl ShapeValidator {
    /// Check `raw` against `shape` and return it as a record with exactly the input's keys.
    /// Every problem is reported, not just the first.
    pub fn validate(shape: &GeneratedShape, raw: &Value) -> Result<Map<String, Value>, AppError> {
        let Some(obj) = raw.as_object() else {
            return Err(AppError::invalid_field("$", format!("expected an object for {}", shape.name)));
        };
        let mut errors = Vec::new();
        check_object(shape, obj, "", &mut errors);
        if errors.is_empty() {
            Ok(obj.clone())
        } else {
            Err(AppError::invalid_fields(errors))
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn check_object(shape: &GeneratedShape, obj: &Map<String, Value>, prefix: &str, errors: &mut Vec<FieldError>) {
    for key in obj.keys() {
        if shape.field(key).is_none() {
            errors.push(FieldError::new(join(prefix, key), format!("is not a field of {}", shape.name)));
        }
    }
    for field in &shape.fields {
        let path = join(prefix, &field.name);
        match obj.get(&field.name) {
            None | Some(Value::Null) if field.optional => {}
            None => errors.push(FieldError::new(path, "is required")),
            Some(Value::Null) => errors.push(FieldError::new(path, "must not be null")),
            Some(v) => check_type(&field.ty, v, &path, errors),
        }
    }
}

fn check_type(ty: &FieldType, v: &Value, path: &str, errors: &mut Vec<FieldError>) {
    match ty {
        FieldType::Scalar(scalar) => {
            if let Err(msg) = check_scalar(*scalar, v) {
                errors.push(FieldError::new(path, msg));
            }
        }
        FieldType::Shape(shape) => match v.as_object() {
            Some(obj) => check_object(shape, obj, path, errors),
            None => errors.push(FieldError::new(path, format!("must be an object ({})", shape.name))),
        },
        FieldType::List(inner) => match v.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    if item.is_null() {
                        errors.push(FieldError::new(item_path, "must not be null"));
                    } else {
                        check_type(inner, item, &item_path, errors);
                    }
                }
            }
            None => errors.push(FieldError::new(path, "must be a list")),
        },
    }
}

fn check_scalar(scalar: ScalarType, v: &Value) -> Result<(), &'static str> {
    let ok = match scalar {
        ScalarType::Integer | ScalarType::BigInteger => v.is_i64() || v.is_u64(),
        ScalarType::Float => v.is_number(),
        ScalarType::Decimal => v.is_number() || v.as_str().map(|s| s.trim().parse::<f64>().is_ok()).unwrap_or(false),
        ScalarType::Boolean => v.is_boolean(),
        ScalarType::String | ScalarType::Text | ScalarType::Document => v.is_string(),
        ScalarType::Date => v
            .as_str()
            .map(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
            .unwrap_or(false),
        ScalarType::DateTime => v
            .as_str()
            .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
            .unwrap_or(false),
        ScalarType::Uuid => v.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
        ScalarType::Json => true,
    };
    if ok {
        return Ok(());
    }
    Err(match scalar {
        ScalarType::Integer | ScalarType::BigInteger => "must be an integer",
        ScalarType::Float | ScalarType::Decimal => "must be a number",
        ScalarType::Boolean => "must be a boolean",
        ScalarType::String | ScalarType::Text => "must be a string",
        ScalarType::Document => "must be a document id",
        ScalarType::Date => "must be a date (YYYY-MM-DD)",
        ScalarType::DateTime => "must be an RFC 3339 date-time",
        ScalarType::Uuid => "must be a valid UUID",
        ScalarType::Json => "must be JSON",
    })
}

/// Per-column rules configured on a resource.
pub struct RequestValidator;

impl RequestValidator {
    /// Validate a record against per-column rules. Columns marked required must be present.
    pub fn validate(body: &Map<String, Value>, rules: &HashMap<String, ValidationRule>) -> Result<(), AppError> {
        let mut errors = Vec::new();
        for (col, rule) in sorted(rules) {
            let val = body.get(col);
            if rule.required == Some(true) && val.map(Value::is_null).unwrap_or(true) {
                errors.push(FieldError::new(col, "is required"));
                continue;
            }
            if let Some(v) = val {
                validate_field(col, v, rule, &mut errors);
            }
        }
        finish(errors)
    }

    /// Validate only the fields present in body (for PATCH). Required is not enforced for missing fields.
    pub fn validate_partial(body: &Map<String, Value>, rules: &HashMap<String, ValidationRule>) -> Result<(), AppError> {
        let mut errors = Vec::new();
        for (col, v) in body {
            if let Some(rule) = rules.get(col) {
                validate_field(col, v, rule, &mut errors);
            }
        }
        finish(errors)
    }

    /// Rule problems that would only surface at request time (bad regex, inverted bounds).
    pub fn check_rules(rules: &HashMap<String, ValidationRule>) -> Result<(), String> {
        for (col, rule) in sorted(rules) {
            if let Some(pattern) = &rule.pattern {
                Regex::new(pattern).map_err(|e| format!("invalid pattern for {}: {}", col, e))?;
            }
            if let (Some(min), Some(max)) = (rule.min_length, rule.max_length) {
                if min > max {
                    return Err(format!("{}: min_length {} exceeds max_length {}", col, min, max));
                }
            }
            if let (Some(min), Some(max)) = (rule.minimum, rule.maximum) {
                if min > max {
                    return Err(format!("{}: minimum {} exceeds maximum {}", col, min, max));
                }
            }
        }
        Ok(())
    }
}

fn sorted(rules: &HashMap<String, ValidationRule>) -> Vec<(&String, &ValidationRule)> {
    let mut v: Vec<_> = rules.iter().collect();
    v.sort_by(|a, b| a.0.cmp(b.0));
    v
}

fn finish(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::invalid_fields(errors))
    }
}

fn numeric(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule, errors: &mut Vec<FieldError>) {
    if v.is_null() {
        return;
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format, errors);
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                errors.push(FieldError::new(col, format!("must be at most {} characters", max)));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                errors.push(FieldError::new(col, format!("must be at least {} characters", min)));
            }
        }
        if let Some(ref pattern) = rule.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    errors.push(FieldError::new(col, "does not match required pattern"));
                }
                Ok(_) => {}
                Err(_) => errors.push(FieldError::new(col, "has an invalid validation pattern")),
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(FieldError::new(
                col,
                format!("must be one of: {:?}", allowed.iter().take(5).collect::<Vec<_>>()),
            ));
        }
    }
    if let Some(n) = numeric(v) {
        if let Some(min) = rule.minimum {
            if n < min {
                errors.push(FieldError::new(col, format!("must be at least {}", min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                errors.push(FieldError::new(col, format!("must be at most {}", max)));
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str, errors: &mut Vec<FieldError>) {
    let Some(s) = v.as_str() else { return };
    match format.to_lowercase().as_str() {
        "email" => {
            if !s.contains('@') || s.len() < 3 {
                errors.push(FieldError::new(col, "must be a valid email"));
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                errors.push(FieldError::new(col, "must be a valid UUID"));
            }
        }
        _ => {}
    }
}

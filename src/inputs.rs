//! User-input collection, validation, and template application.
//!
//! Validation collects every violation before failing. Template application
//! goes through a small instruction set so rendering is total and testable
//! independent of any one provider's template shape.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::{Error, Result};
use crate::models::{InputType, McpServerDescriptor, UserInput};
use crate::paths::expand_tilde;

/// Merge caller-provided values with declared defaults.
pub fn collect(
    descriptor: &McpServerDescriptor,
    provided: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for input in &descriptor.user_inputs {
        if let Some(v) = provided.get(&input.name) {
            values.insert(input.name.clone(), v.clone());
        } else if let Some(default) = &input.default {
            values.insert(input.name.clone(), value_to_string(default));
        }
    }
    values
}

/// Check every declared input against its rules, returning all violations
/// at once rather than stopping at the first.
pub fn validate(values: &BTreeMap<String, String>, descriptor: &McpServerDescriptor) -> Result<()> {
    let mut errors = Vec::new();

    for input in &descriptor.user_inputs {
        let Some(value) = values.get(&input.name) else {
            if input.required {
                errors.push(format!("{}: required input is missing", input.name));
            }
            continue;
        };
        check_value(input, value, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

fn check_value(input: &UserInput, value: &str, errors: &mut Vec<String>) {
    let rules = input.validation.clone().unwrap_or_default();

    match input.input_type {
        InputType::Path => {
            let path = expand_tilde(value);
            if rules.must_exist && !path.exists() {
                errors.push(format!("{}: path '{}' does not exist", input.name, value));
            } else if rules.must_be_dir && !path.is_dir() {
                errors.push(format!("{}: '{}' is not a directory", input.name, value));
            } else if rules.must_be_file && !path.is_file() {
                errors.push(format!("{}: '{}' is not a file", input.name, value));
            }
        }
        InputType::String | InputType::Password => {
            if let Some(min) = rules.min_length {
                if value.chars().count() < min {
                    errors.push(format!("{}: must be at least {} characters", input.name, min));
                }
            }
            if let Some(max) = rules.max_length {
                if value.chars().count() > max {
                    errors.push(format!("{}: must be at most {} characters", input.name, max));
                }
            }
            if let Some(pattern) = &rules.pattern {
                match regex::Regex::new(pattern) {
                    Ok(re) if !re.is_match(value) => {
                        errors.push(format!("{}: does not match pattern {}", input.name, pattern));
                    }
                    Ok(_) => {}
                    Err(_) => {
                        errors.push(format!("{}: invalid validation pattern in registry", input.name));
                    }
                }
            }
        }
        InputType::Number => match value.parse::<f64>() {
            Ok(n) => {
                if let Some(min) = rules.min {
                    if n < min {
                        errors.push(format!("{}: must be >= {}", input.name, min));
                    }
                }
                if let Some(max) = rules.max {
                    if n > max {
                        errors.push(format!("{}: must be <= {}", input.name, max));
                    }
                }
            }
            Err(_) => errors.push(format!("{}: '{}' is not a number", input.name, value)),
        },
        InputType::Boolean => {
            if value != "true" && value != "false" {
                errors.push(format!("{}: expected true or false, got '{}'", input.name, value));
            }
        }
        InputType::Url => {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                errors.push(format!("{}: '{}' is not an http(s) URL", input.name, value));
            }
        }
        InputType::Select => {
            if !input.options.iter().any(|o| o == value) {
                errors.push(format!(
                    "{}: '{}' is not one of [{}]",
                    input.name,
                    value,
                    input.options.join(", ")
                ));
            }
        }
    }
}

/// One placement of a validated value into the install plan.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateOp {
    /// Write `value` at a dotted JSON path inside the config template.
    SetField { path: Vec<String>, value: Value },
    /// Insert `value` into the template's `args` array at `position`.
    AppendArg { position: usize, value: String },
    /// Export `key=value` into the provider subprocess environment.
    SetEnv { key: String, value: String },
}

/// Compile collected values into placement instructions. The three
/// mechanisms are independent; one input may produce up to three ops.
pub fn plan_ops(
    descriptor: &McpServerDescriptor,
    values: &BTreeMap<String, String>,
) -> Vec<TemplateOp> {
    let mut ops = Vec::new();
    for input in &descriptor.user_inputs {
        let Some(value) = values.get(&input.name) else {
            continue;
        };
        if let Some(config_path) = &input.config_path {
            ops.push(TemplateOp::SetField {
                path: config_path.split('.').map(str::to_string).collect(),
                value: typed_value(input.input_type, value),
            });
        }
        if let Some(position) = input.arg_position {
            ops.push(TemplateOp::AppendArg {
                position,
                value: value.clone(),
            });
        }
        if let Some(env_var) = &input.env_var {
            ops.push(TemplateOp::SetEnv {
                key: env_var.clone(),
                value: value.clone(),
            });
        }
    }
    ops
}

/// Apply field and argument ops to the JSON template; return the env pairs
/// for the executor to export.
pub fn apply_ops(template: &mut Value, ops: &[TemplateOp]) -> Vec<(String, String)> {
    // Registry templates are untrusted; a non-object one cannot take
    // placements, so start from an empty object instead of indexing into it.
    if !template.is_object() {
        *template = Value::Object(serde_json::Map::new());
    }
    let mut env = Vec::new();
    for op in ops {
        match op {
            TemplateOp::SetField { path, value } => {
                set_dotted(template, path, value.clone());
            }
            TemplateOp::AppendArg { position, value } => {
                if !template.get("args").map(Value::is_array).unwrap_or(false) {
                    template["args"] = Value::Array(vec![]);
                }
                let args = template["args"].as_array_mut().unwrap();
                let at = (*position).min(args.len());
                args.insert(at, Value::String(value.clone()));
            }
            TemplateOp::SetEnv { key, value } => {
                env.push((key.clone(), value.clone()));
            }
        }
    }
    env
}

/// Numbers and booleans land typed at their config path; everything else is
/// a string.
fn typed_value(input_type: InputType, value: &str) -> Value {
    match input_type {
        InputType::Number => value
            .parse::<f64>()
            .ok()
            .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
            .unwrap_or_else(|| Value::String(value.to_string())),
        InputType::Boolean => match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        _ => Value::String(value.to_string()),
    }
}

fn set_dotted(target: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = target;
    for key in parents {
        if !cursor.get(key.as_str()).map(Value::is_object).unwrap_or(false) {
            cursor[key.as_str()] = Value::Object(serde_json::Map::new());
        }
        cursor = cursor.get_mut(key.as_str()).unwrap();
    }
    cursor[last.as_str()] = value;
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

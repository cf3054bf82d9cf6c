// Error handling utilities for consistent error messages and exit codes

use std::process;
use crate::models::{FieldKind, ListField};

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exit with an internal error (exit code 2)
/// Internal errors are for unexpected system failures, database corruption, etc.
pub fn internal_error(message: &str) -> ! {
    eprintln!("Internal error: {}", message);
    process::exit(2);
}

/// Validate that a string is not empty
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate that a lead ID is valid (positive integer)
pub fn validate_lead_id(id_str: &str) -> Result<i64, String> {
    id_str.parse::<i64>()
        .map_err(|_| format!("Invalid lead ID: '{}'. Lead ID must be a number.", id_str))
        .and_then(|id| {
            if id > 0 {
                Ok(id)
            } else {
                Err(format!("Invalid lead ID: {}. Lead ID must be positive.", id))
            }
        })
}

/// Validate an agent, list or campaign name.
/// Names may not be blank, purely numeric (those are ids) or contain control characters.
pub fn validate_name(name: &str, kind: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{} name cannot be empty", kind));
    }
    if name.trim() != name {
        return Err(format!("{} name cannot start or end with whitespace", kind));
    }
    if name.parse::<i64>().is_ok() {
        return Err(format!("Invalid {} name: '{}'. Names cannot be plain numbers.", kind.to_lowercase(), name));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(format!("Invalid {} name: '{}'. Names cannot contain control characters.", kind.to_lowercase(), name));
    }
    Ok(())
}

/// Parse a field spec `name` or `name:kind` into a list field.
/// Without a kind, the kind is inferred from the name.
pub fn parse_field_spec(spec: &str) -> Result<ListField, String> {
    let (name, kind) = match spec.rsplit_once(':') {
        Some((name, kind)) => {
            let kind = FieldKind::from_str(&kind.to_lowercase()).ok_or_else(|| {
                format!("Invalid field type '{}'. Use text, phone, email, url, number or date.", kind)
            })?;
            (name.trim(), kind)
        }
        None => (spec.trim(), FieldKind::infer(spec.trim())),
    };
    validate_non_empty(name, "Field name")?;
    Ok(ListField::new(name, kind))
}

/// Parse `key=value`. The value may be empty; the key may not.
pub fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("Invalid attribute '{}'. Use key=value.", arg))?;
    validate_non_empty(key, "Attribute name")?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

/// Split a comma-separated field list, dropping blanks
pub fn parse_field_list(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

#![forbid(unsafe_code)]

use crate::{AppError, ErrorCode};
use serde_json::Value;
use sz_core::JsonMap;

pub(crate) fn require_string(args: &JsonMap, key: &str) -> Result<String, AppError> {
    match args.get(key) {
        Some(Value::String(v)) if !v.trim().is_empty() => Ok(v.to_string()),
        Some(Value::String(_)) => Err(AppError::invalid_args(format!("{key} must not be empty"))),
        Some(Value::Null) | None => Err(AppError::invalid_args(format!("{key} is required"))),
        Some(_) => Err(AppError::invalid_args(format!("{key} must be a string"))),
    }
}

/// Absent, null and empty strings all read as "not provided".
pub(crate) fn optional_string(args: &JsonMap, key: &str) -> Result<Option<String>, AppError> {
    match args.get(key) {
        Some(Value::String(v)) if v.is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.to_string())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(AppError::invalid_args(format!("{key} must be a string"))),
    }
}

pub(crate) fn optional_object(
    args: &JsonMap,
    key: &str,
    code: ErrorCode,
) -> Result<Option<JsonMap>, AppError> {
    match args.get(key) {
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(AppError::new(code, format!("{key} must be an object"))),
    }
}

pub(crate) fn require_object(
    args: &JsonMap,
    key: &str,
    code: ErrorCode,
) -> Result<JsonMap, AppError> {
    match optional_object(args, key, code)? {
        Some(map) => Ok(map),
        None => Err(AppError::new(
            code,
            format!("{key} is required and must be an object"),
        )),
    }
}

pub(crate) fn optional_string_list(args: &JsonMap, key: &str) -> Result<Vec<String>, AppError> {
    let items = match args.get(key) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => {
            return Err(AppError::invalid_args(format!(
                "{key} must be an array of strings"
            )));
        }
    };
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                AppError::invalid_args(format!("{key} must contain only strings"))
            })
        })
        .collect()
}

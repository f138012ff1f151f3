#![forbid(unsafe_code)]

//! Payload decoding for tools that accept the same object three ways: inline, as JSON
//! text, or as base64 of JSON text. The first encoding present wins and a failure names
//! the stage that failed.

use crate::{AppError, ErrorCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::collections::BTreeMap;
use sz_core::{DbCheckDraft, JsonMap, StepDraft};

pub(crate) struct PayloadKeys {
    pub(crate) object: &'static str,
    pub(crate) json: &'static str,
    pub(crate) base64: &'static str,
    /// Used when the inline key holds something other than an object.
    pub(crate) object_code: ErrorCode,
    pub(crate) json_code: ErrorCode,
    pub(crate) base64_code: ErrorCode,
    pub(crate) missing_code: ErrorCode,
}

pub(crate) const META_PAYLOAD: PayloadKeys = PayloadKeys {
    object: "meta",
    json: "meta_json",
    base64: "meta_base64",
    object_code: ErrorCode::InvalidArgs,
    json_code: ErrorCode::InvalidMetaJson,
    base64_code: ErrorCode::InvalidMetaBase64,
    missing_code: ErrorCode::InvalidArgs,
};

pub(crate) const STEP_PAYLOAD: PayloadKeys = PayloadKeys {
    object: "step",
    json: "step_json",
    base64: "step_base64",
    object_code: ErrorCode::InvalidStep,
    json_code: ErrorCode::InvalidStepJson,
    base64_code: ErrorCode::InvalidStepBase64,
    missing_code: ErrorCode::InvalidStep,
};

/// A decoder either produces the payload, reports its encoding absent, or fails.
type Decoder = fn(&JsonMap, &PayloadKeys) -> Result<Option<JsonMap>, AppError>;

const DECODERS: [Decoder; 3] = [from_object, from_json_text, from_base64];

pub(crate) fn decode_payload(args: &JsonMap, keys: &PayloadKeys) -> Result<JsonMap, AppError> {
    for decoder in DECODERS {
        if let Some(payload) = decoder(args, keys)? {
            return Ok(payload);
        }
    }
    Err(AppError::new(
        keys.missing_code,
        format!(
            "missing {}. Provide {} (object) or {} (string) or {} (string)",
            keys.object, keys.object, keys.json, keys.base64
        ),
    ))
}

fn from_object(args: &JsonMap, keys: &PayloadKeys) -> Result<Option<JsonMap>, AppError> {
    crate::optional_object(args, keys.object, keys.object_code)
}

fn from_json_text(args: &JsonMap, keys: &PayloadKeys) -> Result<Option<JsonMap>, AppError> {
    let Some(text) = crate::optional_string(args, keys.json)? else {
        return Ok(None);
    };
    parse_object_text(&text, keys.json, keys.json_code).map(Some)
}

fn from_base64(args: &JsonMap, keys: &PayloadKeys) -> Result<Option<JsonMap>, AppError> {
    let Some(encoded) = crate::optional_string(args, keys.base64)? else {
        return Ok(None);
    };
    let bytes = STANDARD.decode(encoded.trim()).map_err(|err| {
        AppError::new(keys.base64_code, format!("invalid {}: {err}", keys.base64))
    })?;
    let text = String::from_utf8(bytes).map_err(|err| {
        AppError::new(keys.base64_code, format!("invalid {}: {err}", keys.base64))
    })?;
    parse_object_text(&text, keys.base64, keys.json_code).map(Some)
}

fn parse_object_text(text: &str, key: &str, code: ErrorCode) -> Result<JsonMap, AppError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::new(
            code,
            format!("invalid {key}: must decode to a JSON object"),
        )),
        Err(err) => Err(AppError::new(code, format!("invalid {key}: {err}"))),
    }
}

/// Strict step parsing: every known field must have its declared type.
pub(crate) fn parse_step(raw: &JsonMap, code: ErrorCode) -> Result<StepDraft, AppError> {
    let object = |key: &str| -> Result<JsonMap, AppError> {
        match raw.get(key) {
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(Value::Null) | None => Ok(JsonMap::new()),
            Some(_) => Err(AppError::new(code, format!("step.{key} must be an object"))),
        }
    };
    let name = match raw.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Null) | None => String::new(),
        Some(_) => return Err(AppError::new(code, "step.name must be a string")),
    };
    Ok(StepDraft {
        name,
        util: object("util")?,
        db: object("db")?,
        ui: object("ui")?,
        net: object("net")?,
        expect: object("expect")?,
    })
}

pub(crate) fn parse_db_check(raw: &JsonMap) -> Result<DbCheckDraft, AppError> {
    let invalid = |message: String| AppError::new(ErrorCode::InvalidDbCheck, message);
    let text = |key: &str| -> Result<String, AppError> {
        match raw.get(key) {
            Some(Value::String(v)) => Ok(v.clone()),
            Some(Value::Null) | None => Ok(String::new()),
            Some(_) => Err(invalid(format!("db_check.{key} must be a string"))),
        }
    };

    let mut params = BTreeMap::new();
    match raw.get("params") {
        Some(Value::Object(map)) => {
            for (key, value) in map {
                let Some(value) = value.as_str() else {
                    return Err(invalid(format!("db_check.params.{key} must be a string")));
                };
                params.insert(key.clone(), value.to_string());
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => return Err(invalid("db_check.params must be an object".to_string())),
    }
    let assert = match raw.get("assert") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => JsonMap::new(),
        Some(_) => return Err(invalid("db_check.assert must be an object".to_string())),
    };

    Ok(DbCheckDraft {
        name: text("name")?,
        dms: text("dms")?,
        sql: text("sql")?,
        params,
        assert,
    })
}

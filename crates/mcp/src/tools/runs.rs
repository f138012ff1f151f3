#![forbid(unsafe_code)]

use super::decode::{STEP_PAYLOAD, decode_payload, parse_db_check, parse_step};
use crate::service::{CrystallizeArgs, ReplayArgs};
use crate::*;
use serde_json::{Value, json};
use sz_core::JsonMap;

impl McpServer {
    /// `unit_id` plus the explicit `run_id` or, when omitted, the unit's latest run.
    /// A missing unit is `unit_not_found`; a unit without runs is `run_not_found`.
    pub(crate) fn run_target(&self, args: &JsonMap) -> Result<(String, String), AppError> {
        let unit_id = require_string(args, "unit_id")?;
        if let Some(run_id) = optional_string(args, "run_id")?.filter(|v| !v.trim().is_empty()) {
            return Ok((unit_id, run_id));
        }
        let unit = self.service.get_unit(&unit_id)?;
        let Some(latest) = unit.latest_run() else {
            return Err(AppError::new(
                ErrorCode::RunNotFound,
                format!("unit has no runs: unit_id={unit_id}"),
            ));
        };
        let run_id = latest.run_id.clone();
        Ok((unit_id, run_id))
    }

    pub(crate) fn tool_syzygy_step_append(&mut self, args: &JsonMap) -> Result<Value, AppError> {
        let raw = require_object(args, "step", ErrorCode::InvalidStep)?;
        let draft = parse_step(&raw, ErrorCode::InvalidStep)?;
        let (unit_id, run_id) = self.run_target(args)?;
        let step_id = self.service.step_append(&unit_id, &run_id, draft)?;
        Ok(json!({ "step_id": step_id }))
    }

    pub(crate) fn tool_syzygy_step_append_json(
        &mut self,
        args: &JsonMap,
    ) -> Result<Value, AppError> {
        let raw = decode_payload(args, &STEP_PAYLOAD)?;
        let draft = parse_step(&raw, ErrorCode::InvalidStep)?;
        let (unit_id, run_id) = self.run_target(args)?;
        let step_id = self.service.step_append(&unit_id, &run_id, draft)?;
        Ok(json!({ "step_id": step_id }))
    }

    pub(crate) fn tool_syzygy_steps_append_batch(
        &mut self,
        args: &JsonMap,
    ) -> Result<Value, AppError> {
        let Some(Value::Array(items)) = args.get("steps") else {
            return Err(AppError::new(ErrorCode::InvalidSteps, "steps must be an array"));
        };
        let drafts = items
            .iter()
            .map(|item| match item {
                Value::Object(raw) => parse_step(raw, ErrorCode::InvalidSteps),
                _ => Err(AppError::new(
                    ErrorCode::InvalidSteps,
                    "each step must be an object",
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let (unit_id, run_id) = self.run_target(args)?;
        let step_ids = self.service.steps_append(&unit_id, &run_id, drafts)?;
        Ok(json!({ "step_ids": step_ids }))
    }

    pub(crate) fn tool_syzygy_anchor_set(&mut self, args: &JsonMap) -> Result<Value, AppError> {
        let key = require_string(args, "key")?;
        let value = require_string(args, "value")?;
        let source = optional_string(args, "source")?.unwrap_or_default();
        let (unit_id, run_id) = self.run_target(args)?;
        self.service
            .anchor_set(&unit_id, &run_id, &key, &value, &source)?;
        Ok(json!({ "ok": true }))
    }

    pub(crate) fn tool_syzygy_dbcheck_append(
        &mut self,
        args: &JsonMap,
    ) -> Result<Value, AppError> {
        let raw = require_object(args, "db_check", ErrorCode::InvalidDbCheck)?;
        let draft = parse_db_check(&raw)?;
        let (unit_id, run_id) = self.run_target(args)?;
        let check_id = self.service.dbcheck_append(&unit_id, &run_id, draft)?;
        Ok(json!({ "dbcheck_id": check_id }))
    }

    pub(crate) fn tool_syzygy_crystallize(&mut self, args: &JsonMap) -> Result<Value, AppError> {
        let crystallize = CrystallizeArgs {
            template: optional_string(args, "template")?,
            output_dir: optional_string(args, "output_dir")?,
        };
        let (unit_id, run_id) = self.run_target(args)?;
        let outcome = self.service.crystallize(&unit_id, &run_id, crystallize)?;
        Ok(serde_json::to_value(outcome)?)
    }

    pub(crate) fn tool_syzygy_replay(&mut self, args: &JsonMap) -> Result<Value, AppError> {
        let replay = ReplayArgs {
            command: optional_string(args, "command")?,
            args: optional_string_list(args, "args")?,
            cwd: optional_string(args, "cwd")?,
            env: optional_object(args, "env", ErrorCode::InvalidArgs)?.unwrap_or_default(),
        };
        let (unit_id, run_id) = self.run_target(args)?;
        let outcome = self.service.replay(&unit_id, &run_id, replay)?;
        Ok(serde_json::to_value(outcome)?)
    }

    pub(crate) fn tool_syzygy_selfcheck(&mut self, args: &JsonMap) -> Result<Value, AppError> {
        let (unit_id, run_id) = self.run_target(args)?;
        let report = self.service.selfcheck(&unit_id, &run_id)?;
        Ok(serde_json::to_value(report)?)
    }
}

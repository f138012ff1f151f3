#![forbid(unsafe_code)]

use super::decode::{META_PAYLOAD, decode_payload};
use crate::service::ProjectInitArgs;
use crate::*;
use serde_json::{Value, json};
use sz_core::JsonMap;
use sz_core::impact::ImpactQuery;
use sz_core::merge::UnitSeed;

impl McpServer {
    pub(crate) fn tool_syzygy_project_init(&mut self, args: &JsonMap) -> Result<Value, AppError> {
        let init = ProjectInitArgs {
            project_key: optional_string(args, "project_key")?,
            env: optional_object(args, "env", ErrorCode::InvalidArgs)?.unwrap_or_default(),
            runner_command: optional_string(args, "runner_command")?,
            runner_dir: optional_string(args, "runner_dir")?,
            artifacts_dir: optional_string(args, "artifacts_dir")?,
        };
        let config = self.service.project_init(init)?;
        self.note_project(&config.project_key);
        Ok(json!({
            "ok": true,
            "project_key": config.project_key,
            "config": config,
        }))
    }

    pub(crate) fn tool_syzygy_unit_start(&mut self, args: &JsonMap) -> Result<Value, AppError> {
        let unit_id = require_string(args, "unit_id")?;
        let title = optional_string(args, "title")?.unwrap_or_default();
        let env = optional_object(args, "env", ErrorCode::InvalidArgs)?;
        let variables =
            optional_object(args, "variables", ErrorCode::InvalidArgs)?.unwrap_or_default();

        let run_id = self
            .service
            .unit_start(&unit_id, UnitSeed::new(title, env), variables)?;
        Ok(json!({ "unit_id": unit_id, "run_id": run_id }))
    }

    pub(crate) fn tool_syzygy_unit_meta_set(&mut self, args: &JsonMap) -> Result<Value, AppError> {
        let unit_id = require_string(args, "unit_id")?;
        let meta = require_object(args, "meta", ErrorCode::InvalidArgs)?;
        self.service.set_unit_meta(&unit_id, meta)?;
        Ok(json!({ "ok": true }))
    }

    pub(crate) fn tool_syzygy_unit_meta_set_json(
        &mut self,
        args: &JsonMap,
    ) -> Result<Value, AppError> {
        let unit_id = require_string(args, "unit_id")?;
        let meta = decode_payload(args, &META_PAYLOAD)?;
        self.service.set_unit_meta(&unit_id, meta)?;
        Ok(json!({ "ok": true }))
    }

    pub(crate) fn tool_syzygy_plan_impacted_units(
        &mut self,
        args: &JsonMap,
    ) -> Result<Value, AppError> {
        let query = ImpactQuery {
            changed_files: optional_string_list(args, "changed_files")?,
            changed_apis: optional_string_list(args, "changed_apis")?,
            changed_tables: optional_string_list(args, "changed_tables")?,
            tags: optional_string_list(args, "tags")?,
        };
        let impacted = self.service.plan_impacted_units(&query)?;
        Ok(json!({ "impacted_units": impacted }))
    }
}

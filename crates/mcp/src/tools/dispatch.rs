#![forbid(unsafe_code)]

use crate::{AppError, ErrorCode, McpServer};
use serde_json::Value;
use sz_core::JsonMap;

pub(crate) fn dispatch_tool(
    server: &mut McpServer,
    name: &str,
    args: &JsonMap,
) -> Result<Value, AppError> {
    match name {
        "syzygy_project_init" => server.tool_syzygy_project_init(args),
        "syzygy_unit_start" => server.tool_syzygy_unit_start(args),
        "syzygy_unit_meta_set" => server.tool_syzygy_unit_meta_set(args),
        "syzygy_unit_meta_set_json" => server.tool_syzygy_unit_meta_set_json(args),
        "syzygy_plan_impacted_units" => server.tool_syzygy_plan_impacted_units(args),
        "syzygy_step_append" => server.tool_syzygy_step_append(args),
        "syzygy_step_append_json" => server.tool_syzygy_step_append_json(args),
        "syzygy_steps_append_batch" => server.tool_syzygy_steps_append_batch(args),
        "syzygy_anchor_set" => server.tool_syzygy_anchor_set(args),
        "syzygy_dbcheck_append" => server.tool_syzygy_dbcheck_append(args),
        "syzygy_crystallize" => server.tool_syzygy_crystallize(args),
        "syzygy_replay" => server.tool_syzygy_replay(args),
        "syzygy_selfcheck" => server.tool_syzygy_selfcheck(args),
        _ => Err(AppError::new(
            ErrorCode::ToolNotImplemented,
            format!("tool not implemented: {name}"),
        )),
    }
}

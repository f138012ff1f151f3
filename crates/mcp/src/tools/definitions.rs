#![forbid(unsafe_code)]

use serde_json::{Value, json};

const STRING: &str = "string";

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": STRING } })
}

pub(crate) fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "syzygy_project_init",
            "description": "Initialize the project runtime config (env such as DB/BASE_URL, artifacts dir, replay runner) and make it the active project.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "project_key": { "type": STRING },
                    "env": { "type": "object" },
                    "runner_command": { "type": STRING },
                    "runner_dir": { "type": STRING },
                    "artifacts_dir": { "type": STRING }
                },
                "required": []
            }
        }),
        json!({
            "name": "syzygy_unit_start",
            "description": "Start a new run of a unit, creating the unit on first use.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "title": { "type": STRING },
                    "env": { "type": "object" },
                    "variables": { "type": "object" }
                },
                "required": ["unit_id"]
            }
        }),
        json!({
            "name": "syzygy_unit_meta_set",
            "description": "Merge annotations (tags, touchpoints) into unit meta.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "meta": { "type": "object" }
                },
                "required": ["unit_id", "meta"]
            }
        }),
        json!({
            "name": "syzygy_unit_meta_set_json",
            "description": "Merge unit meta given as an object, a JSON string or base64 of a JSON string.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "meta": { "type": "object" },
                    "meta_json": { "type": STRING },
                    "meta_base64": { "type": STRING }
                },
                "required": ["unit_id"]
            }
        }),
        json!({
            "name": "syzygy_plan_impacted_units",
            "description": "List units whose touchpoints or tags match the changed files, APIs, tables or tags.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "changed_files": string_array(),
                    "changed_apis": string_array(),
                    "changed_tables": string_array(),
                    "tags": string_array()
                },
                "required": []
            }
        }),
        json!({
            "name": "syzygy_step_append",
            "description": "Append an action step to a run (defaults to the latest run).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "run_id": { "type": STRING },
                    "step": { "type": "object" }
                },
                "required": ["unit_id", "step"]
            }
        }),
        json!({
            "name": "syzygy_step_append_json",
            "description": "Append an action step given as an object, a JSON string or base64 of a JSON string.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "run_id": { "type": STRING },
                    "step": { "type": "object" },
                    "step_json": { "type": STRING },
                    "step_base64": { "type": STRING }
                },
                "required": ["unit_id"]
            }
        }),
        json!({
            "name": "syzygy_steps_append_batch",
            "description": "Append several action steps at once; nothing is appended if any step is invalid.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "run_id": { "type": STRING },
                    "steps": { "type": "array", "items": { "type": "object" } }
                },
                "required": ["unit_id", "steps"]
            }
        }),
        json!({
            "name": "syzygy_anchor_set",
            "description": "Set a data anchor linking UI, network and database layers.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "run_id": { "type": STRING },
                    "key": { "type": STRING },
                    "value": { "type": STRING },
                    "source": { "type": STRING }
                },
                "required": ["unit_id", "key", "value"]
            }
        }),
        json!({
            "name": "syzygy_dbcheck_append",
            "description": "Append a database assertion to a run.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "run_id": { "type": STRING },
                    "db_check": {
                        "type": "object",
                        "properties": {
                            "name": { "type": STRING },
                            "dms": { "type": STRING },
                            "sql": { "type": STRING },
                            "params": { "type": "object" },
                            "assert": { "type": "object" }
                        }
                    }
                },
                "required": ["unit_id", "db_check"]
            }
        }),
        json!({
            "name": "syzygy_crystallize",
            "description": "Export a run into replayable artifacts (spec.json and a Playwright skeleton).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "run_id": { "type": STRING },
                    "template": { "type": STRING },
                    "output_dir": { "type": STRING }
                },
                "required": ["unit_id"]
            }
        }),
        json!({
            "name": "syzygy_replay",
            "description": "Replay a crystallized run through the project runner or an explicit command.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "run_id": { "type": STRING },
                    "command": { "type": STRING },
                    "args": string_array(),
                    "cwd": { "type": STRING },
                    "env": { "type": "object" }
                },
                "required": ["unit_id"]
            }
        }),
        json!({
            "name": "syzygy_selfcheck",
            "description": "Check a run for completion: crystallized, replayed successfully, three-layer aligned, deliverable.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "unit_id": { "type": STRING },
                    "run_id": { "type": STRING }
                },
                "required": ["unit_id"]
            }
        }),
    ]
}

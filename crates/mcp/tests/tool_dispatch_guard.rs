#![forbid(unsafe_code)]

mod support;
use support::*;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

fn start_run(server: &mut Server, unit_id: &str, title: &str) -> String {
    let started = server.call_ok(
        "syzygy_unit_start",
        json!({ "unit_id": unit_id, "title": title, "env": { "BASE_URL": "http://localhost:3000" } }),
    );
    assert_eq!(started["unit_id"], json!(unit_id));
    started["run_id"].as_str().expect("run_id").to_string()
}

fn is_generated_id(value: &Value, prefix: &str) -> bool {
    value.as_str().is_some_and(|id| {
        id.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|hex| hex.len() == 16 && hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()))
    })
}

#[test]
fn unit_start_twice_yields_distinct_runs() {
    let mut server = Server::start_initialized();
    let first = start_run(&mut server, "login", "Login");
    let second = start_run(&mut server, "login", "");
    assert_ne!(first, second);
    assert!(is_generated_id(&json!(first), "run"));

    for run_id in [&first, &second] {
        let report = server.call_ok("syzygy_selfcheck", json!({ "unit_id": "login", "run_id": run_id }));
        assert_eq!(report["run_id"], json!(run_id));
    }
}

#[test]
fn steps_append_in_order_with_unique_ids() {
    let mut server = Server::start_initialized();
    let run_id = start_run(&mut server, "cart", "Cart");

    let a = server.call_ok(
        "syzygy_step_append",
        json!({ "unit_id": "cart", "run_id": run_id, "step": { "name": "open", "ui": { "goto": "/cart" } } }),
    );
    let b = server.call_ok(
        "syzygy_step_append_json",
        json!({ "unit_id": "cart", "step_json": "{\"name\":\"add\",\"net\":{\"POST\":\"/api/cart\"}}" }),
    );
    let c = server.call_ok(
        "syzygy_step_append_json",
        json!({ "unit_id": "cart", "step_base64": STANDARD.encode("{\"name\":\"verify\"}") }),
    );
    let ids = [&a["step_id"], &b["step_id"], &c["step_id"]];
    assert!(ids.iter().all(|id| is_generated_id(id, "step")));
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);

    let out = server.call_ok("syzygy_crystallize", json!({ "unit_id": "cart" }));
    let spec_path = out["artifact_paths"]["spec"].as_str().expect("spec path");
    let spec: Value = serde_json::from_str(&std::fs::read_to_string(spec_path).expect("spec file"))
        .expect("spec json");
    let names = spec["steps"]
        .as_array()
        .expect("steps")
        .iter()
        .map(|s| s["name"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["open", "add", "verify"]);
}

#[test]
fn step_payload_decoding_names_the_failed_stage() {
    let mut server = Server::start_initialized();
    start_run(&mut server, "u", "U");

    let resp = server.call_tool("syzygy_step_append_json", json!({ "unit_id": "u", "step_json": "{nope" }));
    assert_tool_error(&resp, "invalid_step_json");

    let resp = server.call_tool("syzygy_step_append_json", json!({ "unit_id": "u", "step_base64": "***" }));
    assert_tool_error(&resp, "invalid_step_base64");

    let resp = server.call_tool("syzygy_step_append_json", json!({ "unit_id": "u" }));
    assert_tool_error(&resp, "invalid_step");

    let resp = server.call_tool("syzygy_step_append", json!({ "unit_id": "u", "step": "click" }));
    assert_tool_error(&resp, "invalid_step");

    let ok = server.call_ok(
        "syzygy_step_append_json",
        json!({ "unit_id": "u", "step": { "name": "inline" }, "step_json": "{nope" }),
    );
    assert!(is_generated_id(&ok["step_id"], "step"));
}

#[test]
fn meta_payload_decoding() {
    let mut server = Server::start_initialized();

    let resp = server.call_tool("syzygy_unit_meta_set_json", json!({ "unit_id": "m", "meta_json": "not json" }));
    assert_tool_error(&resp, "invalid_meta_json");
    let resp = server.call_tool("syzygy_unit_meta_set_json", json!({ "unit_id": "m", "meta_base64": "@@" }));
    assert_tool_error(&resp, "invalid_meta_base64");
    let resp = server.call_tool("syzygy_unit_meta_set_json", json!({ "unit_id": "m" }));
    assert_tool_error(&resp, "invalid_args");
    let resp = server.call_tool("syzygy_unit_meta_set", json!({ "unit_id": "m", "meta": [1] }));
    assert_tool_error(&resp, "invalid_args");

    let ok = server.call_ok(
        "syzygy_unit_meta_set_json",
        json!({ "unit_id": "m", "meta_base64": STANDARD.encode("{\"tags\":[\"smoke\"]}") }),
    );
    assert_eq!(ok, json!({ "ok": true }));
    let plan = server.call_ok("syzygy_plan_impacted_units", json!({ "tags": ["smoke"] }));
    assert_eq!(
        plan,
        json!({ "impacted_units": [{ "unit_id": "m", "title": "", "reasons": ["tag"] }] })
    );
}

#[test]
fn anchor_last_write_wins() {
    let mut server = Server::start_initialized();
    let run_id = start_run(&mut server, "order", "Order");

    for value in ["A-1", "A-2"] {
        let ok = server.call_ok(
            "syzygy_anchor_set",
            json!({ "unit_id": "order", "run_id": run_id, "key": "order_no", "value": value, "source": "ui" }),
        );
        assert_eq!(ok, json!({ "ok": true }));
    }
    let out = server.call_ok("syzygy_crystallize", json!({ "unit_id": "order" }));
    let spec: Value = serde_json::from_str(
        &std::fs::read_to_string(out["artifact_paths"]["spec"].as_str().expect("path")).expect("spec"),
    )
    .expect("json");
    assert_eq!(spec["anchors"], json!({ "order_no": "A-2" }));
}

#[test]
fn unknown_run_and_unit_are_reported() {
    let mut server = Server::start_initialized();
    start_run(&mut server, "u", "U");

    let resp = server.call_tool(
        "syzygy_anchor_set",
        json!({ "unit_id": "u", "run_id": "run_0000000000000000", "key": "k", "value": "v" }),
    );
    assert_tool_error(&resp, "run_not_found");

    let resp = server.call_tool("syzygy_selfcheck", json!({ "unit_id": "ghost" }));
    assert_tool_error(&resp, "unit_not_found");
}

#[test]
fn batch_append_is_all_or_nothing() {
    let mut server = Server::start_initialized();
    start_run(&mut server, "b", "Batch");

    let resp = server.call_tool(
        "syzygy_steps_append_batch",
        json!({ "unit_id": "b", "steps": [{ "name": "ok" }, "bad"] }),
    );
    assert_tool_error(&resp, "invalid_steps");
    let resp = server.call_tool("syzygy_steps_append_batch", json!({ "unit_id": "b", "steps": {} }));
    assert_tool_error(&resp, "invalid_steps");

    let report = server.call_ok("syzygy_selfcheck", json!({ "unit_id": "b" }));
    let alignment = &report["checks"][3];
    assert_eq!(alignment["name"], json!("three_layer_alignment"));
    assert_eq!(alignment["passed"], json!(false));

    let ok = server.call_ok(
        "syzygy_steps_append_batch",
        json!({ "unit_id": "b", "steps": [{ "name": "one" }, { "name": "two", "db": { "table": "orders" } }] }),
    );
    assert_eq!(ok["step_ids"].as_array().map(Vec::len), Some(2));
}

#[test]
fn dbcheck_validation() {
    let mut server = Server::start_initialized();
    start_run(&mut server, "d", "Db");

    let resp = server.call_tool("syzygy_dbcheck_append", json!({ "unit_id": "d", "db_check": "select 1" }));
    assert_tool_error(&resp, "invalid_db_check");
    let resp = server.call_tool(
        "syzygy_dbcheck_append",
        json!({ "unit_id": "d", "db_check": { "sql": 1 } }),
    );
    assert_tool_error(&resp, "invalid_db_check");

    let ok = server.call_ok(
        "syzygy_dbcheck_append",
        json!({ "unit_id": "d", "db_check": {
            "name": "order row", "dms": "mysql", "sql": "select * from orders where no = :no",
            "params": { "no": "A-2" }, "assert": { "rows": 1 }
        } }),
    );
    assert!(is_generated_id(&ok["dbcheck_id"], "db"));
}

#[test]
fn selfcheck_on_bare_run_fails_expected_checks() {
    let mut server = Server::start_initialized();
    let run_id = start_run(&mut server, "bare", "");

    let report = server.call_ok("syzygy_selfcheck", json!({ "unit_id": "bare", "run_id": run_id }));
    assert_eq!(report["all_passed"], json!(false));
    let failed = report["checks"]
        .as_array()
        .expect("checks")
        .iter()
        .filter(|c| c["passed"] == json!(false))
        .map(|c| c["name"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        failed,
        vec!["crystallize_completed", "replay_verified", "three_layer_alignment", "delivery_format"]
    );
    let summary = report["summary"].as_str().expect("summary");
    assert!(summary.contains("crystallize_completed"));
}

#[test]
fn replay_needs_artifact_then_project() {
    let mut server = Server::start_initialized();
    start_run(&mut server, "r", "Replay");

    let resp = server.call_tool("syzygy_replay", json!({ "unit_id": "r" }));
    assert_tool_error(&resp, "missing_artifact");

    server.call_ok("syzygy_crystallize", json!({ "unit_id": "r" }));
    let resp = server.call_tool("syzygy_replay", json!({ "unit_id": "r" }));
    assert_tool_error(&resp, "project_not_initialized");

    let resp = server.call_tool(
        "syzygy_replay",
        json!({ "unit_id": "r", "command": "no-such-runner-on-this-machine" }),
    );
    assert_tool_error(&resp, "environment_error");
}

#[cfg(unix)]
fn write_runner_script(dir: &std::path::Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    std::fs::create_dir_all(dir).expect("runner dir");
    let script = dir.join("runner.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\ntest -f \"$1\" || exit 9\ntest \"$SYZYGY_SPEC\" = \"$1\" || exit 8\necho \"replay-ok $DB_DSN $(basename \"$PWD\")\"\n",
    )
    .expect("write runner");
    let mut perms = std::fs::metadata(&script).expect("meta").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).expect("chmod");
    script
}

#[cfg(unix)]
#[test]
fn full_flow_passes_selfcheck() {
    let mut server = Server::start_initialized();
    let runner_dir = server.scratch().join("runner");
    let script = write_runner_script(&runner_dir);
    let init = server.call_ok(
        "syzygy_project_init",
        json!({
            "project_key": "shop",
            "env": { "DB_DSN": "mysql://shop", "RETRIES": 3 },
            "runner_command": script.to_string_lossy(),
            "runner_dir": runner_dir.to_string_lossy()
        }),
    );
    assert_eq!(init["project_key"], json!("shop"));
    assert_eq!(init["config"]["env"]["RETRIES"], json!("3"));

    let run_id = start_run(&mut server, "checkout", "Checkout happy path");
    server.call_ok(
        "syzygy_step_append",
        json!({ "unit_id": "checkout", "step": { "name": "wait for confirmation", "db": { "table": "orders" } } }),
    );
    let crystal = server.call_ok("syzygy_crystallize", json!({ "unit_id": "checkout" }));
    assert_eq!(crystal["spec_sha256"].as_str().map(str::len), Some(64));
    let expected_dir = server.scratch().join("artifacts").join("checkout").join(&run_id);
    assert!(expected_dir.join("spec.json").is_file());
    assert!(expected_dir.join("e2e.spec.ts").is_file());

    let replay = server.call_ok("syzygy_replay", json!({ "unit_id": "checkout" }));
    assert_eq!(replay["ok"], json!(true), "replay: {replay}");
    assert_eq!(replay["output"], json!("replay-ok mysql://shop runner\n"));
    assert!(replay.get("error").is_none());

    let report = server.call_ok("syzygy_selfcheck", json!({ "unit_id": "checkout" }));
    assert_eq!(report["all_passed"], json!(true), "report: {report}");
    assert_eq!(report["checks"].as_array().map(Vec::len), Some(6));
}

#[cfg(unix)]
#[test]
fn failed_replay_fails_selfcheck() {
    let mut server = Server::start_initialized();
    start_run(&mut server, "f", "Failing");
    server.call_ok("syzygy_crystallize", json!({ "unit_id": "f" }));

    let replay = server.call_ok(
        "syzygy_replay",
        json!({ "unit_id": "f", "command": "sh", "args": ["-c", "echo broken >&2; exit 4"] }),
    );
    assert_eq!(replay["ok"], json!(false));
    assert_eq!(replay["error"], json!("exit status 4"));
    assert_eq!(replay["output"], json!("broken\n"));

    let report = server.call_ok("syzygy_selfcheck", json!({ "unit_id": "f" }));
    let replay_check = &report["checks"][2];
    assert_eq!(replay_check["name"], json!("replay_verified"));
    assert_eq!(replay_check["passed"], json!(false));
}

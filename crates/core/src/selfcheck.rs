#![forbid(unsafe_code)]

//! Compliance rules evaluated over a stored run.
//!
//! Every rule runs; none short-circuits another. `performance_recorded` is advisory and
//! never fails the aggregate.

use crate::model::{META_PERFORMANCE, META_REPLAY_RESULT, Run, Unit};
use serde::Serialize;
use serde_json::{Value, json};

pub const CATEGORY_DEVELOPMENT: &str = "development";
pub const CATEGORY_COMPLETION: &str = "completion";

const PERFORMANCE_STEP_MARKERS: [&str; 3] = ["timeout", "performance", "wait"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub category: &'static str,
    pub passed: bool,
    pub message: String,
    pub details: Value,
    #[serde(skip)]
    advisory: bool,
}

impl CheckOutcome {
    fn new(
        name: &'static str,
        category: &'static str,
        passed: bool,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            name,
            category,
            passed,
            message: message.into(),
            details,
            advisory: false,
        }
    }

    fn advisory(mut self) -> Self {
        self.advisory = true;
        self
    }

    pub fn is_advisory(&self) -> bool {
        self.advisory
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelfCheckReport {
    pub unit_id: String,
    pub run_id: String,
    pub all_passed: bool,
    pub checks: Vec<CheckOutcome>,
    pub summary: String,
}

impl SelfCheckReport {
    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|check| !check.passed)
            .map(|check| check.name)
            .collect()
    }
}

pub fn evaluate(unit: &Unit, run: &Run) -> SelfCheckReport {
    let checks = vec![
        run_status(run),
        crystallize_completed(run),
        replay_verified(run),
        three_layer_alignment(run),
        performance_recorded(run),
        delivery_format(unit),
    ];

    let all_passed = checks
        .iter()
        .filter(|check| !check.is_advisory())
        .all(|check| check.passed);

    let summary = if all_passed {
        "SELFCHECK PASSED - all checks completed successfully".to_string()
    } else {
        let failed = checks
            .iter()
            .filter(|check| !check.passed)
            .map(|check| check.name)
            .collect::<Vec<_>>();
        format!("SELFCHECK FAILED - failed checks: {}", failed.join(", "))
    };

    SelfCheckReport {
        unit_id: unit.unit_id.clone(),
        run_id: run.run_id.clone(),
        all_passed,
        checks,
        summary,
    }
}

fn run_status(run: &Run) -> CheckOutcome {
    let passed = !run.status.is_empty();
    let message = if passed {
        "run status is set"
    } else {
        "run status is empty"
    };
    CheckOutcome::new(
        "run_status",
        CATEGORY_DEVELOPMENT,
        passed,
        message,
        json!({ "status": run.status }),
    )
}

fn crystallize_completed(run: &Run) -> CheckOutcome {
    let passed = !run.artifacts.is_empty();
    let message = if passed {
        "crystallize has been executed"
    } else {
        "syzygy_crystallize not executed: no artifacts found"
    };
    CheckOutcome::new(
        "crystallize_completed",
        CATEGORY_COMPLETION,
        passed,
        message,
        json!({ "artifacts": run.artifacts.keys().collect::<Vec<_>>() }),
    )
}

fn replay_verified(run: &Run) -> CheckOutcome {
    let name = "replay_verified";
    let Some(result) = run.meta.get(META_REPLAY_RESULT) else {
        return CheckOutcome::new(
            name,
            CATEGORY_COMPLETION,
            false,
            "syzygy_replay not executed: no replay result found",
            json!({ "present": false }),
        );
    };

    let Some(ok) = result.as_object().and_then(|obj| obj.get("ok")) else {
        return CheckOutcome::new(
            name,
            CATEGORY_COMPLETION,
            true,
            "replay verification has been executed",
            json!({ "present": true }),
        );
    };

    if ok.as_bool() == Some(true) {
        return CheckOutcome::new(
            name,
            CATEGORY_COMPLETION,
            true,
            "replay verification successful",
            json!({ "present": true, "ok": true }),
        );
    }

    let error = result
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    CheckOutcome::new(
        name,
        CATEGORY_COMPLETION,
        false,
        format!("syzygy_replay returned ok={ok}: {error}").trim_end_matches([':', ' ']),
        json!({ "present": true, "ok": ok }),
    )
}

fn three_layer_alignment(run: &Run) -> CheckOutcome {
    let has_ui = run.steps.iter().any(|step| !step.ui.is_empty());
    let has_net = run.steps.iter().any(|step| !step.net.is_empty());
    let has_db = run.steps.iter().any(|step| !step.db.is_empty()) || !run.db_checks.is_empty();
    let passed = has_ui || has_net || has_db;
    let message = if passed {
        "three-layer alignment check"
    } else {
        "no UI/Net/DB steps found: three-layer alignment not achieved"
    };
    CheckOutcome::new(
        "three_layer_alignment",
        CATEGORY_COMPLETION,
        passed,
        message,
        json!({ "ui": has_ui, "net": has_net, "db": has_db }),
    )
}

fn performance_recorded(run: &Run) -> CheckOutcome {
    let has_meta = run
        .meta
        .get(META_PERFORMANCE)
        .is_some_and(|value| !value.is_null());
    let has_step = run.steps.iter().any(|step| {
        PERFORMANCE_STEP_MARKERS
            .iter()
            .any(|marker| step.name.contains(marker))
    });
    let message = if has_meta || has_step {
        "performance record check (optional)"
    } else {
        "warning: no performance record found (optional but recommended)"
    };
    CheckOutcome::new(
        "performance_recorded",
        CATEGORY_COMPLETION,
        true,
        message,
        json!({ "performance_meta": has_meta, "timing_steps": has_step }),
    )
    .advisory()
}

fn delivery_format(unit: &Unit) -> CheckOutcome {
    let passed = !unit.title.is_empty();
    let message = if passed {
        "delivery format check"
    } else {
        "unit title is empty: delivery format incomplete"
    };
    CheckOutcome::new(
        "delivery_format",
        CATEGORY_COMPLETION,
        passed,
        message,
        json!({ "title": unit.title }),
    )
}

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Open string-keyed JSON mapping used for env, meta, variables and step payloads.
pub type JsonMap = serde_json::Map<String, Value>;

pub const RUN_STATUS_IN_PROGRESS: &str = "in_progress";

pub const META_LAST_ANCHOR_SOURCE: &str = "last_anchor_source";
pub const META_REPLAY_RESULT: &str = "replay_result";
pub const META_REPLAY_EXECUTED_AT: &str = "replay_executed_at";
pub const META_PERFORMANCE: &str = "performance";
pub const META_CRYSTALLIZE_TEMPLATE: &str = "crystallize_template";
pub const META_SPEC_SHA256: &str = "spec_sha256";

pub const ARTIFACT_SPEC: &str = "spec";
pub const ARTIFACT_PLAYWRIGHT_TS: &str = "playwright_ts";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub env: JsonMap,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub meta: JsonMap,
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Unit {
    pub fn new(
        unit_id: impl Into<String>,
        title: impl Into<String>,
        env: JsonMap,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            title: title.into(),
            env,
            meta: JsonMap::new(),
            runs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes `updated_at`, never letting it fall behind `created_at`.
    pub fn touch(&mut self, now: OffsetDateTime) {
        self.updated_at = if now < self.created_at {
            self.created_at
        } else {
            now
        };
    }

    pub fn run(&self, run_id: &str) -> Option<&Run> {
        self.runs.iter().find(|run| run.run_id == run_id)
    }

    pub fn run_mut(&mut self, run_id: &str) -> Option<&mut Run> {
        self.runs.iter_mut().find(|run| run.run_id == run_id)
    }

    pub fn latest_run(&self) -> Option<&Run> {
        self.runs.last()
    }

    pub fn push_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    /// Per-key overwrite of caller-supplied annotations.
    pub fn merge_meta(&mut self, meta: JsonMap) {
        for (key, value) in meta {
            self.meta.insert(key, value);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub status: String,
    #[serde(default)]
    pub variables: JsonMap,
    #[serde(default)]
    pub steps: Vec<ActionStep>,
    #[serde(default)]
    pub anchors: BTreeMap<String, String>,
    #[serde(default)]
    pub db_checks: Vec<DbCheck>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ended_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub meta: JsonMap,
}

impl Run {
    pub fn start(run_id: impl Into<String>, variables: JsonMap, now: OffsetDateTime) -> Self {
        Self {
            run_id: run_id.into(),
            status: RUN_STATUS_IN_PROGRESS.to_string(),
            variables,
            steps: Vec::new(),
            anchors: BTreeMap::new(),
            db_checks: Vec::new(),
            artifacts: BTreeMap::new(),
            started_at: now,
            ended_at: None,
            meta: JsonMap::new(),
        }
    }

    pub fn set_anchor(&mut self, key: impl Into<String>, value: impl Into<String>, source: &str) {
        self.anchors.insert(key.into(), value.into());
        self.meta.insert(
            META_LAST_ANCHOR_SOURCE.to_string(),
            Value::String(source.to_string()),
        );
    }

    pub fn spec_artifact(&self) -> Option<&str> {
        self.artifacts
            .get(ARTIFACT_SPEC)
            .map(String::as_str)
            .filter(|path| !path.trim().is_empty())
    }
}

/// Caller-supplied step content before an id is assigned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepDraft {
    pub name: String,
    pub util: JsonMap,
    pub db: JsonMap,
    pub ui: JsonMap,
    pub net: JsonMap,
    pub expect: JsonMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub step_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub util: JsonMap,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub db: JsonMap,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub ui: JsonMap,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub net: JsonMap,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub expect: JsonMap,
}

impl ActionStep {
    pub fn from_draft(step_id: impl Into<String>, draft: StepDraft) -> Self {
        Self {
            step_id: step_id.into(),
            name: draft.name,
            util: draft.util,
            db: draft.db,
            ui: draft.ui,
            net: draft.net,
            expect: draft.expect,
        }
    }

    pub fn touches_layer(&self) -> bool {
        !self.ui.is_empty() || !self.net.is_empty() || !self.db.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DbCheckDraft {
    pub name: String,
    pub dms: String,
    pub sql: String,
    pub params: BTreeMap<String, String>,
    pub assert: JsonMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbCheck {
    pub check_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dms: String,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub assert: JsonMap,
}

impl DbCheck {
    pub fn from_draft(check_id: impl Into<String>, draft: DbCheckDraft) -> Self {
        Self {
            check_id: check_id.into(),
            name: draft.name,
            dms: draft.dms,
            sql: draft.sql,
            params: draft.params,
            assert: draft.assert,
        }
    }
}

pub const DEFAULT_PROJECT_KEY: &str = "default";
pub const DEFAULT_RUNNER_COMMAND: &str = "syzygy-runner";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_key: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub runner_command: String,
    #[serde(default)]
    pub runner_dir: String,
    #[serde(default)]
    pub artifacts_dir: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Normalizes a caller-supplied project key into a single path-safe segment.
pub fn canonical_project_key(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_PROJECT_KEY.to_string();
    }
    let cleaned = trimmed
        .replace("..", "")
        .replace(std::path::MAIN_SEPARATOR, "-")
        .replace('/', "-");
    if cleaned.is_empty() {
        DEFAULT_PROJECT_KEY.to_string()
    } else {
        cleaned
    }
}

#![forbid(unsafe_code)]

//! Domain operations over the unit store. Every mutation loads the whole unit, edits it
//! in memory and writes it back before returning.

mod exporter;
mod runner;


pub(crate) use exporter::{ArtifactExporter, ExportOutcome, ExportRequest, FsExporter};
pub(crate) use runner::{CommandOutcome, CommandRunner, CommandSpec, SystemRunner};

use crate::{AppError, ErrorCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use sz_core::ids::{DB_CHECK_PREFIX, RUN_PREFIX, STEP_PREFIX, new_id};
use sz_core::impact::{ImpactQuery, ImpactedUnit, impact_of};
use sz_core::merge::UnitSeed;
use sz_core::model::{
    DEFAULT_RUNNER_COMMAND, META_CRYSTALLIZE_TEMPLATE, META_REPLAY_EXECUTED_AT, META_REPLAY_RESULT,
    META_SPEC_SHA256,
};
use sz_core::selfcheck::{SelfCheckReport, evaluate};
use sz_core::{
    ActionStep, DbCheck, DbCheckDraft, JsonMap, ProjectConfig, Run, StepDraft, Unit,
    canonical_project_key,
};
use sz_storage::UnitStore;
use tracing::{debug, warn};

pub(crate) const DEFAULT_TEMPLATE: &str = "spec_json";
pub(crate) const SPEC_ENV: &str = "SYZYGY_SPEC";

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ProjectInitArgs {
    pub(crate) project_key: Option<String>,
    pub(crate) env: JsonMap,
    pub(crate) runner_command: Option<String>,
    pub(crate) runner_dir: Option<String>,
    pub(crate) artifacts_dir: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CrystallizeArgs {
    pub(crate) template: Option<String>,
    pub(crate) output_dir: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct CrystallizeOutcome {
    pub(crate) artifact_paths: BTreeMap<String, String>,
    pub(crate) spec_sha256: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ReplayArgs {
    pub(crate) command: Option<String>,
    pub(crate) args: Vec<String>,
    pub(crate) cwd: Option<String>,
    pub(crate) env: JsonMap,
}

/// Stored verbatim under `run.meta.replay_result`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct ReplayOutcome {
    pub(crate) ok: bool,
    pub(crate) output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
    pub(crate) anchors: BTreeMap<String, String>,
}

pub(crate) struct SyzygyService {
    store: Box<dyn UnitStore>,
    exporter: Box<dyn ArtifactExporter>,
    runner: Box<dyn CommandRunner>,
    project_key: String,
    artifacts_root: PathBuf,
}

impl SyzygyService {
    pub(crate) fn new(store: Box<dyn UnitStore>, project_key: &str, artifacts_root: PathBuf) -> Self {
        Self::with_collaborators(
            store,
            Box::new(FsExporter),
            Box::new(SystemRunner),
            project_key,
            artifacts_root,
        )
    }

    pub(crate) fn with_collaborators(
        store: Box<dyn UnitStore>,
        exporter: Box<dyn ArtifactExporter>,
        runner: Box<dyn CommandRunner>,
        project_key: &str,
        artifacts_root: PathBuf,
    ) -> Self {
        Self {
            store,
            exporter,
            runner,
            project_key: canonical_project_key(project_key),
            artifacts_root,
        }
    }

    pub(crate) fn project_key(&self) -> &str {
        &self.project_key
    }

    pub(crate) fn get_unit(&self, unit_id: &str) -> Result<Unit, AppError> {
        Ok(self.store.get_unit(&self.project_key, unit_id)?)
    }

    pub(crate) fn unit_start(
        &mut self,
        unit_id: &str,
        seed: UnitSeed,
        variables: JsonMap,
    ) -> Result<String, AppError> {
        let now = crate::now_utc();
        let mut unit = self
            .store
            .load_or_seed_unit(&self.project_key, unit_id, seed, now)?;
        let run_id = new_id(RUN_PREFIX)?;
        unit.push_run(Run::start(run_id.clone(), variables, now));
        unit.touch(now);
        self.store.save_unit(&self.project_key, &unit)?;
        debug!(unit_id, run_id = %run_id, "run started");
        Ok(run_id)
    }

    pub(crate) fn set_unit_meta(&mut self, unit_id: &str, meta: JsonMap) -> Result<(), AppError> {
        let now = crate::now_utc();
        let mut unit =
            self.store
                .load_or_seed_unit(&self.project_key, unit_id, UnitSeed::default(), now)?;
        unit.merge_meta(meta);
        unit.touch(now);
        self.store.save_unit(&self.project_key, &unit)?;
        Ok(())
    }

    pub(crate) fn step_append(
        &mut self,
        unit_id: &str,
        run_id: &str,
        draft: StepDraft,
    ) -> Result<String, AppError> {
        let mut ids = self.steps_append(unit_id, run_id, vec![draft])?;
        ids.pop()
            .ok_or_else(|| AppError::new(ErrorCode::InvalidStep, "no step appended"))
    }

    /// Appends all drafts in order with a single save.
    pub(crate) fn steps_append(
        &mut self,
        unit_id: &str,
        run_id: &str,
        drafts: Vec<StepDraft>,
    ) -> Result<Vec<String>, AppError> {
        let step_ids = drafts
            .iter()
            .map(|_| new_id(STEP_PREFIX))
            .collect::<Result<Vec<_>, _>>()?;
        let steps = step_ids
            .iter()
            .zip(drafts)
            .map(|(id, draft)| ActionStep::from_draft(id.clone(), draft))
            .collect::<Vec<_>>();
        self.mutate_run(unit_id, run_id, |run| run.steps.extend(steps))?;
        Ok(step_ids)
    }

    pub(crate) fn anchor_set(
        &mut self,
        unit_id: &str,
        run_id: &str,
        key: &str,
        value: &str,
        source: &str,
    ) -> Result<(), AppError> {
        self.mutate_run(unit_id, run_id, |run| run.set_anchor(key, value, source))
    }

    pub(crate) fn dbcheck_append(
        &mut self,
        unit_id: &str,
        run_id: &str,
        draft: DbCheckDraft,
    ) -> Result<String, AppError> {
        let check_id = new_id(DB_CHECK_PREFIX)?;
        let check = DbCheck::from_draft(check_id.clone(), draft);
        self.mutate_run(unit_id, run_id, |run| run.db_checks.push(check))?;
        Ok(check_id)
    }

    pub(crate) fn project_init(&mut self, args: ProjectInitArgs) -> Result<ProjectConfig, AppError> {
        let project_key = canonical_project_key(
            args.project_key.as_deref().unwrap_or(self.project_key.as_str()),
        );
        let env = args
            .env
            .into_iter()
            .map(|(key, value)| (key, stringify(value)))
            .collect();
        let runner_command = args
            .runner_command
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_RUNNER_COMMAND.to_string());
        let config = ProjectConfig {
            project_key: project_key.clone(),
            env,
            runner_command,
            runner_dir: trimmed(args.runner_dir),
            artifacts_dir: trimmed(args.artifacts_dir),
            updated_at: crate::now_rfc3339(),
        };
        self.store.save_project_config(&config)?;
        self.project_key = project_key;
        Ok(config)
    }

    pub(crate) fn plan_impacted_units(
        &self,
        query: &ImpactQuery,
    ) -> Result<Vec<ImpactedUnit>, AppError> {
        let unit_ids = self.store.list_unit_ids(&self.project_key)?;
        let mut impacted = Vec::new();
        for unit_id in unit_ids {
            let unit = match self.store.get_unit(&self.project_key, &unit_id) {
                Ok(unit) => unit,
                Err(err) => {
                    debug!(unit_id = %unit_id, error = %err, "skipping unreadable unit");
                    continue;
                }
            };
            if let Some(hit) = impact_of(&unit, query) {
                impacted.push(hit);
            }
        }
        Ok(impacted)
    }

    pub(crate) fn crystallize(
        &mut self,
        unit_id: &str,
        run_id: &str,
        args: CrystallizeArgs,
    ) -> Result<CrystallizeOutcome, AppError> {
        let mut unit = self.get_unit(unit_id)?;
        let template = args
            .template
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
        let output_dir = match args.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.artifacts_base()?.join(unit_id).join(run_id),
        };

        let run = unit
            .run(run_id)
            .ok_or_else(|| AppError::run_not_found(unit_id, run_id))?;
        let ExportOutcome {
            artifacts,
            spec_sha256,
        } = self.exporter.export(&ExportRequest {
            unit: &unit,
            run,
            template: &template,
            output_dir: &output_dir,
        })?;

        let run = unit
            .run_mut(run_id)
            .ok_or_else(|| AppError::run_not_found(unit_id, run_id))?;
        run.artifacts = artifacts.clone();
        run.meta
            .insert(META_CRYSTALLIZE_TEMPLATE.to_string(), Value::String(template));
        run.meta.insert(
            META_SPEC_SHA256.to_string(),
            Value::String(spec_sha256.clone()),
        );
        unit.touch(crate::now_utc());
        self.store.save_unit(&self.project_key, &unit)?;

        Ok(CrystallizeOutcome {
            artifact_paths: artifacts,
            spec_sha256,
        })
    }

    /// Runs the replay command and records its outcome on the run. Persisting the outcome
    /// is best-effort: a failed save is logged and the outcome is still returned.
    pub(crate) fn replay(
        &mut self,
        unit_id: &str,
        run_id: &str,
        args: ReplayArgs,
    ) -> Result<ReplayOutcome, AppError> {
        let mut unit = self.get_unit(unit_id)?;
        let run = unit
            .run(run_id)
            .ok_or_else(|| AppError::run_not_found(unit_id, run_id))?;
        let config = self.store.load_project_config(&self.project_key)?;

        let mut extra_env = BTreeMap::new();
        let (program, argv, cwd) = match args.command {
            Some(command) => (command, args.args, args.cwd),
            None => {
                let Some(spec_path) = run.spec_artifact() else {
                    return Err(AppError::new(
                        ErrorCode::MissingArtifact,
                        "spec artifact not found; run syzygy_crystallize first",
                    ));
                };
                let Some(config) = config.as_ref() else {
                    return Err(AppError::new(
                        ErrorCode::ProjectNotInitialized,
                        format!(
                            "project {} is not initialized; run syzygy_project_init first",
                            self.project_key
                        ),
                    ));
                };
                let mut parts = config.runner_command.split_whitespace().map(str::to_string);
                let program = parts
                    .next()
                    .unwrap_or_else(|| DEFAULT_RUNNER_COMMAND.to_string());
                let mut argv = parts.collect::<Vec<_>>();
                argv.push(spec_path.to_string());
                extra_env.insert(SPEC_ENV.to_string(), spec_path.to_string());
                let cwd = args
                    .cwd
                    .or_else(|| Some(config.runner_dir.clone()).filter(|d| !d.is_empty()));
                (program, argv, cwd)
            }
        };

        let Some(resolved) = crate::resolve_command(&program) else {
            return Err(AppError::new(
                ErrorCode::EnvironmentError,
                format!(
                    "command '{program}' not found in PATH or common locations; fix the environment before replay"
                ),
            ));
        };

        let mut env = config.map(|c| c.env).unwrap_or_default();
        env.extend(string_values(&unit.env));
        env.extend(string_values(&args.env));
        env.extend(extra_env);

        let spec = CommandSpec {
            program: resolved,
            args: argv,
            cwd: cwd.map(PathBuf::from),
            env,
        };
        let CommandOutcome {
            success,
            output,
            error,
        } = self.runner.run(&spec);
        let outcome = ReplayOutcome {
            ok: success,
            output,
            error,
            anchors: run.anchors.clone(),
        };

        let recorded = serde_json::to_value(&outcome)?;
        if let Some(run) = unit.run_mut(run_id) {
            run.meta.insert(META_REPLAY_RESULT.to_string(), recorded);
            run.meta.insert(
                META_REPLAY_EXECUTED_AT.to_string(),
                Value::String(crate::now_rfc3339()),
            );
        }
        unit.touch(crate::now_utc());
        if let Err(err) = self.store.save_unit(&self.project_key, &unit) {
            warn!(unit_id, run_id, error = %err, "failed to persist replay result");
        }
        Ok(outcome)
    }

    pub(crate) fn selfcheck(&self, unit_id: &str, run_id: &str) -> Result<SelfCheckReport, AppError> {
        let unit = self.get_unit(unit_id)?;
        let run = unit
            .run(run_id)
            .ok_or_else(|| AppError::run_not_found(unit_id, run_id))?;
        Ok(evaluate(&unit, run))
    }

    fn mutate_run(
        &mut self,
        unit_id: &str,
        run_id: &str,
        edit: impl FnOnce(&mut Run),
    ) -> Result<(), AppError> {
        let mut unit = self.get_unit(unit_id)?;
        let run = unit
            .run_mut(run_id)
            .ok_or_else(|| AppError::run_not_found(unit_id, run_id))?;
        edit(run);
        unit.touch(crate::now_utc());
        self.store.save_unit(&self.project_key, &unit)?;
        Ok(())
    }

    fn artifacts_base(&self) -> Result<PathBuf, AppError> {
        let configured = self
            .store
            .load_project_config(&self.project_key)?
            .map(|c| c.artifacts_dir)
            .filter(|dir| !dir.is_empty());
        Ok(configured
            .map(PathBuf::from)
            .unwrap_or_else(|| self.artifacts_root.clone()))
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Strings stay as-is; other values become compact JSON text.
fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Only string values are exported into a child environment.
fn string_values(map: &JsonMap) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
        .collect()
}

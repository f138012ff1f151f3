#![forbid(unsafe_code)]

use crate::AppError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use sz_core::model::{ARTIFACT_PLAYWRIGHT_TS, ARTIFACT_SPEC};
use sz_core::{ActionStep, DbCheck, JsonMap, Run, Unit};

pub(crate) const SPEC_FILE: &str = "spec.json";
pub(crate) const PLAYWRIGHT_FILE: &str = "e2e.spec.ts";

pub(crate) struct ExportRequest<'a> {
    pub(crate) unit: &'a Unit,
    pub(crate) run: &'a Run,
    pub(crate) template: &'a str,
    pub(crate) output_dir: &'a Path,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ExportOutcome {
    /// Artifact kind to written path.
    pub(crate) artifacts: BTreeMap<String, String>,
    pub(crate) spec_sha256: String,
}

/// Turns a recorded run into replayable files.
pub(crate) trait ArtifactExporter {
    fn export(&self, request: &ExportRequest<'_>) -> Result<ExportOutcome, AppError>;
}

#[derive(Serialize)]
struct SpecDocument<'a> {
    unit_id: &'a str,
    run_id: &'a str,
    template: &'a str,
    steps: &'a [ActionStep],
    anchors: &'a BTreeMap<String, String>,
    db_checks: &'a [DbCheck],
    variables: &'a JsonMap,
    env: &'a JsonMap,
}

/// Writes `spec.json` plus a Playwright skeleton into the output directory.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct FsExporter;

impl ArtifactExporter for FsExporter {
    fn export(&self, request: &ExportRequest<'_>) -> Result<ExportOutcome, AppError> {
        std::fs::create_dir_all(request.output_dir)?;

        let doc = SpecDocument {
            unit_id: &request.unit.unit_id,
            run_id: &request.run.run_id,
            template: request.template,
            steps: &request.run.steps,
            anchors: &request.run.anchors,
            db_checks: &request.run.db_checks,
            variables: &request.run.variables,
            env: &request.unit.env,
        };
        let spec_bytes = serde_json::to_vec_pretty(&doc)?;
        let spec_path = request.output_dir.join(SPEC_FILE);
        std::fs::write(&spec_path, &spec_bytes)?;

        let playwright_path = request.output_dir.join(PLAYWRIGHT_FILE);
        std::fs::write(&playwright_path, playwright_skeleton(&request.unit.unit_id))?;

        let artifacts = BTreeMap::from([
            (
                ARTIFACT_SPEC.to_string(),
                spec_path.to_string_lossy().to_string(),
            ),
            (
                ARTIFACT_PLAYWRIGHT_TS.to_string(),
                playwright_path.to_string_lossy().to_string(),
            ),
        ]);
        Ok(ExportOutcome {
            artifacts,
            spec_sha256: hex::encode(Sha256::digest(&spec_bytes)),
        })
    }
}

fn playwright_skeleton(unit_id: &str) -> String {
    let title = serde_json::to_string(&format!("syzygy unit {unit_id}"))
        .unwrap_or_else(|_| "\"syzygy unit\"".to_string());
    format!(
        "import {{ test, expect }} from '@playwright/test'\n\n\
test({title}, async ({{ page }}) => {{\n\
  // Steps live in spec.json next to this file; replay them through the runner.\n\
  await page.goto(process.env.BASE_URL || 'http://localhost');\n\
  await expect(page).toBeTruthy();\n\
}});\n"
    )
}

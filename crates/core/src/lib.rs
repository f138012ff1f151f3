#![forbid(unsafe_code)]

pub mod ids;
pub mod impact;
pub mod merge;
pub mod model;
pub mod selfcheck;

pub use model::{
    ActionStep, DbCheck, DbCheckDraft, JsonMap, ProjectConfig, Run, StepDraft, Unit,
    canonical_project_key,
};

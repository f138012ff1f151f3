#![forbid(unsafe_code)]

use std::path::PathBuf;
use sz_core::canonical_project_key;

const DEFAULT_STORE_DIR_NAME: &str = ".syzygy-mcp";
const DEFAULT_ARTIFACTS_DIR: &str = "syzygy-artifacts";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RuntimeConfig {
    pub(crate) storage_dir: PathBuf,
    pub(crate) project_key: String,
    pub(crate) artifacts_dir: PathBuf,
}

pub(crate) fn parse_runtime_config() -> RuntimeConfig {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    runtime_config_from(&args, |key| std::env::var(key).ok())
}

/// Flags win over environment, environment wins over defaults. Empty values count as unset.
pub(crate) fn runtime_config_from(
    args: &[String],
    env: impl Fn(&str) -> Option<String>,
) -> RuntimeConfig {
    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let storage_dir = flag_value(args, "--storage-dir")
        .or_else(|| env("SYZYGY_HOME"))
        .or_else(|| env("SYZYGY_DATA_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(|| match env("HOME") {
            Some(home) => PathBuf::from(home).join(DEFAULT_STORE_DIR_NAME),
            None => PathBuf::from(".").join(DEFAULT_STORE_DIR_NAME),
        });

    let project_key = flag_value(args, "--project")
        .or_else(|| env("SYZYGY_PROJECT_KEY"))
        .unwrap_or_default();

    let artifacts_dir = flag_value(args, "--artifacts-dir")
        .or_else(|| env("SYZYGY_ARTIFACTS_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".").join(DEFAULT_ARTIFACTS_DIR));

    RuntimeConfig {
        storage_dir,
        project_key: canonical_project_key(&project_key),
        artifacts_dir,
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut iter = args.iter();
    let mut found = None;
    while let Some(arg) = iter.next() {
        if arg.as_str() == flag
            && let Some(value) = iter.next()
        {
            found = Some(value.clone());
        }
    }
    found.filter(|v| !v.trim().is_empty())
}

pub(crate) fn wants_help(args: &[String]) -> bool {
    args.iter().any(|arg| matches!(arg.as_str(), "-h" | "--help"))
}

pub(crate) fn wants_version(args: &[String]) -> bool {
    args.iter()
        .any(|arg| matches!(arg.as_str(), "-V" | "--version"))
}
